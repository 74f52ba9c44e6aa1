//! Pre-decoder: moves up to `PreDecode_Width` instances per cycle from a
//! 16-byte block into the instruction queue, honoring LCP stalls
//! (`SPEC_FULL.md` §4.2).

use std::collections::VecDeque;

use crate::isa::Program;
use crate::pipeline::cacheblock::BlockInstr;

const LCP_STALL_CYCLES: u32 = 3;

/// Splits a 32-byte (non-cacheable) half into its two 16-byte quarters.
#[must_use]
pub fn split_into_16byte_quarters(half: &[BlockInstr]) -> Vec<Vec<BlockInstr>> {
    let Some(first) = half.first() else {
        return Vec::new();
    };
    let half_start = first.addr - first.addr % 16;
    let mid = half_start + 16;
    let (lo, hi): (Vec<_>, Vec<_>) = half.iter().copied().partition(|i| i.addr < mid);
    [lo, hi].into_iter().filter(|q| !q.is_empty()).collect()
}

/// Stages instruction instances out of 16-byte blocks, applying the LCP
/// stall penalty before releasing a group to the instruction queue.
#[derive(Debug)]
pub struct PreDecoder {
    queue: VecDeque<Vec<BlockInstr>>,
    carry: Vec<BlockInstr>,
    staged: Option<(Vec<BlockInstr>, u32)>,
    width: usize,
}

impl PreDecoder {
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            carry: Vec::new(),
            staged: None,
            width,
        }
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn push_quarter(&mut self, quarter: Vec<BlockInstr>) {
        self.queue.push_back(quarter);
    }

    /// Address of the next instruction this stage would release, if any.
    #[must_use]
    pub fn peek_addr(&self) -> Option<u64> {
        self.carry
            .first()
            .or_else(|| self.staged.as_ref().and_then(|(g, _)| g.first()))
            .or_else(|| self.queue.front().and_then(|b| b.first()))
            .map(|i| i.addr)
    }

    /// Advances by one cycle; returns a group of instances newly released
    /// to the instruction queue, if any.
    pub fn cycle(&mut self, program: &Program) -> Option<Vec<BlockInstr>> {
        if let Some((_, stall)) = &mut self.staged {
            if *stall > 0 {
                *stall -= 1;
                return None;
            }
            return self.staged.take().map(|(group, _)| group);
        }

        let block = self.queue.pop_front()?;
        let mut group = std::mem::take(&mut self.carry);
        let mut block_iter = block.into_iter();
        for instr in block_iter.by_ref() {
            if group.len() >= self.width {
                self.carry.push(instr);
                break;
            }
            let local = instr.addr % 16;
            if local + u64::from(instr.len) > 16 && !group.is_empty() {
                self.carry.push(instr);
                continue;
            }
            group.push(instr);
        }
        self.carry.extend(block_iter);

        if group.is_empty() {
            return None;
        }
        let stall: u32 = group
            .iter()
            .map(|i| {
                if program.instructions[i.instr_pos].lcp_stall {
                    LCP_STALL_CYCLES
                } else {
                    0
                }
            })
            .sum();
        if stall == 0 {
            Some(group)
        } else {
            self.staged = Some((group, stall));
            None
        }
    }
}
