//! Decoded Stream Buffer: emits laminated uops straight from cached 32-byte
//! halves, bypassing pre-decode/decode entirely (`SPEC_FULL.md` §4.2).

use std::collections::VecDeque;

use crate::isa::Program;
use crate::model::{FusedUop, UopPool};
use crate::pipeline::cacheblock::BlockInstr;
use crate::pipeline::frontend::instantiate::instantiate;

#[derive(Debug)]
pub struct Dsb {
    blocks: VecDeque<VecDeque<BlockInstr>>,
    current: VecDeque<BlockInstr>,
    last_emitted_end: Option<u64>,
    width: usize,
}

impl Dsb {
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            blocks: VecDeque::new(),
            current: VecDeque::new(),
            last_emitted_end: None,
            width,
        }
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.blocks.len() + usize::from(!self.current.is_empty())
    }

    /// Address of the next instruction this buffer would emit, if any.
    #[must_use]
    pub fn peek_addr(&self) -> Option<u64> {
        self.current
            .front()
            .or_else(|| self.blocks.front().and_then(|b| b.front()))
            .map(|i| i.addr)
    }

    pub fn push_half(&mut self, half: Vec<BlockInstr>) {
        self.blocks.push_back(half.into());
    }

    /// Advances by one cycle, emitting up to `width` laminated uops onto
    /// `out`; returns any uops routed to the Microcode Sequencer.
    pub fn cycle(&mut self, program: &Program, pool: &mut UopPool, out: &mut Vec<FusedUop>) -> Vec<FusedUop> {
        let mut ms_handoff = Vec::new();
        let mut budget = self.width;
        let mut blocks_started_this_cycle = 0;

        loop {
            if self.current.is_empty() {
                if blocks_started_this_cycle >= 2 {
                    break;
                }
                let Some(next) = self.blocks.front() else {
                    break;
                };
                if blocks_started_this_cycle == 1 {
                    let contiguous = next
                        .front()
                        .zip(self.last_emitted_end)
                        .is_some_and(|(head, end)| head.addr == end);
                    if !contiguous {
                        break;
                    }
                }
                self.current = self.blocks.pop_front().unwrap_or_default();
                blocks_started_this_cycle += 1;
            }
            if budget == 0 {
                break;
            }
            let Some(instr) = self.current.pop_front() else {
                continue;
            };
            self.last_emitted_end = Some(instr.addr + u64::from(instr.len));
            let data = &program.instructions[instr.instr_pos];
            let inst = instantiate(instr.instr_pos, instr.round, data, pool);
            let n = inst.mite.len().min(budget);
            out.extend(inst.mite.into_iter().take(n));
            budget -= n;
            ms_handoff.extend(inst.ms);
        }
        ms_handoff
    }
}
