//! Cache-block generation and DSB-cacheability (`SPEC_FULL.md` §4.2).

use std::collections::HashMap;

use crate::isa::Program;

/// One instruction's static position within one iteration of the program,
/// laid out sequentially from address 0.
#[derive(Debug, Clone, Copy)]
struct InstrLayout {
    instr_pos: usize,
    addr: u64,
    len: u32,
}

/// Whether the generator repeats the same addresses every round (`-loop`)
/// or lays successive rounds out at ever-increasing addresses (unroll,
/// the default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Loop,
    Unroll,
}

/// One instruction's occurrence within a generated [`CacheBlock`].
#[derive(Debug, Clone, Copy)]
pub struct BlockInstr {
    pub instr_pos: usize,
    pub round: u64,
    pub addr: u64,
    pub len: u32,
}

/// One 64-byte-aligned cache block's worth of instruction occurrences.
#[derive(Debug, Clone, Default)]
pub struct CacheBlock {
    pub instrs: Vec<BlockInstr>,
}

impl CacheBlock {
    /// Splits this block into its (up to two) 32-byte halves, in address
    /// order.
    #[must_use]
    pub fn halves(&self) -> Vec<Vec<BlockInstr>> {
        let Some(first) = self.instrs.first() else {
            return Vec::new();
        };
        let block_start = first.addr - first.addr % 64;
        let mid = block_start + 32;
        let (lo, hi): (Vec<_>, Vec<_>) = self.instrs.iter().partition(|i| i.addr < mid);
        [lo, hi].into_iter().filter(|h| !h.is_empty()).collect()
    }
}

/// Precomputes the sequential byte layout of one program iteration.
fn layout_program(program: &Program) -> (Vec<InstrLayout>, u64) {
    let mut layout = Vec::with_capacity(program.len());
    let mut addr = 0u64;
    for (instr_pos, instr) in program.instructions.iter().enumerate() {
        layout.push(InstrLayout {
            instr_pos,
            addr,
            len: instr.length,
        });
        addr += u64::from(instr.length);
    }
    (layout, addr)
}

/// Produces the sequence of 64-byte cache blocks covering the instruction
/// stream, in `-loop` or unrolled mode.
#[derive(Clone)]
pub struct CacheBlockGenerator {
    layout: Vec<InstrLayout>,
    total_len: u64,
    mode: Mode,
    next_pos: usize,
    round: u64,
    addr_base: u64,
}

impl CacheBlockGenerator {
    #[must_use]
    pub fn new(program: &Program, mode: Mode) -> Self {
        let (layout, total_len) = layout_program(program);
        Self {
            layout,
            total_len,
            mode,
            next_pos: 0,
            round: 0,
            addr_base: 0,
        }
    }

    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    fn current_addr(&self) -> u64 {
        self.addr_base + self.layout[self.next_pos].addr
    }

    fn advance(&mut self) {
        self.next_pos += 1;
        if self.next_pos >= self.layout.len() {
            self.next_pos = 0;
            self.round += 1;
            match self.mode {
                Mode::Loop => self.addr_base = 0,
                Mode::Unroll => self.addr_base += self.total_len,
            }
        }
    }

    /// Produces the next 64-byte cache block, or `None` for an empty
    /// program.
    pub fn next_block(&mut self) -> Option<CacheBlock> {
        if self.layout.is_empty() {
            return None;
        }
        let mut instrs = Vec::new();
        let start_round = self.round;
        let boundary = {
            let start = self.current_addr();
            start - start % 64 + 64
        };
        loop {
            let addr = self.current_addr();
            if addr >= boundary {
                break;
            }
            // Loop mode never spans a round boundary within one block: a
            // partial trailing block at the end of a round is short rather
            // than stitched to the next round's head.
            if self.mode == Mode::Loop && self.round != start_round {
                break;
            }
            let layout = self.layout[self.next_pos];
            instrs.push(BlockInstr {
                instr_pos: layout.instr_pos,
                round: self.round,
                addr,
                len: layout.len,
            });
            self.advance();
            if instrs.is_empty() {
                break;
            }
        }
        Some(CacheBlock { instrs })
    }
}

/// Absolute address of the address-0 half, reduced to a `total_len`-periodic
/// offset so loop and unroll modes share one cacheability cache.
fn periodic_offset(addr: u64, total_len: u64) -> u64 {
    if total_len == 0 { 0 } else { addr % total_len }
}

/// Lazily-memoized DSB-cacheability per 32-byte-half starting offset
/// (`SPEC_FULL.md` §4.2). Cacheability depends only on `addr % total_len`,
/// since the instruction bytes repeat every iteration; loop mode
/// precomputes every offset from the first round up front, unroll mode
/// computes each offset the first time a block reaches it (see DESIGN.md,
/// Open Question #7).
#[derive(Debug, Default)]
pub struct DsbCacheability {
    cache: HashMap<u64, bool>,
}

impl DsbCacheability {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_cacheable(
        &mut self,
        half: &[BlockInstr],
        total_len: u64,
        program: &Program,
    ) -> bool {
        let Some(first) = half.first() else {
            return false;
        };
        let offset = periodic_offset(first.addr, total_len);
        if let Some(&cached) = self.cache.get(&offset) {
            return cached;
        }
        let value = compute_cacheable(half, program);
        self.cache.insert(offset, value);
        value
    }

    /// Looks up a previously-computed cacheability without materializing the
    /// half; used by the front-end's source-switching decision, which only
    /// ever asks about offsets already observed by cache-block admission.
    #[must_use]
    pub fn cached_is_cacheable(&self, addr: u64, total_len: u64) -> Option<bool> {
        self.cache.get(&periodic_offset(addr, total_len)).copied()
    }

    pub fn precompute_first_round(&mut self, generator_layout: &[CacheBlock], total_len: u64, program: &Program) {
        for block in generator_layout {
            for half in block.halves() {
                self.is_cacheable(&half, total_len, program);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Instruction;

    fn instr_of_len(len: u32) -> Instruction {
        let mut instr = Instruction::unknown("nop");
        instr.length = len;
        instr
    }

    #[test]
    fn a_block_includes_every_instruction_starting_before_the_next_64_byte_boundary() {
        // Only an instruction's *start* address is checked against the
        // boundary: instr_of_len(8) starts at 60 (before 64) and is kept
        // whole in the first block even though it ends at 68.
        let program = Program {
            instructions: vec![instr_of_len(60), instr_of_len(8), instr_of_len(4)],
        };
        let mut gen = CacheBlockGenerator::new(&program, Mode::Unroll);

        let first = gen.next_block().unwrap();
        assert_eq!(first.instrs.iter().map(|i| i.instr_pos).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(first.instrs[0].addr, 0);
        assert_eq!(first.instrs[1].addr, 60);

        let second = gen.next_block().unwrap();
        assert_eq!(second.instrs[0].instr_pos, 2);
        assert_eq!(second.instrs[0].addr, 68);
    }

    #[test]
    fn unroll_mode_advances_addresses_every_round_while_loop_mode_repeats() {
        let program = Program { instructions: vec![instr_of_len(64)] };

        let mut unroll = CacheBlockGenerator::new(&program, Mode::Unroll);
        let first_block = unroll.next_block().unwrap();
        assert_eq!(first_block.instrs[0].addr, 0);
        let second_block = unroll.next_block().unwrap();
        assert_eq!(second_block.instrs[0].addr, 64);
        assert_eq!(second_block.instrs[0].round, 1);

        let mut looped = CacheBlockGenerator::new(&program, Mode::Loop);
        let first_loop_block = looped.next_block().unwrap();
        assert_eq!(first_loop_block.instrs[0].addr, 0);
        let second_loop_block = looped.next_block().unwrap();
        assert_eq!(second_loop_block.instrs[0].addr, 0);
        assert_eq!(second_loop_block.instrs[0].round, 1);
    }

    #[test]
    fn empty_program_yields_no_blocks() {
        let program = Program { instructions: Vec::new() };
        let mut gen = CacheBlockGenerator::new(&program, Mode::Unroll);
        assert!(gen.next_block().is_none());
    }

    #[test]
    fn cacheability_rejects_a_half_with_too_many_uops() {
        let mut heavy = Instruction::unknown("heavy");
        heavy.length = 4;
        heavy.uops = 19;
        let program = Program { instructions: vec![heavy] };
        let half = vec![BlockInstr { instr_pos: 0, round: 0, addr: 0, len: 4 }];

        let mut cacheability = DsbCacheability::new();
        assert!(!cacheability.is_cacheable(&half, 4, &program));
    }
}

fn compute_cacheable(half: &[BlockInstr], program: &Program) -> bool {
    let Some(&half_start) = half.first().map(|i| &i.addr) else {
        return false;
    };
    let half_end = half_start + 32;

    let mut total_uops = 0u32;
    for instr in half {
        let data = &program.instructions[instr.instr_pos];
        if !data.macro_fused_with_prev_instr {
            total_uops += data.uops;
        }
    }
    if total_uops > 18 {
        return false;
    }

    let Some(last) = half.last() else { return false };
    let last_data = &program.instructions[last.instr_pos];
    if last_data.macro_fused_with_next_instr {
        return false;
    }
    if last_data.is_branch_instr && last.addr + u64::from(last.len) >= half_end {
        return false;
    }
    true
}
