//! Front-end: cache-block generation, DSB/MITE source selection, and the
//! pre-decode/decode/DSB/MS stages that fill the IDQ (`SPEC_FULL.md` §4.2).

pub mod decode;
pub mod dsb;
pub mod instantiate;
pub mod ms;
pub mod predecode;

use std::collections::VecDeque;

use crate::arch::ArchProfile;
use crate::isa::Program;
use crate::model::{LaminatedUop, UopPool};
use crate::pipeline::cacheblock::{CacheBlockGenerator, DsbCacheability, Mode};
use crate::pipeline::idq::Idq;

use decode::{Decoder, IqEntry, IQ_WIDTH};
use dsb::Dsb;
use ms::MicrocodeSequencer;
use predecode::{split_into_16byte_quarters, PreDecoder};

/// Which uop source is currently active. The front-end only ever drains
/// one of MITE/DSB per cycle (mutually exclusive, as on real hardware);
/// the other keeps being topped up by cache-block admission in the
/// background so the switch is instant once triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Mite,
    Dsb,
}

pub struct FrontEnd {
    generator: CacheBlockGenerator,
    cacheability: DsbCacheability,
    total_len: u64,
    mode: Mode,
    source: Source,

    dsb: Dsb,
    predecoder: PreDecoder,
    decoder: Decoder,
    ms: MicrocodeSequencer,
    iq: VecDeque<IqEntry>,

    pending: VecDeque<LaminatedUop>,
}

impl FrontEnd {
    #[must_use]
    pub fn new(program: &Program, profile: &ArchProfile, mode: Mode) -> Self {
        let mut cacheability = DsbCacheability::new();
        let total_len = CacheBlockGenerator::new(program, mode).total_len();

        if mode == Mode::Loop {
            let mut probe = CacheBlockGenerator::new(program, mode);
            let mut first_round = Vec::new();
            while let Some(block) = probe.next_block() {
                if block.instrs.first().is_some_and(|i| i.round > 0) {
                    break;
                }
                first_round.push(block);
            }
            cacheability.precompute_first_round(&first_round, total_len, program);
        }

        let source = match mode {
            Mode::Loop => {
                if cacheability.cached_is_cacheable(0, total_len).unwrap_or(false) {
                    Source::Dsb
                } else {
                    Source::Mite
                }
            }
            Mode::Unroll => Source::Mite,
        };

        Self {
            generator: CacheBlockGenerator::new(program, mode),
            cacheability,
            total_len,
            mode,
            source,
            dsb: Dsb::new(profile.dsb_width),
            predecoder: PreDecoder::new(profile.predecode_width),
            decoder: Decoder::new(profile.n_decoders, profile.macro_fusible_instr_can_be_decoded_as_last_instr),
            ms: MicrocodeSequencer::new(),
            iq: VecDeque::new(),
            pending: VecDeque::new(),
        }
    }

    fn admit_cache_blocks(&mut self, program: &Program) {
        while self.dsb.queue_len() < 2 && self.predecoder.queue_len() < 4 {
            let Some(block) = self.generator.next_block() else {
                break;
            };
            for half in block.halves() {
                if self.cacheability.is_cacheable(&half, self.total_len, program) {
                    let filtered: Vec<_> = half
                        .into_iter()
                        .filter(|i| !program.instructions[i.instr_pos].macro_fused_with_prev_instr)
                        .collect();
                    if !filtered.is_empty() {
                        self.dsb.push_half(filtered);
                    }
                } else {
                    for quarter in split_into_16byte_quarters(&half) {
                        self.predecoder.push_quarter(quarter);
                    }
                }
            }
        }
    }

    /// Re-evaluates `self.source` after the active stage terminates a
    /// decode/DSB group on a branch or macro-fused-with-next instruction,
    /// modeling steady-state throughput as an always-taken loop back to
    /// the head of the program (`SPEC_FULL.md` §4.2).
    fn maybe_switch_source(&mut self) {
        let Some(next_addr) = self.next_pending_addr() else {
            return;
        };
        let cacheable = self
            .cacheability
            .cached_is_cacheable(next_addr, self.total_len)
            .unwrap_or(false);
        self.source = if cacheable { Source::Dsb } else { Source::Mite };
    }

    fn next_pending_addr(&self) -> Option<u64> {
        [self.dsb.peek_addr(), self.predecoder.peek_addr()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Advances the front-end by one cycle, pushing newly-fetched laminated
    /// uops into `idq` and stamping `addedToIdq` on each of their uops.
    pub fn cycle(&mut self, clock: u64, program: &Program, pool: &mut UopPool, idq: &mut Idq) {
        self.admit_cache_blocks(program);

        let mut produced: Vec<LaminatedUop> = Vec::new();
        let mut ms_input = Vec::new();
        let mut ended_on_branch_or_fusion = false;

        if self.ms.is_busy() {
            let drained = self.ms.cycle();
            produced.extend(drained.into_iter().map(LaminatedUop::single));
        } else {
            match self.source {
                Source::Mite => {
                    while let Some(group) = self.predecoder.cycle(program) {
                        for instr in group {
                            debug_assert!(self.iq.len() <= IQ_WIDTH * 2);
                            self.iq.push_back(IqEntry {
                                instr,
                                predecoded: clock,
                            });
                        }
                    }
                    let mut fused = Vec::new();
                    let handed_off = self.decoder.cycle(&mut self.iq, clock, program, pool, &mut fused);
                    if let Some(last) = fused.last() {
                        let instr_pos = last.instr_pos(pool);
                        let data = &program.instructions[instr_pos];
                        ended_on_branch_or_fusion = data.is_branch_instr || data.macro_fused_with_next_instr;
                    }
                    produced.extend(fused.into_iter().map(LaminatedUop::single));
                    ms_input.extend(handed_off);
                }
                Source::Dsb => {
                    let mut fused = Vec::new();
                    let handed_off = self.dsb.cycle(program, pool, &mut fused);
                    if let Some(last) = fused.last() {
                        let instr_pos = last.instr_pos(pool);
                        let data = &program.instructions[instr_pos];
                        ended_on_branch_or_fusion = data.is_branch_instr || data.macro_fused_with_next_instr;
                    }
                    produced.extend(fused.into_iter().map(LaminatedUop::single));
                    ms_input.extend(handed_off);
                }
            }
        }

        if !ms_input.is_empty() {
            self.ms.add_uops(ms_input);
        }
        if ended_on_branch_or_fusion {
            self.maybe_switch_source();
        }

        self.pending.extend(produced);
        while idq.has_room_for(1) {
            let Some(laminated) = self.pending.pop_front() else {
                break;
            };
            for uop_id in laminated.iter_uops() {
                pool.get_mut(uop_id).added_to_idq = Some(clock);
            }
            idq.push(laminated);
        }
    }
}
