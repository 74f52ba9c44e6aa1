//! MITE decoder: turns instruction-queue entries into laminated MITE uops,
//! handing microcoded instructions off to the Microcode Sequencer
//! (`SPEC_FULL.md` §4.2).
//!
//! The `POP 5C` (`pop rsp`/`pop r12`) special case is absorbed into the
//! externally-supplied `complex_decoder` flag rather than re-derived from an
//! opcode byte — this crate takes decoder classification as disassembly-
//! layer input, the same choice already made for `InstrKind` (see
//! `isa::instruction`).

use std::collections::VecDeque;

use crate::isa::Program;
use crate::model::{FusedUop, UopPool};
use crate::pipeline::cacheblock::BlockInstr;
use crate::pipeline::frontend::instantiate::{instantiate, splice_macro_fused};

const PREDECODE_DECODE_DELAY: u64 = 3;

/// One instance sitting in the instruction queue, predecoded but not yet
/// decoded.
#[derive(Debug, Clone, Copy)]
pub struct IqEntry {
    pub instr: BlockInstr,
    pub predecoded: u64,
}

pub const IQ_WIDTH: usize = 25;

pub struct Decoder {
    n_decoders: usize,
    macro_fusible_can_be_last: bool,
}

impl Decoder {
    #[must_use]
    pub fn new(n_decoders: usize, macro_fusible_can_be_last: bool) -> Self {
        Self {
            n_decoders,
            macro_fusible_can_be_last,
        }
    }

    /// Runs one decode cycle over up to `n_decoders` slots, consuming
    /// entries from the head of `iq`. Newly laminated MITE uops are pushed
    /// onto `out` (so macro-fusion can splice into the previous
    /// instruction's tail `FusedUop`); any uops handed to the Microcode
    /// Sequencer are returned separately.
    pub fn cycle(
        &mut self,
        iq: &mut VecDeque<IqEntry>,
        clock: u64,
        program: &Program,
        pool: &mut UopPool,
        out: &mut Vec<FusedUop>,
    ) -> Vec<FusedUop> {
        let mut ms_handoff = Vec::new();
        let mut remaining = self.n_decoders;
        let mut used_complex_slot = false;

        while remaining > 0 {
            let Some(entry) = iq.front().copied() else {
                break;
            };
            let data = &program.instructions[entry.instr.instr_pos];

            if data.macro_fused_with_prev_instr {
                iq.pop_front();
                let inst = instantiate(entry.instr.instr_pos, entry.instr.round, data, pool);
                if let Some(prev) = out.last_mut() {
                    out.extend(splice_macro_fused(prev, inst.mite));
                } else {
                    out.extend(inst.mite);
                }
                ms_handoff.extend(inst.ms);
                continue;
            }

            if clock.saturating_sub(entry.predecoded) < PREDECODE_DECODE_DELAY {
                break;
            }

            let is_fusible = !data.macro_fusible_with.is_empty();
            if data.complex_decoder {
                if used_complex_slot {
                    break;
                }
                used_complex_slot = true;
            } else if !self.macro_fusible_can_be_last && is_fusible {
                if remaining == 1 {
                    // A fusible instruction may not occupy the last decoder
                    // slot this cycle.
                    break;
                }
                let next_ready = iq
                    .get(1)
                    .is_some_and(|next| clock.saturating_sub(next.predecoded) >= PREDECODE_DECODE_DELAY);
                if !next_ready {
                    break;
                }
            }

            iq.pop_front();
            let inst = instantiate(entry.instr.instr_pos, entry.instr.round, data, pool);
            let handed_off_to_ms = !inst.ms.is_empty();
            out.extend(inst.mite);
            ms_handoff.extend(inst.ms);
            remaining -= 1;

            if handed_off_to_ms {
                // A decoder cycle terminates once it hands work to the MS.
                break;
            }
            if data.is_branch_instr || data.macro_fused_with_next_instr {
                break;
            }
        }
        ms_handoff
    }
}
