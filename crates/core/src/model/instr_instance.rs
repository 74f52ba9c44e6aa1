//! `InstrInstance`: one dynamic occurrence of a static instruction moving
//! through pre-decode and decode before it has been grouped into laminated
//! uops (`SPEC_FULL.md` §4.2).

use crate::model::uop::UopId;

/// Bookkeeping for one instruction-round as it is fetched, pre-decoded and
/// decoded, before the renamer laminates its uops into [`crate::model::laminated::LaminatedUop`]s.
///
/// Front-end stages accumulate a round's uops here one at a time (MITE
/// decoders and the microcode sequencer both append to the same
/// instruction's `uops` list); once an instruction's full uop count has
/// been produced, `source` records where they came from for port-usage
/// and DSB-delivery accounting.
#[derive(Debug, Clone)]
pub struct InstrInstance {
    pub instr_pos: usize,
    pub round: u64,
    pub source: UopSource,
    pub uops: Vec<UopId>,
}

/// Which front-end path produced an instruction's uops this round
/// (`SPEC_FULL.md` §4.2's `uopSource`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UopSource {
    Mite,
    Dsb,
    Ms,
}

impl InstrInstance {
    #[must_use]
    pub fn new(instr_pos: usize, round: u64, source: UopSource) -> Self {
        Self {
            instr_pos,
            round,
            source,
            uops: Vec::new(),
        }
    }

    pub fn push_uop(&mut self, uop: UopId) {
        self.uops.push(uop);
    }
}
