//! `LaminatedUop`: one or more [`FusedUop`]s consumed from the IDQ as a
//! single slot (`SPEC_FULL.md` §3, §4.2-§4.3).

use crate::model::fused::FusedUop;
use crate::model::uop::{UopId, UopPool};

/// A laminated group, occupying one IDQ entry.
///
/// Laminated uops that don't fit the renamer's per-cycle issue width are
/// split back into their constituent [`FusedUop`]s at issue time (the
/// reference tool's `laminate`/`delaminate` distinction); this type only
/// models the grouping the front-end hands to the renamer, not that split.
#[derive(Debug, Clone)]
pub struct LaminatedUop {
    pub fused: Vec<FusedUop>,
}

impl LaminatedUop {
    #[must_use]
    pub fn new(fused: Vec<FusedUop>) -> Self {
        debug_assert!(!fused.is_empty(), "a laminated uop must contain at least one fused uop");
        Self { fused }
    }

    #[must_use]
    pub fn single(fused: FusedUop) -> Self {
        Self { fused: vec![fused] }
    }

    pub fn iter_uops(&self) -> impl Iterator<Item = UopId> + '_ {
        self.fused.iter().flat_map(|f| f.uops.iter().copied())
    }

    #[must_use]
    pub fn instr_pos(&self, pool: &UopPool) -> usize {
        self.fused[0].instr_pos(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UopKind;

    #[test]
    fn iter_uops_flattens_every_fused_group_in_order() {
        let mut pool = UopPool::new();
        let a = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let b = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let c = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let laminated = LaminatedUop::new(vec![FusedUop::new(vec![a, b]), FusedUop::new(vec![c])]);

        assert_eq!(laminated.iter_uops().collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(laminated.instr_pos(&pool), 0);
    }
}
