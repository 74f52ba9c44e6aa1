//! `FusedUop`: one or more unfused uops sharing a single ROB/retirement
//! slot (`SPEC_FULL.md` §3, §4.4).

use crate::isa::Program;
use crate::model::uop::{UopId, UopPool};

/// A micro-fused group of [`UopId`]s that retires together.
///
/// Unlike [`crate::model::uop::Uop`] and
/// [`crate::model::renamed_operand::RenamedOperandState`], `FusedUop` is
/// not arena-held: it is built once by the renamer and then moved by value
/// through the ROB's `VecDeque`, the same way the teacher's pipeline
/// latches move owned stage-entry structs between stages rather than
/// referencing them by index.
#[derive(Debug, Clone)]
pub struct FusedUop {
    pub uops: Vec<UopId>,
}

impl FusedUop {
    #[must_use]
    pub fn new(uops: Vec<UopId>) -> Self {
        debug_assert!(!uops.is_empty(), "a fused uop must contain at least one uop");
        Self { uops }
    }

    #[must_use]
    pub fn is_retired(&self, pool: &UopPool) -> bool {
        self.uops.iter().all(|&id| pool.get(id).retired.is_some())
    }

    /// The latest `executed` cycle among this group's uops, or `None` if
    /// any of them hasn't executed yet — the earliest cycle at which the
    /// whole fused group can retire.
    #[must_use]
    pub fn all_executed_cycle(&self, pool: &UopPool) -> Option<u64> {
        self.uops
            .iter()
            .map(|&id| pool.get(id).executed)
            .try_fold(0u64, |max, executed| executed.map(|e| max.max(e)))
    }

    #[must_use]
    pub fn instr_pos(&self, pool: &UopPool) -> usize {
        pool.get(self.uops[0]).instr_pos
    }

    #[must_use]
    pub fn instr_str<'a>(&self, pool: &UopPool, program: &'a Program) -> &'a str {
        pool.get(self.uops[0]).instr_str(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UopKind;

    #[test]
    fn all_executed_cycle_is_none_until_every_uop_has_executed() {
        let mut pool = UopPool::new();
        let a = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let b = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let fused = FusedUop::new(vec![a, b]);

        assert_eq!(fused.all_executed_cycle(&pool), None);

        pool.get_mut(a).executed = Some(3);
        assert_eq!(fused.all_executed_cycle(&pool), None);

        pool.get_mut(b).executed = Some(5);
        assert_eq!(fused.all_executed_cycle(&pool), Some(5));
    }

    #[test]
    fn is_retired_requires_every_uop_retired() {
        let mut pool = UopPool::new();
        let a = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let b = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![] });
        let fused = FusedUop::new(vec![a, b]);

        pool.get_mut(a).retired = Some(1);
        assert!(!fused.is_retired(&pool));
        pool.get_mut(b).retired = Some(2);
        assert!(fused.is_retired(&pool));
    }
}
