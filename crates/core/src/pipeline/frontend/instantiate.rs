//! Turns one instruction occurrence into its unfused [`crate::model::Uop`]s,
//! grouped into the [`FusedUop`]s it retires as.
//!
//! The uop model only records a count of retirement slots, not which
//! unfused uops share one — this module's grouping rule (front-load singles,
//! tail-merge any remainder into the last slot) is a documented
//! simplification rather than a literal port of per-uop fusion metadata,
//! since the compiled `UopProperties` table carries no such field (see
//! DESIGN.md).

use crate::isa::Instruction;
use crate::model::{FusedUop, UopId, UopKind, UopPool};

/// The MITE-deliverable and MS-deliverable `FusedUop` groups for one
/// instruction occurrence, in program order.
pub struct InstantiatedInstr {
    pub mite: Vec<FusedUop>,
    pub ms: Vec<FusedUop>,
}

fn group_into_fused(ids: Vec<UopId>, slots: usize) -> Vec<FusedUop> {
    let slots = slots.max(1);
    if ids.len() <= slots {
        return ids.into_iter().map(|id| FusedUop::new(vec![id])).collect();
    }
    let mut groups: Vec<Vec<UopId>> = (0..slots).map(|_| Vec::new()).collect();
    for (i, id) in ids.into_iter().enumerate() {
        groups[i.min(slots - 1)].push(id);
    }
    groups.into_iter().map(FusedUop::new).collect()
}

/// Allocates fresh [`UopId`]s for one occurrence (`instr_pos`, `round`) of
/// `instr` and groups them into retiring `FusedUop`s.
pub fn instantiate(instr_pos: usize, round: u64, instr: &Instruction, pool: &mut UopPool) -> InstantiatedInstr {
    let all_ids: Vec<UopId> = (0..instr.uop_properties.len())
        .map(|i| pool.allocate(instr_pos, round, UopKind::Normal { uop_props_idx: i }))
        .collect();

    let split_at = (instr.uops_mite as usize).min(all_ids.len());
    let mite_ids = all_ids[..split_at].to_vec();
    let ms_ids = all_ids[split_at..].to_vec();

    if ms_ids.is_empty() {
        InstantiatedInstr {
            mite: group_into_fused(mite_ids, instr.retire_slots as usize),
            ms: Vec::new(),
        }
    } else {
        // Microcoded instructions don't fold their MS uops into the MITE
        // retirement slots in this model; each MS uop retires on its own.
        InstantiatedInstr {
            mite: group_into_fused(mite_ids, instr.retire_slots as usize),
            ms: ms_ids.into_iter().map(|id| FusedUop::new(vec![id])).collect(),
        }
    }
}

/// Allocates one self-contained stack-synch [`UopId`] and wraps it as its
/// own `FusedUop` (`SPEC_FULL.md` §4.1).
pub fn instantiate_stack_synch(
    instr_pos: usize,
    round: u64,
    possible_ports: Vec<crate::arch::Port>,
    pool: &mut UopPool,
) -> FusedUop {
    let id = pool.allocate(instr_pos, round, UopKind::StackSynch { possible_ports });
    FusedUop::new(vec![id])
}

/// Splices `fused_groups`'s first group into the end of `prev_tail` (the
/// previous instruction's last `FusedUop`), modeling macro-fusion's shared
/// retirement slot; any remaining groups are appended unchanged.
pub fn splice_macro_fused(prev_tail: &mut FusedUop, mut fused_groups: Vec<FusedUop>) -> Vec<FusedUop> {
    if fused_groups.is_empty() {
        return Vec::new();
    }
    let first = fused_groups.remove(0);
    prev_tail.uops.extend(first.uops);
    fused_groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uops_within_slot_count_each_get_their_own_fused_group() {
        let ids: Vec<UopId> = (0..3).map(UopId).collect();
        let groups = group_into_fused(ids, 4);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.uops.len() == 1));
    }

    #[test]
    fn excess_uops_tail_merge_into_the_last_slot() {
        let ids: Vec<UopId> = (0..5).map(UopId).collect();
        let groups = group_into_fused(ids, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].uops.len(), 1);
        assert_eq!(groups[1].uops.len(), 4);
    }
}
