//! When a non-dispatched uop becomes ready to dispatch (`SPEC_FULL.md` §4.5
//! step 5).

use crate::isa::{Operand, Program};
use crate::model::{OperandPool, UopId, UopPool};
use crate::pipeline::scheduler::fences::FenceState;

/// `getReadyForDispatchCycle`: combines operand readiness with the fixed
/// issue-to-dispatch delay.
#[must_use]
pub fn ready_for_dispatch_cycle(issued: u64, op_ready: i64, issue_dispatch_delay: u64, clock: u64) -> u64 {
    let issued = i64::try_from(issued).unwrap_or(i64::MAX);
    let d = i64::try_from(issue_dispatch_delay).unwrap_or(i64::MAX);
    let base = issued + d;
    let v = if op_ready < base {
        base
    } else if op_ready == base || op_ready == base + 1 {
        op_ready + 1
    } else {
        op_ready
    };
    let v = v.max(i64::try_from(clock).unwrap_or(0) + 1);
    u64::try_from(v).unwrap_or(u64::MAX)
}

/// The latest cycle every non-memory input this uop depends on becomes
/// ready, or `None` if some producer hasn't dispatched yet.
///
/// A load uop's memory operand is skipped: it can issue as soon as its
/// address registers are ready, before the actual memory operand is ready
/// (`SPEC_FULL.md` §4.5 step 5).
#[must_use]
pub fn operand_ready(uop_id: UopId, pool: &UopPool, operands: &OperandPool, program: &Program) -> Option<i64> {
    let uop = pool.get(uop_id);
    let is_load = uop.is_load_uop(program);
    let input_values = uop.input_operand_values(program);
    let mut ready = -1i64;
    for (idx, &renamed) in uop.renamed_inputs.iter().enumerate() {
        if is_load && matches!(input_values.get(idx), Some(Operand::Mem(_))) {
            continue;
        }
        let r = operands.ready_cycle_of(renamed, pool, program)?;
        ready = ready.max(r);
    }
    Some(ready)
}

/// Whether `uop_id` clears the fence ordering rules for this cycle.
///
/// The store-serializing branch below consults the *load* fence FIFO and
/// load-since-fence list instead of the store ones — this reproduces a bug
/// in the reference tool verbatim rather than fixing it (see DESIGN.md,
/// Open Question #4).
#[must_use]
pub fn clears_fences(uop_id: UopId, clock: u64, pool: &UopPool, program: &Program, fences: &FenceState) -> bool {
    let uop = pool.get(uop_id);
    let is_first = uop.is_first_uop_of_instr(program);
    let data = &program.instructions[uop.instr_pos];

    if is_first && data.is_load_serializing {
        if fences.load_fence_fifo.front() != Some(&uop_id) {
            return false;
        }
        if !fences.loads_since_fence.iter().all(|&id| pool.get(id).executed.is_some_and(|e| e <= clock)) {
            return false;
        }
    }
    if is_first && data.is_store_serializing {
        // BUG (preserved, see DESIGN.md #4): checks the load fence FIFO,
        // not the store one.
        if fences.load_fence_fifo.front() != Some(&uop_id) {
            return false;
        }
        if !fences.loads_since_fence.iter().all(|&id| pool.get(id).executed.is_some_and(|e| e <= clock)) {
            return false;
        }
    }

    if uop.is_load_uop(program) {
        if let Some(&head) = fences.load_fence_fifo.front() {
            if pool.get(head).idx < uop.idx {
                return false;
            }
        }
    }
    if uop.is_store_address_uop(program) || uop.is_store_data_uop(program) {
        if let Some(&head) = fences.store_fence_fifo.front() {
            if pool.get(head).idx < uop.idx {
                return false;
            }
        }
    }

    true
}

/// First uop of a finite-throughput instruction currently serving its
/// instruction-level throughput penalty is not ready.
#[must_use]
pub fn blocked_by_resource(uop_id: UopId, pool: &UopPool, program: &Program, blocked_resources: &std::collections::HashMap<String, f64>) -> bool {
    let uop = pool.get(uop_id);
    if !uop.is_first_uop_of_instr(program) {
        return false;
    }
    let Some(tp) = uop.tp(program) else { return false };
    if tp <= 0.0 {
        return false;
    }
    blocked_resources
        .get(uop.instr_str(program))
        .is_some_and(|&remaining| remaining > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Port;
    use crate::isa::{Instruction, MemOperand, OperandId};
    use crate::model::{OutputKey, UopKind};

    #[test]
    fn a_load_uops_memory_operand_is_excluded_from_operand_ready() {
        let mut instr = Instruction::unknown("mov");
        instr.is_unknown = false;
        instr.operands = vec![Operand::Mem(MemOperand::default())];
        instr.uop_properties = vec![crate::isa::UopProperties {
            possible_ports: vec![Port::P2],
            input_operands: vec![OperandId(0)],
            output_operands: Vec::new(),
            div_cycles: 0,
            is_load_uop: true,
            is_store_address_uop: false,
            is_store_data_uop: false,
            is_first_uop_of_instr: true,
            is_last_uop_of_instr: true,
        }];
        let program = Program {
            instructions: vec![instr],
        };

        let mut pool = UopPool::new();
        let mut operands = OperandPool::new();

        // A producer that hasn't dispatched, so this operand's ready_cycle
        // is None were it consulted.
        let producer = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![Port::P0] });
        let mem_operand_id = operands.allocate(OutputKey::StackSynchRsp);
        operands.get_mut(mem_operand_id).add_producer(producer);
        operands.get_mut(mem_operand_id).finalize();

        let load_uop = pool.allocate(0, 0, UopKind::Normal { uop_props_idx: 0 });
        pool.get_mut(load_uop).renamed_inputs = vec![mem_operand_id];

        assert_eq!(operand_ready(load_uop, &pool, &operands, &program), Some(-1));
    }
}
