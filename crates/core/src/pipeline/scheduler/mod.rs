//! Reservation-station scheduler: port-balancing admission, dispatch, and
//! readiness tracking (`SPEC_FULL.md` §4.5).
//!
//! Admission (`Scheduler::admit`) is called inline from the renamer's
//! per-cycle loop, the same way `Rob::admit_non_dispatching` is — so by the
//! time `Scheduler::cycle` runs its own per-cycle housekeeping (divider
//! decay/promotion, dispatch, completion, readiness, fence clearing,
//! blocked-resource decay), this cycle's newly-renamed uops are already
//! sitting in `nonReadyUops`. This reorders the reference tool's
//! admission-then-housekeeping sequence within a cycle without changing
//! which cycle either happens in.

pub mod dispatch;
pub mod fences;
pub mod readiness;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::arch::{ArchProfile, Port};
use crate::isa::Program;
use crate::model::{OperandPool, UopId, UopPool};

use fences::FenceState;

/// Reservation station: tracks every uop from admission through execution.
pub struct Scheduler {
    ports: Vec<Port>,
    rs_width: usize,
    issue_width: usize,
    issue_dispatch_delay: u64,

    div_busy: u64,
    div_queue: BinaryHeap<Reverse<UopId>>,
    port_queues: HashMap<Port, BinaryHeap<Reverse<UopId>>>,

    port_usage: HashMap<Port, i64>,
    pending_decrements: Vec<Port>,
    admission_clock: u64,
    admission_seq: usize,

    non_ready: Vec<UopId>,
    ready_at: HashMap<u64, Vec<UopId>>,
    pending: Vec<UopId>,

    blocked_resources: HashMap<String, f64>,
    fences: FenceState,

    in_flight: usize,
}

impl Scheduler {
    #[must_use]
    pub fn new(profile: &ArchProfile) -> Self {
        Self {
            ports: profile.arch.ports().to_vec(),
            rs_width: profile.rs_width,
            issue_width: profile.issue_width,
            issue_dispatch_delay: profile.issue_dispatch_delay,
            div_busy: 0,
            div_queue: BinaryHeap::new(),
            port_queues: HashMap::new(),
            port_usage: HashMap::new(),
            pending_decrements: Vec::new(),
            admission_clock: u64::MAX,
            admission_seq: 0,
            non_ready: Vec::new(),
            ready_at: HashMap::new(),
            pending: Vec::new(),
            blocked_resources: HashMap::new(),
            fences: FenceState::new(),
            in_flight: 0,
        }
    }

    /// `isFull` iff `len(uops) + issue_Width > RS_Width`.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.in_flight + self.issue_width > self.rs_width
    }

    /// Advances the scheduler by one cycle: decays the divider, promotes
    /// uops whose readiness matured last cycle, dispatches, completes
    /// pending uops, re-checks non-ready uops, clears satisfied fences, and
    /// decays blocked-resource counters. Must run after this cycle's
    /// `admit` calls.
    pub fn cycle(&mut self, clock: u64, pool: &mut UopPool, operands: &OperandPool, program: &Program) {
        for port in std::mem::take(&mut self.pending_decrements) {
            if let Some(usage) = self.port_usage.get_mut(&port) {
                *usage -= 1;
            }
        }

        self.div_busy = self.div_busy.saturating_sub(1);
        self.promote_ready(clock, pool, program);

        self.dispatch(clock, pool, program);
        self.complete_pending(clock, pool, operands, program);
        self.check_readiness(clock, pool, operands, program);

        self.fences.clear_executed(clock, pool);

        self.blocked_resources.retain(|_, remaining| {
            *remaining -= 1.0;
            *remaining > 0.0
        });
    }

    fn promote_ready(&mut self, clock: u64, pool: &UopPool, program: &Program) {
        let Some(ready) = self.ready_at.remove(&clock) else {
            return;
        };
        for uop_id in ready {
            let uop = pool.get(uop_id);
            if uop.div_cycles(program) > 0 {
                self.div_queue.push(Reverse(uop_id));
            } else if let Some(port) = uop.actual_port {
                self.port_queues.entry(port).or_default().push(Reverse(uop_id));
            }
        }
    }

    fn complete_pending(&mut self, clock: u64, pool: &mut UopPool, operands: &OperandPool, program: &Program) {
        let pending = std::mem::take(&mut self.pending);
        for uop_id in pending {
            let Some(dispatched) = pool.get(uop_id).dispatched else {
                continue;
            };
            let mut finish = dispatched + 2;
            if pool.get(uop_id).is_first_uop_of_instr(program) {
                if let Some(tp) = pool.get(uop_id).tp(program) {
                    finish = finish.max(dispatched + tp.ceil() as u64);
                }
            }

            let outputs = pool.get(uop_id).renamed_outputs.clone();
            let mut all_known = true;
            for &out_id in &outputs {
                match operands.ready_cycle_of(out_id, pool, program) {
                    Some(ready) => finish = finish.max(u64::try_from(ready.max(0)).unwrap_or(0)),
                    None => all_known = false,
                }
            }

            if all_known {
                pool.get_mut(uop_id).executed = Some(finish);
                self.in_flight = self.in_flight.saturating_sub(1);
            } else {
                self.pending.push(uop_id);
            }
        }
    }

    fn check_readiness(&mut self, clock: u64, pool: &mut UopPool, operands: &OperandPool, program: &Program) {
        let candidates = std::mem::take(&mut self.non_ready);
        for uop_id in candidates {
            if readiness::blocked_by_resource(uop_id, pool, program, &self.blocked_resources) {
                self.non_ready.push(uop_id);
                continue;
            }
            if !readiness::clears_fences(uop_id, clock, pool, program, &self.fences) {
                self.non_ready.push(uop_id);
                continue;
            }
            let Some(op_ready) = readiness::operand_ready(uop_id, pool, operands, program) else {
                self.non_ready.push(uop_id);
                continue;
            };

            let Some(issued) = pool.get(uop_id).issued else {
                self.non_ready.push(uop_id);
                continue;
            };
            let ready_cycle = readiness::ready_for_dispatch_cycle(issued, op_ready, self.issue_dispatch_delay, clock);
            pool.get_mut(uop_id).ready_for_dispatch = Some(ready_cycle);

            let uop = pool.get(uop_id);
            if uop.is_first_uop_of_instr(program) {
                if let Some(tp) = uop.tp(program) {
                    if tp > 0.0 {
                        self.blocked_resources.insert(uop.instr_str(program).to_string(), tp);
                    }
                }
            }
            self.fences.on_became_ready(uop_id, pool, program);
            self.ready_at.entry(ready_cycle).or_default().push(uop_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;
    use crate::isa::{Instruction, Program};
    use crate::model::{FusedUop, UopKind, UopPool};

    fn single_nop_program() -> Program {
        Program {
            instructions: vec![Instruction::unknown("nop")],
        }
    }

    #[test]
    fn a_stack_synch_uop_dispatches_after_the_issue_dispatch_delay_and_then_executes() {
        let program = single_nop_program();
        let profile = Arch::Cfl.profile();
        let mut pool = UopPool::new();
        let operands = OperandPool::new();
        let mut scheduler = Scheduler::new(&profile);

        let uop_id = pool.allocate(0, 0, UopKind::StackSynch { possible_ports: vec![Port::P0] });
        let fused = FusedUop::new(vec![uop_id]);

        scheduler.admit(&fused, 0, &mut pool, &program);
        assert!(!scheduler.is_full());

        for clock in 0..=4 {
            scheduler.cycle(clock, &mut pool, &operands, &program);
            assert!(pool.get(uop_id).dispatched.is_none());
        }

        scheduler.cycle(5, &mut pool, &operands, &program);
        assert_eq!(pool.get(uop_id).dispatched, Some(5));
        assert_eq!(pool.get(uop_id).executed, Some(7));
    }
}
