//! `RenamedOperand`: one write-to-next-write lifetime of a renamed register
//! or abstract memory value (`SPEC_FULL.md` §3, §4.3).

use std::cell::Cell;

use crate::isa::{OperandId, Program};
use crate::model::uop::{UopId, UopPool};

/// Stable index of a [`RenamedOperandState`] within an [`OperandPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenamedOperandId(pub u32);

/// The static operand a [`RenamedOperandState`] stands for, needed to look
/// up per-producer-uop latencies.
///
/// A stack-synch uop's RSP input/output are freshly constructed `Operand`
/// values that never appear in any instruction's `latencies` table, so
/// their latency is always the default of 1; this is modeled directly
/// rather than by minting a throwaway `OperandId` for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKey {
    Operand {
        instr_pos: usize,
        operand_id: OperandId,
    },
    StackSynchRsp,
    /// A register's architectural value at the start of the run: no
    /// producer uop, ready as of cycle -1, the same as an empty-producer
    /// write (distinguished only for readability at call sites).
    Initial,
}

/// One write's worth of a renamed register or abstract memory value.
///
/// Allocated fresh by the renamer each time an instruction-round writes a
/// logical register/memory location; superseded (not mutated) by the next
/// write to the same location. `complete` flips to `true` once every
/// producer uop of this write has been identified (all of the producing
/// instruction's relevant uops have been renamed this round); before that,
/// [`RenamedOperandState::ready_cycle`] must not be queried.
#[derive(Debug)]
pub struct RenamedOperandState {
    output_key: OutputKey,
    producers: Vec<UopId>,
    complete: bool,
    cached_ready: Cell<Option<i64>>,
}

impl RenamedOperandState {
    #[must_use]
    pub fn new(output_key: OutputKey) -> Self {
        Self {
            output_key,
            producers: Vec::new(),
            complete: false,
            cached_ready: Cell::new(None),
        }
    }

    pub fn add_producer(&mut self, uop: UopId) {
        debug_assert!(!self.complete, "cannot add a producer after finalize()");
        self.producers.push(uop);
    }

    /// Called once all of this write's producer uops have been renamed.
    pub fn finalize(&mut self) {
        self.complete = true;
    }

    #[must_use]
    pub fn producers(&self) -> &[UopId] {
        &self.producers
    }

    /// The cycle this value becomes available to dependents, or `None` if
    /// any producer hasn't dispatched yet (`getReadyCycle` in the reference
    /// tool). A value with no producers (e.g. a register read before any
    /// write in this run) is ready as of cycle `-1`.
    ///
    /// # Panics
    /// Panics in debug builds if called before [`Self::finalize`].
    pub fn ready_cycle(
        &self,
        uops: &UopPool,
        program: &Program,
        operand_ready_cycle: impl Fn(RenamedOperandId, &UopPool, &Program) -> Option<i64>,
    ) -> Option<i64> {
        debug_assert!(self.complete, "ready_cycle queried before finalize()");
        if let Some(cached) = self.cached_ready.get() {
            return Some(cached);
        }
        if self.producers.is_empty() {
            self.cached_ready.set(Some(-1));
            return Some(-1);
        }

        let mut first_dispatch = i64::MAX;
        let mut last_dispatch = i64::MIN;
        for &p in &self.producers {
            let dispatched = uops.get(p).dispatched?;
            let dispatched = i64::try_from(dispatched).unwrap_or(i64::MAX);
            first_dispatch = first_dispatch.min(dispatched);
            last_dispatch = last_dispatch.max(dispatched);
        }

        let mut ready = last_dispatch + 1;
        for &p in &self.producers {
            let uop = uops.get(p);
            let input_ids = uop.input_operand_ids(program);
            for (input_idx, &renamed_input) in uop.renamed_inputs.iter().enumerate() {
                let Some(input_ready) = operand_ready_cycle(renamed_input, uops, program) else {
                    return None;
                };
                let lat = i64::from(match self.output_key {
                    OutputKey::Operand {
                        instr_pos,
                        operand_id,
                    } => {
                        let Some(&input_id) = input_ids.get(input_idx) else {
                            continue;
                        };
                        program.instructions[instr_pos].latency(input_id, operand_id)
                    }
                    OutputKey::StackSynchRsp => 1,
                });
                ready = ready.max(first_dispatch + lat).max(input_ready + lat);
            }
        }

        self.cached_ready.set(Some(ready));
        Some(ready)
    }
}

/// Owning arena of every [`RenamedOperandState`] allocated so far.
#[derive(Debug, Default)]
pub struct OperandPool {
    operands: Vec<RenamedOperandState>,
}

impl OperandPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, output_key: OutputKey) -> RenamedOperandId {
        let id = RenamedOperandId(u32::try_from(self.operands.len()).unwrap_or(u32::MAX));
        self.operands.push(RenamedOperandState::new(output_key));
        id
    }

    #[must_use]
    pub fn get(&self, id: RenamedOperandId) -> &RenamedOperandState {
        &self.operands[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: RenamedOperandId) -> &mut RenamedOperandState {
        &mut self.operands[id.0 as usize]
    }

    /// Recursive `ready_cycle` lookup bound to this pool, suitable for
    /// passing as the `operand_ready_cycle` callback.
    #[must_use]
    pub fn ready_cycle_of(
        &self,
        id: RenamedOperandId,
        uops: &UopPool,
        program: &Program,
    ) -> Option<i64> {
        self.get(id)
            .ready_cycle(uops, program, |id, uops, program| {
                self.ready_cycle_of(id, uops, program)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_with_no_producers_is_ready_at_minus_one() {
        let mut pool = OperandPool::new();
        let id = pool.allocate(OutputKey::StackSynchRsp);
        pool.get_mut(id).finalize();
        let uops = UopPool::new();
        let program = Program {
            instructions: Vec::new(),
        };
        assert_eq!(pool.ready_cycle_of(id, &uops, &program), Some(-1));
    }
}
