//! Load/store fence FIFOs (`SPEC_FULL.md` §4.5 steps 2, 5, 6).

use std::collections::VecDeque;

use crate::isa::Program;
use crate::model::{UopId, UopPool};

#[derive(Debug, Default)]
pub struct FenceState {
    pub load_fence_fifo: VecDeque<UopId>,
    pub store_fence_fifo: VecDeque<UopId>,
    pub loads_since_fence: Vec<UopId>,
    pub stores_since_fence: Vec<UopId>,
}

impl FenceState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Step 2: a serializing instruction's first uop joins the matching
    /// fence FIFO on admission.
    pub fn on_admit(&mut self, uop_id: UopId, pool: &UopPool, program: &Program) {
        let uop = pool.get(uop_id);
        if !uop.is_first_uop_of_instr(program) {
            return;
        }
        let data = &program.instructions[uop.instr_pos];
        if data.is_store_serializing {
            self.store_fence_fifo.push_back(uop_id);
        }
        if data.is_load_serializing {
            self.load_fence_fifo.push_back(uop_id);
        }
    }

    pub fn on_became_ready(&mut self, uop_id: UopId, pool: &UopPool, program: &Program) {
        let uop = pool.get(uop_id);
        if uop.is_load_uop(program) {
            self.loads_since_fence.push(uop_id);
        }
        if uop.is_store_address_uop(program) || uop.is_store_data_uop(program) {
            self.stores_since_fence.push(uop_id);
        }
    }

    /// Step 6: drop a fence FIFO's head once it has executed, along with
    /// its corresponding since-fence list.
    ///
    /// `processPendingFences` only ever inspects the FIFO head, relying on
    /// first-uops being enqueued in the same program order they execute in
    /// — true here since admission itself is program-ordered (DESIGN.md,
    /// Open Question #3).
    pub fn clear_executed(&mut self, clock: u64, pool: &UopPool) {
        if let Some(&head) = self.load_fence_fifo.front() {
            debug_assert!(self.load_fence_fifo.len() <= 1 || pool.get(head).idx < pool.get(self.load_fence_fifo[1]).idx);
            if pool.get(head).executed.is_some_and(|e| e <= clock) {
                self.load_fence_fifo.pop_front();
                self.loads_since_fence.clear();
            }
        }
        if let Some(&head) = self.store_fence_fifo.front() {
            if pool.get(head).executed.is_some_and(|e| e <= clock) {
                self.store_fence_fifo.pop_front();
                self.stores_since_fence.clear();
            }
        }
    }
}
