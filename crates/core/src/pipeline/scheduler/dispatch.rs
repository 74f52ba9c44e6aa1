//! Port-balancing admission and per-cycle dispatch (`SPEC_FULL.md` §4.5
//! steps 2, 3).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::arch::Port;
use crate::isa::Program;
use crate::model::{FusedUop, UopId, UopPool};
use crate::pipeline::scheduler::Scheduler;

impl Scheduler {
    /// Assigns `actual_port`/`issued`, bumps the port's usage counter, and
    /// queues every dispatchable uop of `fused` onto `nonReadyUops`. Uops
    /// with no possible port or already eliminated are skipped — those
    /// retire without ever dispatching (`Rob::admit_non_dispatching`).
    pub fn admit(&mut self, fused: &FusedUop, clock: u64, pool: &mut UopPool, program: &Program) {
        if clock != self.admission_clock {
            self.admission_clock = clock;
            self.admission_seq = 0;
        }
        for &uop_id in &fused.uops {
            let (eliminated, has_port, possible_ports) = {
                let u = pool.get(uop_id);
                (u.eliminated, !u.has_no_port(program), u.possible_ports(program))
            };
            if eliminated || !has_port {
                continue;
            }
            let port = self.choose_port(&possible_ports);
            {
                let u = pool.get_mut(uop_id);
                u.actual_port = Some(port);
                u.issued = Some(clock);
            }
            *self.port_usage.entry(port).or_insert(0) += 1;
            self.fences.on_admit(uop_id, pool, program);
            self.non_ready.push(uop_id);
            self.in_flight += 1;
        }
    }

    fn usage(&self, port: Port) -> i64 {
        *self.port_usage.get(&port).unwrap_or(&0)
    }

    /// Port-balancing heuristic: lowest-usage port wins ties going to the
    /// higher-numbered port; every other issue slot within the cycle (the
    /// 1st, 3rd, ... uop admitted) takes the second-lowest-usage port
    /// instead, unless the lowest trails it by three or more.
    fn choose_port(&mut self, possible_ports: &[Port]) -> Port {
        debug_assert!(!possible_ports.is_empty());
        let seq = self.admission_seq;
        self.admission_seq += 1;
        if possible_ports.len() == 1 {
            return possible_ports[0];
        }
        let mut sorted: Vec<Port> = possible_ports.to_vec();
        sorted.sort_by_key(|&p| (self.usage(p), Reverse(p.index())));
        let lowest = sorted[0];
        let Some(&second) = sorted.get(1) else {
            return lowest;
        };
        if seq % 2 == 0 && self.usage(lowest) + 3 > self.usage(second) {
            second
        } else {
            lowest
        }
    }

    /// Step 3: dispatch up to one uop per port, ascending. Port 0 prefers
    /// the divider queue over its own ready queue whenever the divider
    /// isn't busy and has the program-order-earlier candidate; ports 2/3
    /// each dispatch a second uop from the other's queue when their own is
    /// empty.
    pub fn dispatch(&mut self, clock: u64, pool: &mut UopPool, program: &Program) {
        let ports = self.ports.clone();
        for &port in &ports {
            self.dispatch_from_port(port, clock, pool);
            if matches!(port, Port::P0) {
                self.maybe_dispatch_divider(clock, pool, program);
            }
        }
        self.steal_between(Port::P2, Port::P3, clock, pool);
        self.steal_between(Port::P3, Port::P2, clock, pool);
    }

    fn dispatch_from_port(&mut self, port: Port, clock: u64, pool: &mut UopPool) {
        let Some(queue) = self.port_queues.get_mut(&port) else { return };
        let Some(Reverse(uop_id)) = queue.pop() else { return };
        self.commit_dispatch(uop_id, port, clock, pool);
    }

    fn maybe_dispatch_divider(&mut self, clock: u64, pool: &mut UopPool, program: &Program) {
        if self.div_busy > 0 {
            return;
        }
        let div_head = self.div_queue.peek().map(|Reverse(id)| *id);
        let Some(div_id) = div_head else { return };
        let port0_head = self.port_queues.get(&Port::P0).and_then(BinaryHeap::peek).map(|Reverse(id)| *id);
        let divider_wins = match port0_head {
            Some(p0) => div_id < p0,
            None => true,
        };
        if !divider_wins {
            return;
        }
        self.div_queue.pop();
        self.div_busy = pool.get(div_id).div_cycles(program);
        self.commit_dispatch(div_id, Port::P0, clock, pool);
    }

    fn steal_between(&mut self, empty_port: Port, donor_port: Port, clock: u64, pool: &mut UopPool) {
        let is_empty = self.port_queues.get(&empty_port).map_or(true, BinaryHeap::is_empty);
        if !is_empty {
            return;
        }
        let Some(queue) = self.port_queues.get_mut(&donor_port) else { return };
        let Some(Reverse(uop_id)) = queue.pop() else { return };
        self.commit_dispatch(uop_id, donor_port, clock, pool);
    }

    fn commit_dispatch(&mut self, uop_id: UopId, port: Port, clock: u64, pool: &mut UopPool) {
        pool.get_mut(uop_id).dispatched = Some(clock);
        self.pending.push(uop_id);
        self.pending_decrements.push(port);
    }
}
