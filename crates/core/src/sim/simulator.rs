//! Top-level simulation driver: owns every component and ticks them in the
//! fixed per-cycle order of `SPEC_FULL.md` §5.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::arch::{Arch, ArchProfile};
use crate::isa::Program;
use crate::model::{OperandPool, UopPool};
use crate::pipeline::cacheblock::Mode;
use crate::pipeline::{FrontEnd, Idq, Renamer, Rob, Scheduler};
use crate::sim::stats::{SimStats, SimulationReport};

/// How many trailing per-round retirement intervals must agree before the
/// run is declared steady-state (`SPEC_FULL.md` §8).
const STEADY_STATE_WINDOW: usize = 5;
/// Earliest round steady state is checked from.
const STEADY_STATE_MIN_ROUND: u64 = 50;
/// Upper bound on rounds simulated before giving up on convergence and
/// reporting the trailing window's mean interval as a best effort.
const MAX_ROUNDS: u64 = 500;
/// Absolute cycle cap, independent of round count, guarding against a
/// program that never retires its tracked instruction at all.
const MAX_CYCLES: u64 = 2_000_000;

pub struct Simulator {
    program: Program,
    profile: ArchProfile,
    mode: Mode,

    clock: u64,
    pool: UopPool,
    operands: OperandPool,
    front_end: FrontEnd,
    idq: Idq,
    renamer: Renamer,
    rob: Rob,
    scheduler: Scheduler,

    /// Position of the last instruction in the program that isn't itself
    /// folded into a predecessor's macro-fused retirement slot — the
    /// instruction whose retirement cadence defines steady-state `TP`.
    tracked_instr_pos: Option<usize>,
    last_tracked_retire: Option<u64>,
    intervals: VecDeque<u64>,
    fused_retired: u64,
}

impl Simulator {
    /// Compiles `program` for `arch` and builds a fresh simulator ready to
    /// [`Simulator::run`].
    #[must_use]
    pub fn new(mut program: Program, arch: Arch, mode: Mode) -> Self {
        program.compile(arch);
        let profile = arch.profile();

        let tracked_instr_pos = (0..program.instructions.len())
            .rev()
            .find(|&i| !program.instructions[i].macro_fused_with_prev_instr);

        Self {
            front_end: FrontEnd::new(&program, &profile, mode),
            idq: Idq::new(profile.idq_width),
            renamer: Renamer::new(),
            rob: Rob::new(profile.rb_width, profile.issue_width, profile.retire_width),
            scheduler: Scheduler::new(&profile),
            pool: UopPool::new(),
            operands: OperandPool::new(),
            program,
            profile,
            mode,
            clock: 0,
            tracked_instr_pos,
            last_tracked_retire: None,
            intervals: VecDeque::with_capacity(STEADY_STATE_WINDOW),
            fused_retired: 0,
        }
    }

    /// Runs until steady-state throughput is detected (or the safety caps
    /// trip) and returns the resulting report.
    pub fn run(&mut self) -> SimulationReport {
        if self.program.is_empty() {
            return SimulationReport {
                arch: self.profile.arch,
                stats: SimStats::compute(&self.pool, &self.program, 0, 0, 0.0),
            };
        }

        let tp = loop {
            self.tick();
            if let Some(tp) = self.check_steady_state() {
                break tp;
            }
            if self.clock >= MAX_CYCLES {
                warn!(clock = self.clock, "hit max-cycle cap before converging; reporting best effort TP");
                break self.fallback_tp();
            }
        };

        SimulationReport {
            arch: self.profile.arch,
            stats: SimStats::compute(&self.pool, &self.program, self.clock, self.fused_retired, tp),
        }
    }

    /// Every uop the run allocated, for trace rendering (`SPEC_FULL.md`
    /// §10.6); the core crate itself never formats this.
    #[must_use]
    pub fn pool(&self) -> &UopPool {
        &self.pool
    }

    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    fn fallback_tp(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.intervals.iter().sum();
        sum as f64 / self.intervals.len() as f64
    }

    /// One cycle: front-end (which internally drives the renamer and
    /// ROB/scheduler admission), then scheduler housekeeping, then
    /// retirement draining.
    fn tick(&mut self) {
        let clock = self.clock;

        self.front_end.cycle(clock, &self.program, &mut self.pool, &mut self.idq);

        let admitted = self.renamer.cycle(
            clock,
            self.profile.issue_width,
            &mut self.idq,
            &self.rob,
            || self.scheduler.is_full(),
            &self.program,
            &mut self.pool,
            &mut self.operands,
        );
        for fused in admitted {
            self.rob.admit_non_dispatching(&fused, clock, &self.program, &mut self.pool);
            self.scheduler.admit(&fused, clock, &mut self.pool, &self.program);
            self.rob.admit(fused);
        }

        self.scheduler.cycle(clock, &mut self.pool, &self.operands, &self.program);

        let mut retired_this_cycle = Vec::new();
        self.rob.retire(clock, &mut self.pool, &mut |fused| retired_this_cycle.push(fused));
        for fused in retired_this_cycle {
            self.fused_retired += 1;
            if self.tracked_instr_pos == Some(fused.instr_pos(&self.pool)) {
                let round = self.pool.get(fused.uops[0]).round;
                debug!(round, clock, "tracked instruction retired");
                if let Some(prev) = self.last_tracked_retire {
                    let interval = clock.saturating_sub(prev);
                    if self.intervals.len() == STEADY_STATE_WINDOW {
                        self.intervals.pop_front();
                    }
                    self.intervals.push_back(interval);
                }
                self.last_tracked_retire = Some(clock);
            }
        }

        self.clock += 1;
    }

    fn check_steady_state(&self) -> Option<f64> {
        if self.clock < STEADY_STATE_MIN_ROUND || self.intervals.len() < STEADY_STATE_WINDOW {
            return None;
        }
        let first = *self.intervals.front()?;
        if self.intervals.iter().all(|&i| i == first) {
            Some(first as f64)
        } else if self.clock >= MAX_ROUNDS {
            Some(self.fallback_tp())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Arch;

    #[test]
    fn an_empty_program_terminates_immediately_with_zero_throughput() {
        let program = Program { instructions: Vec::new() };
        let mut sim = Simulator::new(program, Arch::Cfl, Mode::Unroll);
        let report = sim.run();
        assert_eq!(report.stats.cycles, 0);
        assert_eq!(report.stats.fused_retired, 0);
        assert!((report.stats.tp - 0.0).abs() < f64::EPSILON);
    }
}
