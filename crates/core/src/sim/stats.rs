//! Post-run reporting: per-port dispatch counts, move-elimination count,
//! steady-state throughput (`SPEC_FULL.md` §10.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::arch::Port;
use crate::isa::Program;
use crate::model::UopPool;

/// Pure counters describing one completed run. Computed once, after the
/// run finishes, by scanning every uop the pool ever allocated — the pool
/// already retains them all, so there is no need to thread live counters
/// through the scheduler just for reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimStats {
    pub cycles: u64,
    pub uops_retired: u64,
    pub fused_retired: u64,
    pub move_eliminations: u64,
    pub unknown_instr_count: u64,
    pub port_usage_total: HashMap<Port, u64>,
    pub port_usage_by_instr: HashMap<String, HashMap<Port, u64>>,
    /// Steady-state cycles-per-iteration of the run's trailing instruction
    /// (`SPEC_FULL.md` §8's "Steady-state property").
    pub tp: f64,
}

impl SimStats {
    #[must_use]
    pub fn compute(pool: &UopPool, program: &Program, cycles: u64, fused_retired: u64, tp: f64) -> Self {
        let mut stats = Self {
            cycles,
            fused_retired,
            tp,
            ..Self::default()
        };
        for instr in &program.instructions {
            if instr.is_unknown {
                stats.unknown_instr_count += 1;
            }
        }
        for uop in pool.iter() {
            if uop.retired.is_some() {
                stats.uops_retired += 1;
            }
            if uop.eliminated {
                stats.move_eliminations += 1;
            }
            if let Some(port) = uop.actual_port {
                if uop.dispatched.is_some() {
                    *stats.port_usage_total.entry(port).or_insert(0) += 1;
                    let instr_str = uop.instr_str(program).to_string();
                    *stats
                        .port_usage_by_instr
                        .entry(instr_str)
                        .or_default()
                        .entry(port)
                        .or_insert(0) += 1;
                }
            }
        }
        stats
    }
}

/// A completed simulation's full, formatting-agnostic result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub arch: crate::arch::Arch,
    pub stats: SimStats,
}
