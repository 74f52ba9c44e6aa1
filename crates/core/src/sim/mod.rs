//! Top-level simulation driver and reporting (`SPEC_FULL.md` §5, §10.6).

pub mod simulator;
pub mod stats;

pub use simulator::Simulator;
pub use stats::{SimStats, SimulationReport};
