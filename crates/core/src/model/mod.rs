//! The dynamic, per-cycle object graph: every uop, fused/laminated grouping,
//! and renamed operand a simulation run produces (`SPEC_FULL.md` §3).
//!
//! `Uop` and `RenamedOperandState` are mutually referential (a uop points
//! at the renamed operands it reads/writes; a renamed operand points back
//! at its producer uops) and are held in arenas ([`uop::UopPool`],
//! [`renamed_operand::OperandPool`]) indexed by small `u32` newtypes rather
//! than linked by Rust references, the same way `isa::operand::OperandId`
//! replaces identity-keyed Python dicts in the static model.
//! [`fused::FusedUop`], [`laminated::LaminatedUop`] and
//! [`instr_instance::InstrInstance`] are plain owned groupings moved by
//! value between pipeline stages; they don't need arena indices because
//! nothing outside the stage currently holding them ever needs to address
//! them by id.

pub mod fused;
pub mod instr_instance;
pub mod laminated;
pub mod renamed_operand;
pub mod uop;

pub use fused::FusedUop;
pub use instr_instance::{InstrInstance, UopSource};
pub use laminated::LaminatedUop;
pub use renamed_operand::{OperandPool, OutputKey, RenamedOperandId, RenamedOperandState};
pub use uop::{Uop, UopId, UopKind, UopPool};
