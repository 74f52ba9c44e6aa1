//! Error types for the simulation core.
//!
//! The taxonomy is intentionally narrow (see `SPEC_FULL.md` §7): the core
//! never fails mid-simulation. Every pipeline condition — a full ROB, a
//! stalled decoder, an unready operand — is modelled as a stall, not an
//! error. The only failures are in constructing a [`crate::isa::Program`]
//! from external input.

use thiserror::Error;

/// Failure constructing or configuring a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The program file could not be parsed into a [`crate::isa::Program`].
    ///
    /// Stands in for "the input file cannot be disassembled": this crate
    /// takes pre-disassembled, pre-resolved instruction metadata as input
    /// (disassembly is an out-of-scope external collaborator), so the
    /// analogous failure here is a malformed or schema-incompatible
    /// `ProgramFile`.
    #[error("failed to parse program file: {0}")]
    MalformedProgram(String),

    /// The requested `-arch` value has no known [`crate::arch::ArchProfile`].
    #[error("unknown microarchitecture: {0:?}")]
    UnknownArch(String),

    /// A required external tool was not found.
    ///
    /// No external tool is invoked by this crate today; the variant is
    /// retained because `SPEC_FULL.md` §7 names it as part of the fatal
    /// taxonomy an eventual disassembling front end would raise through
    /// this same error type.
    #[error("required external tool not found: {0}")]
    MissingTool(String),
}
