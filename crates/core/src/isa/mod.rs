//! Static instruction data: operands, per-template uop properties, and the
//! one-time instruction-to-uop compilation pass (`SPEC_FULL.md` §2.1, §3,
//! §4.1).

pub mod compile;
pub mod instruction;
pub mod operand;
pub mod uop_props;

pub use instruction::{InstrKind, Instruction, PortDistEntry};
pub use operand::{MemOperand, Operand, OperandId, Register};
pub use uop_props::UopProperties;

use serde::{Deserialize, Serialize};

use crate::arch::Arch;
use crate::error::SimError;

/// The external, pre-disassembled instruction stream.
///
/// This is the `ProgramFile` of `SPEC_FULL.md` §2.1/§10.4: the JSON
/// boundary standing in for the out-of-scope disassembly/XED and
/// per-architecture metadata-table lookup. Compilation (§4.1) is
/// arch-dependent (`adjustLatencies`'s SNB-and-later fast path), so parsing
/// a `ProgramFile` alone leaves every instruction's `uop_properties` empty;
/// call [`Program::compile`] once the target architecture is known —
/// [`crate::sim::Simulator::new`] does this on the caller's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Parses a `ProgramFile` without running the §4.1 compilation pass.
    ///
    /// # Errors
    /// Returns [`SimError::MalformedProgram`] if `json` does not match the
    /// `ProgramFile` schema.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        serde_json::from_str(json).map_err(|e| SimError::MalformedProgram(e.to_string()))
    }

    /// Runs the one-time instruction-to-uop compilation pass of §4.1,
    /// populating every instruction's `uop_properties` and
    /// `requires_stack_synch_uop`.
    pub fn compile(&mut self, arch: Arch) {
        compile::compile_all(&mut self.instructions, arch);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
