//! Register/memory operands (`SPEC_FULL.md` §2.1, §3).

use serde::{Deserialize, Serialize};

/// A canonical x86 register name.
///
/// Renaming keys on the *canonical* (widest) name of a register so that,
/// e.g., writes to `EAX` and `AL` are tracked against the same physical
/// slot as `RAX`. The canonicalization table below follows the standard
/// x86-64 GPR aliasing; non-GPR registers (SIMD, flags, segment) have no
/// narrower aliases modelled here and canonicalize to themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register(pub String);

impl Register {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The stack pointer, used for synthetic stack-synch uops.
    #[must_use]
    pub fn rsp() -> Self {
        Self::new("RSP")
    }

    /// Maps a register to its canonical (widest) name.
    #[must_use]
    pub fn canonical(&self) -> Self {
        Self::new(canonicalize(&self.0))
    }

    /// Whether this is one of the "high-8" registers (`AH`, `BH`, `CH`, `DH`)
    /// whose write creates a partial-register merge dependency
    /// (`SPEC_FULL.md` §4.1 "high-8 merge penalty").
    #[must_use]
    pub fn is_high8(&self) -> bool {
        matches!(self.0.as_str(), "AH" | "BH" | "CH" | "DH")
    }
}

fn canonicalize(name: &str) -> &str {
    match name {
        "RAX" | "EAX" | "AX" | "AL" | "AH" => "RAX",
        "RBX" | "EBX" | "BX" | "BL" | "BH" => "RBX",
        "RCX" | "ECX" | "CX" | "CL" | "CH" => "RCX",
        "RDX" | "EDX" | "DX" | "DL" | "DH" => "RDX",
        "RSI" | "ESI" | "SI" | "SIL" => "RSI",
        "RDI" | "EDI" | "DI" | "DIL" => "RDI",
        "RBP" | "EBP" | "BP" | "BPL" => "RBP",
        "RSP" | "ESP" | "SP" | "SPL" => "RSP",
        "R8" | "R8D" | "R8W" | "R8B" => "R8",
        "R9" | "R9D" | "R9W" | "R9B" => "R9",
        "R10" | "R10D" | "R10W" | "R10B" => "R10",
        "R11" | "R11D" | "R11W" | "R11B" => "R11",
        "R12" | "R12D" | "R12W" | "R12B" => "R12",
        "R13" | "R13D" | "R13W" | "R13B" => "R13",
        "R14" | "R14D" | "R14W" | "R14B" => "R14",
        "R15" | "R15D" | "R15W" | "R15B" => "R15",
        // SIMD (XMM/YMM/ZMM share a name prefix per lane width already) and
        // all other register classes have no narrower alias tracked.
        other => other,
    }
}

/// A memory operand's addressing components.
///
/// Equality/hashing is by abstract renamed value, not these raw fields —
/// see `pipeline::renamer::RenameKey` — but the raw components are needed
/// to compute that abstract value (`getAbstractValue`/`computeAbstractValue`
/// in the reference tool).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct MemOperand {
    pub base: Option<Register>,
    pub index: Option<Register>,
    pub scale: u8,
    pub displacement: i64,
}

impl MemOperand {
    /// Whether this is a base-only addressing mode with a small positive
    /// displacement — the shape eligible for the extra latency fast path in
    /// `adjustLatencies` (`SPEC_FULL.md` §4.1).
    #[must_use]
    pub fn is_simple_base_only(&self) -> bool {
        self.index.is_none() && (0..2048).contains(&self.displacement)
    }
}

/// One operand of an instruction: a register or a memory location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Reg(Register),
    Mem(MemOperand),
}

impl Operand {
    #[must_use]
    pub fn as_reg(&self) -> Option<&Register> {
        match self {
            Self::Reg(r) => Some(r),
            Self::Mem(_) => None,
        }
    }

    #[must_use]
    pub fn as_mem(&self) -> Option<&MemOperand> {
        match self {
            Self::Mem(m) => Some(m),
            Self::Reg(_) => None,
        }
    }
}

/// Index of an [`Operand`] within an [`crate::isa::Instruction`]'s operand
/// arena.
///
/// The reference implementation keys its `latencies` dict and rename maps
/// by Python object identity of shared `RegOperand`/`MemOperand` instances.
/// Rust has no stable identity hash for arbitrary values, so each
/// instruction instead owns one small arena of operands and every
/// input/output list stores indices into it (`SPEC_FULL.md` §9,
/// "arena-allocated nodes with stable indices").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperandId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_aliases_canonicalize_to_64_bit_name() {
        assert_eq!(Register::new("AL").canonical(), Register::new("RAX"));
        assert_eq!(Register::new("EAX").canonical(), Register::new("RAX"));
        assert_eq!(Register::new("R12D").canonical(), Register::new("R12"));
    }

    #[test]
    fn high8_registers_are_recognized() {
        assert!(Register::new("AH").is_high8());
        assert!(!Register::new("AL").is_high8());
        assert!(!Register::new("RAX").is_high8());
    }

    #[test]
    fn simd_registers_pass_through_unaliased() {
        assert_eq!(Register::new("XMM0").canonical(), Register::new("XMM0"));
    }
}
