//! `Instruction`: the static, per-program-position instruction template
//! (`SPEC_FULL.md` §2.1, §3).

use std::collections::HashMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::arch::Port;
use crate::isa::operand::{Operand, OperandId};
use crate::isa::uop_props::UopProperties;

/// One entry of an instruction's port-distribution table: `count` uops may
/// dispatch on any port in `ports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDistEntry {
    pub ports: Vec<Port>,
    pub count: u32,
}

/// The operand-renaming shape a uop's abstract value is derived from
/// (`computeAbstractValue` in the reference tool).
///
/// The reference tool recognizes these by substring/prefix matching on the
/// instruction's mnemonic string (`'MOV' in s and 'CMOV' not in s`, a
/// `POP` variant, a `LEA_`-prefixed iform). This crate takes the
/// classification as an explicit input field instead of re-deriving it
/// from a mnemonic string, since the mnemonic-matching rules belong to the
/// out-of-scope disassembly layer that produces the `ProgramFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstrKind {
    #[default]
    Other,
    /// A plain register/memory move (never `CMOV`): propagates its input
    /// operand's abstract value to its output.
    Mov,
    /// `POP`: its output's abstract value is read from the input memory
    /// operand's abstract value (the stack slot being popped).
    Pop,
    /// `LEA`: its output's abstract value is derived from its AGEN operand.
    Lea,
}

/// A static instruction template.
///
/// Identity is this instruction's position within its owning
/// [`crate::isa::Program`]; `operands` is a small per-instruction arena —
/// every operand list below stores [`OperandId`] indices into it (see that
/// type's docs for why identity-keyed Python dicts became index-keyed
/// Rust maps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub asm: String,
    /// The mnemonic/iform key macro-fusibility and `blockedResources` key
    /// against (`instrStr` in the reference tool).
    pub instr_str: String,
    /// Instruction length in bytes, used for address/boundary-crossing math.
    pub length: u32,
    /// Byte offset of the nominal opcode within the encoding, used for the
    /// pre-decoder's 16-byte-boundary-crossing "partial instruction" rule.
    pub pos_nominal_opcode: u32,

    pub operands: Vec<Operand>,

    pub port_data: Vec<PortDistEntry>,
    pub uops: u32,
    pub retire_slots: u32,
    pub uops_mite: u32,
    pub uops_ms: u32,
    pub div_cycles: u64,

    pub input_reg_operands: Vec<OperandId>,
    pub input_mem_operands: Vec<OperandId>,
    pub output_reg_operands: Vec<OperandId>,
    pub output_mem_operands: Vec<OperandId>,
    pub mem_addr_operands: Vec<OperandId>,
    pub agen_operands: Vec<OperandId>,

    /// Latency in cycles from an input operand to an output operand.
    /// Absent pairs default to 1 (`getReadyCycle`'s `latencies.get(key, 1)`).
    #[serde(with = "latency_map")]
    pub latencies: HashMap<(OperandId, OperandId), i32>,

    /// Reciprocal throughput; `None` means unconstrained (no
    /// `blockedResources` entry is ever installed for this instruction).
    pub tp: Option<f64>,

    pub lcp_stall: bool,
    pub modifies_stack: bool,
    pub may_be_eliminated: bool,
    pub kind: InstrKind,
    pub complex_decoder: bool,
    pub n_available_simple_decoders: usize,
    pub has_lock_prefix: bool,
    pub is_branch_instr: bool,
    pub is_load_serializing: bool,
    pub is_store_serializing: bool,
    pub macro_fusible_with: HashSet<String>,
    #[serde(default)]
    pub macro_fused_with_prev_instr: bool,
    #[serde(default)]
    pub macro_fused_with_next_instr: bool,

    /// Whether disassembly produced no matching metadata entry for this
    /// position (`UnknownInstr` in `SPEC_FULL.md` §7); displayed as `X` in
    /// the port-usage table.
    #[serde(default)]
    pub is_unknown: bool,

    /// Populated once by [`crate::isa::compile::compute_uop_properties`].
    #[serde(default, skip_serializing)]
    pub uop_properties: Vec<UopProperties>,
    /// Populated once by [`crate::isa::compile::mark_stack_synch_requirements`].
    #[serde(default, skip_serializing)]
    pub requires_stack_synch_uop: bool,
}

impl Instruction {
    /// Replacement for an instruction with no matching disassembly/metadata
    /// entry (`SPEC_FULL.md` §7): one empty MITE uop, one retire slot,
    /// displayed as `X`.
    #[must_use]
    pub fn unknown(asm: impl Into<String>) -> Self {
        Self {
            asm: asm.into(),
            instr_str: "UNKNOWN".to_string(),
            length: 1,
            pos_nominal_opcode: 0,
            operands: Vec::new(),
            port_data: Vec::new(),
            uops: 0,
            retire_slots: 1,
            uops_mite: 1,
            uops_ms: 0,
            div_cycles: 0,
            input_reg_operands: Vec::new(),
            input_mem_operands: Vec::new(),
            output_reg_operands: Vec::new(),
            output_mem_operands: Vec::new(),
            mem_addr_operands: Vec::new(),
            agen_operands: Vec::new(),
            latencies: HashMap::new(),
            tp: None,
            lcp_stall: false,
            modifies_stack: false,
            may_be_eliminated: false,
            kind: InstrKind::Other,
            complex_decoder: false,
            n_available_simple_decoders: 0,
            has_lock_prefix: false,
            is_branch_instr: false,
            is_load_serializing: false,
            is_store_serializing: false,
            macro_fusible_with: HashSet::new(),
            macro_fused_with_prev_instr: false,
            macro_fused_with_next_instr: false,
            is_unknown: true,
            uop_properties: Vec::new(),
            requires_stack_synch_uop: false,
        }
    }

    #[must_use]
    pub fn operand(&self, id: OperandId) -> &Operand {
        &self.operands[id.0 as usize]
    }

    /// Latency from `input` to `output`, defaulting to 1 when unlisted
    /// (`SPEC_FULL.md` §4.3, `getReadyCycle`).
    #[must_use]
    pub fn latency(&self, input: OperandId, output: OperandId) -> i32 {
        self.latencies.get(&(input, output)).copied().unwrap_or(1)
    }

    pub fn set_latency(&mut self, input: OperandId, output: OperandId, value: i32) {
        self.latencies.insert((input, output), value);
    }
}

/// `(OperandId, OperandId)` tuple keys don't round-trip through JSON object
/// keys directly (JSON keys are strings); serialize as a flat
/// `[in, out, value]` triple list instead. Deserialization is the primary
/// direction this crate exercises — `ProgramFile`s are produced externally.
mod latency_map {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::isa::operand::OperandId;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        input: OperandId,
        output: OperandId,
        latency: i32,
    }

    pub fn serialize<S: Serializer>(
        map: &HashMap<(OperandId, OperandId), i32>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(&(input, output), &latency)| Entry {
                input,
                output,
                latency,
            })
            .collect();
        entries.serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<HashMap<(OperandId, OperandId), i32>, D::Error> {
        let entries = Vec::<Entry>::deserialize(de)?;
        Ok(entries
            .into_iter()
            .map(|e| ((e.input, e.output), e.latency))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_instruction_has_one_mite_uop_and_one_retire_slot() {
        let instr = Instruction::unknown("??");
        assert!(instr.is_unknown);
        assert_eq!(instr.uops_mite, 1);
        assert_eq!(instr.retire_slots, 1);
        assert_eq!(instr.uops_ms, 0);
    }

    #[test]
    fn latency_defaults_to_one_when_unlisted() {
        let instr = Instruction::unknown("nop");
        assert_eq!(instr.latency(OperandId(0), OperandId(1)), 1);
    }
}
