//! `UopProperties`: the per-template description of one unfused uop
//! (`SPEC_FULL.md` §3).

use serde::{Deserialize, Serialize};

use crate::arch::Port;
use crate::isa::operand::OperandId;

/// The static template for one unfused uop of an [`crate::isa::Instruction`].
///
/// One `Instruction` compiles to a `Vec<UopProperties>` (`uop_properties`),
/// populated once by [`crate::isa::compile::compute_uop_properties`]; every
/// round's [`crate::model::Uop`] instances for that instruction share the
/// same `UopProperties` by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UopProperties {
    /// Ports this uop may dispatch on; empty means it never occupies a
    /// port (e.g. a move-eliminated or padding uop).
    pub possible_ports: Vec<Port>,
    pub input_operands: Vec<OperandId>,
    pub output_operands: Vec<OperandId>,
    /// Divider occupancy in cycles; 0 for non-dividing uops.
    pub div_cycles: u64,
    pub is_load_uop: bool,
    pub is_store_address_uop: bool,
    pub is_store_data_uop: bool,
    pub is_first_uop_of_instr: bool,
    pub is_last_uop_of_instr: bool,
}

impl UopProperties {
    /// A uop with no ports and no operands: padding emitted to bring an
    /// instruction's uop count up to its `retire_slots` (`SPEC_FULL.md`
    /// §4.1 — "model non-dispatching uops such as eliminated moves").
    #[must_use]
    pub fn empty() -> Self {
        Self {
            possible_ports: Vec::new(),
            input_operands: Vec::new(),
            output_operands: Vec::new(),
            div_cycles: 0,
            is_load_uop: false,
            is_store_address_uop: false,
            is_store_data_uop: false,
            is_first_uop_of_instr: false,
            is_last_uop_of_instr: false,
        }
    }

    /// A uop occupies no execution port at all.
    #[must_use]
    pub fn has_no_port(&self) -> bool {
        self.possible_ports.is_empty()
    }
}
