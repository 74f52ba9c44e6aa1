//! `Uop`: one dynamic, per-round unfused uop (`SPEC_FULL.md` §3).

use crate::arch::Port;
use crate::isa::{Operand, OperandId, Program, Register};
use crate::model::renamed_operand::RenamedOperandId;

/// Stable index of a [`Uop`] within a [`UopPool`].
///
/// Also the tie-break key in scheduler priority queues: uops are allocated
/// in program order, so comparing `UopId`s compares program order
/// (`SPEC_FULL.md` §9, "priority queues keyed by `(uop.idx, uop)`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UopId(pub u32);

/// Closed tagged variant distinguishing ordinary uops from synthetic
/// stack-synch uops (`SPEC_FULL.md` §9: "Model Uop as a closed tagged
/// variant, not an inheritance hierarchy").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UopKind {
    /// An uop drawn from its instruction's compiled `uop_properties` list.
    Normal { uop_props_idx: usize },
    /// A synthetic uop inserted when `requires_stack_synch_uop` is set.
    /// Ports are `{0,1,5}` pre-HSW, `{0,1,5,6}` elsewhere; both its input
    /// and output are RSP (`SPEC_FULL.md` §3).
    StackSynch { possible_ports: Vec<Port> },
}

/// One dynamic occurrence of an unfused uop.
#[derive(Debug, Clone)]
pub struct Uop {
    /// Global monotonic allocation index; see [`UopId`]'s docs.
    pub idx: u64,
    /// Position of the owning instruction in its [`Program`].
    pub instr_pos: usize,
    pub round: u64,
    pub kind: UopKind,
    pub actual_port: Option<Port>,
    pub eliminated: bool,
    pub renamed_inputs: Vec<RenamedOperandId>,
    pub renamed_outputs: Vec<RenamedOperandId>,

    pub predecoded: Option<u64>,
    pub added_to_idq: Option<u64>,
    pub issued: Option<u64>,
    pub ready_for_dispatch: Option<u64>,
    pub dispatched: Option<u64>,
    pub executed: Option<u64>,
    pub retired: Option<u64>,
    pub retire_idx: Option<u32>,
}

impl Uop {
    #[must_use]
    pub fn possible_ports(&self, program: &Program) -> Vec<Port> {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                program.instructions[self.instr_pos].uop_properties[*uop_props_idx]
                    .possible_ports
                    .clone()
            }
            UopKind::StackSynch { possible_ports } => possible_ports.clone(),
        }
    }

    #[must_use]
    pub fn div_cycles(&self, program: &Program) -> u64 {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                program.instructions[self.instr_pos].uop_properties[*uop_props_idx].div_cycles
            }
            UopKind::StackSynch { .. } => 0,
        }
    }

    #[must_use]
    pub fn is_load_uop(&self, program: &Program) -> bool {
        self.normal_props(program).is_some_and(|p| p.is_load_uop)
    }

    #[must_use]
    pub fn is_store_address_uop(&self, program: &Program) -> bool {
        self.normal_props(program)
            .is_some_and(|p| p.is_store_address_uop)
    }

    #[must_use]
    pub fn is_store_data_uop(&self, program: &Program) -> bool {
        self.normal_props(program)
            .is_some_and(|p| p.is_store_data_uop)
    }

    /// Stack-synch uops carry `isFirstUopOfInstr=True` in the reference
    /// tool's `UopProperties` construction, even though they are appended
    /// after an instruction's real uops; preserved here.
    #[must_use]
    pub fn is_first_uop_of_instr(&self, program: &Program) -> bool {
        match &self.kind {
            UopKind::Normal { .. } => self
                .normal_props(program)
                .is_some_and(|p| p.is_first_uop_of_instr),
            UopKind::StackSynch { .. } => true,
        }
    }

    #[must_use]
    pub fn is_last_uop_of_instr(&self, program: &Program) -> bool {
        self.normal_props(program)
            .is_some_and(|p| p.is_last_uop_of_instr)
    }

    #[must_use]
    pub fn has_no_port(&self, program: &Program) -> bool {
        self.possible_ports(program).is_empty()
    }

    fn normal_props<'a>(
        &self,
        program: &'a Program,
    ) -> Option<&'a crate::isa::UopProperties> {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                Some(&program.instructions[self.instr_pos].uop_properties[*uop_props_idx])
            }
            UopKind::StackSynch { .. } => None,
        }
    }

    /// The instruction's `instr_str`, used as the `blockedResources` key
    /// and for macro-fusibility checks.
    #[must_use]
    pub fn instr_str<'a>(&self, program: &'a Program) -> &'a str {
        &program.instructions[self.instr_pos].instr_str
    }

    #[must_use]
    pub fn tp(&self, program: &Program) -> Option<f64> {
        program.instructions[self.instr_pos].tp
    }

    /// The static operand values this uop reads, in the same order
    /// `renamed_inputs` is populated by the renamer.
    #[must_use]
    pub fn input_operand_values(&self, program: &Program) -> Vec<Operand> {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                let instr = &program.instructions[self.instr_pos];
                instr.uop_properties[*uop_props_idx]
                    .input_operands
                    .iter()
                    .map(|&id| instr.operand(id).clone())
                    .collect()
            }
            UopKind::StackSynch { .. } => vec![Operand::Reg(Register::rsp())],
        }
    }

    #[must_use]
    pub fn output_operand_values(&self, program: &Program) -> Vec<Operand> {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                let instr = &program.instructions[self.instr_pos];
                instr.uop_properties[*uop_props_idx]
                    .output_operands
                    .iter()
                    .map(|&id| instr.operand(id).clone())
                    .collect()
            }
            UopKind::StackSynch { .. } => vec![Operand::Reg(Register::rsp())],
        }
    }

    /// `OperandId`s of this uop's static output operands, paired
    /// index-for-index with [`Uop::output_operand_values`]. Empty for
    /// stack-synch uops, which never appear in a real instruction's
    /// latency table (see [`crate::model::renamed_operand::OutputKey`]).
    #[must_use]
    pub fn output_operand_ids(&self, program: &Program) -> Vec<OperandId> {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                program.instructions[self.instr_pos].uop_properties[*uop_props_idx]
                    .output_operands
                    .clone()
            }
            UopKind::StackSynch { .. } => Vec::new(),
        }
    }

    /// `OperandId`s of this uop's static input operands, paired
    /// index-for-index with `renamed_inputs`.
    #[must_use]
    pub fn input_operand_ids(&self, program: &Program) -> Vec<OperandId> {
        match &self.kind {
            UopKind::Normal { uop_props_idx } => {
                program.instructions[self.instr_pos].uop_properties[*uop_props_idx]
                    .input_operands
                    .clone()
            }
            UopKind::StackSynch { .. } => Vec::new(),
        }
    }
}

/// Owning arena of every [`Uop`] allocated so far, indexed by [`UopId`].
#[derive(Debug, Default)]
pub struct UopPool {
    uops: Vec<Uop>,
    next_idx: u64,
}

impl UopPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(
        &mut self,
        instr_pos: usize,
        round: u64,
        kind: UopKind,
    ) -> UopId {
        let idx = self.next_idx;
        self.next_idx += 1;
        let id = UopId(u32::try_from(self.uops.len()).unwrap_or(u32::MAX));
        self.uops.push(Uop {
            idx,
            instr_pos,
            round,
            kind,
            actual_port: None,
            eliminated: false,
            renamed_inputs: Vec::new(),
            renamed_outputs: Vec::new(),
            predecoded: None,
            added_to_idq: None,
            issued: None,
            ready_for_dispatch: None,
            dispatched: None,
            executed: None,
            retired: None,
            retire_idx: None,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: UopId) -> &Uop {
        &self.uops[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: UopId) -> &mut Uop {
        &mut self.uops[id.0 as usize]
    }

    /// Every uop allocated so far, in allocation order. Used by
    /// post-hoc reporting (`sim::stats`) rather than threaded-through
    /// live counters, since the pool already retains every uop for the
    /// life of a run.
    pub fn iter(&self) -> impl Iterator<Item = &Uop> {
        self.uops.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.uops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uops.is_empty()
    }
}
