//! Register renamer: move elimination, rename-key resolution, abstract
//! memory-value tracking (`SPEC_FULL.md` §4.3).

pub mod budget;
pub mod key;

use std::collections::HashMap;

use crate::isa::{InstrKind, Instruction, MemOperand, Operand, OperandId, Program, Register};
use crate::model::{FusedUop, LaminatedUop, OperandPool, OutputKey, RenamedOperandId, UopId, UopPool};
use crate::pipeline::idq::Idq;
use crate::pipeline::rob::Rob;

use budget::EliminationBudget;
use key::{AbstractValue, MemShape, RenameKey};

/// Per-instruction-round bookkeeping, held until that instruction's
/// `isLastUopOfInstr` uop is processed.
#[derive(Debug, Default)]
struct PendingInstr {
    by_operand: HashMap<OperandId, RenamedOperandId>,
    renames: HashMap<RenameKey, RenamedOperandId>,
    abstract_values: HashMap<Register, AbstractValue>,
}

/// Register class a move-elimination budget is tracked per
/// (`multiUseGPRDict`/`multiUseSIMDDict` in the reference tool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegClass {
    Gpr,
    Simd,
}

fn classify(reg: &Register) -> RegClass {
    let name = reg.canonical().0;
    if name.starts_with('X') || name.starts_with('Y') || name.starts_with('Z') {
        RegClass::Simd
    } else {
        RegClass::Gpr
    }
}

pub struct Renamer {
    rename_map: HashMap<RenameKey, RenamedOperandId>,
    reg_abstract: HashMap<Register, AbstractValue>,
    gpr_budget: EliminationBudget,
    simd_budget: EliminationBudget,
    pending: HashMap<usize, PendingInstr>,
    next_fresh: u64,
}

impl Default for Renamer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renamer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rename_map: HashMap::new(),
            reg_abstract: HashMap::new(),
            gpr_budget: EliminationBudget::new(),
            simd_budget: EliminationBudget::new(),
            pending: HashMap::new(),
            next_fresh: 0,
        }
    }

    fn fresh(&mut self) -> AbstractValue {
        let v = AbstractValue::Fresh(self.next_fresh);
        self.next_fresh += 1;
        v
    }

    fn current_abstract(&self, reg: &Register) -> AbstractValue {
        let canonical = reg.canonical();
        self.reg_abstract
            .get(&canonical)
            .copied()
            .unwrap_or_else(|| AbstractValue::identity_of(&canonical))
    }

    fn mem_shape(&self, mem: &MemOperand, is_agen: bool) -> MemShape {
        MemShape {
            base: mem.base.as_ref().map(|r| self.current_abstract(r)),
            index: mem.index.as_ref().map(|r| self.current_abstract(r)),
            scale: mem.scale,
            displacement: mem.displacement,
            is_agen,
        }
    }

    fn rename_key(&self, instr: &Instruction, operand_id: OperandId, operand: &Operand) -> RenameKey {
        match operand {
            Operand::Reg(reg) => RenameKey::Reg(reg.canonical()),
            Operand::Mem(mem) => {
                let is_agen = instr.agen_operands.contains(&operand_id);
                RenameKey::Mem(self.mem_shape(mem, is_agen))
            }
        }
    }

    /// Looks up the current `RenamedOperandId` for a read of `key`,
    /// minting a producer-less "architectural initial value" the first
    /// time any given key is read.
    fn get_or_create(&mut self, key: RenameKey, operands: &mut OperandPool) -> RenamedOperandId {
        if let Some(&id) = self.rename_map.get(&key) {
            return id;
        }
        let id = operands.allocate(OutputKey::Initial);
        operands.get_mut(id).finalize();
        self.rename_map.insert(key, id);
        id
    }

    fn output_abstract_value(
        &mut self,
        instr: &Instruction,
        input_values: &[Operand],
        agen_operand: Option<&MemOperand>,
    ) -> AbstractValue {
        match instr.kind {
            InstrKind::Mov => match input_values.first() {
                Some(Operand::Reg(r)) => self.current_abstract(r),
                Some(Operand::Mem(m)) => AbstractValue::of_mem_shape(&self.mem_shape(m, false)),
                None => self.fresh(),
            },
            InstrKind::Pop => match input_values.iter().find_map(Operand::as_mem) {
                Some(m) => AbstractValue::of_mem_shape(&self.mem_shape(m, false)),
                None => self.fresh(),
            },
            InstrKind::Lea => match agen_operand {
                Some(m) => AbstractValue::of_mem_shape(&self.mem_shape(m, true)),
                None => self.fresh(),
            },
            InstrKind::Other => self.fresh(),
        }
    }

    /// Renames every unfused uop of one laminated group, producing the
    /// `FusedUop`s ready to hand to the ROB/scheduler.
    pub fn rename_laminated(
        &mut self,
        laminated: &LaminatedUop,
        clock: u64,
        program: &Program,
        pool: &mut UopPool,
        operands: &mut OperandPool,
    ) {
        for fused in &laminated.fused {
            for &uop_id in &fused.uops {
                self.rename_uop(uop_id, clock, program, pool, operands);
            }
        }
    }

    fn rename_uop(
        &mut self,
        uop_id: UopId,
        clock: u64,
        program: &Program,
        pool: &mut UopPool,
        operands: &mut OperandPool,
    ) {
        let instr_pos = pool.get(uop_id).instr_pos;
        let instr = &program.instructions[instr_pos];
        let is_stack_synch = matches!(pool.get(uop_id).kind, crate::model::UopKind::StackSynch { .. });

        if is_stack_synch {
            self.rename_stack_synch(uop_id, pool, operands);
            return;
        }

        if self.try_eliminate(uop_id, clock, instr, program, pool, operands) {
            return;
        }

        let input_values = pool.get(uop_id).input_operand_values(program);
        let input_ids = pool.get(uop_id).input_operand_ids(program);
        let mut renamed_inputs = Vec::with_capacity(input_values.len());
        for (id, value) in input_ids.iter().zip(input_values.iter()) {
            let key = self.rename_key(instr, *id, value);
            renamed_inputs.push(self.get_or_create(key, operands));
        }

        let agen_operand = instr
            .agen_operands
            .first()
            .map(|&id| instr.operand(id))
            .and_then(Operand::as_mem);
        let output_av = self.output_abstract_value(instr, &input_values, agen_operand);

        let output_ids = pool.get(uop_id).output_operand_ids(program);
        let output_values = pool.get(uop_id).output_operand_values(program);
        // Computed up front (rather than inside the loop below) because it
        // needs `&self` while `pending` below holds `&mut self.pending`.
        let output_keys: Vec<RenameKey> = output_ids
            .iter()
            .zip(output_values.iter())
            .map(|(id, value)| self.rename_key(instr, *id, value))
            .collect();

        let pending = self.pending.entry(instr_pos).or_default();
        let mut renamed_outputs = Vec::with_capacity(output_ids.len());
        for ((id, value), key) in output_ids.iter().zip(output_values.iter()).zip(output_keys) {
            let renamed_id = if let Some(&existing) = pending.by_operand.get(id) {
                operands.get_mut(existing).add_producer(uop_id);
                existing
            } else {
                let new_id = operands.allocate(OutputKey::Operand {
                    instr_pos,
                    operand_id: *id,
                });
                operands.get_mut(new_id).add_producer(uop_id);
                pending.by_operand.insert(*id, new_id);
                pending.renames.insert(key, new_id);
                if let Operand::Reg(reg) = value {
                    pending
                        .abstract_values
                        .insert(reg.canonical(), output_av);
                }
                new_id
            };
            renamed_outputs.push(renamed_id);
        }

        let uop = pool.get_mut(uop_id);
        uop.renamed_inputs = renamed_inputs;
        uop.renamed_outputs = renamed_outputs;

        if pool.get(uop_id).is_last_uop_of_instr(program) {
            self.finalize_instr(instr_pos, operands);
        }
    }

    /// Stack-synch uops are synthetic, single-uop, self-finalizing writes
    /// of RSP; they never participate in the enclosing instruction's
    /// pending/finalize grouping (see `model::renamed_operand::OutputKey`'s
    /// docs).
    fn rename_stack_synch(&mut self, uop_id: UopId, pool: &mut UopPool, operands: &mut OperandPool) {
        let key = RenameKey::Reg(Register::rsp());
        let input_id = self.get_or_create(key.clone(), operands);
        let output_id = operands.allocate(OutputKey::StackSynchRsp);
        operands.get_mut(output_id).add_producer(uop_id);
        operands.get_mut(output_id).finalize();
        self.release_overwritten(key.clone(), output_id);
        self.rename_map.insert(key, output_id);

        let uop = pool.get_mut(uop_id);
        uop.renamed_inputs = vec![input_id];
        uop.renamed_outputs = vec![output_id];
    }

    fn try_eliminate(
        &mut self,
        uop_id: UopId,
        clock: u64,
        instr: &Instruction,
        program: &Program,
        pool: &mut UopPool,
        operands: &mut OperandPool,
    ) -> bool {
        if !instr.may_be_eliminated {
            return false;
        }
        let input_ids = pool.get(uop_id).input_operand_ids(program);
        let output_ids = pool.get(uop_id).output_operand_ids(program);
        let (&[input_id], &[output_id]) = (input_ids.as_slice(), output_ids.as_slice()) else {
            return false;
        };
        let Operand::Reg(output_reg) = instr.operand(output_id).clone() else {
            return false;
        };
        let input_key = self.rename_key(instr, input_id, instr.operand(input_id));
        let source_id = self.get_or_create(input_key, operands);

        let budget = match classify(&output_reg) {
            RegClass::Gpr => &mut self.gpr_budget,
            RegClass::Simd => &mut self.simd_budget,
        };
        if !budget.try_use(source_id, clock) {
            return false;
        }

        let instr_pos = pool.get(uop_id).instr_pos;
        let pending = self.pending.entry(instr_pos).or_default();
        pending.by_operand.insert(output_id, source_id);
        pending
            .renames
            .insert(RenameKey::Reg(output_reg.canonical()), source_id);

        let uop = pool.get_mut(uop_id);
        uop.eliminated = true;
        uop.renamed_inputs = vec![source_id];
        uop.renamed_outputs = vec![source_id];

        if pool.get(uop_id).is_last_uop_of_instr(program) {
            self.finalize_instr(instr_pos, operands);
        }
        true
    }

    fn finalize_instr(&mut self, instr_pos: usize, operands: &mut OperandPool) {
        let Some(pending) = self.pending.remove(&instr_pos) else {
            return;
        };
        for &id in pending.by_operand.values() {
            operands.get_mut(id).finalize();
        }
        for (key, id) in pending.renames {
            self.release_overwritten(key.clone(), id);
            self.rename_map.insert(key, id);
        }
        for (reg, value) in pending.abstract_values {
            self.reg_abstract.insert(reg, value);
        }
    }

    fn release_overwritten(&mut self, key: RenameKey, new_id: RenamedOperandId) {
        if let Some(&old_id) = self.rename_map.get(&key) {
            if old_id != new_id {
                self.gpr_budget.release(old_id);
                self.simd_budget.release(old_id);
            }
        }
    }

    /// One cycle of admission from the IDQ (`SPEC_FULL.md` §4.3): gated on
    /// IDQ ramp-up (Open Question #2, DESIGN.md), ROB/scheduler fullness,
    /// total fused-uop issue width, and serializing-instruction ordering.
    #[allow(clippy::too_many_arguments)]
    pub fn cycle(
        &mut self,
        clock: u64,
        issue_width: usize,
        idq: &mut Idq,
        rob: &Rob,
        scheduler_is_full: impl Fn() -> bool,
        program: &Program,
        pool: &mut UopPool,
        operands: &mut OperandPool,
    ) -> Vec<FusedUop> {
        let mut admitted = Vec::new();
        if idq.len() < issue_width {
            return admitted;
        }
        let mut fused_pulled = 0usize;
        loop {
            if rob.is_full() || scheduler_is_full() {
                break;
            }
            let Some(laminated) = idq.pop_front() else { break };
            if fused_pulled + laminated.fused.len() > issue_width {
                idq.push_front(laminated);
                break;
            }
            let first_uop_id = laminated.fused[0].uops[0];
            let first_uop = pool.get(first_uop_id);
            let first_instr = &program.instructions[first_uop.instr_pos];
            let is_serializing_first =
                first_uop.is_first_uop_of_instr(program)
                    && (first_instr.is_load_serializing || first_instr.is_store_serializing);
            if is_serializing_first && !rob.is_empty() {
                idq.push_front(laminated);
                break;
            }

            self.rename_laminated(&laminated, clock, program, pool, operands);
            fused_pulled += laminated.fused.len();
            admitted.extend(laminated.fused);
        }
        admitted
    }
}
