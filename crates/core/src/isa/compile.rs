//! One-time instruction-to-uop compilation (`SPEC_FULL.md` §4.1):
//! `compute_uop_properties` and `adjust_latencies`.

use std::collections::HashMap;

use crate::arch::{Arch, Port};
use crate::isa::instruction::{InstrKind, Instruction};
use crate::isa::operand::{Operand, OperandId, Register};
use crate::isa::uop_props::UopProperties;

/// Runs the full one-time compilation pass over a program's instructions,
/// in the order `SPEC_FULL.md` §4.1 describes it: per-instruction uop
/// bucketing, then the program-wide stack-synch and latency-adjustment
/// passes (both of which need to see instructions in program order).
pub fn compile_all(instructions: &mut [Instruction], arch: Arch) {
    for instr in instructions.iter_mut() {
        instr.uop_properties = compute_uop_properties(instr);
    }
    mark_stack_synch_requirements(instructions);
    adjust_latencies(instructions, arch);
}

fn port_set_is(ports: &[Port], candidates: &[Port]) -> bool {
    ports.iter().any(|p| candidates.contains(p))
}

/// Buckets an instruction's port-distribution table into
/// load/store-address/store-data/non-memory uops, applies the promotion
/// and lat-1-split special cases, assigns `div_cycles`, and pads with empty
/// uops up to `retire_slots` (`SPEC_FULL.md` §4.1).
#[must_use]
pub fn compute_uop_properties(instr: &Instruction) -> Vec<UopProperties> {
    use Port::{P2, P3, P4, P7, P8, P9};

    let mut load = Vec::new();
    let mut store_address = Vec::new();
    let mut store_data = Vec::new();
    let mut non_mem = Vec::new();

    for entry in &instr.port_data {
        for _ in 0..entry.count {
            let mut u = UopProperties::empty();
            u.possible_ports = entry.ports.clone();
            if port_set_is(&entry.ports, &[P7, P8]) {
                u.is_store_address_uop = true;
                store_address.push(u);
            } else if port_set_is(&entry.ports, &[P2, P3]) {
                u.is_load_uop = true;
                load.push(u);
            } else if port_set_is(&entry.ports, &[P4, P9]) {
                u.is_store_data_uop = true;
                store_data.push(u);
            } else {
                non_mem.push(u);
            }
        }
    }

    // Promote loads to store-address uops when data has no address to pair with.
    if !store_data.is_empty() && store_address.is_empty() {
        let promote = store_data.len().min(load.len());
        for _ in 0..promote {
            let mut u = load.remove(0);
            u.is_load_uop = false;
            u.is_store_address_uop = true;
            store_address.push(u);
        }
    }

    let mut uops: Vec<UopProperties> = Vec::new();
    let special_cased = load.is_empty()
        && store_address.is_empty()
        && store_data.is_empty()
        && non_mem.len() == 2
        && instr.output_reg_operands.len() == 1
        && try_split_by_latency(instr, &non_mem, &mut uops);

    if !special_cased {
        for mut u in load {
            u.input_operands = instr
                .mem_addr_operands
                .iter()
                .chain(&instr.input_mem_operands)
                .copied()
                .collect();
            u.output_operands = instr
                .output_reg_operands
                .iter()
                .chain(&instr.output_mem_operands)
                .copied()
                .collect();
            uops.push(u);
        }
        for mut u in store_address {
            u.input_operands = instr.mem_addr_operands.clone();
            uops.push(u);
        }
        for mut u in store_data {
            u.input_operands = instr
                .input_reg_operands
                .iter()
                .chain(&instr.input_mem_operands)
                .copied()
                .collect();
            u.output_operands = instr.output_mem_operands.clone();
            uops.push(u);
        }
        assign_non_mem(instr, non_mem, &mut uops);
    }

    if let Some(first_p0) = uops
        .iter_mut()
        .find(|u| u.possible_ports == [Port::P0] && u.div_cycles == 0)
    {
        first_p0.div_cycles = instr.div_cycles;
    }

    while uops.len() < instr.retire_slots as usize {
        uops.push(UopProperties::empty());
    }

    if let Some(first) = uops.first_mut() {
        first.is_first_uop_of_instr = true;
    }
    if let Some(last) = uops.last_mut() {
        last.is_last_uop_of_instr = true;
    }

    uops
}

/// The "only bucket is non-memory with exactly two entries, one output
/// register, and exactly two distinct latencies" special case: splits the
/// input operands by which of the two latencies they produce to the single
/// output, emitting one uop per latency group. Returns `false` (and leaves
/// `out` untouched) if the instruction's inputs don't actually split into
/// two distinct latency groups, falling back to the ordinary non-memory
/// handling.
fn try_split_by_latency(
    instr: &Instruction,
    non_mem: &[UopProperties],
    out: &mut Vec<UopProperties>,
) -> bool {
    let output = instr.output_reg_operands[0];
    let mut groups: HashMap<i32, Vec<OperandId>> = HashMap::new();
    for &input in instr.input_reg_operands.iter().chain(&instr.input_mem_operands) {
        groups
            .entry(instr.latency(input, output))
            .or_default()
            .push(input);
    }
    if groups.len() != 2 {
        return false;
    }
    let mut latencies: Vec<i32> = groups.keys().copied().collect();
    latencies.sort_unstable();
    for (uop_template, lat) in non_mem.iter().zip(latencies) {
        let mut u = uop_template.clone();
        u.input_operands = groups.remove(&lat).unwrap_or_default();
        u.output_operands = vec![output];
        out.push(u);
    }
    true
}

/// Assigns inputs/outputs to non-memory uops, applying the lat-1-output
/// split when ≥ 2 non-memory uops exist and a lat-1 output is present.
fn assign_non_mem(instr: &Instruction, non_mem: Vec<UopProperties>, out: &mut Vec<UopProperties>) {
    if non_mem.is_empty() {
        return;
    }
    let all_inputs: Vec<OperandId> = instr
        .input_reg_operands
        .iter()
        .chain(&instr.input_mem_operands)
        .copied()
        .collect();

    let lat1_outputs: Vec<OperandId> = instr
        .output_reg_operands
        .iter()
        .copied()
        .filter(|&output| {
            all_inputs
                .iter()
                .all(|&input| instr.latency(input, output) <= 1)
        })
        .collect();
    let other_outputs: Vec<OperandId> = instr
        .output_reg_operands
        .iter()
        .copied()
        .filter(|o| !lat1_outputs.contains(o))
        .collect();

    if non_mem.len() >= 2 && !lat1_outputs.is_empty() {
        let mut iter = non_mem.into_iter();
        let mut first = iter.next().unwrap_or_else(UopProperties::empty);
        first.input_operands = all_inputs.clone();
        first.output_operands = lat1_outputs;
        out.push(first);
        let rest: Vec<UopProperties> = iter.collect();
        let last_idx = rest.len().saturating_sub(1);
        for (i, mut u) in rest.into_iter().enumerate() {
            u.input_operands = all_inputs.clone();
            u.output_operands = if i == last_idx {
                other_outputs.clone()
            } else {
                Vec::new()
            };
            out.push(u);
        }
    } else {
        for mut u in non_mem {
            u.input_operands = all_inputs.clone();
            u.output_operands = instr.output_reg_operands.clone();
            out.push(u);
        }
    }
}

/// Marks `requires_stack_synch_uop` on every instruction that implicitly
/// reads/writes RSP but wasn't the most recent explicit stack modifier
/// (`SPEC_FULL.md` §4.1).
fn mark_stack_synch_requirements(instructions: &mut [Instruction]) {
    let mut last_modifier_was_self = false;
    for instr in instructions.iter_mut() {
        let uses_rsp = instr
            .input_reg_operands
            .iter()
            .chain(&instr.output_reg_operands)
            .any(|&id| {
                matches!(instr.operand(id), Operand::Reg(r) if r.canonical() == Register::rsp())
            })
            || instr.operands.iter().any(
                |op| matches!(op, Operand::Mem(m) if m.base.as_ref().is_some_and(|b| b.canonical() == Register::rsp())),
            );

        if instr.modifies_stack {
            last_modifier_was_self = true;
        } else {
            if uses_rsp && !last_modifier_was_self {
                instr.requires_stack_synch_uop = true;
            }
            last_modifier_was_self = false;
        }
    }
}

/// The most recent writer of a canonical register, tracked program-order
/// across the whole instruction stream (`SPEC_FULL.md` §4.1,
/// `adjustLatencies`'s `prevWriteToReg`).
///
/// Move-eliminable `MOV`s are transparent: a write via such a move is
/// attributed to whoever last wrote the move's own source register, since
/// the move itself never occupies a physical register at rename.
fn adjust_latencies(instructions: &mut [Instruction], arch: Arch) {
    // Whether instruction `i` has the shape `adjustLatencies` treats as a
    // "simple MOV-writer base register": a register output fed from a
    // single memory input (a plain load-to-register move).
    let is_simple_mov_writer: Vec<bool> = instructions
        .iter()
        .map(|i| {
            i.kind == InstrKind::Mov
                && i.output_reg_operands.len() == 1
                && i.input_mem_operands.len() == 1
        })
        .collect();

    let mut prev_writer: HashMap<Register, usize> = HashMap::new();
    let mut high8_clean: HashMap<Register, bool> = HashMap::new();

    for idx in 0..instructions.len() {
        let instr = &instructions[idx];

        let high8_dirty_input = instr.input_reg_operands.iter().any(|&id| {
            let Operand::Reg(r) = instr.operand(id) else {
                return false;
            };
            r.is_high8() && !*high8_clean.get(&r.canonical()).unwrap_or(&false)
        });

        if arch.is_snb_or_later() {
            apply_fast_load_path(&mut instructions[idx], &prev_writer, &is_simple_mov_writer);
        }
        let instr = &mut instructions[idx];
        apply_unconditional_load_decrement(instr);
        apply_lock_prefix_latency(instr);
        if high8_dirty_input {
            for v in instr.latencies.values_mut() {
                *v += 1;
            }
        }

        for &id in &instr.output_reg_operands {
            if let Operand::Reg(r) = instr.operand(id) {
                let canon = r.canonical();
                if r.is_high8() {
                    high8_clean.insert(canon, true);
                } else {
                    high8_clean.insert(canon, false);
                }
            }
        }

        let is_transparent_mov = instr.kind == InstrKind::Mov
            && instr.may_be_eliminated
            && instr.input_reg_operands.len() == 1
            && instr.output_reg_operands.len() == 1;
        for &id in &instr.output_reg_operands {
            if let Operand::Reg(r) = instr.operand(id) {
                let canon = r.canonical();
                let writer = if is_transparent_mov {
                    let Operand::Reg(src) = instr.operand(instr.input_reg_operands[0]) else {
                        continue;
                    };
                    prev_writer.get(&src.canonical()).copied()
                } else {
                    None
                };
                prev_writer.insert(canon, writer.unwrap_or(idx));
            }
        }
    }
}

/// The extra -1 mem-load latency decrement for SNB-and-later
/// architectures, gated on a simple `MOV(reg, mem)`-shaped previous writer
/// of the memory operand's base register (`SPEC_FULL.md` §4.1, §9 Open
/// Question 5). A "simple MOV-writer" here means a [`InstrKind::Mov`]
/// instruction with exactly one register output and one memory input — the
/// operational reading of the reference tool's literal-iform-string match,
/// since this crate's `ProgramFile` doesn't carry iform strings for that
/// comparison.
fn apply_fast_load_path(
    instr: &mut Instruction,
    prev_writer: &HashMap<Register, usize>,
    is_simple_mov_writer: &[bool],
) {
    for &mem_id in &instr.input_mem_operands.clone() {
        let Operand::Mem(mem) = instr.operand(mem_id).clone() else {
            continue;
        };
        if !mem.is_simple_base_only() {
            continue;
        }
        let Some(base) = &mem.base else { continue };
        let Some(&writer_idx) = prev_writer.get(&base.canonical()) else {
            continue;
        };
        if !is_simple_mov_writer[writer_idx] {
            continue;
        }
        for &out in &instr.output_reg_operands.clone() {
            let current = instr.latency(mem_id, out);
            instr.set_latency(mem_id, out, current - 1);
        }
    }
}

/// The unconditional -3 decrement applied to every memory-load-to-output
/// latency pair, on every architecture (`SPEC_FULL.md` §4.1, §9 Open
/// Question 5: the reference source's "ToDo: only on HSW" comment was
/// never acted on in the code it annotates).
fn apply_unconditional_load_decrement(instr: &mut Instruction) {
    for &in_mem in &instr.input_mem_operands.clone() {
        for &out in &instr.output_reg_operands.clone() {
            let current = instr.latency(in_mem, out);
            instr.set_latency(in_mem, out, current - 3);
        }
    }
}

fn apply_lock_prefix_latency(instr: &mut Instruction) {
    if !instr.has_lock_prefix {
        return;
    }
    let Some(&out_mem) = instr.output_mem_operands.first() else {
        return;
    };
    let Some(&out_reg) = instr.output_reg_operands.first() else {
        return;
    };
    for &input in &instr.input_reg_operands.clone() {
        let v = instr.latency(input, out_reg);
        instr.set_latency(input, out_mem, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::instruction::PortDistEntry;

    fn simple_alu_instr() -> Instruction {
        let mut instr = Instruction::unknown("add rax, 1");
        instr.is_unknown = false;
        instr.operands = vec![Operand::Reg(Register::new("RAX"))];
        instr.input_reg_operands = vec![OperandId(0)];
        instr.output_reg_operands = vec![OperandId(0)];
        instr.retire_slots = 1;
        instr.uops = 1;
        instr.uops_mite = 1;
        instr.port_data = vec![PortDistEntry {
            ports: vec![Port::P0, Port::P1, Port::P5, Port::P6],
            count: 1,
        }];
        instr
    }

    #[test]
    fn non_mem_uop_gets_single_port_and_all_operands() {
        let instr = simple_alu_instr();
        let uops = compute_uop_properties(&instr);
        assert_eq!(uops.len(), 1);
        assert_eq!(uops[0].possible_ports.len(), 4);
        assert_eq!(uops[0].input_operands, vec![OperandId(0)]);
        assert_eq!(uops[0].output_operands, vec![OperandId(0)]);
        assert!(uops[0].is_first_uop_of_instr);
        assert!(uops[0].is_last_uop_of_instr);
    }

    #[test]
    fn padding_fills_to_retire_slots() {
        let mut instr = simple_alu_instr();
        instr.retire_slots = 3;
        let uops = compute_uop_properties(&instr);
        assert_eq!(uops.len(), 3);
        assert!(uops[1].has_no_port());
        assert!(uops[2].has_no_port());
    }

    #[test]
    fn load_uop_gets_mem_and_addr_operands() {
        let mut instr = Instruction::unknown("mov rax, [rbx]");
        instr.is_unknown = false;
        instr.operands = vec![
            Operand::Reg(Register::new("RAX")),
            Operand::Mem(MemOperand {
                base: Some(Register::new("RBX")),
                ..Default::default()
            }),
        ];
        instr.output_reg_operands = vec![OperandId(0)];
        instr.mem_addr_operands = vec![OperandId(1)];
        instr.retire_slots = 1;
        instr.port_data = vec![PortDistEntry {
            ports: vec![Port::P2, Port::P3],
            count: 1,
        }];
        let uops = compute_uop_properties(&instr);
        assert_eq!(uops.len(), 1);
        assert!(uops[0].is_load_uop);
        assert_eq!(uops[0].input_operands, vec![OperandId(1)]);
        assert_eq!(uops[0].output_operands, vec![OperandId(0)]);
    }

    #[test]
    fn unconditional_load_decrement_applies_on_all_archs() {
        let mut instr = Instruction::unknown("mov rax, [rbx]");
        instr.is_unknown = false;
        instr.operands = vec![
            Operand::Reg(Register::new("RAX")),
            Operand::Mem(MemOperand {
                base: Some(Register::new("RBX")),
                ..Default::default()
            }),
        ];
        instr.output_reg_operands = vec![OperandId(0)];
        instr.input_mem_operands = vec![OperandId(1)];
        instr.set_latency(OperandId(1), OperandId(0), 5);
        let mut instructions = vec![instr];
        adjust_latencies(&mut instructions, Arch::Con);
        assert_eq!(instructions[0].latency(OperandId(1), OperandId(0)), 2);
    }
}
