//! file: core/src/ir/opt/peephole.rs
//! description: instruction-window rewrites inside code chunks.
//!
//! Every rule scans its chunk from the end towards the start, so a deletion
//! never shifts an index that is still to be visited, and reports how many
//! rewrites it made. Inline assembly and binary chunks are never touched.
use crate::ir::chunk::IrChunk;
use crate::ir::instruction::{IrInstruction, ins};
use crate::ir::opcode::Opcode;
use crate::types::IrDataType;

/// Apply the window rules to every code chunk until none of them fires.
pub(crate) fn optimize_instructions(chunks: &mut [IrChunk]) -> usize {
    let mut changes = remove_jumps_to_next_chunk(chunks);
    for chunk in chunks.iter_mut() {
        let Some(instructions) = chunk.instructions_mut() else {
            continue;
        };
        loop {
            let round = remove_nops(instructions)
                + fold_useless_arithmetic(instructions)
                + remove_unreachable_returns(instructions)
                + collapse_flag_changes(instructions)
                + collapse_push_pop(instructions);
            if round == 0 {
                break;
            }
            changes += round;
        }
    }
    changes
}

/// A chunk ending in `jump L` where `L` labels the very next chunk.
fn remove_jumps_to_next_chunk(chunks: &mut [IrChunk]) -> usize {
    let mut removed = 0;
    for idx in 0..chunks.len().saturating_sub(1) {
        let next_label = chunks[idx + 1].label.clone();
        let Some(instructions) = chunks[idx].instructions_mut() else {
            continue;
        };
        let redundant = match instructions.last() {
            Some(last) => {
                last.opcode() == Opcode::Jump
                    && last.label_offset().is_none()
                    && last.label().is_some()
                    && last.label() == next_label.as_deref()
            }
            None => false,
        };
        if redundant {
            instructions.pop();
            removed += 1;
        }
    }
    removed
}

fn remove_nops(instructions: &mut Vec<IrInstruction>) -> usize {
    let before = instructions.len();
    instructions.retain(|i| i.opcode() != Opcode::Nop);
    before - instructions.len()
}

/// What a trivial `op reg,#imm` turns into: `Some(None)` deletes it.
fn simplify_arithmetic(instruction: &IrInstruction) -> Option<Option<IrInstruction>> {
    let (Some(dt), Some(reg), Some(value)) = (instruction.dt(), instruction.reg1(), instruction.immediate()) else {
        return None;
    };
    if dt == IrDataType::Float || instruction.reg2().is_some() {
        return None;
    }
    let all_ones = if dt == IrDataType::Byte { 0xff } else { 0xffff };
    let value = value & all_ones;
    let replacement = match (instruction.opcode(), value) {
        (Opcode::Mul | Opcode::Div | Opcode::Divs, 1) => None,
        (Opcode::Mod, 1) => Some(ins(Opcode::Load).typed(dt).r1(reg).imm(0).finish()),
        (Opcode::Add | Opcode::Sub, 0) => None,
        (Opcode::Add, 1) => Some(ins(Opcode::Inc).typed(dt).r1(reg).finish()),
        (Opcode::Sub, 1) => Some(ins(Opcode::Dec).typed(dt).r1(reg).finish()),
        (Opcode::And, v) if v == all_ones => None,
        (Opcode::And, 0) => Some(ins(Opcode::Load).typed(dt).r1(reg).imm(0).finish()),
        (Opcode::Or | Opcode::Xor, 0) => None,
        (Opcode::Or, v) if v == all_ones => Some(ins(Opcode::Load).typed(dt).r1(reg).imm(all_ones).finish()),
        _ => return None,
    };
    Some(replacement)
}

fn fold_useless_arithmetic(instructions: &mut Vec<IrInstruction>) -> usize {
    let mut changes = 0;
    for idx in (0..instructions.len()).rev() {
        match simplify_arithmetic(&instructions[idx]) {
            Some(Some(replacement)) => instructions[idx] = replacement,
            Some(None) => {
                instructions.remove(idx);
            }
            None => continue,
        }
        changes += 1;
    }
    changes
}

/// A return directly after an unconditional transfer is never reached.
fn remove_unreachable_returns(instructions: &mut Vec<IrInstruction>) -> usize {
    let mut changes = 0;
    let mut idx = instructions.len();
    while idx > 1 {
        idx -= 1;
        if idx >= instructions.len() {
            continue;
        }
        let is_return = matches!(instructions[idx].opcode(), Opcode::Return | Opcode::Returnr);
        if is_return && instructions[idx - 1].opcode().is_unconditional_jump() {
            instructions.remove(idx);
            changes += 1;
        }
    }
    changes
}

/// Of two adjacent carry changes only the second one counts.
fn collapse_flag_changes(instructions: &mut Vec<IrInstruction>) -> usize {
    let is_carry_change = |i: &IrInstruction| matches!(i.opcode(), Opcode::Sec | Opcode::Clc);
    let mut changes = 0;
    let mut idx = instructions.len();
    while idx > 1 {
        idx -= 1;
        if idx >= instructions.len() {
            continue;
        }
        if is_carry_change(&instructions[idx]) && is_carry_change(&instructions[idx - 1]) {
            instructions.remove(idx - 1);
            changes += 1;
        }
    }
    changes
}

/// `push x` + `pop y` becomes `loadr y,x`, or nothing at all when x is y.
fn collapse_push_pop(instructions: &mut Vec<IrInstruction>) -> usize {
    let mut changes = 0;
    let mut idx = instructions.len();
    while idx > 1 {
        idx -= 1;
        if idx >= instructions.len() {
            continue;
        }
        let (push, pop) = (&instructions[idx - 1], &instructions[idx]);
        if push.opcode() != Opcode::Push || pop.opcode() != Opcode::Pop || push.dt() != pop.dt() {
            continue;
        }
        let Some(dt) = push.dt() else {
            continue;
        };
        let (source, target) = if dt.is_float() {
            (push.fp_reg1(), pop.fp_reg1())
        } else {
            (push.reg1(), pop.reg1())
        };
        let (Some(source), Some(target)) = (source, target) else {
            continue;
        };
        if source == target {
            instructions.drain(idx - 1..=idx);
        } else {
            let mv = if dt.is_float() {
                ins(Opcode::Loadr).typed(dt).fr1(target).fr2(source).finish()
            } else {
                ins(Opcode::Loadr).typed(dt).r1(target).r2(source).finish()
            };
            instructions[idx - 1] = mv;
            instructions.remove(idx);
        }
        changes += 1;
    }
    changes
}
