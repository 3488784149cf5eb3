//! file: core/src/ir/lower/lower_stmt.rs
//! description: statement lowering, conditional branches and assignment stores.

use crate::ast::{BinaryOperator, NodeId, NodeKind, PrefixOperator};
use crate::error::{IoError, boxed};
use crate::ir::chunk::{BinarySource, IrChunk};
use crate::ir::instruction::ins;
use crate::ir::lower::function_builder::{ExprResult, FunctionBuilder};
use crate::ir::lower::lower_expr::{MemLocation, split_labels};
use crate::ir::opcode::Opcode;
use crate::types::{IrDataType, mem_size};

/// Contents of an included binary file window.
pub(crate) fn read_binary(source: &BinarySource) -> Result<Vec<u8>, IoError> {
    let data = std::fs::read(&source.file)
        .map_err(|e| IoError::new(source.file.clone(), format!("cannot include binary file: {}", e)))?;
    let start = (source.offset as usize).min(data.len());
    let end = match source.length {
        Some(length) => (start + length as usize).min(data.len()),
        None => data.len(),
    };
    Ok(data[start..end].to_vec())
}

impl FunctionBuilder<'_> {
    pub fn lower_statements(&mut self, statements: &[NodeId]) {
        for statement in statements {
            self.lower_stmt(*statement);
        }
    }

    pub fn lower_stmt(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::Assignment { target, value } => self.lower_assignment(*target, *value),
            NodeKind::AugmentedAssignment { target, op, value } => self.lower_augmented(*target, *op, *value),
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let else_label = self.new_label("else");
                self.jump_if_false(*condition, &else_label);
                self.lower_statements(then_branch);
                if else_branch.is_empty() {
                    self.label(else_label);
                } else {
                    let end = self.new_label("endif");
                    self.emit(ins(Opcode::Jump).label(end.clone()).finish());
                    self.label(else_label);
                    self.lower_statements(else_branch);
                    self.label(end);
                }
            }
            NodeKind::While { condition, body } => {
                let top = self.new_label("while");
                let end = self.new_label("endwhile");
                self.label(top.clone());
                self.jump_if_false(*condition, &end);
                self.lower_statements(body);
                self.emit(ins(Opcode::Jump).label(top).finish());
                self.label(end);
            }
            NodeKind::Repeat { count, body } => self.lower_repeat(*count, body),
            NodeKind::For {
                variable,
                from,
                to,
                step,
                body,
            } => self.lower_for(*variable, *from, *to, *step, body),
            NodeKind::Label { name } => self.label(name.clone()),
            NodeKind::Jump { target } => self.emit(ins(Opcode::Jump).label(target.clone()).finish()),
            NodeKind::Return { value } => match value {
                None => self.emit(ins(Opcode::Return).finish()),
                Some(value) => {
                    let instruction = match self.lower_expr(*value) {
                        ExprResult::Reg(irdt, reg) => ins(Opcode::Returnr).typed(irdt).r1(reg).finish(),
                        ExprResult::FpReg(fr) => ins(Opcode::Returnr).typed(IrDataType::Float).fr1(fr).finish(),
                        ExprResult::Void => ins(Opcode::Return).finish(),
                    };
                    self.emit(instruction);
                }
            },
            NodeKind::InlineAssembly { assembly, is_ir } => {
                self.push_chunk(IrChunk::inline_asm(None, assembly.clone(), *is_ir));
            }
            NodeKind::InlineBinary { source } => match read_binary(source) {
                Ok(data) => self.push_chunk(IrChunk::inline_binary(None, data, Some(source.clone()))),
                Err(e) => self.ctx.report(boxed(e.at(tree.position(id).clone()))),
            },
            // hoisted into the symbol table or the enclosing block
            NodeKind::Variable { .. } | NodeKind::MemMapped { .. } | NodeKind::Sub { .. } | NodeKind::AsmSub { .. } => {}
            kind if kind.is_expression() => {
                self.lower_expr(id);
            }
            other => panic!("unexpected {} in a subroutine body at {}", other, tree.position(id)),
        }
    }

    fn lower_assignment(&mut self, target: NodeId, value: NodeId) {
        let tree = self.tree;
        if matches!(tree.kind(target), NodeKind::Identifier { .. }) && tree.is_same_as(target, value) {
            return;
        }
        if let NodeKind::Binary { left, op, right } = tree.kind(value) {
            if matches!(op, BinaryOperator::Add | BinaryOperator::Sub)
                && tree.is_same_as(*left, target)
                && tree.const_value(*right) == Some(1.0)
                && self.try_inc_dec(target, *op)
            {
                return;
            }
        }
        if tree.const_value(value) == Some(0.0) {
            self.assign_zero(target);
            return;
        }
        let result = self.lower_expr(value);
        self.assign_result(target, result);
    }

    fn lower_augmented(&mut self, target: NodeId, op: BinaryOperator, value: NodeId) {
        let tree = self.tree;
        let dt = tree.expect_dt(target);
        let add_or_sub = matches!(op, BinaryOperator::Add | BinaryOperator::Sub);
        if add_or_sub && tree.const_value(value) == Some(1.0) && self.try_inc_dec(target, op) {
            return;
        }
        if add_or_sub {
            if let Some(location) = self.const_location(target) {
                let opcode = if op == BinaryOperator::Add { Opcode::Addm } else { Opcode::Subm };
                let builder = match self.lower_expr(value) {
                    ExprResult::Reg(irdt, reg) => ins(opcode).typed(irdt).r1(reg),
                    ExprResult::FpReg(fr) => ins(opcode).typed(IrDataType::Float).fr1(fr),
                    ExprResult::Void => panic!("augmented assignment without a value"),
                };
                self.emit(location.apply(builder).finish());
                return;
            }
        }
        let current = self.lower_expr(target);
        let result = self.lower_binary(dt, current, op, value);
        self.assign_result(target, result);
    }

    /// `incm`/`decm` directly on memory; false when the target has no fixed location.
    fn try_inc_dec(&mut self, target: NodeId, op: BinaryOperator) -> bool {
        let Some(location) = self.const_location(target) else {
            return false;
        };
        let irdt = self.tree.expect_dt(target).ir_type();
        let opcode = if op == BinaryOperator::Add { Opcode::Incm } else { Opcode::Decm };
        self.emit(location.apply(ins(opcode).typed(irdt)).finish());
        true
    }

    pub(crate) fn assign_zero(&mut self, target: NodeId) {
        let tree = self.tree;
        let dt = tree.expect_dt(target);
        let irdt = dt.ir_type();
        if let NodeKind::ArrayIndexer {
            name,
            split: true,
            index,
        } = tree.kind(target)
        {
            let (lsb, msb) = split_labels(name);
            match tree.const_int(*index) {
                Some(i) => {
                    self.emit(ins(Opcode::Storezm).typed(IrDataType::Byte).label_at(lsb, i).finish());
                    self.emit(ins(Opcode::Storezm).typed(IrDataType::Byte).label_at(msb, i).finish());
                }
                None => {
                    let idx = self.scaled_index(*index, 1);
                    self.emit(ins(Opcode::Storezx).typed(IrDataType::Byte).r1(idx).label(lsb).finish());
                    self.emit(ins(Opcode::Storezx).typed(IrDataType::Byte).r1(idx).label(msb).finish());
                }
            }
            return;
        }
        if let Some(location) = self.const_location(target) {
            self.emit(location.apply(ins(Opcode::Storezm).typed(irdt)).finish());
            return;
        }
        match tree.kind(target) {
            NodeKind::MemoryByte { address } => {
                let address = self.lower_expr(*address).reg();
                self.emit(ins(Opcode::Storezi).typed(IrDataType::Byte).r1(address).finish());
            }
            NodeKind::ArrayIndexer { name, index, .. } => {
                let idx = self.scaled_index(*index, mem_size(dt, None));
                self.emit(ins(Opcode::Storezx).typed(irdt).r1(idx).label(name.clone()).finish());
            }
            other => panic!("cannot assign to {} at {}", other, tree.position(target)),
        }
    }

    /// Store an evaluated value into an assignable expression.
    pub(crate) fn assign_result(&mut self, target: NodeId, value: ExprResult) {
        let tree = self.tree;
        let dt = tree.expect_dt(target);
        if let NodeKind::ArrayIndexer {
            name,
            split: true,
            index,
        } = tree.kind(target)
        {
            let word = value.reg();
            let (lsb, msb) = split_labels(name);
            let lo = self.reg(IrDataType::Byte);
            let hi = self.reg(IrDataType::Byte);
            self.emit(ins(Opcode::Lsig).typed(IrDataType::Byte).r1(lo).r2(word).finish());
            self.emit(ins(Opcode::Msig).typed(IrDataType::Byte).r1(hi).r2(word).finish());
            match tree.const_int(*index) {
                Some(i) => {
                    self.emit(ins(Opcode::Storem).typed(IrDataType::Byte).r1(lo).label_at(lsb, i).finish());
                    self.emit(ins(Opcode::Storem).typed(IrDataType::Byte).r1(hi).label_at(msb, i).finish());
                }
                None => {
                    let idx = self.scaled_index(*index, 1);
                    self.emit(ins(Opcode::Storex).typed(IrDataType::Byte).r1(lo).r2(idx).label(lsb).finish());
                    self.emit(ins(Opcode::Storex).typed(IrDataType::Byte).r1(hi).r2(idx).label(msb).finish());
                }
            }
            return;
        }
        if let Some(location) = self.const_location(target) {
            self.store_to(value, &location);
            return;
        }
        match tree.kind(target) {
            NodeKind::MemoryByte { address } => {
                let address = self.lower_expr(*address).reg();
                let instruction = ins(Opcode::Storei).typed(IrDataType::Byte).r1(value.reg()).r2(address);
                self.emit(instruction.finish());
            }
            NodeKind::ArrayIndexer { name, index, .. } => {
                let idx = self.scaled_index(*index, mem_size(dt, None));
                let builder = match value {
                    ExprResult::FpReg(fr) => ins(Opcode::Storex).typed(IrDataType::Float).r1(idx).fr1(fr),
                    ExprResult::Reg(irdt, reg) => ins(Opcode::Storex).typed(irdt).r1(reg).r2(idx),
                    ExprResult::Void => panic!("cannot store a value-less expression"),
                };
                self.emit(builder.label(name.clone()).finish());
            }
            other => panic!("cannot assign to {} at {}", other, tree.position(target)),
        }
    }

    /// Branch to `target` when the condition evaluates to false.
    pub(crate) fn jump_if_false(&mut self, condition: NodeId, target: &str) {
        let tree = self.tree;
        match tree.kind(condition) {
            NodeKind::Binary {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.jump_if_false(*left, target);
                self.jump_if_false(*right, target);
            }
            NodeKind::Binary {
                left,
                op: BinaryOperator::Or,
                right,
            } => {
                let taken = self.new_label("or_true");
                self.jump_if_true(*left, &taken);
                self.jump_if_false(*right, target);
                self.label(taken);
            }
            NodeKind::Binary { left, op, right } if op.is_comparison() => {
                self.branch_unless(*left, *op, *right, target);
            }
            NodeKind::Prefix {
                op: PrefixOperator::Not,
                operand,
            } => self.jump_if_true(*operand, target),
            _ => self.branch_on_value(condition, Opcode::Beq, target),
        }
    }

    fn jump_if_true(&mut self, condition: NodeId, target: &str) {
        self.branch_on_value(condition, Opcode::Bne, target);
    }

    fn branch_on_value(&mut self, condition: NodeId, branch: Opcode, target: &str) {
        match self.lower_expr(condition) {
            ExprResult::Reg(irdt, reg) => {
                self.emit(ins(branch).typed(irdt).r1(reg).imm(0).label(target).finish());
            }
            other => panic!("condition must be an integer value, got {:?}", other),
        }
    }

    /// Branch to `target` when `left op right` does not hold.
    fn branch_unless(&mut self, left: NodeId, op: BinaryOperator, right: NodeId, target: &str) {
        use BinaryOperator::*;

        let tree = self.tree;
        let operand_dt = tree.expect_dt(left);
        let irdt = operand_dt.ir_type();

        if irdt.is_float() {
            let fa = self.lower_expr(left).fp_reg();
            let fb = self.lower_expr(right).fp_reg();
            let cmp = self.reg(IrDataType::Byte);
            self.emit(ins(Opcode::Fcomp).typed(IrDataType::Float).r1(cmp).fr1(fa).fr2(fb).finish());
            let branch = match op {
                Eq => Opcode::Bne,
                Ne => Opcode::Beq,
                Lt => Opcode::Bges,
                Le => Opcode::Bgts,
                Gt => Opcode::Bles,
                _ => Opcode::Blts,
            };
            self.emit(ins(branch).typed(IrDataType::Byte).r1(cmp).imm(0).label(target).finish());
            return;
        }

        let signed = operand_dt.is_signed();
        let a = self.lower_expr(left).reg();

        if let Some(value) = tree.const_int(right) {
            let status = match (op, signed) {
                (Eq, _) => Some(Opcode::Bstne),
                (Ne, _) => Some(Opcode::Bsteq),
                (Lt, false) => Some(Opcode::Bstcs),
                (Ge, false) => Some(Opcode::Bstcc),
                _ => None,
            };
            if let Some(status) = status {
                self.emit(ins(Opcode::Cmpi).typed(irdt).r1(a).imm(value).finish());
                self.emit(ins(status).label(target).finish());
                return;
            }
            let branch = match (op, signed) {
                (Le, false) => Opcode::Bgt,
                (Gt, false) => Opcode::Ble,
                (Lt, true) => Opcode::Bges,
                (Le, true) => Opcode::Bgts,
                (Gt, true) => Opcode::Bles,
                _ => Opcode::Blts,
            };
            self.emit(ins(branch).typed(irdt).r1(a).imm(value).label(target).finish());
            return;
        }

        let b = self.lower_expr(right).reg();
        let (status, first, second) = match (op, signed) {
            (Eq, _) => (Some(Opcode::Bstne), a, b),
            (Ne, _) => (Some(Opcode::Bsteq), a, b),
            (Lt, false) => (Some(Opcode::Bstcs), a, b),
            (Ge, false) => (Some(Opcode::Bstcc), a, b),
            (Le, false) => (Some(Opcode::Bstcc), b, a),
            (Gt, false) => (Some(Opcode::Bstcs), b, a),
            _ => (None, a, b),
        };
        if let Some(status) = status {
            self.emit(ins(Opcode::Cmp).typed(irdt).r1(first).r2(second).finish());
            self.emit(ins(status).label(target).finish());
            return;
        }
        let (branch, first, second) = match op {
            Lt => (Opcode::Bgesr, a, b),
            Le => (Opcode::Bgtsr, a, b),
            Gt => (Opcode::Bgesr, b, a),
            _ => (Opcode::Bgtsr, b, a),
        };
        self.emit(ins(branch).typed(irdt).r1(first).r2(second).label(target).finish());
    }

    fn lower_repeat(&mut self, count: Option<NodeId>, body: &[NodeId]) {
        let tree = self.tree;
        let Some(count) = count else {
            let top = self.new_label("repeat");
            self.label(top.clone());
            self.lower_statements(body);
            self.emit(ins(Opcode::Jump).label(top).finish());
            return;
        };

        let top = self.new_label("repeat");
        let (irdt, reg, end) = match tree.const_int(count) {
            Some(0) => return,
            Some(times) => {
                let irdt = if times < 256 { IrDataType::Byte } else { IrDataType::Word };
                let reg = self.reg(irdt);
                self.emit(ins(Opcode::Load).typed(irdt).r1(reg).imm(times).finish());
                (irdt, reg, None)
            }
            None => {
                let (irdt, reg) = match self.lower_expr(count) {
                    ExprResult::Reg(irdt, reg) => (irdt, reg),
                    other => panic!("repeat count must be an integer, got {:?}", other),
                };
                let end = self.new_label("repeat_end");
                self.emit(ins(Opcode::Beq).typed(irdt).r1(reg).imm(0).label(end.clone()).finish());
                (irdt, reg, Some(end))
            }
        };
        self.label(top.clone());
        self.lower_statements(body);
        self.emit(ins(Opcode::Dec).typed(irdt).r1(reg).finish());
        self.emit(ins(Opcode::Bstne).label(top).finish());
        if let Some(end) = end {
            self.label(end);
        }
    }

    fn lower_for(&mut self, variable: NodeId, from: NodeId, to: NodeId, step: i32, body: &[NodeId]) {
        let tree = self.tree;
        let NodeKind::Identifier { name } = tree.kind(variable) else {
            panic!("for loop variable must be an identifier at {}", tree.position(variable));
        };
        let dt = tree.expect_dt(variable);
        let irdt = dt.ir_type();
        if irdt.is_float() || step == 0 {
            panic!("unsupported for loop over {:?} with step {}", dt, step);
        }
        let var = MemLocation::Label(name.clone(), 0);

        let start = self.lower_expr(from).reg();
        self.store_to(ExprResult::Reg(irdt, start), &var);
        let end_value = self.lower_expr(to).reg();

        let top = self.new_label("for");
        let end = self.new_label("for_end");
        let skip = if dt.is_signed() { Opcode::Bgtsr } else { Opcode::Bgtr };
        let (first, second) = if step > 0 { (start, end_value) } else { (end_value, start) };
        self.emit(ins(skip).typed(irdt).r1(first).r2(second).label(end.clone()).finish());

        self.label(top.clone());
        self.lower_statements(body);

        let current = self.load_from(irdt, &var).reg();
        let remaining = self.reg(irdt);
        let (minuend, subtrahend) = if step > 0 { (end_value, current) } else { (current, end_value) };
        self.emit(ins(Opcode::Loadr).typed(irdt).r1(remaining).r2(minuend).finish());
        self.emit(ins(Opcode::Subr).typed(irdt).r1(remaining).r2(subtrahend).finish());
        self.emit(ins(Opcode::Blt).typed(irdt).r1(remaining).imm(step.abs()).label(end.clone()).finish());
        let advance = if step > 0 { Opcode::Add } else { Opcode::Sub };
        self.emit(ins(advance).typed(irdt).r1(current).imm(step.abs()).finish());
        self.store_to(ExprResult::Reg(irdt, current), &var);
        self.emit(ins(Opcode::Jump).label(top).finish());
        self.label(end);
    }
}
