//! file: core/src/ir/lower/lower_expr.rs
//! description: expression lowering. Every expression lands in a fresh register.

use crate::ast::{BinaryOperator, NodeId, NodeKind, PrefixOperator, RpnItem, rpn_max_depth};
use crate::ir::instruction::{InstructionBuilder, ins};
use crate::ir::lower::function_builder::{ExprResult, FunctionBuilder};
use crate::ir::lower::lowering_context::CallTarget;
use crate::ir::opcode::Opcode;
use crate::ir::symbols::{ArrayElement, StaticVariable, VariableInit};
use crate::types::{DataType, IrDataType, mem_size};

/// A memory operand known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemLocation {
    Label(String, i32),
    Address(u32),
}

impl MemLocation {
    pub(crate) fn apply(&self, builder: InstructionBuilder) -> InstructionBuilder {
        match self {
            MemLocation::Label(label, offset) => builder.label_at(label.clone(), *offset),
            MemLocation::Address(address) => builder.addr(*address),
        }
    }
}

/// Labels of the low and high byte halves of a split word array.
pub(crate) fn split_labels(name: &str) -> (String, String) {
    (format!("{}_lsb", name), format!("{}_msb", name))
}

fn set_opcode(op: BinaryOperator, signed: bool) -> Opcode {
    match (op, signed) {
        (BinaryOperator::Eq, _) => Opcode::Seq,
        (BinaryOperator::Ne, _) => Opcode::Sne,
        (BinaryOperator::Lt, false) => Opcode::Slt,
        (BinaryOperator::Lt, true) => Opcode::Slts,
        (BinaryOperator::Le, false) => Opcode::Sle,
        (BinaryOperator::Le, true) => Opcode::Sles,
        (BinaryOperator::Gt, false) => Opcode::Sgt,
        (BinaryOperator::Gt, true) => Opcode::Sgts,
        (BinaryOperator::Ge, false) => Opcode::Sge,
        (BinaryOperator::Ge, true) => Opcode::Sges,
        (other, _) => panic!("{:?} is not a comparison", other),
    }
}

impl FunctionBuilder<'_> {
    pub fn lower_expr(&mut self, id: NodeId) -> ExprResult {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::Number { value } => self.load_constant(tree.expect_dt(id), *value),
            NodeKind::StringLiteral { value, label } => self.lower_string(value, label),
            NodeKind::Identifier { name } => {
                let dt = tree.expect_dt(id);
                if dt.is_pass_by_reference() {
                    self.load_address(name)
                } else {
                    self.load_from(dt.ir_type(), &MemLocation::Label(name.clone(), 0))
                }
            }
            NodeKind::AddressOf { name } => self.load_address(name),
            NodeKind::MemoryByte { address } => match tree.const_int(*address) {
                Some(address) => self.load_from(IrDataType::Byte, &MemLocation::Address(address as u32)),
                None => {
                    let address = self.lower_expr(*address).reg();
                    let result = self.reg(IrDataType::Byte);
                    self.emit(ins(Opcode::Loadi).typed(IrDataType::Byte).r1(result).r2(address).finish());
                    ExprResult::Reg(IrDataType::Byte, result)
                }
            },
            NodeKind::ArrayIndexer { name, split, index } => {
                self.lower_array_read(tree.expect_dt(id), name, *split, *index)
            }
            NodeKind::Prefix { op, operand } => self.lower_prefix(tree.expect_dt(id), *op, *operand),
            NodeKind::Typecast { operand } => {
                self.lower_typecast(tree.expect_dt(*operand), tree.expect_dt(id), *operand)
            }
            NodeKind::Binary { left, op, right } => {
                let operand_dt = tree.expect_dt(*left);
                match op {
                    BinaryOperator::And | BinaryOperator::Or => self.lower_short_circuit(*left, *op, *right),
                    _ if op.is_comparison() => {
                        let a = self.lower_expr(*left);
                        let b = self.lower_expr(*right);
                        self.compare_values(operand_dt, *op, a, b)
                    }
                    _ => {
                        let a = self.lower_expr(*left);
                        self.lower_binary(operand_dt, a, *op, *right)
                    }
                }
            }
            NodeKind::Rpn { items } => self.lower_rpn(tree.expect_dt(id), items),
            NodeKind::BuiltinCall { name, args } => self.lower_builtin(id, name, args),
            NodeKind::FunctionCall { target, args } => self.lower_function_call(id, target, args),
            other => panic!("{} is not an expression, at {}", other, tree.position(id)),
        }
    }

    pub(crate) fn load_constant(&mut self, dt: DataType, value: f64) -> ExprResult {
        if dt == DataType::Float {
            let fr = self.fp_reg();
            self.emit(ins(Opcode::Load).typed(IrDataType::Float).fr1(fr).fimm(value).finish());
            ExprResult::FpReg(fr)
        } else {
            let irdt = dt.ir_type();
            let reg = self.reg(irdt);
            self.emit(ins(Opcode::Load).typed(irdt).r1(reg).imm(value as i32).finish());
            ExprResult::Reg(irdt, reg)
        }
    }

    /// Address of a symbol; split arrays start at their low byte half.
    pub(crate) fn load_address(&mut self, name: &str) -> ExprResult {
        let label = match self.ctx.symbols.variable(name) {
            Some(var) if var.dt.is_split_array() => split_labels(name).0,
            _ => name.to_string(),
        };
        let reg = self.reg(IrDataType::Word);
        self.emit(ins(Opcode::Load).typed(IrDataType::Word).r1(reg).label(label).finish());
        ExprResult::Reg(IrDataType::Word, reg)
    }

    pub(crate) fn load_from(&mut self, dt: IrDataType, location: &MemLocation) -> ExprResult {
        if dt.is_float() {
            let fr = self.fp_reg();
            self.emit(location.apply(ins(Opcode::Loadm).typed(dt).fr1(fr)).finish());
            ExprResult::FpReg(fr)
        } else {
            let reg = self.reg(dt);
            self.emit(location.apply(ins(Opcode::Loadm).typed(dt).r1(reg)).finish());
            ExprResult::Reg(dt, reg)
        }
    }

    pub(crate) fn store_to(&mut self, value: ExprResult, location: &MemLocation) {
        let builder = match value {
            ExprResult::Reg(dt, reg) => ins(Opcode::Storem).typed(dt).r1(reg),
            ExprResult::FpReg(fr) => ins(Opcode::Storem).typed(IrDataType::Float).fr1(fr),
            ExprResult::Void => panic!("cannot store a value-less expression"),
        };
        self.emit(location.apply(builder).finish());
    }

    /// Memory operand of an assignable expression, when it needs no runtime address computation.
    pub(crate) fn const_location(&self, target: NodeId) -> Option<MemLocation> {
        let tree = self.tree;
        match tree.kind(target) {
            NodeKind::Identifier { name } => Some(MemLocation::Label(name.clone(), 0)),
            NodeKind::MemoryByte { address } => tree.const_int(*address).map(|a| MemLocation::Address(a as u32)),
            NodeKind::ArrayIndexer {
                name,
                split: false,
                index,
            } => {
                let element = mem_size(tree.expect_dt(target), None) as i32;
                tree.const_int(*index).map(|i| MemLocation::Label(name.clone(), i * element))
            }
            _ => None,
        }
    }

    fn lower_string(&mut self, value: &str, label: &str) -> ExprResult {
        if !self.ctx.symbols.contains(label) {
            let mut bytes: Vec<ArrayElement> = value.bytes().map(|b| ArrayElement::Number(b as f64)).collect();
            bytes.push(ArrayElement::Number(0.0));
            let var = StaticVariable::new(label, DataType::ArrayUB)
                .with_length(bytes.len() as u32)
                .with_init(VariableInit::Array(bytes));
            if let Err(e) = self.ctx.symbols.add_variable(var) {
                panic!("{}", e);
            }
        }
        self.load_address(label)
    }

    /// Index register scaled to a byte offset for elements of `element_size` bytes.
    pub(crate) fn scaled_index(&mut self, index: NodeId, element_size: u32) -> u32 {
        let (dt, mut reg) = match self.lower_expr(index) {
            ExprResult::Reg(dt, reg) => (dt, reg),
            other => panic!("array index must be an integer, got {:?}", other),
        };
        if element_size == 1 {
            return reg;
        }
        if dt == IrDataType::Byte {
            let word = self.reg(IrDataType::Word);
            self.emit(ins(Opcode::Ext).typed(IrDataType::Byte).r1(word).r2(reg).finish());
            reg = word;
        }
        if element_size == 2 {
            self.emit(ins(Opcode::Lsl).typed(IrDataType::Word).r1(reg).finish());
        } else {
            self.emit(ins(Opcode::Mul).typed(IrDataType::Word).r1(reg).imm(element_size as i32).finish());
        }
        reg
    }

    fn lower_array_read(&mut self, element: DataType, name: &str, split: bool, index: NodeId) -> ExprResult {
        let tree = self.tree;
        if split {
            let (lsb, msb) = split_labels(name);
            let lo = self.reg(IrDataType::Byte);
            let hi = self.reg(IrDataType::Byte);
            match tree.const_int(index) {
                Some(i) => {
                    self.emit(ins(Opcode::Loadm).typed(IrDataType::Byte).r1(lo).label_at(lsb, i).finish());
                    self.emit(ins(Opcode::Loadm).typed(IrDataType::Byte).r1(hi).label_at(msb, i).finish());
                }
                None => {
                    let idx = self.scaled_index(index, 1);
                    self.emit(ins(Opcode::Loadx).typed(IrDataType::Byte).r1(lo).r2(idx).label(lsb).finish());
                    self.emit(ins(Opcode::Loadx).typed(IrDataType::Byte).r1(hi).r2(idx).label(msb).finish());
                }
            }
            let word = self.reg(IrDataType::Word);
            self.emit(ins(Opcode::Concat).typed(IrDataType::Byte).r1(word).r2(hi).r3(lo).finish());
            return ExprResult::Reg(IrDataType::Word, word);
        }

        let size = mem_size(element, None);
        let irdt = element.ir_type();
        if let Some(i) = tree.const_int(index) {
            return self.load_from(irdt, &MemLocation::Label(name.to_string(), i * size as i32));
        }
        let idx = self.scaled_index(index, size);
        if irdt.is_float() {
            let fr = self.fp_reg();
            self.emit(ins(Opcode::Loadx).typed(irdt).r1(idx).fr1(fr).label(name).finish());
            ExprResult::FpReg(fr)
        } else {
            let reg = self.reg(irdt);
            self.emit(ins(Opcode::Loadx).typed(irdt).r1(reg).r2(idx).label(name).finish());
            ExprResult::Reg(irdt, reg)
        }
    }

    fn lower_prefix(&mut self, dt: DataType, op: PrefixOperator, operand: NodeId) -> ExprResult {
        let value = self.lower_expr(operand);
        match (op, value) {
            (PrefixOperator::Plus, _) => {}
            (PrefixOperator::Minus, ExprResult::FpReg(fr)) => {
                self.emit(ins(Opcode::Neg).typed(IrDataType::Float).fr1(fr).finish());
            }
            (PrefixOperator::Minus, ExprResult::Reg(irdt, reg)) => {
                self.emit(ins(Opcode::Neg).typed(irdt).r1(reg).finish());
            }
            (PrefixOperator::Invert, ExprResult::Reg(irdt, reg)) => {
                self.emit(ins(Opcode::Inv).typed(irdt).r1(reg).finish());
            }
            (PrefixOperator::Not, ExprResult::Reg(irdt, reg)) => {
                self.emit(ins(Opcode::Xor).typed(irdt).r1(reg).imm(1).finish());
            }
            _ => panic!("prefix {:?} cannot be applied to {:?}", op, dt),
        }
        value
    }

    fn lower_typecast(&mut self, from: DataType, to: DataType, operand: NodeId) -> ExprResult {
        let value = self.lower_expr(operand);
        if to == DataType::Bool && from != DataType::Bool {
            return self.to_bool(value);
        }
        match (value, to.ir_type()) {
            (ExprResult::Reg(IrDataType::Byte, reg), IrDataType::Word) => {
                let word = self.reg(IrDataType::Word);
                let op = if from.is_signed() { Opcode::Exts } else { Opcode::Ext };
                self.emit(ins(op).typed(IrDataType::Byte).r1(word).r2(reg).finish());
                ExprResult::Reg(IrDataType::Word, word)
            }
            (ExprResult::Reg(IrDataType::Word, reg), IrDataType::Byte) => {
                let byte = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Lsig).typed(IrDataType::Byte).r1(byte).r2(reg).finish());
                ExprResult::Reg(IrDataType::Byte, byte)
            }
            (ExprResult::Reg(_, reg), IrDataType::Float) => {
                let op = match from {
                    DataType::Byte => Opcode::Ffromsb,
                    DataType::UWord => Opcode::Ffromuw,
                    DataType::Word => Opcode::Ffromsw,
                    _ => Opcode::Ffromub,
                };
                let fr = self.fp_reg();
                self.emit(ins(op).typed(IrDataType::Float).r1(reg).fr1(fr).finish());
                ExprResult::FpReg(fr)
            }
            (ExprResult::FpReg(fr), IrDataType::Byte | IrDataType::Word) => {
                let op = match to {
                    DataType::Byte => Opcode::Ftosb,
                    DataType::UWord => Opcode::Ftouw,
                    DataType::Word => Opcode::Ftosw,
                    _ => Opcode::Ftoub,
                };
                let irdt = to.ir_type();
                let reg = self.reg(irdt);
                self.emit(ins(op).typed(IrDataType::Float).r1(reg).fr1(fr).finish());
                ExprResult::Reg(irdt, reg)
            }
            (ExprResult::Reg(_, reg), irdt) => ExprResult::Reg(irdt, reg),
            (same, _) => same,
        }
    }

    /// Nonzero becomes 1, zero stays 0.
    fn to_bool(&mut self, value: ExprResult) -> ExprResult {
        let result = self.reg(IrDataType::Byte);
        match value {
            ExprResult::Reg(irdt, reg) => {
                let zero = self.reg(irdt);
                self.emit(ins(Opcode::Load).typed(irdt).r1(zero).imm(0).finish());
                self.emit(ins(Opcode::Sne).typed(irdt).r1(result).r2(reg).r3(zero).finish());
            }
            ExprResult::FpReg(fr) => {
                let fzero = self.fp_reg();
                self.emit(ins(Opcode::Load).typed(IrDataType::Float).fr1(fzero).fimm(0.0).finish());
                let cmp = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Fcomp).typed(IrDataType::Float).r1(cmp).fr1(fr).fr2(fzero).finish());
                let zero = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Load).typed(IrDataType::Byte).r1(zero).imm(0).finish());
                self.emit(ins(Opcode::Sne).typed(IrDataType::Byte).r1(result).r2(cmp).r3(zero).finish());
            }
            ExprResult::Void => panic!("cannot convert a value-less expression to bool"),
        }
        ExprResult::Reg(IrDataType::Byte, result)
    }

    /// Boolean result of a comparison. Floats compare through `fcomp` and a signed set against zero.
    pub(crate) fn compare_values(
        &mut self,
        operand_dt: DataType,
        op: BinaryOperator,
        a: ExprResult,
        b: ExprResult,
    ) -> ExprResult {
        let result = self.reg(IrDataType::Byte);
        match (a, b) {
            (ExprResult::FpReg(fa), ExprResult::FpReg(fb)) => {
                let cmp = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Fcomp).typed(IrDataType::Float).r1(cmp).fr1(fa).fr2(fb).finish());
                let zero = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Load).typed(IrDataType::Byte).r1(zero).imm(0).finish());
                let set = set_opcode(op, true);
                self.emit(ins(set).typed(IrDataType::Byte).r1(result).r2(cmp).r3(zero).finish());
            }
            (ExprResult::Reg(irdt, ra), ExprResult::Reg(_, rb)) => {
                let set = set_opcode(op, operand_dt.is_signed());
                self.emit(ins(set).typed(irdt).r1(result).r2(ra).r3(rb).finish());
            }
            (a, b) => panic!("cannot compare {:?} with {:?}", a, b),
        }
        ExprResult::Reg(IrDataType::Byte, result)
    }

    fn lower_short_circuit(&mut self, left: NodeId, op: BinaryOperator, right: NodeId) -> ExprResult {
        let reg = self.lower_expr(left).reg();
        let (hint, branch) = match op {
            BinaryOperator::And => ("and", Opcode::Beq),
            _ => ("or", Opcode::Bne),
        };
        let end = self.new_label(hint);
        self.emit(ins(branch).typed(IrDataType::Byte).r1(reg).imm(0).label(end.clone()).finish());
        let other = self.lower_expr(right).reg();
        self.emit(ins(Opcode::Loadr).typed(IrDataType::Byte).r1(reg).r2(other).finish());
        self.label(end);
        ExprResult::Reg(IrDataType::Byte, reg)
    }

    /// `left op right` where the left operand already sits in a register it may overwrite.
    pub(crate) fn lower_binary(&mut self, dt: DataType, left: ExprResult, op: BinaryOperator, right: NodeId) -> ExprResult {
        if let Some(value) = self.tree.const_value(right) {
            if !op.is_comparison() {
                if let Some(result) = self.binary_immediate(dt, left, op, value) {
                    return result;
                }
            }
        }
        let right = self.lower_expr(right);
        self.binary_registers(dt, left, op, right)
    }

    fn binary_immediate(&mut self, dt: DataType, left: ExprResult, op: BinaryOperator, value: f64) -> Option<ExprResult> {
        match left {
            ExprResult::FpReg(fr) => {
                let opcode = match op {
                    BinaryOperator::Add => Opcode::Add,
                    BinaryOperator::Sub => Opcode::Sub,
                    BinaryOperator::Mul => Opcode::Mul,
                    BinaryOperator::Div => Opcode::Div,
                    _ => return None,
                };
                self.emit(ins(opcode).typed(IrDataType::Float).fr1(fr).fimm(value).finish());
            }
            ExprResult::Reg(irdt, reg) => {
                let value = value as i32;
                let signed = dt.is_signed();
                let opcode = match op {
                    BinaryOperator::Add => Opcode::Add,
                    BinaryOperator::Sub => Opcode::Sub,
                    BinaryOperator::Mul => Opcode::Mul,
                    BinaryOperator::Div if signed => Opcode::Divs,
                    BinaryOperator::Div => Opcode::Div,
                    BinaryOperator::Mod => Opcode::Mod,
                    BinaryOperator::BitAnd => Opcode::And,
                    BinaryOperator::BitOr => Opcode::Or,
                    BinaryOperator::BitXor | BinaryOperator::Xor => Opcode::Xor,
                    BinaryOperator::Shl | BinaryOperator::Shr if value == 1 => {
                        let shift = match (op, signed) {
                            (BinaryOperator::Shl, _) => Opcode::Lsl,
                            (_, true) => Opcode::Asr,
                            (_, false) => Opcode::Lsr,
                        };
                        self.emit(ins(shift).typed(irdt).r1(reg).finish());
                        return Some(left);
                    }
                    _ => return None,
                };
                self.emit(ins(opcode).typed(irdt).r1(reg).imm(value).finish());
            }
            ExprResult::Void => panic!("binary operand without a value"),
        }
        Some(left)
    }

    /// `left op right` with both operands in registers. The result replaces the left register.
    pub(crate) fn binary_registers(
        &mut self,
        dt: DataType,
        left: ExprResult,
        op: BinaryOperator,
        right: ExprResult,
    ) -> ExprResult {
        if op.is_comparison() {
            return self.compare_values(dt, op, left, right);
        }
        match (left, right) {
            (ExprResult::FpReg(fa), ExprResult::FpReg(fb)) => {
                let opcode = match op {
                    BinaryOperator::Add => Opcode::Addr,
                    BinaryOperator::Sub => Opcode::Subr,
                    BinaryOperator::Mul => Opcode::Mulr,
                    BinaryOperator::Div => Opcode::Divr,
                    other => panic!("float operator {:?} has no lowering", other),
                };
                self.emit(ins(opcode).typed(IrDataType::Float).fr1(fa).fr2(fb).finish());
            }
            (ExprResult::Reg(irdt, ra), ExprResult::Reg(_, rb)) => {
                let signed = dt.is_signed();
                let opcode = match op {
                    BinaryOperator::Add => Opcode::Addr,
                    BinaryOperator::Sub => Opcode::Subr,
                    BinaryOperator::Mul => Opcode::Mulr,
                    BinaryOperator::Div if signed => Opcode::Divsr,
                    BinaryOperator::Div => Opcode::Divr,
                    BinaryOperator::Mod => Opcode::Modr,
                    BinaryOperator::BitAnd | BinaryOperator::And => Opcode::Andr,
                    BinaryOperator::BitOr | BinaryOperator::Or => Opcode::Orr,
                    BinaryOperator::BitXor | BinaryOperator::Xor => Opcode::Xorr,
                    BinaryOperator::Shl => Opcode::Lsln,
                    BinaryOperator::Shr if signed => Opcode::Asrn,
                    BinaryOperator::Shr => Opcode::Lsrn,
                    other => panic!("integer operator {:?} has no lowering", other),
                };
                self.emit(ins(opcode).typed(irdt).r1(ra).r2(rb).finish());
            }
            (a, b) => panic!("mismatched binary operands {:?} and {:?}", a, b),
        }
        left
    }

    fn lower_rpn(&mut self, dt: DataType, items: &[RpnItem]) -> ExprResult {
        rpn_max_depth(self.tree, items);
        for item in items {
            match item {
                RpnItem::Operand(id) => {
                    let value = self.lower_expr(*id);
                    self.push_value(value);
                }
                RpnItem::Operator {
                    op, operand1, operand2, ..
                } => {
                    let right = self.pop_value(operand2.ir_type());
                    let left = self.pop_value(operand1.ir_type());
                    let result = self.binary_registers(*operand1, left, *op, right);
                    self.push_value(result);
                }
            }
        }
        self.pop_value(dt.ir_type())
    }

    pub(crate) fn push_value(&mut self, value: ExprResult) {
        let instruction = match value {
            ExprResult::Reg(irdt, reg) => ins(Opcode::Push).typed(irdt).r1(reg).finish(),
            ExprResult::FpReg(fr) => ins(Opcode::Push).typed(IrDataType::Float).fr1(fr).finish(),
            ExprResult::Void => panic!("cannot push a value-less expression"),
        };
        self.emit(instruction);
    }

    pub(crate) fn pop_value(&mut self, dt: IrDataType) -> ExprResult {
        if dt.is_float() {
            let fr = self.fp_reg();
            self.emit(ins(Opcode::Pop).typed(dt).fr1(fr).finish());
            ExprResult::FpReg(fr)
        } else {
            let reg = self.reg(dt);
            self.emit(ins(Opcode::Pop).typed(dt).r1(reg).finish());
            ExprResult::Reg(dt, reg)
        }
    }

    fn lower_function_call(&mut self, id: NodeId, target: &str, args: &[NodeId]) -> ExprResult {
        let call = match self.ctx.call_targets.get(target) {
            Some(call) => call.clone(),
            None => panic!("call to unknown subroutine '{}'", target),
        };
        let result_dt = self.tree.dt(id);
        match call {
            CallTarget::Sub { params, .. } => {
                if params.len() != args.len() {
                    panic!("'{}' takes {} arguments, got {}", target, params.len(), args.len());
                }
                let values: Vec<ExprResult> = args.iter().map(|arg| self.lower_expr(*arg)).collect();
                for ((name, _), value) in params.iter().zip(values) {
                    self.store_to(value, &MemLocation::Label(name.clone(), 0));
                }
                match result_dt {
                    Some(dt) if dt.ir_type().is_float() => {
                        let fr = self.fp_reg();
                        self.emit(ins(Opcode::Call).typed(IrDataType::Float).fr1(fr).label(target).finish());
                        ExprResult::FpReg(fr)
                    }
                    Some(dt) => {
                        let irdt = dt.ir_type();
                        let reg = self.reg(irdt);
                        self.emit(ins(Opcode::Call).typed(irdt).r1(reg).label(target).finish());
                        ExprResult::Reg(irdt, reg)
                    }
                    None => {
                        self.emit(ins(Opcode::Call).label(target).finish());
                        ExprResult::Void
                    }
                }
            }
            CallTarget::AsmSub { params, returns } => {
                if params.len() != args.len() {
                    panic!("'{}' takes {} arguments, got {}", target, params.len(), args.len());
                }
                if result_dt.is_some() && returns.is_empty() {
                    panic!("'{}' returns no value", target);
                }
                for arg in args {
                    let value = self.lower_expr(*arg);
                    self.push_value(value);
                }
                self.emit(ins(Opcode::Call).label(target).finish());
                match result_dt {
                    Some(dt) => self.pop_value(dt.ir_type()),
                    None => ExprResult::Void,
                }
            }
        }
    }
}
