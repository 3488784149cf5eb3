//! file: core/src/ir/lower/builtins.rs
//! description: instruction templates for the builtin functions.
//!
//! Each builtin expands inline. Builtins that the VM implements natively
//! (string compare, clamping, far calls) are lowered to a `syscall` whose
//! arguments travel over the value stack.

use crate::ast::{NodeId, NodeKind};
use crate::ir::instruction::ins;
use crate::ir::lower::function_builder::{ExprResult, FunctionBuilder};
use crate::ir::lower::lower_expr::{MemLocation, split_labels};
use crate::ir::opcode::Opcode;
use crate::ir::symbols::MemorySlab;
use crate::ir::syscall::Syscall;
use crate::types::{DataType, IrDataType};

/// Argument count per builtin.
const ARITY: &[(&str, usize)] = &[
    ("abs", 1),
    ("sgn", 1),
    ("sqrt", 1),
    ("square", 1),
    ("divmod", 4),
    ("min", 2),
    ("max", 2),
    ("clamp", 3),
    ("rol", 1),
    ("ror", 1),
    ("rol2", 1),
    ("ror2", 1),
    ("peek", 1),
    ("peekw", 1),
    ("peekf", 1),
    ("poke", 2),
    ("pokew", 2),
    ("pokef", 2),
    ("pokemon", 2),
    ("mkword", 2),
    ("lsb", 1),
    ("msb", 1),
    ("setlsb", 2),
    ("setmsb", 2),
    ("memory", 3),
    ("cmp", 2),
    ("call", 1),
    ("callfar", 3),
    ("callfar2", 6),
    ("string_compare", 2),
    ("structalloc", 1),
    ("set_carry", 0),
    ("clear_carry", 0),
    ("rsave", 0),
    ("rrestore", 0),
];

impl FunctionBuilder<'_> {
    pub(crate) fn lower_builtin(&mut self, id: NodeId, name: &str, args: &[NodeId]) -> ExprResult {
        match ARITY.iter().find(|(builtin, _)| *builtin == name) {
            Some((_, arity)) if *arity == args.len() => {}
            Some((_, arity)) => panic!("builtin '{}' takes {} arguments, got {}", name, arity, args.len()),
            None => panic!("unknown builtin function '{}'", name),
        }

        match name {
            "abs" => self.builtin_abs(args[0]),
            "sgn" => self.builtin_sgn(args[0]),
            "sqrt" => self.builtin_sqrt(args[0]),
            "square" => self.builtin_square(args[0]),
            "divmod" => self.builtin_divmod(args),
            "min" => self.builtin_min_max(id, args, true),
            "max" => self.builtin_min_max(id, args, false),
            "clamp" => self.builtin_clamp(id, args),
            "rol" => self.builtin_rotate(args[0], Opcode::Roxl, Opcode::Roxlm, true),
            "ror" => self.builtin_rotate(args[0], Opcode::Roxr, Opcode::Roxrm, false),
            "rol2" => self.builtin_rotate(args[0], Opcode::Rol, Opcode::Rolm, true),
            "ror2" => self.builtin_rotate(args[0], Opcode::Ror, Opcode::Rorm, false),
            "peek" => self.builtin_peek(args[0], IrDataType::Byte),
            "peekw" => self.builtin_peek(args[0], IrDataType::Word),
            "peekf" => self.builtin_peek(args[0], IrDataType::Float),
            "poke" => self.builtin_poke(args, IrDataType::Byte),
            "pokew" => self.builtin_poke(args, IrDataType::Word),
            "pokef" => self.builtin_poke(args, IrDataType::Float),
            "pokemon" => {
                let old = self.builtin_peek(args[0], IrDataType::Byte);
                self.builtin_poke(args, IrDataType::Byte);
                old
            }
            "mkword" => self.builtin_mkword(args),
            "lsb" => self.builtin_lsb_msb(args[0], false),
            "msb" => self.builtin_lsb_msb(args[0], true),
            "setlsb" => self.builtin_set_lsb_msb(args, false),
            "setmsb" => self.builtin_set_lsb_msb(args, true),
            "memory" => self.builtin_memory(args),
            "cmp" => {
                let a = self.lower_expr(args[0]);
                let b = self.lower_expr(args[1]);
                let irdt = a.ir_type().unwrap_or(IrDataType::Byte);
                self.emit(ins(Opcode::Cmp).typed(irdt).r1(a.reg()).r2(b.reg()).finish());
                ExprResult::Void
            }
            "call" => {
                let address = self.lower_expr(args[0]).reg();
                self.emit(ins(Opcode::Calli).r1(address).finish());
                match self.tree.dt(id) {
                    Some(_) => ExprResult::Reg(IrDataType::Word, address),
                    None => ExprResult::Void,
                }
            }
            "callfar" => self.syscall_with(Syscall::CallFar, args, Some(IrDataType::Word)),
            "callfar2" => self.syscall_with(Syscall::CallFar2, args, Some(IrDataType::Word)),
            "string_compare" => self.syscall_with(Syscall::CompareStrings, args, Some(IrDataType::Byte)),
            "structalloc" => match self.tree.kind(args[0]) {
                NodeKind::AddressOf { name } | NodeKind::Identifier { name } => self.load_address(name),
                other => panic!("structalloc needs a named instance, got {}", other),
            },
            "set_carry" => {
                self.emit(ins(Opcode::Sec).finish());
                ExprResult::Void
            }
            "clear_carry" => {
                self.emit(ins(Opcode::Clc).finish());
                ExprResult::Void
            }
            // the VM has no registers to preserve across calls
            _ => ExprResult::Void,
        }
    }

    /// Push the arguments in order, call the VM and pop the result, if any.
    fn syscall_with(&mut self, call: Syscall, args: &[NodeId], result: Option<IrDataType>) -> ExprResult {
        let values: Vec<ExprResult> = args.iter().map(|arg| self.lower_expr(*arg)).collect();
        for value in values {
            self.push_value(value);
        }
        self.emit(ins(Opcode::Syscall).imm(call.number()).finish());
        match result {
            Some(dt) => self.pop_value(dt),
            None => ExprResult::Void,
        }
    }

    fn builtin_abs(&mut self, arg: NodeId) -> ExprResult {
        let dt = self.tree.expect_dt(arg);
        match dt {
            DataType::Float => {
                let source = self.lower_expr(arg).fp_reg();
                let result = self.fp_reg();
                self.emit(ins(Opcode::Fabs).typed(IrDataType::Float).fr1(result).fr2(source).finish());
                ExprResult::FpReg(result)
            }
            DataType::Byte | DataType::Word => {
                let irdt = dt.ir_type();
                let value = self.lower_expr(arg);
                let reg = value.reg();
                let sign = self.reg(irdt);
                self.emit(ins(Opcode::Loadr).typed(irdt).r1(sign).r2(reg).finish());
                let after = self.new_label("abs");
                self.emit(ins(Opcode::Bstpos).label(after.clone()).finish());
                self.emit(ins(Opcode::Neg).typed(irdt).r1(reg).finish());
                self.label(after);
                value
            }
            _ => self.lower_expr(arg),
        }
    }

    fn builtin_sgn(&mut self, arg: NodeId) -> ExprResult {
        let result = self.reg(IrDataType::Byte);
        match self.lower_expr(arg) {
            ExprResult::FpReg(fr) => {
                self.emit(ins(Opcode::Sgn).typed(IrDataType::Float).r1(result).fr1(fr).finish());
            }
            ExprResult::Reg(irdt, reg) => {
                self.emit(ins(Opcode::Sgn).typed(irdt).r1(result).r2(reg).finish());
            }
            ExprResult::Void => panic!("sgn of a value-less expression"),
        }
        ExprResult::Reg(IrDataType::Byte, result)
    }

    fn builtin_sqrt(&mut self, arg: NodeId) -> ExprResult {
        match self.lower_expr(arg) {
            ExprResult::FpReg(fr) => {
                let result = self.fp_reg();
                self.emit(ins(Opcode::Sqrt).typed(IrDataType::Float).fr1(result).fr2(fr).finish());
                ExprResult::FpReg(result)
            }
            ExprResult::Reg(irdt, reg) => {
                let result = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Sqrt).typed(irdt).r1(result).r2(reg).finish());
                ExprResult::Reg(IrDataType::Byte, result)
            }
            ExprResult::Void => panic!("sqrt of a value-less expression"),
        }
    }

    fn builtin_square(&mut self, arg: NodeId) -> ExprResult {
        match self.lower_expr(arg) {
            ExprResult::FpReg(fr) => {
                let result = self.fp_reg();
                self.emit(ins(Opcode::Square).typed(IrDataType::Float).fr1(result).fr2(fr).finish());
                ExprResult::FpReg(result)
            }
            ExprResult::Reg(irdt, reg) => {
                let result = self.reg(irdt);
                self.emit(ins(Opcode::Square).typed(irdt).r1(result).r2(reg).finish());
                ExprResult::Reg(irdt, result)
            }
            ExprResult::Void => panic!("square of a value-less expression"),
        }
    }

    /// The VM pushes the quotient, then the remainder.
    fn builtin_divmod(&mut self, args: &[NodeId]) -> ExprResult {
        let tree = self.tree;
        let irdt = tree.expect_dt(args[0]).ir_type();
        let number = self.lower_expr(args[0]).reg();
        let remainder = match tree.const_int(args[1]) {
            Some(divisor) => {
                self.emit(ins(Opcode::Divmod).typed(irdt).r1(number).imm(divisor).finish());
                self.reg(irdt)
            }
            None => {
                let divisor = self.lower_expr(args[1]).reg();
                self.emit(ins(Opcode::Divmodr).typed(irdt).r1(number).r2(divisor).finish());
                divisor
            }
        };
        self.emit(ins(Opcode::Pop).typed(irdt).r1(remainder).finish());
        self.emit(ins(Opcode::Pop).typed(irdt).r1(number).finish());
        self.assign_result(args[2], ExprResult::Reg(irdt, number));
        self.assign_result(args[3], ExprResult::Reg(irdt, remainder));
        ExprResult::Void
    }

    fn builtin_min_max(&mut self, id: NodeId, args: &[NodeId], is_min: bool) -> ExprResult {
        let dt = self.tree.expect_dt(id);
        let left = self.lower_expr(args[0]);
        let right = self.lower_expr(args[1]);
        let after = self.new_label(if is_min { "min" } else { "max" });
        match (left, right) {
            (ExprResult::Reg(irdt, l), ExprResult::Reg(_, r)) => {
                let branch = if dt.is_signed() { Opcode::Bgtsr } else { Opcode::Bgtr };
                let (first, second) = if is_min { (r, l) } else { (l, r) };
                self.emit(ins(branch).typed(irdt).r1(first).r2(second).label(after.clone()).finish());
                self.emit(ins(Opcode::Loadr).typed(irdt).r1(l).r2(r).finish());
            }
            (ExprResult::FpReg(l), ExprResult::FpReg(r)) => {
                let cmp = self.reg(IrDataType::Byte);
                self.emit(ins(Opcode::Fcomp).typed(IrDataType::Float).r1(cmp).fr1(l).fr2(r).finish());
                let branch = if is_min { Opcode::Bles } else { Opcode::Bges };
                self.emit(ins(branch).typed(IrDataType::Byte).r1(cmp).imm(0).label(after.clone()).finish());
                self.emit(ins(Opcode::Loadr).typed(IrDataType::Float).fr1(l).fr2(r).finish());
            }
            (a, b) => panic!("min/max operands {:?} and {:?} differ", a, b),
        }
        self.label(after);
        left
    }

    fn builtin_clamp(&mut self, id: NodeId, args: &[NodeId]) -> ExprResult {
        let dt = self.tree.expect_dt(id);
        let call = match dt {
            DataType::Bool | DataType::UByte => Syscall::ClampUByte,
            DataType::Byte => Syscall::ClampByte,
            DataType::UWord => Syscall::ClampUWord,
            DataType::Word => Syscall::ClampWord,
            DataType::Float => Syscall::ClampFloat,
            other => panic!("cannot clamp a {:?}", other),
        };
        self.syscall_with(call, args, Some(dt.ir_type()))
    }

    /// Rotate in place. Memory forms are used whenever the operand has a fixed location.
    fn builtin_rotate(&mut self, arg: NodeId, reg_op: Opcode, mem_op: Opcode, left: bool) -> ExprResult {
        let tree = self.tree;
        let irdt = tree.expect_dt(arg).ir_type();

        if let NodeKind::ArrayIndexer {
            name,
            split: true,
            index,
        } = tree.kind(arg)
        {
            if let Some(i) = tree.const_int(*index) {
                let (lsb, msb) = split_labels(name);
                let order = if left { [lsb, msb] } else { [msb, lsb] };
                for label in order {
                    self.emit(ins(mem_op).typed(IrDataType::Byte).label_at(label, i).finish());
                }
                return ExprResult::Void;
            }
        }
        if let Some(location) = self.const_location(arg) {
            self.emit(location.apply(ins(mem_op).typed(irdt)).finish());
            return ExprResult::Void;
        }

        let save_carry = reg_op.depends_on_carry() && !tree.is_simple(arg);
        if save_carry {
            self.emit(ins(Opcode::Pushst).finish());
        }
        let value = self.lower_expr(arg);
        if save_carry {
            self.emit(ins(Opcode::Popst).finish());
        }
        self.emit(ins(reg_op).typed(irdt).r1(value.reg()).finish());
        if save_carry {
            self.emit(ins(Opcode::Pushst).finish());
        }
        self.assign_result(arg, value);
        if save_carry {
            self.emit(ins(Opcode::Popst).finish());
        }
        ExprResult::Void
    }

    fn builtin_peek(&mut self, address: NodeId, dt: IrDataType) -> ExprResult {
        if let Some(address) = self.tree.const_int(address) {
            return self.load_from(dt, &MemLocation::Address(address as u32));
        }
        let address = self.lower_expr(address).reg();
        if dt.is_float() {
            let fr = self.fp_reg();
            self.emit(ins(Opcode::Loadi).typed(dt).r1(address).fr1(fr).finish());
            ExprResult::FpReg(fr)
        } else {
            let result = self.reg(dt);
            self.emit(ins(Opcode::Loadi).typed(dt).r1(result).r2(address).finish());
            ExprResult::Reg(dt, result)
        }
    }

    fn builtin_poke(&mut self, args: &[NodeId], dt: IrDataType) -> ExprResult {
        let tree = self.tree;
        let zero = tree.const_value(args[1]) == Some(0.0);
        match tree.const_int(args[0]) {
            Some(address) => {
                let location = MemLocation::Address(address as u32);
                if zero {
                    self.emit(location.apply(ins(Opcode::Storezm).typed(dt)).finish());
                } else {
                    let value = self.lower_expr(args[1]);
                    self.store_to(value, &location);
                }
            }
            None => {
                let address = self.lower_expr(args[0]).reg();
                if zero {
                    self.emit(ins(Opcode::Storezi).typed(dt).r1(address).finish());
                } else {
                    let instruction = match self.lower_expr(args[1]) {
                        ExprResult::Reg(irdt, reg) => ins(Opcode::Storei).typed(irdt).r1(reg).r2(address),
                        ExprResult::FpReg(fr) => ins(Opcode::Storei).typed(IrDataType::Float).r1(address).fr1(fr),
                        ExprResult::Void => panic!("poke of a value-less expression"),
                    };
                    self.emit(instruction.finish());
                }
            }
        }
        ExprResult::Void
    }

    fn builtin_mkword(&mut self, args: &[NodeId]) -> ExprResult {
        let result = self.reg(IrDataType::Word);
        if self.tree.const_int(args[0]) == Some(0) {
            let lsb = self.lower_expr(args[1]).reg();
            self.emit(ins(Opcode::Ext).typed(IrDataType::Byte).r1(result).r2(lsb).finish());
        } else {
            let msb = self.lower_expr(args[0]).reg();
            let lsb = self.lower_expr(args[1]).reg();
            self.emit(ins(Opcode::Concat).typed(IrDataType::Byte).r1(result).r2(msb).r3(lsb).finish());
        }
        ExprResult::Reg(IrDataType::Word, result)
    }

    fn builtin_lsb_msb(&mut self, arg: NodeId, msb: bool) -> ExprResult {
        let value = self.lower_expr(arg);
        let result = self.reg(IrDataType::Byte);
        match (value, msb) {
            (ExprResult::Reg(IrDataType::Byte, _), false) => return value,
            (ExprResult::Reg(IrDataType::Byte, _), true) => {
                self.emit(ins(Opcode::Load).typed(IrDataType::Byte).r1(result).imm(0).finish());
            }
            (ExprResult::Reg(_, reg), _) => {
                let op = if msb { Opcode::Msig } else { Opcode::Lsig };
                self.emit(ins(op).typed(IrDataType::Byte).r1(result).r2(reg).finish());
            }
            (other, _) => panic!("lsb/msb of {:?}", other),
        }
        ExprResult::Reg(IrDataType::Byte, result)
    }

    /// Overwrite one byte of a word variable or word array element.
    fn builtin_set_lsb_msb(&mut self, args: &[NodeId], msb: bool) -> ExprResult {
        let tree = self.tree;
        let target = args[0];
        let zero = tree.const_value(args[1]) == Some(0.0);
        let value = if zero { None } else { Some(self.lower_expr(args[1]).reg()) };

        match tree.kind(target) {
            NodeKind::Identifier { name } => {
                let pointer = self.reg(IrDataType::Word);
                self.emit(ins(Opcode::Load).typed(IrDataType::Word).r1(pointer).label(name.clone()).finish());
                if msb {
                    self.emit(ins(Opcode::Inc).typed(IrDataType::Word).r1(pointer).finish());
                }
                let instruction = match value {
                    Some(value) => ins(Opcode::Storei).typed(IrDataType::Byte).r1(value).r2(pointer),
                    None => ins(Opcode::Storezi).typed(IrDataType::Byte).r1(pointer),
                };
                self.emit(instruction.finish());
            }
            NodeKind::ArrayIndexer { name, split, index } => {
                let (offset, label) = if *split {
                    let (lsb, msb_label) = split_labels(name);
                    (self.scaled_index(*index, 1), if msb { msb_label } else { lsb })
                } else {
                    let offset = self.scaled_index(*index, 2);
                    if msb {
                        self.emit(ins(Opcode::Inc).typed(IrDataType::Word).r1(offset).finish());
                    }
                    (offset, name.clone())
                };
                let instruction = match value {
                    Some(value) => ins(Opcode::Storex).typed(IrDataType::Byte).r1(value).r2(offset),
                    None => ins(Opcode::Storezx).typed(IrDataType::Byte).r1(offset),
                };
                self.emit(instruction.label(label).finish());
            }
            other => panic!("setlsb/setmsb cannot target {} at {}", other, tree.position(target)),
        }
        ExprResult::Void
    }

    fn builtin_memory(&mut self, args: &[NodeId]) -> ExprResult {
        let tree = self.tree;
        let NodeKind::StringLiteral { value: name, .. } = tree.kind(args[0]) else {
            panic!("memory() needs a literal slab name at {}", tree.position(args[0]));
        };
        let Some(size) = tree.const_int(args[1]) else {
            panic!("memory() needs a constant size at {}", tree.position(args[1]));
        };
        let align = tree.const_int(args[2]).unwrap_or(0);
        let label = format!("slabs.memoryslab_{}", name);
        if self.ctx.symbols.slab(&label).is_none() {
            let slab = MemorySlab {
                name: label.clone(),
                size: size as u32,
                align: align as u32,
            };
            if let Err(e) = self.ctx.symbols.add_slab(slab) {
                panic!("{}", e);
            }
        }
        let reg = self.reg(IrDataType::Word);
        self.emit(ins(Opcode::Load).typed(IrDataType::Word).r1(reg).label(label).finish());
        ExprResult::Reg(IrDataType::Word, reg)
    }
}
