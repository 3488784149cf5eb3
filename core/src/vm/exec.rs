//! file: core/src/vm/exec.rs
//! description: instruction dispatch of the virtual machine.
//!
//! Integer operations work on the width named by the instruction type: the
//! register is read through a byte or word mask, and a byte write leaves the
//! high byte of the register alone. Loads and arithmetic update the zero and
//! negative flags, shifts and rotates also update carry, compares set carry
//! when the first operand is unsigned-greater-or-equal.

use std::cmp::Ordering;

use crate::error::{LowbyteErrorExt, MalformedProgramError, UnsupportedOperationError, boxed};
use crate::ir::instruction::IrInstruction;
use crate::ir::opcode::Opcode;
use crate::types::IrDataType;
use crate::vm::loader::{LoadedInstruction, Target};
use crate::vm::{CallFrame, ResultRegister, StackValue, VirtualMachine, VmResult};

pub(crate) fn mask(dt: IrDataType) -> u16 {
    match dt {
        IrDataType::Byte => 0xff,
        _ => 0xffff,
    }
}

fn sign_bit(dt: IrDataType) -> u16 {
    match dt {
        IrDataType::Byte => 0x80,
        _ => 0x8000,
    }
}

fn width(dt: IrDataType) -> u32 {
    match dt {
        IrDataType::Byte => 8,
        _ => 16,
    }
}

pub(crate) fn signed(dt: IrDataType, value: u16) -> i32 {
    match dt {
        IrDataType::Byte => value as u8 as i8 as i32,
        _ => value as i16 as i32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    DivSigned,
    Mod,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Inc,
    Dec,
    Neg,
    Inv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftOp {
    Lsl,
    Lsr,
    Asr,
    Rol,
    Ror,
    Roxl,
    Roxr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Eq,
    Ne,
    Lt,
    LtSigned,
    Gt,
    GtSigned,
    Le,
    LeSigned,
    Ge,
    GeSigned,
}

impl Condition {
    fn holds(self, dt: IrDataType, a: u16, b: u16) -> bool {
        let (a, b) = (a & mask(dt), b & mask(dt));
        let (sa, sb) = (signed(dt, a), signed(dt, b));
        match self {
            Condition::Eq => a == b,
            Condition::Ne => a != b,
            Condition::Lt => a < b,
            Condition::LtSigned => sa < sb,
            Condition::Gt => a > b,
            Condition::GtSigned => sa > sb,
            Condition::Le => a <= b,
            Condition::LeSigned => sa <= sb,
            Condition::Ge => a >= b,
            Condition::GeSigned => sa >= sb,
        }
    }
}

fn int_alu(op: AluOp, dt: IrDataType, a: u16, b: u16) -> u16 {
    let m = mask(dt);
    let (a, b) = (a & m, b & m);
    let result = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Div if b == 0 => m,
        AluOp::Div => a / b,
        AluOp::DivSigned if b == 0 => m,
        AluOp::DivSigned => signed(dt, a).wrapping_div(signed(dt, b)) as u16,
        AluOp::Mod if b == 0 => a,
        AluOp::Mod => a % b,
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
    };
    result & m
}

fn float_alu(op: AluOp, a: f64, b: f64) -> Option<f64> {
    match op {
        AluOp::Add => Some(a + b),
        AluOp::Sub => Some(a - b),
        AluOp::Mul => Some(a * b),
        AluOp::Div | AluOp::DivSigned => Some(a / b),
        AluOp::Mod => Some(a % b),
        AluOp::And | AluOp::Or | AluOp::Xor => None,
    }
}

fn int_unary(op: UnaryOp, dt: IrDataType, value: u16) -> u16 {
    let result = match op {
        UnaryOp::Inc => value.wrapping_add(1),
        UnaryOp::Dec => value.wrapping_sub(1),
        UnaryOp::Neg => 0u16.wrapping_sub(value),
        UnaryOp::Inv => !value,
    };
    result & mask(dt)
}

/// Shift or rotate `count` times; returns the new value and carry.
fn shift(op: ShiftOp, dt: IrDataType, value: u16, count: u32, carry: bool) -> (u16, bool) {
    let m = mask(dt);
    let top = sign_bit(dt);
    let (mut value, mut carry) = (value & m, carry);
    for _ in 0..count {
        let (high, low) = (value & top != 0, value & 1 != 0);
        value = match op {
            ShiftOp::Lsl => value << 1,
            ShiftOp::Lsr => value >> 1,
            ShiftOp::Asr => (value >> 1) | (value & top),
            ShiftOp::Rol => (value << 1) | high as u16,
            ShiftOp::Ror => (value >> 1) | if low { top } else { 0 },
            ShiftOp::Roxl => (value << 1) | carry as u16,
            ShiftOp::Roxr => (value >> 1) | if carry { top } else { 0 },
        } & m;
        carry = match op {
            ShiftOp::Lsl | ShiftOp::Rol | ShiftOp::Roxl => high,
            _ => low,
        };
    }
    (value, carry)
}

fn int_value(value: StackValue) -> Option<u16> {
    match value {
        StackValue::Byte(b) => Some(b as u16),
        StackValue::Word(w) => Some(w),
        StackValue::Float(_) => None,
    }
}

impl VirtualMachine {
    fn unsupported(&self, what: impl Into<String>) -> Box<dyn LowbyteErrorExt> {
        boxed(UnsupportedOperationError::new(what).at(self.pc))
    }

    pub(crate) fn malformed(&self, message: impl Into<String>) -> Box<dyn LowbyteErrorExt> {
        boxed(MalformedProgramError::new(message).at(self.pc))
    }

    fn checked<T>(&self, result: Result<T, MalformedProgramError>) -> VmResult<T> {
        result.map_err(|e| boxed(e.at(self.pc)))
    }

    fn operand(&self, value: Option<u32>, what: &str, ins: &IrInstruction) -> VmResult<u32> {
        value.ok_or_else(|| self.malformed(format!("`{}` is missing its {}", ins, what)))
    }

    fn typed(&self, ins: &IrInstruction) -> VmResult<IrDataType> {
        ins.dt().ok_or_else(|| self.malformed(format!("`{}` is missing its type", ins)))
    }

    fn r1(&self, ins: &IrInstruction) -> VmResult<u32> {
        self.operand(ins.reg1(), "first register", ins)
    }

    fn r2(&self, ins: &IrInstruction) -> VmResult<u32> {
        self.operand(ins.reg2(), "second register", ins)
    }

    fn r3(&self, ins: &IrInstruction) -> VmResult<u32> {
        self.operand(ins.reg3(), "third register", ins)
    }

    fn fr1(&self, ins: &IrInstruction) -> VmResult<u32> {
        self.operand(ins.fp_reg1(), "first float register", ins)
    }

    fn fr2(&self, ins: &IrInstruction) -> VmResult<u32> {
        self.operand(ins.fp_reg2(), "second float register", ins)
    }

    pub(crate) fn get(&self, dt: IrDataType, reg: u32) -> u16 {
        self.register(reg) & mask(dt)
    }

    pub(crate) fn set(&mut self, dt: IrDataType, reg: u32, value: u16) {
        let value = match dt {
            IrDataType::Byte => (self.register(reg) & 0xff00) | (value & 0xff),
            _ => value,
        };
        self.set_register(reg, value);
    }

    fn set_nz(&mut self, dt: IrDataType, value: u16) {
        self.flags.zero = value & mask(dt) == 0;
        self.flags.negative = value & sign_bit(dt) != 0;
    }

    fn set_result(&mut self, dt: IrDataType, reg: u32, value: u16) {
        self.set(dt, reg, value);
        self.set_nz(dt, value);
    }

    fn data_address(&self, current: &LoadedInstruction) -> VmResult<u32> {
        match current.target {
            Some(Target::Data(address)) => Ok(address),
            _ => Err(self.malformed(format!("`{}` has no memory operand", current.ins))),
        }
    }

    fn code_target(&self, current: &LoadedInstruction) -> VmResult<usize> {
        match current.target {
            Some(Target::Code(index)) => Ok(index),
            Some(Target::Data(address)) => Err(self.unsupported(format!("jump to machine address ${:04x}", address))),
            None => Err(self.malformed(format!("`{}` has no target", current.ins))),
        }
    }

    pub(crate) fn push_value(&mut self, value: StackValue) {
        self.value_stack.push(value);
    }

    pub(crate) fn push_int(&mut self, dt: IrDataType, value: u16) {
        let value = match dt {
            IrDataType::Byte => StackValue::Byte(value as u8),
            _ => StackValue::Word(value),
        };
        self.push_value(value);
    }

    pub(crate) fn pop_value(&mut self) -> VmResult<StackValue> {
        self.value_stack.pop().ok_or_else(|| self.malformed("value stack underflow"))
    }

    pub(crate) fn pop_int(&mut self) -> VmResult<u16> {
        let value = self.pop_value()?;
        int_value(value).ok_or_else(|| self.malformed(format!("expected an integer on the value stack, got {:?}", value)))
    }

    pub(crate) fn pop_float(&mut self) -> VmResult<f64> {
        match self.pop_value()? {
            StackValue::Float(f) => Ok(f),
            other => Err(self.malformed(format!("expected a float on the value stack, got {:?}", other))),
        }
    }

    pub(crate) fn execute(&mut self, current: &LoadedInstruction) -> VmResult<()> {
        let ins = &current.ins;
        let mut next = self.pc + 1;
        match ins.opcode() {
            Opcode::Nop => {}
            Opcode::Load | Opcode::Loadm | Opcode::Loadi | Opcode::Loadx | Opcode::Loadr => self.exec_load(current)?,
            Opcode::Storem | Opcode::Storei | Opcode::Storex | Opcode::Storezm | Opcode::Storezi | Opcode::Storezx => {
                self.exec_store(current)?
            }

            Opcode::Jump => next = self.code_target(current)?,
            Opcode::Call => {
                let result = match ins.dt() {
                    Some(IrDataType::Float) => Some(ResultRegister::Float(self.fr1(ins)?)),
                    Some(dt) => Some(ResultRegister::Int(dt, self.r1(ins)?)),
                    None => None,
                };
                let target = self.code_target(current)?;
                self.call_stack.push(CallFrame {
                    return_pc: next,
                    result,
                });
                next = target;
            }
            Opcode::Calli => return Err(self.unsupported("indirect call to a machine address")),
            Opcode::Syscall => {
                let number = ins
                    .immediate()
                    .ok_or_else(|| self.malformed(format!("`{}` is missing its syscall number", ins)))?;
                self.syscall(number)?;
            }
            Opcode::Return | Opcode::Returnr => {
                let value = if ins.opcode() == Opcode::Returnr {
                    Some(match self.typed(ins)? {
                        IrDataType::Float => StackValue::Float(self.fp_register(self.fr1(ins)?)),
                        IrDataType::Byte => StackValue::Byte(self.get(IrDataType::Byte, self.r1(ins)?) as u8),
                        IrDataType::Word => StackValue::Word(self.get(IrDataType::Word, self.r1(ins)?)),
                    })
                } else {
                    None
                };
                match self.call_stack.pop() {
                    Some(frame) => {
                        if let (Some(result), Some(value)) = (frame.result, value) {
                            self.store_result(result, value)?;
                        }
                        next = frame.return_pc;
                    }
                    None => {
                        self.halted = true;
                        next = self.pc;
                    }
                }
            }

            Opcode::Bstcc
            | Opcode::Bstcs
            | Opcode::Bsteq
            | Opcode::Bstne
            | Opcode::Bstneg
            | Opcode::Bstpos
            | Opcode::Bstvc
            | Opcode::Bstvs
            | Opcode::Beqr
            | Opcode::Bner
            | Opcode::Bgtr
            | Opcode::Bgtsr
            | Opcode::Bger
            | Opcode::Bgesr
            | Opcode::Beq
            | Opcode::Bne
            | Opcode::Bgt
            | Opcode::Bgts
            | Opcode::Blt
            | Opcode::Blts
            | Opcode::Bge
            | Opcode::Bges
            | Opcode::Ble
            | Opcode::Bles => {
                if self.branch_taken(ins)? {
                    next = self.code_target(current)?;
                }
            }

            Opcode::Cmp | Opcode::Cmpi => {
                let dt = self.typed(ins)?;
                let a = self.get(dt, self.r1(ins)?);
                let b = match ins.immediate() {
                    Some(value) => value as u16 & mask(dt),
                    None => self.get(dt, self.r2(ins)?),
                };
                let result = a.wrapping_sub(b) & mask(dt);
                self.flags.carry = a >= b;
                self.flags.overflow = (a ^ b) & (a ^ result) & sign_bit(dt) != 0;
                self.set_nz(dt, result);
            }
            Opcode::Seq
            | Opcode::Sne
            | Opcode::Slt
            | Opcode::Slts
            | Opcode::Sgt
            | Opcode::Sgts
            | Opcode::Sle
            | Opcode::Sles
            | Opcode::Sge
            | Opcode::Sges => {
                let dt = self.typed(ins)?;
                let condition = condition(ins.opcode())
                    .ok_or_else(|| self.malformed(format!("`{}` is not a comparison", ins)))?;
                let holds = condition.holds(dt, self.get(dt, self.r2(ins)?), self.get(dt, self.r3(ins)?));
                self.set_result(dt, self.r1(ins)?, holds as u16);
            }

            Opcode::Inc | Opcode::Incm => self.exec_unary(current, UnaryOp::Inc)?,
            Opcode::Dec | Opcode::Decm => self.exec_unary(current, UnaryOp::Dec)?,
            Opcode::Neg | Opcode::Negm => self.exec_unary(current, UnaryOp::Neg)?,
            Opcode::Inv => self.exec_unary(current, UnaryOp::Inv)?,
            Opcode::Add | Opcode::Addr | Opcode::Addm => self.exec_alu(current, AluOp::Add)?,
            Opcode::Sub | Opcode::Subr | Opcode::Subm => self.exec_alu(current, AluOp::Sub)?,
            Opcode::Mul | Opcode::Mulr => self.exec_alu(current, AluOp::Mul)?,
            Opcode::Div | Opcode::Divr => self.exec_alu(current, AluOp::Div)?,
            Opcode::Divs | Opcode::Divsr => self.exec_alu(current, AluOp::DivSigned)?,
            Opcode::Mod | Opcode::Modr => self.exec_alu(current, AluOp::Mod)?,
            Opcode::And | Opcode::Andr => self.exec_alu(current, AluOp::And)?,
            Opcode::Or | Opcode::Orr => self.exec_alu(current, AluOp::Or)?,
            Opcode::Xor | Opcode::Xorr => self.exec_alu(current, AluOp::Xor)?,
            Opcode::Divmod | Opcode::Divmodr => {
                let dt = self.typed(ins)?;
                let number = self.get(dt, self.r1(ins)?);
                let divisor = match ins.immediate() {
                    Some(value) => value as u16 & mask(dt),
                    None => self.get(dt, self.r2(ins)?),
                };
                self.push_int(dt, int_alu(AluOp::Div, dt, number, divisor));
                self.push_int(dt, int_alu(AluOp::Mod, dt, number, divisor));
            }
            Opcode::Sqrt => match self.typed(ins)? {
                IrDataType::Float => self.set_fp_register(self.fr1(ins)?, self.fp_register(self.fr2(ins)?).sqrt()),
                dt => {
                    let root = (self.get(dt, self.r2(ins)?) as f64).sqrt() as u16;
                    self.set_result(IrDataType::Byte, self.r1(ins)?, root);
                }
            },
            Opcode::Square => match self.typed(ins)? {
                IrDataType::Float => {
                    let value = self.fp_register(self.fr2(ins)?);
                    self.set_fp_register(self.fr1(ins)?, value * value);
                }
                dt => {
                    let value = self.get(dt, self.r2(ins)?);
                    self.set_result(dt, self.r1(ins)?, value.wrapping_mul(value) & mask(dt));
                }
            },
            Opcode::Sgn => {
                let sign = match self.typed(ins)? {
                    IrDataType::Float => match self.fp_register(self.fr1(ins)?).partial_cmp(&0.0) {
                        Some(Ordering::Less) => -1,
                        Some(Ordering::Greater) => 1,
                        _ => 0,
                    },
                    dt => signed(dt, self.get(dt, self.r2(ins)?)).signum(),
                };
                self.set_result(IrDataType::Byte, self.r1(ins)?, sign as u16 & 0xff);
            }

            Opcode::Lsl => self.exec_shift(current, ShiftOp::Lsl)?,
            Opcode::Lsr => self.exec_shift(current, ShiftOp::Lsr)?,
            Opcode::Asr => self.exec_shift(current, ShiftOp::Asr)?,
            Opcode::Lsln => self.exec_shift(current, ShiftOp::Lsl)?,
            Opcode::Lsrn => self.exec_shift(current, ShiftOp::Lsr)?,
            Opcode::Asrn => self.exec_shift(current, ShiftOp::Asr)?,
            Opcode::Rol | Opcode::Rolm => self.exec_shift(current, ShiftOp::Rol)?,
            Opcode::Ror | Opcode::Rorm => self.exec_shift(current, ShiftOp::Ror)?,
            Opcode::Roxl | Opcode::Roxlm => self.exec_shift(current, ShiftOp::Roxl)?,
            Opcode::Roxr | Opcode::Roxrm => self.exec_shift(current, ShiftOp::Roxr)?,
            Opcode::Ext | Opcode::Exts => {
                if self.typed(ins)? != IrDataType::Byte {
                    return Err(self.unsupported(format!("`{}`", ins)));
                }
                let byte = self.get(IrDataType::Byte, self.r2(ins)?);
                let word = if ins.opcode() == Opcode::Exts {
                    signed(IrDataType::Byte, byte) as u16
                } else {
                    byte
                };
                self.set_result(IrDataType::Word, self.r1(ins)?, word);
            }
            Opcode::Concat => {
                let word = self.get(IrDataType::Byte, self.r2(ins)?) << 8 | self.get(IrDataType::Byte, self.r3(ins)?);
                self.set_result(IrDataType::Word, self.r1(ins)?, word);
            }
            Opcode::Lsig | Opcode::Msig => {
                let word = self.register(self.r2(ins)?);
                let byte = if ins.opcode() == Opcode::Msig { word >> 8 } else { word & 0xff };
                self.set_result(IrDataType::Byte, self.r1(ins)?, byte);
            }

            Opcode::Clc => self.flags.carry = false,
            Opcode::Sec => self.flags.carry = true,
            Opcode::Pushst => self.push_value(StackValue::Byte(self.flags.to_byte())),
            Opcode::Popst => {
                let status = self.pop_int()?;
                self.flags = crate::vm::StatusFlags::from_byte(status as u8);
            }
            Opcode::Push => match self.typed(ins)? {
                IrDataType::Float => self.push_value(StackValue::Float(self.fp_register(self.fr1(ins)?))),
                dt => self.push_int(dt, self.get(dt, self.r1(ins)?)),
            },
            Opcode::Pop => match self.typed(ins)? {
                IrDataType::Float => {
                    let value = self.pop_float()?;
                    self.set_fp_register(self.fr1(ins)?, value);
                }
                dt => {
                    let value = self.pop_int()?;
                    self.set(dt, self.r1(ins)?, value);
                }
            },

            Opcode::Ffromub | Opcode::Ffromsb | Opcode::Ffromuw | Opcode::Ffromsw => {
                let reg = self.r1(ins)?;
                let value = match ins.opcode() {
                    Opcode::Ffromub => self.get(IrDataType::Byte, reg) as f64,
                    Opcode::Ffromsb => signed(IrDataType::Byte, self.get(IrDataType::Byte, reg)) as f64,
                    Opcode::Ffromuw => self.get(IrDataType::Word, reg) as f64,
                    _ => signed(IrDataType::Word, self.get(IrDataType::Word, reg)) as f64,
                };
                self.set_fp_register(self.fr1(ins)?, value);
            }
            Opcode::Ftoub | Opcode::Ftosb | Opcode::Ftouw | Opcode::Ftosw => {
                let value = self.fp_register(self.fr1(ins)?);
                let (dt, converted) = match ins.opcode() {
                    Opcode::Ftoub => (IrDataType::Byte, value as u8 as u16),
                    Opcode::Ftosb => (IrDataType::Byte, value as i8 as u8 as u16),
                    Opcode::Ftouw => (IrDataType::Word, value as u16),
                    _ => (IrDataType::Word, value as i16 as u16),
                };
                self.set_result(dt, self.r1(ins)?, converted);
            }
            Opcode::Fabs | Opcode::Fsin | Opcode::Fcos | Opcode::Fround | Opcode::Ffloor | Opcode::Fceil => {
                let value = self.fp_register(self.fr2(ins)?);
                let result = match ins.opcode() {
                    Opcode::Fabs => value.abs(),
                    Opcode::Fsin => value.sin(),
                    Opcode::Fcos => value.cos(),
                    Opcode::Fround => value.round(),
                    Opcode::Ffloor => value.floor(),
                    _ => value.ceil(),
                };
                self.set_fp_register(self.fr1(ins)?, result);
            }
            Opcode::Fpow => {
                let (base, exponent) = (self.fp_register(self.fr1(ins)?), self.fp_register(self.fr2(ins)?));
                self.set_fp_register(self.fr1(ins)?, base.powf(exponent));
            }
            Opcode::Fcomp => {
                let (a, b) = (self.fp_register(self.fr1(ins)?), self.fp_register(self.fr2(ins)?));
                let result = match a.partial_cmp(&b) {
                    Some(Ordering::Less) => 0xff,
                    Some(Ordering::Greater) => 1,
                    _ => 0,
                };
                self.set_result(IrDataType::Byte, self.r1(ins)?, result);
            }

            Opcode::BinaryData => return Err(self.unsupported("inline binary data")),
        }
        self.pc = next;
        Ok(())
    }

    fn store_result(&mut self, result: ResultRegister, value: StackValue) -> VmResult<()> {
        match (result, value) {
            (ResultRegister::Float(reg), StackValue::Float(f)) => self.set_fp_register(reg, f),
            (ResultRegister::Int(dt, reg), value) => {
                let value = int_value(value)
                    .ok_or_else(|| self.malformed("float returned to an integer result register"))?;
                self.set(dt, reg, value);
            }
            (ResultRegister::Float(_), _) => return Err(self.malformed("integer returned to a float result register")),
        }
        Ok(())
    }

    fn branch_taken(&self, ins: &IrInstruction) -> VmResult<bool> {
        let flags = self.flags;
        let taken = match ins.opcode() {
            Opcode::Bstcc => !flags.carry,
            Opcode::Bstcs => flags.carry,
            Opcode::Bsteq => flags.zero,
            Opcode::Bstne => !flags.zero,
            Opcode::Bstneg => flags.negative,
            Opcode::Bstpos => !flags.negative,
            Opcode::Bstvc => !flags.overflow,
            Opcode::Bstvs => flags.overflow,
            op => {
                let dt = self.typed(ins)?;
                let a = self.get(dt, self.r1(ins)?);
                let b = match ins.immediate() {
                    Some(value) => value as u16 & mask(dt),
                    None => self.get(dt, self.r2(ins)?),
                };
                let condition =
                    condition(op).ok_or_else(|| self.malformed(format!("`{}` is not a branch", ins)))?;
                condition.holds(dt, a, b)
            }
        };
        Ok(taken)
    }

    fn exec_load(&mut self, current: &LoadedInstruction) -> VmResult<()> {
        let ins = &current.ins;
        let dt = self.typed(ins)?;
        if dt == IrDataType::Float {
            let value = match ins.opcode() {
                Opcode::Load => match (ins.immediate_fp(), ins.immediate()) {
                    (Some(value), _) => value,
                    (None, Some(value)) => value as f64,
                    (None, None) => return Err(self.malformed(format!("`{}` has no value", ins))),
                },
                Opcode::Loadm => self.checked(self.memory.read_float(self.data_address(current)?))?,
                Opcode::Loadi => self.checked(self.memory.read_float(self.register(self.r1(ins)?) as u32))?,
                Opcode::Loadx => {
                    let address = self.data_address(current)? + self.register(self.r1(ins)?) as u32;
                    self.checked(self.memory.read_float(address))?
                }
                _ => self.fp_register(self.fr2(ins)?),
            };
            self.set_fp_register(self.fr1(ins)?, value);
            return Ok(());
        }

        let value = match ins.opcode() {
            Opcode::Load => match ins.immediate() {
                Some(value) => value as u16,
                None => self.data_address(current)? as u16,
            },
            Opcode::Loadm => self.checked(self.memory.read_int(dt, self.data_address(current)?))?,
            Opcode::Loadi => self.checked(self.memory.read_int(dt, self.register(self.r2(ins)?) as u32))?,
            Opcode::Loadx => {
                let address = self.data_address(current)? + self.register(self.r2(ins)?) as u32;
                self.checked(self.memory.read_int(dt, address))?
            }
            _ => self.get(dt, self.r2(ins)?),
        };
        self.set_result(dt, self.r1(ins)?, value & mask(dt));
        Ok(())
    }

    fn exec_store(&mut self, current: &LoadedInstruction) -> VmResult<()> {
        let ins = &current.ins;
        let dt = self.typed(ins)?;
        let float = dt == IrDataType::Float;
        let address = match ins.opcode() {
            Opcode::Storem | Opcode::Storezm => self.data_address(current)?,
            Opcode::Storei if !float => self.register(self.r2(ins)?) as u32,
            Opcode::Storei | Opcode::Storezi => self.register(self.r1(ins)?) as u32,
            Opcode::Storex if !float => self.data_address(current)? + self.register(self.r2(ins)?) as u32,
            _ => self.data_address(current)? + self.register(self.r1(ins)?) as u32,
        };
        let zero = matches!(ins.opcode(), Opcode::Storezm | Opcode::Storezi | Opcode::Storezx);
        let written = match (float, zero) {
            (true, true) => self.memory.write_float(address, 0.0),
            (true, false) => {
                let value = self.fp_register(self.fr1(ins)?);
                self.memory.write_float(address, value)
            }
            (false, true) => self.memory.write_int(dt, address, 0),
            (false, false) => {
                let value = self.get(dt, self.r1(ins)?);
                self.memory.write_int(dt, address, value)
            }
        };
        self.checked(written)
    }

    fn exec_unary(&mut self, current: &LoadedInstruction, op: UnaryOp) -> VmResult<()> {
        let ins = &current.ins;
        let dt = self.typed(ins)?;
        let in_memory = matches!(current.target, Some(Target::Data(_)));
        if dt == IrDataType::Float {
            let apply = |value: f64| match op {
                UnaryOp::Inc => Some(value + 1.0),
                UnaryOp::Dec => Some(value - 1.0),
                UnaryOp::Neg => Some(-value),
                UnaryOp::Inv => None,
            };
            if in_memory {
                let address = self.data_address(current)?;
                let value = self.checked(self.memory.read_float(address))?;
                let result = apply(value).ok_or_else(|| self.malformed(format!("`{}` on a float", ins)))?;
                let written = self.memory.write_float(address, result);
                return self.checked(written);
            }
            let reg = self.fr1(ins)?;
            let result = apply(self.fp_register(reg)).ok_or_else(|| self.malformed(format!("`{}` on a float", ins)))?;
            self.set_fp_register(reg, result);
            return Ok(());
        }

        if in_memory {
            let address = self.data_address(current)?;
            let value = self.checked(self.memory.read_int(dt, address))?;
            let result = int_unary(op, dt, value);
            self.set_nz(dt, result);
            let written = self.memory.write_int(dt, address, result);
            return self.checked(written);
        }
        let reg = self.r1(ins)?;
        let result = int_unary(op, dt, self.get(dt, reg));
        self.set_result(dt, reg, result);
        Ok(())
    }

    fn exec_alu(&mut self, current: &LoadedInstruction, op: AluOp) -> VmResult<()> {
        let ins = &current.ins;
        let dt = self.typed(ins)?;
        let in_memory = matches!(current.target, Some(Target::Data(_)));
        if dt == IrDataType::Float {
            let operand = self.fp_register(self.fr1(ins)?);
            if in_memory {
                let address = self.data_address(current)?;
                let value = self.checked(self.memory.read_float(address))?;
                let result =
                    float_alu(op, value, operand).ok_or_else(|| self.malformed(format!("`{}` on a float", ins)))?;
                let written = self.memory.write_float(address, result);
                return self.checked(written);
            }
            let other = match (ins.immediate_fp(), ins.fp_reg2()) {
                (Some(value), _) => value,
                (None, Some(reg)) => self.fp_register(reg),
                (None, None) => return Err(self.malformed(format!("`{}` has no second operand", ins))),
            };
            let result = float_alu(op, operand, other).ok_or_else(|| self.malformed(format!("`{}` on a float", ins)))?;
            self.set_fp_register(self.fr1(ins)?, result);
            return Ok(());
        }

        let operand = self.get(dt, self.r1(ins)?);
        if in_memory {
            let address = self.data_address(current)?;
            let value = self.checked(self.memory.read_int(dt, address))?;
            let result = int_alu(op, dt, value, operand);
            self.set_nz(dt, result);
            let written = self.memory.write_int(dt, address, result);
            return self.checked(written);
        }
        let other = match (ins.immediate(), ins.reg2()) {
            (Some(value), _) => value as u16,
            (None, Some(reg)) => self.get(dt, reg),
            (None, None) => return Err(self.malformed(format!("`{}` has no second operand", ins))),
        };
        let result = int_alu(op, dt, operand, other);
        self.set_result(dt, self.r1(ins)?, result);
        Ok(())
    }

    fn exec_shift(&mut self, current: &LoadedInstruction, op: ShiftOp) -> VmResult<()> {
        let ins = &current.ins;
        let dt = self.typed(ins)?;
        let count = match ins.reg2() {
            Some(reg) => (self.register(reg) & 0xff) as u32,
            None => 1,
        };
        let count = count.min(width(dt) + 1);
        if matches!(current.target, Some(Target::Data(_))) {
            let address = self.data_address(current)?;
            let value = self.checked(self.memory.read_int(dt, address))?;
            let (result, carry) = shift(op, dt, value, count, self.flags.carry);
            self.flags.carry = carry;
            self.set_nz(dt, result);
            let written = self.memory.write_int(dt, address, result);
            return self.checked(written);
        }
        let reg = self.r1(ins)?;
        let (result, carry) = shift(op, dt, self.get(dt, reg), count, self.flags.carry);
        self.flags.carry = carry;
        self.set_result(dt, reg, result);
        Ok(())
    }
}

fn condition(op: Opcode) -> Option<Condition> {
    let condition = match op {
        Opcode::Seq | Opcode::Beqr | Opcode::Beq => Condition::Eq,
        Opcode::Sne | Opcode::Bner | Opcode::Bne => Condition::Ne,
        Opcode::Slt | Opcode::Blt => Condition::Lt,
        Opcode::Slts | Opcode::Blts => Condition::LtSigned,
        Opcode::Sgt | Opcode::Bgtr | Opcode::Bgt => Condition::Gt,
        Opcode::Sgts | Opcode::Bgtsr | Opcode::Bgts => Condition::GtSigned,
        Opcode::Sle | Opcode::Ble => Condition::Le,
        Opcode::Sles | Opcode::Bles => Condition::LeSigned,
        Opcode::Sge | Opcode::Bger | Opcode::Bge => Condition::Ge,
        Opcode::Sges | Opcode::Bgesr | Opcode::Bges => Condition::GeSigned,
        _ => return None,
    };
    Some(condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_by_zero_is_defined() {
        assert_eq!(int_alu(AluOp::Div, IrDataType::Byte, 7, 0), 0xff);
        assert_eq!(int_alu(AluOp::Div, IrDataType::Word, 7, 0), 0xffff);
        assert_eq!(int_alu(AluOp::Mod, IrDataType::Byte, 7, 0), 7);
    }

    #[test]
    fn signed_division_truncates_towards_zero() {
        // -7 / 2 == -3
        assert_eq!(int_alu(AluOp::DivSigned, IrDataType::Byte, 0xf9, 2), 0xfd);
    }

    #[test]
    fn rotate_through_carry_uses_incoming_carry() {
        assert_eq!(shift(ShiftOp::Roxl, IrDataType::Byte, 0x80, 1, true), (0x01, true));
        assert_eq!(shift(ShiftOp::Roxr, IrDataType::Byte, 0x01, 1, false), (0x00, true));
        assert_eq!(shift(ShiftOp::Rol, IrDataType::Byte, 0x81, 1, false), (0x03, true));
    }

    #[test]
    fn signed_conditions_respect_width() {
        assert!(Condition::LtSigned.holds(IrDataType::Byte, 0xff, 1));
        assert!(!Condition::Lt.holds(IrDataType::Byte, 0xff, 1));
        assert!(Condition::GtSigned.holds(IrDataType::Word, 0x7fff, 0x8000));
    }
}
