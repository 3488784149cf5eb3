//! file: core/src/ir/instruction.rs
//! description: the immutable IR instruction, its validating builder and text form.
//!
//! Instructions are assembled through [`InstructionBuilder`] and checked once,
//! when built. After that the fields can only be read. The text form is
//! `mnemonic[.t] operands` with operands in a fixed order: integer registers,
//! float registers, `#immediate`, `@address`, `label[+offset]`.

use std::fmt;
use std::str::FromStr;

use crate::ir::opcode::{OperandClass, Opcode};
use crate::ir::textual::parse_int;
use crate::types::IrDataType;

/// Highest register number accepted by validation.
pub const MAX_REGISTER: u32 = 65536;

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidInstruction(pub String);

impl fmt::Display for InvalidInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InvalidInstruction {}

#[derive(Debug, Clone, PartialEq)]
pub struct IrInstruction {
    opcode: Opcode,
    dt: Option<IrDataType>,
    reg1: Option<u32>,
    reg2: Option<u32>,
    reg3: Option<u32>,
    fp_reg1: Option<u32>,
    fp_reg2: Option<u32>,
    immediate: Option<i32>,
    immediate_fp: Option<f64>,
    address: Option<u32>,
    label: Option<String>,
    label_offset: Option<i32>,
    binary_data: Option<Vec<u8>>,
}

/// Shorthand for [`IrInstruction::build`].
pub fn ins(opcode: Opcode) -> InstructionBuilder {
    IrInstruction::build(opcode)
}

impl IrInstruction {
    pub fn build(opcode: Opcode) -> InstructionBuilder {
        InstructionBuilder {
            ins: IrInstruction {
                opcode,
                dt: None,
                reg1: None,
                reg2: None,
                reg3: None,
                fp_reg1: None,
                fp_reg2: None,
                immediate: None,
                immediate_fp: None,
                address: None,
                label: None,
                label_offset: None,
                binary_data: None,
            },
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn dt(&self) -> Option<IrDataType> {
        self.dt
    }

    pub fn reg1(&self) -> Option<u32> {
        self.reg1
    }

    pub fn reg2(&self) -> Option<u32> {
        self.reg2
    }

    pub fn reg3(&self) -> Option<u32> {
        self.reg3
    }

    pub fn fp_reg1(&self) -> Option<u32> {
        self.fp_reg1
    }

    pub fn fp_reg2(&self) -> Option<u32> {
        self.fp_reg2
    }

    pub fn immediate(&self) -> Option<i32> {
        self.immediate
    }

    pub fn immediate_fp(&self) -> Option<f64> {
        self.immediate_fp
    }

    pub fn address(&self) -> Option<u32> {
        self.address
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn label_offset(&self) -> Option<i32> {
        self.label_offset
    }

    pub fn binary_data(&self) -> Option<&[u8]> {
        self.binary_data.as_deref()
    }

    fn validate(&self) -> Result<(), InvalidInstruction> {
        let fail = |msg: String| Err(InvalidInstruction(format!("{}: {}", self.opcode, msg)));

        for reg in [self.reg1, self.reg2, self.reg3, self.fp_reg1, self.fp_reg2].into_iter().flatten() {
            if reg > MAX_REGISTER {
                return fail(format!("register {} out of range", reg));
            }
        }

        match (self.opcode.operand_class(), self.dt) {
            (OperandClass::Untyped, Some(dt)) => return fail(format!("takes no type, got {}", dt)),
            (OperandClass::IntOnly | OperandClass::FloatOnly | OperandClass::Any, None) => {
                return fail("requires a type".to_string());
            }
            (OperandClass::IntOnly, Some(IrDataType::Float)) => return fail("integer types only".to_string()),
            (OperandClass::FloatOnly, Some(IrDataType::Byte | IrDataType::Word)) => {
                return fail("float type only".to_string());
            }
            _ => {}
        }

        if let Some(value) = self.immediate {
            match self.dt {
                Some(IrDataType::Byte) if !(-128..=255).contains(&value) => {
                    return fail(format!("immediate {} out of byte range", value));
                }
                Some(IrDataType::Word) if !(-32768..=65535).contains(&value) => {
                    return fail(format!("immediate {} out of word range", value));
                }
                Some(IrDataType::Float) => return fail("integer immediate on a float instruction".to_string()),
                _ => {}
            }
        }
        if self.immediate_fp.is_some() && self.dt != Some(IrDataType::Float) {
            return fail("float immediate on a non-float instruction".to_string());
        }
        if self.immediate.is_some() && self.immediate_fp.is_some() {
            return fail("more than one immediate".to_string());
        }
        if self.opcode.needs_target() && self.label.is_none() && self.address.is_none() {
            return fail("missing branch target".to_string());
        }
        if self.label_offset.is_some() && self.label.is_none() {
            return fail("label offset without label".to_string());
        }
        if self.binary_data.is_some() != (self.opcode == Opcode::BinaryData) {
            return fail("binary data belongs to binarydata only".to_string());
        }
        Ok(())
    }
}

/// Collects operands for one instruction; validation happens in [`InstructionBuilder::finish`].
#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    ins: IrInstruction,
}

impl InstructionBuilder {
    pub fn typed(mut self, dt: IrDataType) -> Self {
        self.ins.dt = Some(dt);
        self
    }

    pub fn r1(mut self, reg: u32) -> Self {
        self.ins.reg1 = Some(reg);
        self
    }

    pub fn r2(mut self, reg: u32) -> Self {
        self.ins.reg2 = Some(reg);
        self
    }

    pub fn r3(mut self, reg: u32) -> Self {
        self.ins.reg3 = Some(reg);
        self
    }

    pub fn fr1(mut self, reg: u32) -> Self {
        self.ins.fp_reg1 = Some(reg);
        self
    }

    pub fn fr2(mut self, reg: u32) -> Self {
        self.ins.fp_reg2 = Some(reg);
        self
    }

    pub fn imm(mut self, value: i32) -> Self {
        self.ins.immediate = Some(value);
        self
    }

    pub fn fimm(mut self, value: f64) -> Self {
        self.ins.immediate_fp = Some(value);
        self
    }

    pub fn addr(mut self, address: u32) -> Self {
        self.ins.address = Some(address);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.ins.label = Some(label.into());
        self
    }

    /// Label with a byte offset; an offset of zero is not recorded.
    pub fn label_at(mut self, label: impl Into<String>, offset: i32) -> Self {
        self.ins.label = Some(label.into());
        self.ins.label_offset = (offset != 0).then_some(offset);
        self
    }

    pub fn bytes(mut self, data: Vec<u8>) -> Self {
        self.ins.binary_data = Some(data);
        self
    }

    pub fn try_finish(self) -> Result<IrInstruction, InvalidInstruction> {
        self.ins.validate()?;
        Ok(self.ins)
    }

    /// Build and validate; an invalid instruction is a code generator defect.
    pub fn finish(self) -> IrInstruction {
        match self.try_finish() {
            Ok(ins) => ins,
            Err(e) => panic!("invalid IR instruction: {}", e),
        }
    }
}

impl fmt::Display for IrInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode.mnemonic())?;
        if let Some(dt) = self.dt {
            write!(f, ".{}", dt.suffix())?;
        }

        let mut operands: Vec<String> = Vec::new();
        if let Some(data) = &self.binary_data {
            operands.extend(data.iter().map(|b| b.to_string()));
        }
        operands.extend([self.reg1, self.reg2, self.reg3].into_iter().flatten().map(|r| format!("r{}", r)));
        operands.extend([self.fp_reg1, self.fp_reg2].into_iter().flatten().map(|r| format!("fr{}", r)));
        if let Some(value) = self.immediate {
            operands.push(format!("#{}", value));
        }
        if let Some(value) = self.immediate_fp {
            operands.push(format!("#{:?}", value));
        }
        if let Some(address) = self.address {
            operands.push(format!("@{}", address));
        }
        if let Some(label) = &self.label {
            match self.label_offset {
                Some(offset) => operands.push(format!("{}+{}", label, offset)),
                None => operands.push(label.clone()),
            }
        }

        if !operands.is_empty() {
            write!(f, " {}", operands.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for IrInstruction {
    type Err = InvalidInstruction;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let (mnemonic, dt) = match head.split_once('.') {
            Some((mnemonic, suffix)) => {
                let dt = IrDataType::from_suffix(suffix)
                    .ok_or_else(|| InvalidInstruction(format!("unknown type suffix '.{}'", suffix)))?;
                (mnemonic, Some(dt))
            }
            None => (head, None),
        };
        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| InvalidInstruction(format!("unknown opcode '{}'", mnemonic)))?;

        let mut builder = IrInstruction::build(opcode);
        if let Some(dt) = dt {
            builder = builder.typed(dt);
        }
        let operands = rest.split(',').map(str::trim).filter(|o| !o.is_empty());

        if opcode == Opcode::BinaryData {
            let mut data = Vec::new();
            for operand in operands {
                let byte = parse_int(operand)
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| InvalidInstruction(format!("invalid byte '{}'", operand)))?;
                data.push(byte);
            }
            return builder.bytes(data).try_finish();
        }

        let mut regs = Vec::new();
        let mut fp_regs = Vec::new();
        for operand in operands {
            if let Some(reg) = operand.strip_prefix("fr").and_then(|d| d.parse::<u32>().ok()) {
                fp_regs.push(reg);
            } else if let Some(reg) = operand.strip_prefix('r').and_then(|d| d.parse::<u32>().ok()) {
                regs.push(reg);
            } else if let Some(value) = operand.strip_prefix('#') {
                if dt == Some(IrDataType::Float) {
                    let value = value
                        .parse::<f64>()
                        .map_err(|_| InvalidInstruction(format!("invalid float immediate '{}'", value)))?;
                    builder = builder.fimm(value);
                } else {
                    let value = parse_int(value)
                        .and_then(|v| i32::try_from(v).ok())
                        .ok_or_else(|| InvalidInstruction(format!("invalid immediate '{}'", value)))?;
                    builder = builder.imm(value);
                }
            } else if let Some(address) = operand.strip_prefix('@') {
                let address = parse_int(address)
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| InvalidInstruction(format!("invalid address '{}'", address)))?;
                builder = builder.addr(address);
            } else {
                builder = match operand.rsplit_once('+') {
                    Some((label, offset)) => {
                        let offset = parse_int(offset)
                            .and_then(|v| i32::try_from(v).ok())
                            .ok_or_else(|| InvalidInstruction(format!("invalid label offset '{}'", offset)))?;
                        builder.label(label).with_offset(offset)
                    }
                    None => builder.label(operand),
                };
            }
        }

        if regs.len() > 3 || fp_regs.len() > 2 {
            return Err(InvalidInstruction(format!("too many registers in '{}'", line)));
        }
        let mut regs = regs.into_iter();
        if let Some(r) = regs.next() {
            builder = builder.r1(r);
        }
        if let Some(r) = regs.next() {
            builder = builder.r2(r);
        }
        if let Some(r) = regs.next() {
            builder = builder.r3(r);
        }
        let mut fp_regs = fp_regs.into_iter();
        if let Some(r) = fp_regs.next() {
            builder = builder.fr1(r);
        }
        if let Some(r) = fp_regs.next() {
            builder = builder.fr2(r);
        }
        builder.try_finish()
    }
}

impl InstructionBuilder {
    /// Offset as written in text; unlike [`InstructionBuilder::label_at`] an explicit `+0` is kept.
    fn with_offset(mut self, offset: i32) -> Self {
        self.ins.label_offset = Some(offset);
        self
    }
}
