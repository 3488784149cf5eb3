//! file: core/src/vm/mod.rs
//! description: the register virtual machine that executes linked IR programs.
//!
//! The machine owns an integer register file (16 bits per register), a float
//! register file, a memory image, a call stack and a value stack. Execution
//! is a plain fetch-decode-execute loop over the flattened instruction
//! stream built by the loader; one instruction per step.

mod exec;
mod loader;
mod memory;
mod runner;
mod snapshot;
mod syscalls;

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{LowbyteErrorExt, MalformedProgramError, boxed};
use crate::ir::instruction::IrInstruction;
use crate::ir::program::IrProgram;
use crate::types::IrDataType;

pub use memory::Memory;
pub use runner::VmRunner;
pub use snapshot::VmSnapshot;

use loader::LoadedInstruction;

pub type VmResult<T> = Result<T, Box<dyn LowbyteErrorExt>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    pub memory_size: usize,
    /// Fail with a malformed-program error after this many steps.
    pub max_steps: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            memory_size: 65536,
            max_steps: None,
        }
    }
}

/// One entry of the value stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StackValue {
    Byte(u8),
    Word(u16),
    Float(f64),
}

/// The register a `call` expects its result in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResultRegister {
    Int(IrDataType, u32),
    Float(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallFrame {
    pub return_pc: usize,
    pub result: Option<ResultRegister>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub carry: bool,
    pub zero: bool,
    pub negative: bool,
    pub overflow: bool,
}

impl StatusFlags {
    /// Status register layout: N V - - - - Z C.
    pub fn to_byte(self) -> u8 {
        (self.negative as u8) << 7 | (self.overflow as u8) << 6 | (self.zero as u8) << 1 | self.carry as u8
    }

    pub fn from_byte(byte: u8) -> Self {
        StatusFlags {
            carry: byte & 0x01 != 0,
            zero: byte & 0x02 != 0,
            negative: byte & 0x80 != 0,
            overflow: byte & 0x40 != 0,
        }
    }
}

pub struct VirtualMachine {
    program: Rc<Vec<LoadedInstruction>>,
    labels: HashMap<String, usize>,
    addresses: BTreeMap<String, u32>,
    registers: Vec<u16>,
    fp_registers: Vec<f64>,
    memory: Memory,
    flags: StatusFlags,
    call_stack: Vec<CallFrame>,
    value_stack: Vec<StackValue>,
    pc: usize,
    steps: u64,
    halted: bool,
    config: VmConfig,
}

impl VirtualMachine {
    /// Prepare a program for execution. IR assembly chunks are converted on a copy first.
    pub fn load(program: &IrProgram, config: VmConfig) -> VmResult<Self> {
        let mut program = program.clone();
        program
            .convert_ir_asm_chunks()
            .map_err(|e| boxed(MalformedProgramError::new(format!("invalid IR assembly: {}", e))))?;
        let loaded = loader::load(&program, config.memory_size)?;
        Ok(VirtualMachine {
            program: Rc::new(loaded.instructions),
            labels: loaded.labels,
            addresses: loaded.addresses,
            registers: Vec::new(),
            fp_registers: Vec::new(),
            memory: loaded.memory,
            flags: StatusFlags::default(),
            call_stack: Vec::new(),
            value_stack: Vec::new(),
            pc: 0,
            steps: 0,
            halted: false,
            config,
        })
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    pub fn value_stack(&self) -> &[StackValue] {
        &self.value_stack
    }

    /// Full 16-bit content of an integer register; unused registers read as 0.
    pub fn register(&self, reg: u32) -> u16 {
        self.registers.get(reg as usize).copied().unwrap_or(0)
    }

    pub fn fp_register(&self, reg: u32) -> f64 {
        self.fp_registers.get(reg as usize).copied().unwrap_or(0.0)
    }

    pub fn set_register(&mut self, reg: u32, value: u16) {
        let idx = reg as usize;
        if idx >= self.registers.len() {
            self.registers.resize(idx + 1, 0);
        }
        self.registers[idx] = value;
    }

    pub fn set_fp_register(&mut self, reg: u32, value: f64) {
        let idx = reg as usize;
        if idx >= self.fp_registers.len() {
            self.fp_registers.resize(idx + 1, 0.0);
        }
        self.fp_registers[idx] = value;
    }

    /// Memory address a data symbol was placed at.
    pub fn address_of(&self, symbol: &str) -> Option<u32> {
        self.addresses.get(symbol).copied()
    }

    /// Instruction index a code label resolved to.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Labels sitting at each instruction index, sorted by name.
    pub fn labels_by_index(&self) -> BTreeMap<usize, Vec<&str>> {
        let mut out: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for (label, &index) in &self.labels {
            out.entry(index).or_default().push(label.as_str());
        }
        for labels in out.values_mut() {
            labels.sort_unstable();
        }
        out
    }

    /// The flattened instruction stream.
    pub fn instructions(&self) -> impl Iterator<Item = &IrInstruction> {
        self.program.iter().map(|loaded| &loaded.ins)
    }

    pub fn instruction_count(&self) -> usize {
        self.program.len()
    }

    /// Execute one instruction. A halted machine stays halted.
    pub fn step(&mut self) -> VmResult<()> {
        if self.halted {
            return Ok(());
        }
        let program = Rc::clone(&self.program);
        let Some(current) = program.get(self.pc) else {
            debug!("ran off the end of the program at pc {}", self.pc);
            self.halted = true;
            return Ok(());
        };
        trace!("[{:>6}] {:>5}: {}", self.steps, self.pc, current.ins);
        self.execute(current)?;
        self.steps += 1;
        Ok(())
    }

    /// Run until the outermost return or the end of the stream.
    pub fn run(&mut self) -> VmResult<()> {
        while !self.halted {
            if let Some(limit) = self.config.max_steps {
                if self.steps >= limit {
                    return Err(boxed(
                        MalformedProgramError::new(format!("step limit of {} exceeded", limit)).at(self.pc),
                    ));
                }
            }
            self.step()?;
        }
        debug!("halted at pc {} after {} steps", self.pc, self.steps);
        Ok(())
    }

    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot::capture(self)
    }
}
