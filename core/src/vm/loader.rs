//! file: core/src/vm/loader.rs
//! description: flattens a linked IR program into one instruction stream and lays out its memory.
//!
//! The stream starts with the global initializations, optionally followed by
//! a `jump main.start`, and then holds every block item in order. Chunk and
//! subroutine labels become instruction indices. Static variables get
//! addresses from 0 upwards in name order, slabs follow them, and memory
//! mapped variables keep their fixed address. Every label operand is
//! resolved here, so execution never looks up a name.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::error::{LowbyteErrorExt, MalformedProgramError, UnsupportedOperationError, boxed};
use crate::ir::chunk::{ChunkKind, IrChunk};
use crate::ir::instruction::{IrInstruction, ins};
use crate::ir::opcode::Opcode;
use crate::ir::program::{BlockItem, ENTRY_LABEL, IrProgram};
use crate::ir::symbols::{ArrayElement, StaticVariable, VariableInit};
use crate::ir::textual::parse_int;
use crate::types::{DataType, mem_size};
use crate::vm::memory::Memory;

type LoadResult<T> = Result<T, Box<dyn LowbyteErrorExt>>;

/// Where a label or address operand points once the program is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    /// Instruction index in the flattened stream.
    Code(usize),
    /// Byte address in VM memory.
    Data(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LoadedInstruction {
    pub ins: IrInstruction,
    pub target: Option<Target>,
}

#[derive(Debug)]
pub(crate) struct LoadedProgram {
    pub instructions: Vec<LoadedInstruction>,
    pub labels: HashMap<String, usize>,
    pub addresses: BTreeMap<String, u32>,
    pub memory: Memory,
}

fn malformed(message: String) -> Box<dyn LowbyteErrorExt> {
    boxed(MalformedProgramError::new(message))
}

#[derive(Default)]
struct Flattener {
    instructions: Vec<IrInstruction>,
    labels: HashMap<String, usize>,
}

impl Flattener {
    fn define(&mut self, label: &str) -> LoadResult<()> {
        let here = self.instructions.len();
        match self.labels.get(label) {
            Some(&existing) if existing != here => Err(malformed(format!("label '{}' is defined twice", label))),
            Some(_) => Ok(()),
            None => {
                self.labels.insert(label.to_string(), here);
                Ok(())
            }
        }
    }

    fn chunk(&mut self, chunk: &IrChunk) -> LoadResult<()> {
        if let Some(label) = &chunk.label {
            self.define(label)?;
        }
        match &chunk.kind {
            ChunkKind::Code(instructions) => self.instructions.extend(instructions.iter().cloned()),
            ChunkKind::InlineBinary { data, .. } => {
                self.instructions.push(ins(Opcode::BinaryData).bytes(data.clone()).finish());
            }
            ChunkKind::InlineAsm { .. } => {
                let at = chunk.label.as_deref().unwrap_or("<unlabeled>");
                return Err(boxed(UnsupportedOperationError::new(format!("inline assembly at {}", at))));
            }
        }
        Ok(())
    }

    fn program_items(&mut self, program: &IrProgram) -> LoadResult<()> {
        for block in &program.blocks {
            for item in &block.children {
                match item {
                    BlockItem::Sub(sub) => {
                        self.define(&sub.label)?;
                        for chunk in &sub.chunks {
                            self.chunk(chunk)?;
                        }
                    }
                    BlockItem::AsmSub(asmsub) => {
                        return Err(boxed(UnsupportedOperationError::new(format!(
                            "machine-bound subroutine {}",
                            asmsub.label
                        ))));
                    }
                    BlockItem::Chunk(chunk) => self.chunk(chunk)?,
                }
            }
        }
        Ok(())
    }
}

fn align_up(address: u32, align: u32) -> u32 {
    if align > 1 { address.div_ceil(align) * align } else { address }
}

fn allocate(program: &IrProgram, memory_size: usize) -> LoadResult<BTreeMap<String, u32>> {
    let mut addresses = BTreeMap::new();
    let mut next = 0u32;
    for var in program.symbols.variables() {
        next = align_up(next, var.align);
        addresses.insert(var.name.clone(), next);
        if var.dt.is_split_array() {
            let length = var.length.unwrap_or(0);
            addresses.insert(format!("{}_lsb", var.name), next);
            addresses.insert(format!("{}_msb", var.name), next + length);
        }
        next += var.mem_size().max(1);
    }
    for slab in program.symbols.slabs() {
        next = align_up(next, slab.align);
        addresses.insert(slab.name.clone(), next);
        next += slab.size.max(1);
    }
    if next as usize > memory_size {
        return Err(malformed(format!(
            "static data needs {} bytes but the machine has {}",
            next, memory_size
        )));
    }
    for var in program.symbols.memory_mapped() {
        addresses.insert(var.name.clone(), var.address);
    }
    for (name, value) in program.symbols.asm_symbols() {
        if let Some(address) = parse_int(value).and_then(|v| u32::try_from(v).ok()) {
            addresses.insert(name.to_string(), address);
        }
    }
    Ok(addresses)
}

fn resolve(name: &str, addresses: &BTreeMap<String, u32>, labels: &HashMap<String, usize>) -> Option<u32> {
    addresses
        .get(name)
        .copied()
        .or_else(|| labels.get(name).map(|&index| index as u32))
}

fn write_element(memory: &mut Memory, dt: DataType, address: u32, value: f64) -> LoadResult<()> {
    let written = match dt {
        DataType::Float => memory.write_float(address, value),
        _ if dt.is_word() => memory.write_word(address, value as i64 as u16),
        _ => memory.write_byte(address, value as i64 as u8),
    };
    written.map_err(boxed)
}

fn initialize(
    memory: &mut Memory,
    var: &StaticVariable,
    address: u32,
    addresses: &BTreeMap<String, u32>,
    labels: &HashMap<String, usize>,
) -> LoadResult<()> {
    let Some(init) = &var.init else {
        return Ok(());
    };
    match init {
        VariableInit::Scalar(value) => write_element(memory, var.dt, address, *value),
        VariableInit::Array(elements) => {
            let element = var.dt.element_type().unwrap_or(DataType::UByte);
            let size = mem_size(element, None);
            let length = var.length.unwrap_or(elements.len() as u32);
            for (i, value) in elements.iter().enumerate() {
                let value = match value {
                    ArrayElement::Number(n) => *n,
                    ArrayElement::AddressOf(name) => resolve(name, addresses, labels)
                        .ok_or_else(|| malformed(format!("unresolved address-of '{}' in {}", name, var.name)))?
                        as f64,
                };
                let i = i as u32;
                if var.dt.is_split_array() {
                    let word = value as i64 as u16;
                    memory.write_byte(address + i, word as u8).map_err(boxed)?;
                    memory.write_byte(address + length + i, (word >> 8) as u8).map_err(boxed)?;
                } else {
                    write_element(memory, element, address + i * size, value)?;
                }
            }
            Ok(())
        }
    }
}

/// Flatten, allocate and resolve. The program must already have its IR assembly converted.
pub(crate) fn load(program: &IrProgram, memory_size: usize) -> LoadResult<LoadedProgram> {
    let mut body = Flattener::default();
    body.program_items(program)?;

    let mut prefix = Flattener::default();
    prefix.chunk(&program.global_inits)?;
    if matches!(body.labels.get(ENTRY_LABEL), Some(&index) if index != 0) {
        prefix.instructions.push(ins(Opcode::Jump).label(ENTRY_LABEL).finish());
    }

    let offset = prefix.instructions.len();
    let mut labels = prefix.labels;
    for (label, index) in body.labels {
        labels.insert(label, index + offset);
    }
    let mut stream = prefix.instructions;
    stream.extend(body.instructions);

    let addresses = allocate(program, memory_size)?;
    let mut memory = Memory::new(memory_size);
    for var in program.symbols.variables() {
        if let Some(&address) = addresses.get(&var.name) {
            initialize(&mut memory, var, address, &addresses, &labels)?;
        }
    }

    let mut instructions = Vec::with_capacity(stream.len());
    for ins in stream {
        let target = match (ins.label(), ins.address()) {
            (Some(label), _) if ins.opcode().needs_target() => {
                let index = labels
                    .get(label)
                    .and_then(|&index| index.checked_add_signed(ins.label_offset().unwrap_or(0) as isize))
                    .ok_or_else(|| malformed(format!("unresolved jump target '{}' in `{}`", label, ins)))?;
                Some(Target::Code(index))
            }
            (Some(label), _) => {
                let address = resolve(label, &addresses, &labels)
                    .ok_or_else(|| malformed(format!("unresolved symbol '{}' in `{}`", label, ins)))?;
                Some(Target::Data(address.wrapping_add_signed(ins.label_offset().unwrap_or(0))))
            }
            (None, Some(address)) => Some(Target::Data(address)),
            (None, None) => None,
        };
        instructions.push(LoadedInstruction { ins, target });
    }

    debug!(
        "loaded '{}': {} instructions, {} labels, {} data symbols",
        program.name,
        instructions.len(),
        labels.len(),
        addresses.len()
    );
    Ok(LoadedProgram {
        instructions,
        labels,
        addresses,
        memory,
    })
}
