//! file: core/src/ir/program.rs
//! description: program, block and subroutine structure plus linking and validation.

use std::collections::HashSet;
use std::fmt;

use log::warn;

use crate::ir::chunk::{ChunkKind, IrChunk};
use crate::ir::instruction::{InvalidInstruction, IrInstruction};
use crate::ir::options::CompilationOptions;
use crate::ir::symbols::IrSymbolTable;
use crate::location::Position;
use crate::types::DataType;

/// Label of the subroutine the VM starts in, when present.
pub const ENTRY_LABEL: &str = "main.start";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAlignment {
    None,
    Word,
    Page,
}

impl BlockAlignment {
    pub fn name(self) -> &'static str {
        match self {
            BlockAlignment::None => "NONE",
            BlockAlignment::Word => "WORD",
            BlockAlignment::Page => "PAGE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "NONE" => Some(BlockAlignment::None),
            "WORD" => Some(BlockAlignment::Word),
            "PAGE" => Some(BlockAlignment::Page),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockOptions {
    pub address: Option<u32>,
    pub force_output: bool,
    pub no_symbol_prefixing: bool,
    pub alignment: BlockAlignment,
}

impl Default for BlockOptions {
    fn default() -> Self {
        BlockOptions {
            address: None,
            force_output: false,
            no_symbol_prefixing: false,
            alignment: BlockAlignment::None,
        }
    }
}

/// CPU register or status flag used by a machine-bound subroutine's calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterOrFlag {
    A,
    X,
    Y,
    AX,
    AY,
    XY,
    /// Virtual 16-bit register R0..R15.
    R(u8),
    Carry,
    Zero,
    Negative,
    Overflow,
}

impl RegisterOrFlag {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "A" => Some(RegisterOrFlag::A),
            "X" => Some(RegisterOrFlag::X),
            "Y" => Some(RegisterOrFlag::Y),
            "AX" => Some(RegisterOrFlag::AX),
            "AY" => Some(RegisterOrFlag::AY),
            "XY" => Some(RegisterOrFlag::XY),
            "Pc" => Some(RegisterOrFlag::Carry),
            "Pz" => Some(RegisterOrFlag::Zero),
            "Pn" => Some(RegisterOrFlag::Negative),
            "Pv" => Some(RegisterOrFlag::Overflow),
            _ => {
                let n: u8 = text.strip_prefix('R')?.parse().ok()?;
                (n < 16).then_some(RegisterOrFlag::R(n))
            }
        }
    }
}

impl fmt::Display for RegisterOrFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterOrFlag::A => write!(f, "A"),
            RegisterOrFlag::X => write!(f, "X"),
            RegisterOrFlag::Y => write!(f, "Y"),
            RegisterOrFlag::AX => write!(f, "AX"),
            RegisterOrFlag::AY => write!(f, "AY"),
            RegisterOrFlag::XY => write!(f, "XY"),
            RegisterOrFlag::R(n) => write!(f, "R{}", n),
            RegisterOrFlag::Carry => write!(f, "Pc"),
            RegisterOrFlag::Zero => write!(f, "Pz"),
            RegisterOrFlag::Negative => write!(f, "Pn"),
            RegisterOrFlag::Overflow => write!(f, "Pv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrParameter {
    pub name: String,
    pub dt: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrAsmParameter {
    pub location: RegisterOrFlag,
    pub dt: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrSubroutine {
    pub label: String,
    pub parameters: Vec<IrParameter>,
    pub return_type: Option<DataType>,
    pub position: Position,
    pub chunks: Vec<IrChunk>,
}

/// Subroutine bound to a machine address with a register calling convention.
#[derive(Debug, Clone, PartialEq)]
pub struct IrAsmSubroutine {
    pub label: String,
    pub address: Option<u32>,
    pub clobbers: Vec<RegisterOrFlag>,
    pub parameters: Vec<IrAsmParameter>,
    pub returns: Vec<IrAsmParameter>,
    pub position: Position,
    pub asm_chunk: IrChunk,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Sub(IrSubroutine),
    AsmSub(IrAsmSubroutine),
    Chunk(IrChunk),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrBlock {
    pub name: String,
    pub library: bool,
    pub options: BlockOptions,
    pub position: Position,
    pub children: Vec<BlockItem>,
}

impl IrBlock {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        IrBlock {
            name: name.into(),
            library: false,
            options: BlockOptions::default(),
            position,
            children: Vec::new(),
        }
    }

    pub fn subroutines(&self) -> impl Iterator<Item = &IrSubroutine> {
        self.children.iter().filter_map(|item| match item {
            BlockItem::Sub(sub) => Some(sub),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrProgram {
    pub name: String,
    pub options: CompilationOptions,
    pub symbols: IrSymbolTable,
    pub global_inits: IrChunk,
    pub blocks: Vec<IrBlock>,
}

impl IrProgram {
    pub fn new(name: impl Into<String>, options: CompilationOptions, symbols: IrSymbolTable) -> Self {
        IrProgram {
            name: name.into(),
            options,
            symbols,
            global_inits: IrChunk::code(None),
            blocks: Vec::new(),
        }
    }

    pub fn subroutines(&self) -> impl Iterator<Item = &IrSubroutine> {
        self.blocks.iter().flat_map(|b| b.subroutines())
    }

    pub fn subroutines_mut(&mut self) -> impl Iterator<Item = &mut IrSubroutine> {
        self.blocks.iter_mut().flat_map(|b| {
            b.children.iter_mut().filter_map(|item| match item {
                BlockItem::Sub(sub) => Some(sub),
                _ => None,
            })
        })
    }

    /// Every chunk in the program, global inits first.
    pub fn chunks(&self) -> Vec<&IrChunk> {
        let mut chunks = vec![&self.global_inits];
        for block in &self.blocks {
            for item in &block.children {
                match item {
                    BlockItem::Sub(sub) => chunks.extend(sub.chunks.iter()),
                    BlockItem::AsmSub(asmsub) => chunks.push(&asmsub.asm_chunk),
                    BlockItem::Chunk(chunk) => chunks.push(chunk),
                }
            }
        }
        chunks
    }

    fn chunks_mut(&mut self) -> Vec<&mut IrChunk> {
        let mut chunks = vec![&mut self.global_inits];
        for block in &mut self.blocks {
            for item in &mut block.children {
                match item {
                    BlockItem::Sub(sub) => chunks.extend(sub.chunks.iter_mut()),
                    BlockItem::AsmSub(asmsub) => chunks.push(&mut asmsub.asm_chunk),
                    BlockItem::Chunk(chunk) => chunks.push(chunk),
                }
            }
        }
        chunks
    }

    pub fn instruction_count(&self) -> usize {
        self.chunks().iter().map(|c| c.instructions().len()).sum()
    }

    /// Recompute the fall-through successor of every subroutine chunk.
    pub fn link_chunks(&mut self) {
        for sub in self.subroutines_mut() {
            link_chunk_list(&mut sub.chunks);
        }
    }

    /// Replace inline assembly written in IR syntax by ordinary code chunks.
    pub fn convert_ir_asm_chunks(&mut self) -> Result<(), InvalidInstruction> {
        for chunk in self.chunks_mut() {
            let ChunkKind::InlineAsm { assembly, is_ir: true } = &chunk.kind else {
                continue;
            };
            let mut instructions = Vec::new();
            for line in assembly.lines().map(str::trim) {
                if line.is_empty() || line.starts_with(';') {
                    continue;
                }
                instructions.push(line.parse::<IrInstruction>()?);
            }
            chunk.kind = ChunkKind::Code(instructions);
        }
        self.link_chunks();
        Ok(())
    }

    /// Structural checks: unique labels, no unlabeled empty chunks, every label operand resolves.
    pub fn validate(&self) -> Result<(), String> {
        let mut labels: HashSet<&str> = HashSet::new();
        for block in &self.blocks {
            for item in &block.children {
                let (own, chunks): (Option<&str>, Vec<&IrChunk>) = match item {
                    BlockItem::Sub(sub) => (Some(sub.label.as_str()), sub.chunks.iter().collect()),
                    BlockItem::AsmSub(asmsub) => (Some(asmsub.label.as_str()), vec![&asmsub.asm_chunk]),
                    BlockItem::Chunk(chunk) => (None, vec![chunk]),
                };
                let mut seen_own = false;
                for chunk in chunks {
                    match &chunk.label {
                        Some(label) => {
                            if own == Some(label.as_str()) && !seen_own {
                                seen_own = true;
                            } else if !labels.insert(label.as_str()) {
                                return Err(format!("duplicate label '{}'", label));
                            }
                        }
                        None if chunk.is_empty_code() => {
                            return Err(format!("unlabeled empty chunk in block '{}'", block.name));
                        }
                        None => {}
                    }
                }
                if let Some(own) = own {
                    if !labels.insert(own) {
                        return Err(format!("duplicate label '{}'", own));
                    }
                }
            }
        }

        for chunk in self.chunks() {
            for ins in chunk.instructions() {
                if let Some(label) = ins.label() {
                    if !labels.contains(label) && !self.symbols.resolves_label(label) {
                        return Err(format!("undefined symbol '{}' in `{}`", label, ins));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Link each chunk to the one after it unless it ends in an unconditional transfer.
pub fn link_chunk_list(chunks: &mut [IrChunk]) {
    let count = chunks.len();
    for (idx, chunk) in chunks.iter_mut().enumerate() {
        chunk.next = (idx + 1 < count && chunk.falls_through()).then_some(idx + 1);
    }
    if let Some(last) = chunks.last() {
        if last.is_code() && last.falls_through() && !last.is_empty_code() {
            warn!("chunk {:?} falls off the end of its subroutine", last.label);
        }
    }
}
