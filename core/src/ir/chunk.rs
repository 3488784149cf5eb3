//! file: core/src/ir/chunk.rs
//! description: code chunks and their three kinds.

use crate::ir::instruction::IrInstruction;

/// External file window an inline binary chunk was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySource {
    pub file: String,
    pub offset: u32,
    /// `None` reads to the end of the file.
    pub length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkKind {
    Code(Vec<IrInstruction>),
    /// Opaque assembly text; `is_ir` marks text written in IR instruction syntax.
    InlineAsm { assembly: String, is_ir: bool },
    InlineBinary { data: Vec<u8>, source: Option<BinarySource> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrChunk {
    pub label: Option<String>,
    pub kind: ChunkKind,
    /// Index of the fall-through successor in the owning chunk list, set by linking.
    pub next: Option<usize>,
}

impl IrChunk {
    pub fn code(label: Option<String>) -> Self {
        IrChunk {
            label,
            kind: ChunkKind::Code(Vec::new()),
            next: None,
        }
    }

    pub fn code_with(label: Option<String>, instructions: Vec<IrInstruction>) -> Self {
        IrChunk {
            label,
            kind: ChunkKind::Code(instructions),
            next: None,
        }
    }

    pub fn inline_asm(label: Option<String>, assembly: impl Into<String>, is_ir: bool) -> Self {
        IrChunk {
            label,
            kind: ChunkKind::InlineAsm {
                assembly: assembly.into(),
                is_ir,
            },
            next: None,
        }
    }

    pub fn inline_binary(label: Option<String>, data: Vec<u8>, source: Option<BinarySource>) -> Self {
        IrChunk {
            label,
            kind: ChunkKind::InlineBinary { data, source },
            next: None,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self.kind, ChunkKind::Code(_))
    }

    /// A code chunk without instructions. Assembly and binary chunks are never empty here.
    pub fn is_empty_code(&self) -> bool {
        matches!(&self.kind, ChunkKind::Code(instructions) if instructions.is_empty())
    }

    /// Instructions of a code chunk; empty for the other kinds.
    pub fn instructions(&self) -> &[IrInstruction] {
        match &self.kind {
            ChunkKind::Code(instructions) => instructions,
            _ => &[],
        }
    }

    pub fn instructions_mut(&mut self) -> Option<&mut Vec<IrInstruction>> {
        match &mut self.kind {
            ChunkKind::Code(instructions) => Some(instructions),
            _ => None,
        }
    }

    pub fn push(&mut self, instruction: IrInstruction) {
        match &mut self.kind {
            ChunkKind::Code(instructions) => instructions.push(instruction),
            _ => panic!("cannot add instructions to a non-code chunk"),
        }
    }

    pub fn last_instruction(&self) -> Option<&IrInstruction> {
        self.instructions().last()
    }

    /// Whether execution can run off the end of this chunk into the next one.
    pub fn falls_through(&self) -> bool {
        !matches!(self.last_instruction(), Some(last) if last.opcode().is_unconditional_jump())
    }
}
