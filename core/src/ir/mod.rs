//! file: core/src/ir/mod.rs
//! description: the typed register IR, its builder, optimizer and text form.

pub mod chunk;
pub mod instruction;
pub mod lower;
pub mod opcode;
pub mod opt;
pub mod options;
pub mod program;
pub mod symbols;
pub mod syscall;
pub mod textual;

pub use chunk::{BinarySource, ChunkKind, IrChunk};
pub use instruction::{InstructionBuilder, InvalidInstruction, IrInstruction, MAX_REGISTER, ins};
pub use lower::lower_program;
pub use opcode::Opcode;
pub use options::CompilationOptions;
pub use program::{BlockItem, IrAsmSubroutine, IrBlock, IrProgram, IrSubroutine};
pub use symbols::IrSymbolTable;
pub use syscall::Syscall;
