//! file: core/src/ir/lower/function_builder.rs
//! description: per-subroutine chunk builder used while lowering a body.

use crate::ast::PtProgram;
use crate::ir::chunk::IrChunk;
use crate::ir::instruction::{IrInstruction, ins};
use crate::ir::opcode::Opcode;
use crate::ir::lower::lowering_context::LoweringContext;
use crate::types::IrDataType;

/// Where an evaluated expression left its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprResult {
    Reg(IrDataType, u32),
    FpReg(u32),
    Void,
}

impl ExprResult {
    pub fn reg(self) -> u32 {
        match self {
            ExprResult::Reg(_, reg) => reg,
            other => panic!("expected an integer register result, got {:?}", other),
        }
    }

    pub fn fp_reg(self) -> u32 {
        match self {
            ExprResult::FpReg(reg) => reg,
            other => panic!("expected a float register result, got {:?}", other),
        }
    }

    pub fn ir_type(self) -> Option<IrDataType> {
        match self {
            ExprResult::Reg(dt, _) => Some(dt),
            ExprResult::FpReg(_) => Some(IrDataType::Float),
            ExprResult::Void => None,
        }
    }
}

/// Collects the chunks of one subroutine.
///
/// The first chunk carries the subroutine's own label. Instructions go into
/// the last chunk; a new unlabeled chunk is opened only when the last one is
/// an inline assembly or binary chunk, so an unlabeled chunk is never empty.
pub struct FunctionBuilder<'a> {
    pub ctx: &'a mut LoweringContext,
    pub tree: &'a PtProgram,
    pub sub_name: String,
    chunks: Vec<IrChunk>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(ctx: &'a mut LoweringContext, tree: &'a PtProgram, sub_name: impl Into<String>) -> Self {
        let sub_name = sub_name.into();
        FunctionBuilder {
            ctx,
            tree,
            chunks: vec![IrChunk::code(Some(sub_name.clone()))],
            sub_name,
        }
    }

    pub fn emit(&mut self, instruction: IrInstruction) {
        let needs_chunk = !matches!(self.chunks.last(), Some(chunk) if chunk.is_code());
        if needs_chunk {
            self.chunks.push(IrChunk::code(None));
        }
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.push(instruction);
        }
    }

    /// Open a new chunk under `label`; the following instructions go there.
    pub fn label(&mut self, label: impl Into<String>) {
        self.chunks.push(IrChunk::code(Some(label.into())));
    }

    pub fn push_chunk(&mut self, chunk: IrChunk) {
        self.chunks.push(chunk);
    }

    pub fn new_label(&mut self, hint: &str) -> String {
        self.ctx.create_label(&self.sub_name, hint)
    }

    pub fn reg(&mut self, dt: IrDataType) -> u32 {
        self.ctx.next_reg(dt)
    }

    pub fn fp_reg(&mut self) -> u32 {
        self.ctx.next_reg(IrDataType::Float)
    }

    /// Whether the code emitted so far ends in a jump or return.
    pub fn ends_with_transfer(&self) -> bool {
        match self.chunks.last() {
            Some(chunk) if chunk.is_code() => {
                matches!(chunk.last_instruction(), Some(last) if last.opcode().is_unconditional_jump())
            }
            _ => false,
        }
    }

    /// Close the body with a `return` when it can run off its end.
    pub fn finish(mut self) -> Vec<IrChunk> {
        if !self.ends_with_transfer() {
            self.emit(ins(Opcode::Return).finish());
        }
        self.chunks
    }
}
