//! file: core/src/ir/lower/mod.rs
//! description: turns a typed source tree into an IR program.
//!
//! Lowering makes two passes. The first walks every block and collects the
//! declarations into the symbol table, together with the calling convention
//! of each subroutine, so call sites can be lowered before their callee. The
//! second pass builds one `IrBlock` per block node, lowering every
//! subroutine body through a `FunctionBuilder`.
//!
//! The front end hands over a checked tree. Anything that breaks that
//! contract (an unknown builtin, an unbalanced RPN sequence, a duplicate
//! symbol) is a compiler defect and panics. Problems with the user's input
//! that only show up here, such as an included binary file that cannot be
//! read, are collected and returned together.

mod builtins;
mod function_builder;
mod lower_expr;
mod lower_stmt;
mod lowering_context;

use log::{debug, info};

use crate::ast::{NodeId, NodeKind, PtProgram};
use crate::error::{LowbyteErrorExt, boxed};
use crate::ir::chunk::IrChunk;
use crate::ir::instruction::ins;
use crate::ir::opcode::Opcode;
use crate::ir::opt;
use crate::ir::options::CompilationOptions;
use crate::ir::program::{BlockItem, IrAsmSubroutine, IrBlock, IrParameter, IrProgram, IrSubroutine};
use crate::ir::symbols::{DuplicateSymbol, IrSymbolTable, MemoryMappedVariable, StaticVariable, VariableInit};
use crate::types::{DataType, IrDataType};

pub use function_builder::{ExprResult, FunctionBuilder};
pub use lowering_context::LoweringContext;

use lower_stmt::read_binary;
use lowering_context::CallTarget;

/// Lower a whole program, optimize it when requested and link its chunks.
pub fn lower_program(tree: &PtProgram, options: CompilationOptions) -> Result<IrProgram, Vec<Box<dyn LowbyteErrorExt>>> {
    let mut ctx = LoweringContext::new(IrSymbolTable::new());
    for &block in tree.blocks() {
        collect_declarations(tree, &mut ctx, block);
    }

    let global_inits = if options.dont_reinit_globals {
        IrChunk::code(None)
    } else {
        build_global_inits(&mut ctx)
    };
    let blocks: Vec<IrBlock> = tree.blocks().iter().map(|&block| lower_block(tree, &mut ctx, block)).collect();
    let diagnostics = ctx.take_diagnostics();
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let registers = (ctx.int_registers_used(), ctx.fp_registers_used());
    let optimize = options.optimize;
    let mut program = IrProgram::new(tree.name.clone(), options, ctx.symbols);
    program.global_inits = global_inits;
    program.blocks = blocks;

    if optimize {
        opt::optimize_program(&mut program);
    }
    program.link_chunks();

    info!(
        "lowered program '{}': {} blocks, {} instructions, {} integer and {} float registers",
        program.name,
        program.blocks.len(),
        program.instruction_count(),
        registers.0,
        registers.1
    );
    Ok(program)
}

/// Strings and arrays are passed by address.
fn param_type(dt: DataType) -> DataType {
    if dt.is_pass_by_reference() { DataType::UWord } else { dt }
}

fn declare(result: Result<(), DuplicateSymbol>) {
    if let Err(e) = result {
        panic!("{}", e);
    }
}

fn collect_declarations(tree: &PtProgram, ctx: &mut LoweringContext, id: NodeId) {
    match tree.kind(id) {
        NodeKind::Variable {
            name,
            dt,
            length,
            init,
            zp_wish,
            align,
        } => {
            let mut var = StaticVariable::new(name.clone(), *dt)
                .with_zp_wish(*zp_wish)
                .with_align(*align);
            if let Some(length) = length {
                var = var.with_length(*length);
            }
            if let Some(init) = init {
                var = var.with_init(init.clone());
            }
            declare(ctx.symbols.add_variable(var));
        }
        NodeKind::MemMapped {
            name,
            dt,
            address,
            length,
        } => declare(ctx.symbols.add_memory_mapped(MemoryMappedVariable {
            name: name.clone(),
            dt: *dt,
            address: *address,
            length: *length,
        })),
        NodeKind::Sub {
            name,
            params,
            return_type,
            ..
        } => {
            let params: Vec<(String, DataType)> =
                params.iter().map(|(param, dt)| (param.clone(), param_type(*dt))).collect();
            for (param, dt) in &params {
                if !ctx.symbols.contains(param) {
                    declare(ctx.symbols.add_variable(StaticVariable::new(param.clone(), *dt)));
                }
            }
            ctx.call_targets.insert(
                name.clone(),
                CallTarget::Sub {
                    params,
                    return_type: return_type.map(param_type),
                },
            );
        }
        NodeKind::AsmSub {
            name, params, returns, ..
        } => {
            ctx.call_targets.insert(
                name.clone(),
                CallTarget::AsmSub {
                    params: params.clone(),
                    returns: returns.clone(),
                },
            );
        }
        _ => {}
    }
    for child in tree.kind(id).children() {
        collect_declarations(tree, ctx, child);
    }
}

/// Re-initialization of every scalar variable with an initial value.
fn build_global_inits(ctx: &mut LoweringContext) -> IrChunk {
    let scalars: Vec<(String, DataType, f64)> = ctx
        .symbols
        .variables()
        .filter_map(|var| match var.init {
            Some(VariableInit::Scalar(value)) if !var.dt.is_pass_by_reference() => {
                Some((var.name.clone(), var.dt, value))
            }
            _ => None,
        })
        .collect();

    let mut chunk = IrChunk::code(None);
    for (name, dt, value) in scalars {
        let irdt = dt.ir_type();
        if value == 0.0 {
            chunk.push(ins(Opcode::Storezm).typed(irdt).label(name).finish());
        } else if irdt == IrDataType::Float {
            let fr = ctx.next_reg(irdt);
            chunk.push(ins(Opcode::Load).typed(irdt).fr1(fr).fimm(value).finish());
            chunk.push(ins(Opcode::Storem).typed(irdt).fr1(fr).label(name).finish());
        } else {
            let reg = ctx.next_reg(irdt);
            chunk.push(ins(Opcode::Load).typed(irdt).r1(reg).imm(value as i32).finish());
            chunk.push(ins(Opcode::Storem).typed(irdt).r1(reg).label(name).finish());
        }
    }
    chunk
}

fn lower_block(tree: &PtProgram, ctx: &mut LoweringContext, id: NodeId) -> IrBlock {
    let NodeKind::Block {
        name,
        library,
        options,
        children,
    } = tree.kind(id)
    else {
        panic!("top-level {} node at {} is not a block", tree.kind(id), tree.position(id));
    };
    let mut block = IrBlock::new(name.clone(), tree.position(id).clone());
    block.library = *library;
    block.options = options.clone();

    // a label statement names whatever comes after it
    let mut pending_label: Option<String> = None;
    fn flush(pending: &mut Option<String>, items: &mut Vec<BlockItem>) {
        if let Some(label) = pending.take() {
            items.push(BlockItem::Chunk(IrChunk::code(Some(label))));
        }
    }

    for &child in children {
        match tree.kind(child) {
            NodeKind::Sub { .. } => {
                flush(&mut pending_label, &mut block.children);
                lower_sub(tree, ctx, child, &mut block.children);
            }
            NodeKind::AsmSub {
                name,
                address,
                clobbers,
                params,
                returns,
                assembly,
            } => {
                flush(&mut pending_label, &mut block.children);
                block.children.push(BlockItem::AsmSub(IrAsmSubroutine {
                    label: name.clone(),
                    address: *address,
                    clobbers: clobbers.clone(),
                    parameters: params.clone(),
                    returns: returns.clone(),
                    position: tree.position(child).clone(),
                    asm_chunk: IrChunk::inline_asm(None, assembly.clone(), false),
                }));
            }
            NodeKind::InlineAssembly { assembly, is_ir } => {
                let chunk = IrChunk::inline_asm(pending_label.take(), assembly.clone(), *is_ir);
                block.children.push(BlockItem::Chunk(chunk));
            }
            NodeKind::InlineBinary { source } => match read_binary(source) {
                Ok(data) => {
                    let chunk = IrChunk::inline_binary(pending_label.take(), data, Some(source.clone()));
                    block.children.push(BlockItem::Chunk(chunk));
                }
                Err(e) => ctx.report(boxed(e.at(tree.position(child).clone()))),
            },
            NodeKind::Label { name } => {
                flush(&mut pending_label, &mut block.children);
                pending_label = Some(name.clone());
            }
            NodeKind::Variable { .. } | NodeKind::MemMapped { .. } => {}
            other => panic!("{} cannot appear at block level ({})", other, tree.position(child)),
        }
    }
    flush(&mut pending_label, &mut block.children);
    block
}

/// Lower a subroutine; nested subroutines follow it as siblings in the block.
fn lower_sub(tree: &PtProgram, ctx: &mut LoweringContext, id: NodeId, items: &mut Vec<BlockItem>) {
    let NodeKind::Sub {
        name,
        params,
        return_type,
        body,
    } = tree.kind(id)
    else {
        panic!("{} at {} is not a subroutine", tree.kind(id), tree.position(id));
    };

    let mut builder = FunctionBuilder::new(ctx, tree, name.clone());
    builder.lower_statements(body);
    let chunks = builder.finish();
    debug!("lowered subroutine {} into {} chunks", name, chunks.len());

    items.push(BlockItem::Sub(IrSubroutine {
        label: name.clone(),
        parameters: params
            .iter()
            .map(|(param, dt)| IrParameter {
                name: param.clone(),
                dt: param_type(*dt),
            })
            .collect(),
        return_type: return_type.map(param_type),
        position: tree.position(id).clone(),
        chunks,
    }));

    for &child in body {
        if matches!(tree.kind(child), NodeKind::Sub { .. }) {
            lower_sub(tree, ctx, child, items);
        }
    }
}
