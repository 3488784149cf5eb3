//! file: core/src/ir/opt/mod.rs
//! description: peephole optimizer driver.
//!
//! Each subroutine's chunk list is optimized on its own: empty chunks are
//! removed, fall-through chunks are joined and the instruction-window rules
//! run, over and over until a whole round changes nothing. Linking happens
//! afterwards, once for the whole program.
mod chunks;
mod peephole;

use log::debug;

use crate::ir::chunk::IrChunk;
use crate::ir::program::IrProgram;

/// Optimize every subroutine of the program and relink it. Returns the number of rewrites.
pub fn optimize_program(program: &mut IrProgram) -> usize {
    let mut total = 0;
    for sub in program.subroutines_mut() {
        let changes = optimize_chunks(&mut sub.chunks);
        if changes > 0 {
            debug!("optimized {}: {} changes, {} chunks left", sub.label, changes, sub.chunks.len());
        }
        total += changes;
    }
    program.link_chunks();
    debug!("optimizer made {} changes in total", total);
    total
}

/// Run the chunk and instruction passes over one subroutine's chunks until a fixed point.
pub fn optimize_chunks(chunks: &mut Vec<IrChunk>) -> usize {
    let mut total = 0;
    loop {
        let round = chunks::remove_empty_chunks(chunks)
            + chunks::join_chunks(chunks)
            + peephole::optimize_instructions(chunks);
        if round == 0 {
            return total;
        }
        total += round;
    }
}
