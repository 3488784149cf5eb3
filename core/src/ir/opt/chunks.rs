//! file: core/src/ir/opt/chunks.rs
//! description: chunk-level cleanup passes, empty-chunk removal and fall-through joining.
use crate::ir::chunk::{ChunkKind, IrChunk};

/// Drop empty code chunks, moving a label onto the next chunk where possible.
///
/// A labeled empty chunk survives only when the chunk after it carries a
/// different label, or when it is the last chunk of the list; something may
/// still jump to it.
pub(crate) fn remove_empty_chunks(chunks: &mut Vec<IrChunk>) -> usize {
    let mut removed = 0;
    let mut idx = 0;
    while idx < chunks.len() {
        if !chunks[idx].is_empty_code() {
            idx += 1;
            continue;
        }
        let Some(label) = chunks[idx].label.clone() else {
            chunks.remove(idx);
            removed += 1;
            continue;
        };
        match chunks.get_mut(idx + 1) {
            Some(next) if next.label.is_none() => {
                next.label = Some(label);
                chunks.remove(idx);
                removed += 1;
            }
            Some(next) if next.label.as_deref() == Some(label.as_str()) => {
                chunks.remove(idx);
                removed += 1;
            }
            _ => idx += 1,
        }
    }
    removed
}

/// Absorb every unlabeled code chunk into the code chunk before it when execution falls through.
pub(crate) fn join_chunks(chunks: &mut Vec<IrChunk>) -> usize {
    let mut joined = 0;
    let mut idx = chunks.len();
    while idx > 1 {
        idx -= 1;
        let (a, b) = (&chunks[idx - 1], &chunks[idx]);
        if !(a.is_code() && b.is_code() && b.label.is_none() && a.falls_through()) {
            continue;
        }
        let b = chunks.remove(idx);
        let a = &mut chunks[idx - 1];
        if let (ChunkKind::Code(into), ChunkKind::Code(from)) = (&mut a.kind, b.kind) {
            into.extend(from);
        }
        a.next = b.next;
        joined += 1;
    }
    joined
}
