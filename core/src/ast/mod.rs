//! file: core/src/ast/mod.rs
//! description: the fully typed source tree consumed by the IR builder.

pub mod expr;
pub mod kind;
pub mod rpn;
pub mod tree;

pub use kind::{BinaryOperator, NodeKind, PrefixOperator, RpnItem};
pub use rpn::{RpnDepth, rpn_max_depth};
pub use tree::{Node, NodeId, PtProgram};
