//! file: core/src/ast/expr.rs
//! description: structural queries over expression nodes.

use crate::ast::kind::{NodeKind, RpnItem};
use crate::ast::tree::{NodeId, PtProgram};

/// Builtins whose evaluation has no effect on processor status.
const SIMPLE_BUILTINS: &[&str] = &["msb", "lsb", "peek", "peekw", "mkword", "set_carry", "clear_carry"];

impl PtProgram {
    /// Numeric value of a literal node.
    pub fn const_value(&self, id: NodeId) -> Option<f64> {
        match self.kind(id) {
            NodeKind::Number { value } => Some(*value),
            _ => None,
        }
    }

    /// Integer value of a literal node, truncated.
    pub fn const_int(&self, id: NodeId) -> Option<i32> {
        self.const_value(id).map(|v| v as i32)
    }

    /// Whether evaluating the expression cannot disturb the status flags.
    pub fn is_simple(&self, id: NodeId) -> bool {
        match self.kind(id) {
            NodeKind::Number { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::AddressOf { .. } => true,
            NodeKind::ArrayIndexer { index, .. } => {
                matches!(self.kind(*index), NodeKind::Number { .. } | NodeKind::Identifier { .. })
            }
            NodeKind::MemoryByte { address } => {
                matches!(self.kind(*address), NodeKind::Number { .. } | NodeKind::Identifier { .. })
            }
            NodeKind::Prefix { operand, .. } | NodeKind::Typecast { operand } => self.is_simple(*operand),
            NodeKind::BuiltinCall { name, .. } => SIMPLE_BUILTINS.contains(&name.as_str()),
            _ => false,
        }
    }

    /// Structural equality of two expressions, ignoring node identity and position.
    pub fn is_same_as(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        let same_type = self.dt(a) == self.dt(b);
        match (self.kind(a), self.kind(b)) {
            (NodeKind::Number { value: x }, NodeKind::Number { value: y }) => same_type && x == y,
            (NodeKind::Identifier { name: x }, NodeKind::Identifier { name: y }) => same_type && x == y,
            (NodeKind::AddressOf { name: x }, NodeKind::AddressOf { name: y }) => same_type && x == y,
            (NodeKind::StringLiteral { label: x, .. }, NodeKind::StringLiteral { label: y, .. }) => x == y,
            (NodeKind::MemoryByte { address: x }, NodeKind::MemoryByte { address: y }) => self.is_same_as(*x, *y),
            (
                NodeKind::ArrayIndexer { name: n1, index: i1, .. },
                NodeKind::ArrayIndexer { name: n2, index: i2, .. },
            ) => same_type && n1 == n2 && self.is_same_as(*i1, *i2),
            (NodeKind::Prefix { op: o1, operand: x }, NodeKind::Prefix { op: o2, operand: y }) => {
                same_type && o1 == o2 && self.is_same_as(*x, *y)
            }
            (NodeKind::Typecast { operand: x }, NodeKind::Typecast { operand: y }) => {
                same_type && self.is_same_as(*x, *y)
            }
            (
                NodeKind::Binary { left: l1, op: o1, right: r1 },
                NodeKind::Binary { left: l2, op: o2, right: r2 },
            ) => o1 == o2 && self.is_same_as(*l1, *l2) && self.is_same_as(*r1, *r2),
            (NodeKind::Rpn { items: x }, NodeKind::Rpn { items: y }) => {
                x.len() == y.len()
                    && x.iter().zip(y).all(|pair| match pair {
                        (RpnItem::Operand(p), RpnItem::Operand(q)) => self.is_same_as(*p, *q),
                        (RpnItem::Operator { op: p, .. }, RpnItem::Operator { op: q, .. }) => p == q,
                        _ => false,
                    })
            }
            _ => false,
        }
    }
}
