//! file: core/src/ast/kind.rs
//! description: node kind definitions and operator enums of the typed tree.
//!
//! Defines `NodeKind` along with `BinaryOperator`, `PrefixOperator` and the
//! RPN item type. Every identifier is already resolved to its scoped name
//! and every expression node already carries its final datatype.

use crate::ast::tree::NodeId;
use crate::ir::chunk::BinarySource;
use crate::ir::program::{BlockOptions, IrAsmParameter, RegisterOrFlag};
use crate::ir::symbols::VariableInit;
use crate::types::{DataType, ZeropageWish};

/// Binary operators of the typed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,    // +
    Sub,    // -
    Mul,    // *
    Div,    // /
    Mod,    // %
    BitAnd, // &
    BitOr,  // |
    BitXor, // ^
    Shl,    // <<
    Shr,    // >>
    Eq,     // ==
    Ne,     // !=
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
    And,    // and (short-circuit)
    Or,     // or (short-circuit)
    Xor,    // xor (logical)
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor)
    }
}

/// Prefix operators of the typed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    Minus,  // -
    Invert, // ~
    Not,    // not
    Plus,   // +
}

/// One element of a flattened stack-machine expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RpnItem {
    Operand(NodeId),
    Operator {
        op: BinaryOperator,
        result: DataType,
        operand1: DataType,
        operand2: DataType,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // declarations
    Block {
        name: String,
        library: bool,
        options: BlockOptions,
        children: Vec<NodeId>,
    },
    Sub {
        name: String,
        params: Vec<(String, DataType)>,
        return_type: Option<DataType>,
        body: Vec<NodeId>,
    },
    AsmSub {
        name: String,
        address: Option<u32>,
        clobbers: Vec<RegisterOrFlag>,
        params: Vec<IrAsmParameter>,
        returns: Vec<IrAsmParameter>,
        assembly: String,
    },
    Variable {
        name: String,
        dt: DataType,
        length: Option<u32>,
        init: Option<VariableInit>,
        zp_wish: ZeropageWish,
        align: u32,
    },
    MemMapped {
        name: String,
        dt: DataType,
        address: u32,
        length: Option<u32>,
    },

    // statements
    Assignment {
        target: NodeId,
        value: NodeId,
    },
    AugmentedAssignment {
        target: NodeId,
        op: BinaryOperator,
        value: NodeId,
    },
    If {
        condition: NodeId,
        then_branch: Vec<NodeId>,
        else_branch: Vec<NodeId>,
    },
    While {
        condition: NodeId,
        body: Vec<NodeId>,
    },
    /// `None` repeats forever.
    Repeat {
        count: Option<NodeId>,
        body: Vec<NodeId>,
    },
    For {
        variable: NodeId,
        from: NodeId,
        to: NodeId,
        step: i32,
        body: Vec<NodeId>,
    },
    Label {
        name: String,
    },
    Jump {
        target: String,
    },
    Return {
        value: Option<NodeId>,
    },
    InlineAssembly {
        assembly: String,
        is_ir: bool,
    },
    InlineBinary {
        source: BinarySource,
    },

    // expressions
    Number {
        value: f64,
    },
    StringLiteral {
        value: String,
        label: String,
    },
    Identifier {
        name: String,
    },
    AddressOf {
        name: String,
    },
    MemoryByte {
        address: NodeId,
    },
    ArrayIndexer {
        name: String,
        split: bool,
        index: NodeId,
    },
    Prefix {
        op: PrefixOperator,
        operand: NodeId,
    },
    Typecast {
        operand: NodeId,
    },
    Binary {
        left: NodeId,
        op: BinaryOperator,
        right: NodeId,
    },
    Rpn {
        items: Vec<RpnItem>,
    },
    BuiltinCall {
        name: String,
        args: Vec<NodeId>,
    },
    FunctionCall {
        target: String,
        args: Vec<NodeId>,
    },
}

impl NodeKind {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Number { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::Identifier { .. }
                | NodeKind::AddressOf { .. }
                | NodeKind::MemoryByte { .. }
                | NodeKind::ArrayIndexer { .. }
                | NodeKind::Prefix { .. }
                | NodeKind::Typecast { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Rpn { .. }
                | NodeKind::BuiltinCall { .. }
                | NodeKind::FunctionCall { .. }
        )
    }

    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Block { children, .. } => children.clone(),
            NodeKind::Sub { body, .. } => body.clone(),
            NodeKind::Assignment { target, value } | NodeKind::AugmentedAssignment { target, value, .. } => {
                vec![*target, *value]
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => std::iter::once(*condition)
                .chain(then_branch.iter().copied())
                .chain(else_branch.iter().copied())
                .collect(),
            NodeKind::While { condition, body } => std::iter::once(*condition).chain(body.iter().copied()).collect(),
            NodeKind::Repeat { count, body } => count.iter().copied().chain(body.iter().copied()).collect(),
            NodeKind::For {
                variable, from, to, body, ..
            } => [*variable, *from, *to].into_iter().chain(body.iter().copied()).collect(),
            NodeKind::Return { value } => value.iter().copied().collect(),
            NodeKind::MemoryByte { address } => vec![*address],
            NodeKind::ArrayIndexer { index, .. } => vec![*index],
            NodeKind::Prefix { operand, .. } | NodeKind::Typecast { operand } => vec![*operand],
            NodeKind::Binary { left, right, .. } => vec![*left, *right],
            NodeKind::Rpn { items } => items
                .iter()
                .filter_map(|item| match item {
                    RpnItem::Operand(id) => Some(*id),
                    RpnItem::Operator { .. } => None,
                })
                .collect(),
            NodeKind::BuiltinCall { args, .. } | NodeKind::FunctionCall { args, .. } => args.clone(),
            NodeKind::AsmSub { .. }
            | NodeKind::Variable { .. }
            | NodeKind::MemMapped { .. }
            | NodeKind::Label { .. }
            | NodeKind::Jump { .. }
            | NodeKind::InlineAssembly { .. }
            | NodeKind::InlineBinary { .. }
            | NodeKind::Number { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::AddressOf { .. } => Vec::new(),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeKind::Block { .. } => "Block",
            NodeKind::Sub { .. } => "Sub",
            NodeKind::AsmSub { .. } => "AsmSub",
            NodeKind::Variable { .. } => "Variable",
            NodeKind::MemMapped { .. } => "MemMapped",
            NodeKind::Assignment { .. } => "Assignment",
            NodeKind::AugmentedAssignment { .. } => "AugmentedAssignment",
            NodeKind::If { .. } => "If",
            NodeKind::While { .. } => "While",
            NodeKind::Repeat { .. } => "Repeat",
            NodeKind::For { .. } => "For",
            NodeKind::Label { .. } => "Label",
            NodeKind::Jump { .. } => "Jump",
            NodeKind::Return { .. } => "Return",
            NodeKind::InlineAssembly { .. } => "InlineAssembly",
            NodeKind::InlineBinary { .. } => "InlineBinary",
            NodeKind::Number { .. } => "Number",
            NodeKind::StringLiteral { .. } => "StringLiteral",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::AddressOf { .. } => "AddressOf",
            NodeKind::MemoryByte { .. } => "MemoryByte",
            NodeKind::ArrayIndexer { .. } => "ArrayIndexer",
            NodeKind::Prefix { .. } => "Prefix",
            NodeKind::Typecast { .. } => "Typecast",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Rpn { .. } => "Rpn",
            NodeKind::BuiltinCall { .. } => "BuiltinCall",
            NodeKind::FunctionCall { .. } => "FunctionCall",
        };
        write!(f, "{}", name)
    }
}
