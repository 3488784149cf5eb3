//! file: core/src/ast/tree.rs
//! description: arena of typed tree nodes with a parent lookup table.
//!
//! Nodes are addressed by `NodeId`. Parents are kept in a side table that is
//! updated whenever a node is added or its kind is replaced, so passes that
//! swap out subtrees only reassign indices.

use crate::ast::kind::NodeKind;
use crate::location::Position;
use crate::types::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Final datatype of an expression; `None` for statements and declarations.
    pub dt: Option<DataType>,
    pub position: Position,
}

/// A whole typed program as handed over by the front end.
#[derive(Debug, Clone, Default)]
pub struct PtProgram {
    pub name: String,
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    blocks: Vec<NodeId>,
}

impl PtProgram {
    pub fn new(name: impl Into<String>) -> Self {
        PtProgram {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, kind: NodeKind, dt: Option<DataType>, position: Position) -> NodeId {
        let id = NodeId(self.nodes.len());
        for child in kind.children() {
            self.parents[child.0] = Some(id);
        }
        self.nodes.push(Node { kind, dt, position });
        self.parents.push(None);
        id
    }

    /// Add a typed expression node at an unknown position.
    pub fn expr(&mut self, kind: NodeKind, dt: DataType) -> NodeId {
        self.add(kind, Some(dt), Position::dummy())
    }

    /// Add a statement or declaration node at an unknown position.
    pub fn stmt(&mut self, kind: NodeKind) -> NodeId {
        self.add(kind, None, Position::dummy())
    }

    pub fn number(&mut self, dt: DataType, value: f64) -> NodeId {
        self.expr(NodeKind::Number { value }, dt)
    }

    pub fn ident(&mut self, dt: DataType, name: impl Into<String>) -> NodeId {
        self.expr(NodeKind::Identifier { name: name.into() }, dt)
    }

    /// Register a top-level block node.
    pub fn add_block(&mut self, block: NodeId) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[NodeId] {
        &self.blocks
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn position(&self, id: NodeId) -> &Position {
        &self.nodes[id.0].position
    }

    pub fn dt(&self, id: NodeId) -> Option<DataType> {
        self.nodes[id.0].dt
    }

    /// Datatype of an expression; an untyped expression breaks the front end contract.
    pub fn expect_dt(&self, id: NodeId) -> DataType {
        match self.nodes[id.0].dt {
            Some(dt) => dt,
            None => panic!("untyped {} node at {}", self.kind(id), self.position(id)),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.0]
    }

    /// Swap the kind of a node in place and re-parent its new children.
    pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
        for child in self.nodes[id.0].kind.children() {
            if self.parents[child.0] == Some(id) {
                self.parents[child.0] = None;
            }
        }
        for child in kind.children() {
            self.parents[child.0] = Some(id);
        }
        self.nodes[id.0].kind = kind;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
