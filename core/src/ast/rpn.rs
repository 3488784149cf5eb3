//! file: core/src/ast/rpn.rs
//! description: balance check of flattened stack-machine expressions.

use crate::ast::kind::RpnItem;
use crate::ast::tree::PtProgram;
use crate::types::{DataType, IrDataType};

/// Deepest stack use per operand class, plus the total number of pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RpnDepth {
    pub byte: usize,
    pub word: usize,
    pub float: usize,
    pub pushes: usize,
}

#[derive(Default)]
struct Counters {
    depth: [i64; 3],
    max: [usize; 3],
    pushes: usize,
    pops: usize,
}

fn class(dt: DataType) -> usize {
    match dt.ir_type() {
        IrDataType::Byte => 0,
        IrDataType::Word => 1,
        IrDataType::Float => 2,
    }
}

impl Counters {
    fn push(&mut self, dt: DataType) {
        let c = class(dt);
        self.depth[c] += 1;
        self.max[c] = self.max[c].max(self.depth[c] as usize);
        self.pushes += 1;
    }

    fn pop(&mut self, dt: DataType) {
        let c = class(dt);
        self.depth[c] -= 1;
        if self.depth[c] < 0 {
            panic!("RPN stack underflow on {} class", dt.ir_type());
        }
        self.pops += 1;
    }
}

/// Walk the sequence with one depth counter per operand class.
///
/// Panics when the sequence is not balanced: it must leave exactly one
/// value, `pushes == pops + 1`.
pub fn rpn_max_depth(tree: &PtProgram, items: &[RpnItem]) -> RpnDepth {
    let mut counters = Counters::default();
    for item in items {
        match item {
            RpnItem::Operand(id) => counters.push(tree.expect_dt(*id)),
            RpnItem::Operator {
                result,
                operand1,
                operand2,
                ..
            } => {
                counters.pop(*operand1);
                counters.pop(*operand2);
                counters.push(*result);
            }
        }
    }
    if counters.pushes != counters.pops + 1 {
        panic!("RPN not balanced, pushes={} pops={}", counters.pushes, counters.pops);
    }
    RpnDepth {
        byte: counters.max[0],
        word: counters.max[1],
        float: counters.max[2],
        pushes: counters.pushes,
    }
}
