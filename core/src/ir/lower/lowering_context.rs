//! file: core/src/ir/lower/lowering_context.rs
//! description: compilation-wide state threaded through the IR builder.
//!
//! `LoweringContext` owns the register and label counters, the symbol table
//! under construction and what the builder needs to know about every
//! subroutine before it lowers calls to it. One context lives for one
//! compilation and is dropped at the end of it.

use std::collections::HashMap;

use crate::error::LowbyteErrorExt;
use crate::ir::program::IrAsmParameter;
use crate::ir::symbols::IrSymbolTable;
use crate::types::{DataType, IrDataType};

/// Calling convention of a subroutine as seen from a call site.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CallTarget {
    Sub {
        params: Vec<(String, DataType)>,
        return_type: Option<DataType>,
    },
    AsmSub {
        params: Vec<IrAsmParameter>,
        returns: Vec<IrAsmParameter>,
    },
}

#[derive(Debug)]
pub struct LoweringContext {
    next_int_reg: u32,
    next_fp_reg: u32,
    label_counter: u32,
    pub symbols: IrSymbolTable,
    pub(crate) call_targets: HashMap<String, CallTarget>,
    diagnostics: Vec<Box<dyn LowbyteErrorExt>>,
}

impl LoweringContext {
    pub fn new(symbols: IrSymbolTable) -> Self {
        LoweringContext {
            next_int_reg: 1,
            next_fp_reg: 1,
            label_counter: 0,
            symbols,
            call_targets: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Fresh register for a value of the given operand type.
    ///
    /// Integer and float registers are separate files with separate
    /// counters. Neither is ever reset, so no two subroutines share a register.
    pub fn next_reg(&mut self, dt: IrDataType) -> u32 {
        let counter = if dt.is_float() {
            &mut self.next_fp_reg
        } else {
            &mut self.next_int_reg
        };
        let reg = *counter;
        *counter += 1;
        reg
    }

    /// `<scope>.label_<n>_<hint>`
    pub fn create_label(&mut self, scope: &str, hint: &str) -> String {
        self.label_counter += 1;
        format!("{}.label_{}_{}", scope, self.label_counter, hint)
    }

    /// Record a problem with the input. Lowering carries on so every problem gets reported.
    pub fn report(&mut self, error: Box<dyn LowbyteErrorExt>) {
        self.diagnostics.push(error);
    }

    pub fn take_diagnostics(&mut self) -> Vec<Box<dyn LowbyteErrorExt>> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn int_registers_used(&self) -> u32 {
        self.next_int_reg - 1
    }

    pub fn fp_registers_used(&self) -> u32 {
        self.next_fp_reg - 1
    }
}
