//! file: core/src/vm/snapshot.rs
//! description: serializable view of the machine state for reports and test diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vm::{StatusFlags, VirtualMachine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSnapshot {
    pub pc: usize,
    pub steps: u64,
    pub halted: bool,
    pub call_depth: usize,
    pub value_stack_depth: usize,
    pub flags: StatusFlags,
    /// Integer registers holding a non-zero value.
    pub registers: BTreeMap<u32, u16>,
    /// Float registers holding a non-zero value.
    pub fp_registers: BTreeMap<u32, f64>,
}

impl VmSnapshot {
    pub(crate) fn capture(vm: &VirtualMachine) -> Self {
        VmSnapshot {
            pc: vm.pc,
            steps: vm.steps,
            halted: vm.halted,
            call_depth: vm.call_stack.len(),
            value_stack_depth: vm.value_stack.len(),
            flags: vm.flags,
            registers: (0..)
                .zip(vm.registers.iter())
                .filter(|(_, value)| **value != 0)
                .map(|(reg, value)| (reg, *value))
                .collect(),
            fp_registers: (0..)
                .zip(vm.fp_registers.iter())
                .filter(|(_, value)| **value != 0.0)
                .map(|(reg, value)| (reg, *value))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
