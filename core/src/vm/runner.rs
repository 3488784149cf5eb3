//! file: core/src/vm/runner.rs
//! description: parse-optimize-run convenience around the virtual machine.

use std::path::Path;

use log::info;

use crate::ir::opt::optimize_program;
use crate::ir::program::IrProgram;
use crate::ir::textual::{read_program, read_program_file};
use crate::vm::{VirtualMachine, VmConfig, VmResult};

#[derive(Debug, Clone, Default)]
pub struct VmRunner {
    config: VmConfig,
    optimize: bool,
}

impl VmRunner {
    pub fn new(config: VmConfig) -> Self {
        VmRunner { config, optimize: false }
    }

    /// Run the peephole optimizer before loading.
    pub fn optimized(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Load and run a program; the halted machine is returned for inspection.
    pub fn run_program(&self, mut program: IrProgram) -> VmResult<VirtualMachine> {
        if self.optimize {
            optimize_program(&mut program);
        }
        let mut vm = VirtualMachine::load(&program, self.config.clone())?;
        vm.run()?;
        info!("program '{}' finished after {} steps", program.name, vm.steps());
        Ok(vm)
    }

    pub fn run_text(&self, text: &str) -> VmResult<VirtualMachine> {
        self.run_program(read_program(text)?)
    }

    pub fn run_file(&self, path: &Path) -> VmResult<VirtualMachine> {
        self.run_program(read_program_file(path)?)
    }
}
