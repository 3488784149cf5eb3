//! file: cli/src/disassembler.rs
//! description: flattened listing of a loaded program, one row per instruction index.

use lowbyte_core::VirtualMachine;

/// Rows of `[index, labels, instruction]` in execution order.
pub fn disassemble(vm: &VirtualMachine) -> Vec<Vec<String>> {
    let labels = vm.labels_by_index();
    vm.instructions()
        .enumerate()
        .map(|(index, ins)| {
            let names = labels.get(&index).map(|names| names.join(" ")).unwrap_or_default();
            vec![format!("{:05}", index), names, ins.to_string()]
        })
        .collect()
}

/// Plain text variant: labels on their own line, instructions indented.
pub fn disassemble_text(vm: &VirtualMachine) -> String {
    let labels = vm.labels_by_index();
    let mut out = String::new();
    for (index, ins) in vm.instructions().enumerate() {
        if let Some(names) = labels.get(&index) {
            for name in names {
                out.push_str(&format!("{}:\n", name));
            }
        }
        out.push_str(&format!("{:05}    {}\n", index, ins));
    }
    out
}
