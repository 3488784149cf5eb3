pub mod ast;
pub mod error;
pub mod ir;
pub mod location;
pub mod types;
pub mod vm;

pub use error::{ErrorKind, Level, LowbyteErrorExt};
pub use ir::lower::lower_program;
pub use ir::opt::optimize_program;
pub use ir::textual::{read_program, read_program_file, write_program, write_program_file};
pub use location::Position;
pub use vm::{VirtualMachine, VmConfig, VmRunner};

pub fn generate_error_report(error: &dyn LowbyteErrorExt) -> String {
    let location = match error.position() {
        Some(pos) => pos.to_string(),
        None => "unknown location".to_string(),
    };

    format!(
        "LOWBYTE | {} | {} | {} | {}",
        error.level(),
        error.kind(),
        location,
        error.message()
    )
}
