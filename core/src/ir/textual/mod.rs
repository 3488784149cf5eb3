//! file: core/src/ir/textual/mod.rs
//! description: the on-disk text form of a whole IR program.
//!
//! The document is XML-like and line oriented. `writer` renders a program,
//! `reader` parses one back; reading then writing reproduces the input
//! exactly for any document the writer produced.

mod document;
mod reader;
mod writer;

pub use reader::{read_program, read_program_file};
pub use writer::{default_output_path, write_program, write_program_file};

/// File extension of textual IR documents.
pub const IR_FILE_EXTENSION: &str = "p8ir";

/// Integer literal as used in the textual IR: decimal, `$hex`, `0xhex` or `%binary`, optionally signed.
pub fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return None;
    }
    let value = if let Some(hex) = digits.strip_prefix('$').or_else(|| digits.strip_prefix("0x")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix('%') {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}
