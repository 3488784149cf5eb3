//! file: core/src/error.rs
//! description: error levels, kinds and the recoverable error types of the core.

use std::fmt;

use crate::location::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        };
        write!(f, "{}", level_str)
    }
}

/// The recoverable error classes of the core.
///
/// Builder invariant violations are not represented here: those panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed textual IR.
    Parse,
    /// A construct the virtual machine cannot execute.
    UnsupportedOperation,
    /// A program that loads or runs inconsistently (unresolved label, stack underflow, step limit).
    MalformedProgram,
    /// A file could not be read or written.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_str = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::UnsupportedOperation => "unsupported operation",
            ErrorKind::MalformedProgram => "malformed program",
            ErrorKind::Io => "io error",
        };
        write!(f, "{}", kind_str)
    }
}

pub trait LowbyteErrorExt {
    fn level(&self) -> Level;
    fn kind(&self) -> ErrorKind;
    fn message(&self) -> String;
    fn issuer(&self) -> String;
    fn position(&self) -> Option<Position>;
}

impl fmt::Debug for dyn LowbyteErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pos_str = match self.position() {
            Some(pos) => pos.to_string(),
            None => "unknown".to_string(),
        };

        write!(
            f,
            "LOWBYTE | {} | {} | {} | {} | {}",
            self.level(),
            self.kind(),
            pos_str,
            self.issuer(),
            self.message()
        )
    }
}

impl fmt::Display for dyn LowbyteErrorExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Erase a concrete error into the boxed trait object passed around the crate.
pub fn boxed<E: LowbyteErrorExt + 'static>(error: E) -> Box<dyn LowbyteErrorExt> {
    Box::new(error)
}

/// Raised by the textual IR reader.
#[derive(Debug, Clone, PartialEq)]
pub struct IrParseError {
    pub message: String,
    /// 1-based line number in the document, when known.
    pub line: Option<usize>,
    /// The offending line.
    pub text: Option<String>,
    pub position: Option<Position>,
}

impl IrParseError {
    pub fn new(message: impl Into<String>) -> Self {
        IrParseError {
            message: message.into(),
            line: None,
            text: None,
            position: None,
        }
    }

    pub fn at_line(mut self, line: usize, text: impl Into<String>) -> Self {
        self.line = Some(line);
        self.text = Some(text.into());
        self
    }
}

impl fmt::Display for IrParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.line, &self.text) {
            (Some(line), Some(text)) => write!(f, "{} (line {}: `{}`)", self.message, line, text.trim()),
            (Some(line), None) => write!(f, "{} (line {})", self.message, line),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for IrParseError {}

impl LowbyteErrorExt for IrParseError {
    fn level(&self) -> Level {
        Level::Error
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "lowbyte.ir.reader".to_string()
    }

    fn position(&self) -> Option<Position> {
        self.position.clone()
    }
}

/// Raised by the virtual machine for constructs it cannot execute.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedOperationError {
    pub operation: String,
    pub pc_index: Option<usize>,
}

impl UnsupportedOperationError {
    pub fn new(operation: impl Into<String>) -> Self {
        UnsupportedOperationError {
            operation: operation.into(),
            pc_index: None,
        }
    }

    pub fn at(mut self, pc_index: usize) -> Self {
        self.pc_index = Some(pc_index);
        self
    }
}

impl fmt::Display for UnsupportedOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not supported in this execution mode", self.operation)?;
        if let Some(pc) = self.pc_index {
            write!(f, " (pc {})", pc)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnsupportedOperationError {}

impl LowbyteErrorExt for UnsupportedOperationError {
    fn level(&self) -> Level {
        Level::Error
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::UnsupportedOperation
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "lowbyte.vm".to_string()
    }

    fn position(&self) -> Option<Position> {
        None
    }
}

/// Raised by the virtual machine when a program is internally inconsistent.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedProgramError {
    pub message: String,
    pub pc_index: Option<usize>,
}

impl MalformedProgramError {
    pub fn new(message: impl Into<String>) -> Self {
        MalformedProgramError {
            message: message.into(),
            pc_index: None,
        }
    }

    pub fn at(mut self, pc_index: usize) -> Self {
        self.pc_index = Some(pc_index);
        self
    }
}

impl fmt::Display for MalformedProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pc_index {
            Some(pc) => write!(f, "{} (pc {})", self.message, pc),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for MalformedProgramError {}

impl LowbyteErrorExt for MalformedProgramError {
    fn level(&self) -> Level {
        Level::Critical
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedProgram
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "lowbyte.vm".to_string()
    }

    fn position(&self) -> Option<Position> {
        None
    }
}

/// A file could not be read or written.
#[derive(Debug, Clone, PartialEq)]
pub struct IoError {
    pub path: String,
    pub message: String,
    /// The source construct that named the file, when there is one.
    pub position: Option<Position>,
}

impl IoError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        IoError {
            path: path.into(),
            message: message.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for IoError {}

impl LowbyteErrorExt for IoError {
    fn level(&self) -> Level {
        Level::Error
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Io
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "lowbyte.io".to_string()
    }

    fn position(&self) -> Option<Position> {
        self.position.clone()
    }
}
