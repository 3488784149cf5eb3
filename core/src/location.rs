//! file: core/src/location.rs
//! description: source positions carried by blocks and subroutines.

use serde::{Deserialize, Serialize};

/// A source position as carried through the IR: `[file: line n col a-b]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// The source file the construct came from.
    pub file: String,
    /// The line number, 1-based.
    pub line: u32,
    /// The first column of the construct.
    pub start_col: u32,
    /// The last column of the construct.
    pub end_col: u32,
}

impl Position {
    pub fn new(file: impl Into<String>, line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            start_col,
            end_col,
        }
    }

    /// Position used for synthesized nodes.
    pub fn dummy() -> Self {
        Self::new("<dummy>", 0, 0, 0)
    }

    /// Parse the bracketed form produced by `Display`.
    pub fn parse(text: &str) -> Option<Self> {
        let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (file, rest) = inner.rsplit_once(": line ")?;
        let (line, cols) = rest.split_once(" col ")?;
        let (start, end) = cols.split_once('-')?;
        Some(Self {
            file: file.to_string(),
            line: line.trim().parse().ok()?,
            start_col: start.trim().parse().ok()?,
            end_col: end.trim().parse().ok()?,
        })
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::dummy()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}: line {} col {}-{}]",
            self.file, self.line, self.start_col, self.end_col
        )
    }
}
