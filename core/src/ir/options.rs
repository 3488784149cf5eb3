//! file: core/src/ir/options.rs
//! description: compilation options carried by every IR program.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Raw,
    Prg,
    Xex,
    Library,
}

impl OutputType {
    pub fn name(self) -> &'static str {
        match self {
            OutputType::Raw => "RAW",
            OutputType::Prg => "PRG",
            OutputType::Xex => "XEX",
            OutputType::Library => "LIBRARY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RAW" => Some(OutputType::Raw),
            "PRG" => Some(OutputType::Prg),
            "XEX" => Some(OutputType::Xex),
            "LIBRARY" => Some(OutputType::Library),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Launcher {
    Basic,
    None,
}

impl Launcher {
    pub fn name(self) -> &'static str {
        match self {
            Launcher::Basic => "BASIC",
            Launcher::None => "NONE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BASIC" => Some(Launcher::Basic),
            "NONE" => Some(Launcher::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeropageType {
    BasicSafe,
    FloatSafe,
    KernalSafe,
    Full,
    DontUse,
}

impl ZeropageType {
    pub fn name(self) -> &'static str {
        match self {
            ZeropageType::BasicSafe => "BASICSAFE",
            ZeropageType::FloatSafe => "FLOATSAFE",
            ZeropageType::KernalSafe => "KERNALSAFE",
            ZeropageType::Full => "FULL",
            ZeropageType::DontUse => "DONTUSE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BASICSAFE" => Some(ZeropageType::BasicSafe),
            "FLOATSAFE" => Some(ZeropageType::FloatSafe),
            "KERNALSAFE" => Some(ZeropageType::KernalSafe),
            "FULL" => Some(ZeropageType::Full),
            "DONTUSE" => Some(ZeropageType::DontUse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationOptions {
    pub comp_target: String,
    pub output: OutputType,
    pub launcher: Launcher,
    pub zeropage: ZeropageType,
    /// Inclusive address ranges kept out of zero-page allocation.
    pub zp_reserved: Vec<(u32, u32)>,
    /// Inclusive address ranges zero-page allocation may use.
    pub zp_allowed: Vec<(u32, u32)>,
    pub load_address: u32,
    pub optimize: bool,
    pub floats: bool,
    /// When set, the global-init chunk is left empty.
    pub dont_reinit_globals: bool,
    pub output_dir: PathBuf,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        CompilationOptions {
            comp_target: "virtual".to_string(),
            output: OutputType::Raw,
            launcher: Launcher::None,
            zeropage: ZeropageType::DontUse,
            zp_reserved: Vec::new(),
            zp_allowed: Vec::new(),
            load_address: 0,
            optimize: false,
            floats: true,
            dont_reinit_globals: false,
            output_dir: PathBuf::from("."),
        }
    }
}

/// `2-5,10-20` style rendering of address ranges.
pub fn format_ranges(ranges: &[(u32, u32)]) -> String {
    ranges
        .iter()
        .map(|(from, to)| format!("{}-{}", from, to))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_ranges(text: &str) -> Option<Vec<(u32, u32)>> {
    text.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| {
            let (from, to) = r.split_once('-')?;
            Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
        })
        .collect()
}
