//! file: core/src/ir/symbols.rs
//! description: the program-wide symbol table.
//!
//! Every name is fully scoped (`block.sub.name`) and unique across all four
//! kinds of entries. Maps are ordered so iteration, and therefore the
//! textual output and VM memory layout, is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{DataType, ZeropageWish, mem_size};

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    Number(f64),
    /// Address of another symbol, written `@name`.
    AddressOf(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariableInit {
    Scalar(f64),
    Array(Vec<ArrayElement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticVariable {
    pub name: String,
    pub dt: DataType,
    pub length: Option<u32>,
    pub init: Option<VariableInit>,
    pub zp_wish: ZeropageWish,
    pub align: u32,
}

impl StaticVariable {
    pub fn new(name: impl Into<String>, dt: DataType) -> Self {
        StaticVariable {
            name: name.into(),
            dt,
            length: None,
            init: None,
            zp_wish: ZeropageWish::DontCare,
            align: 0,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_init(mut self, init: VariableInit) -> Self {
        self.init = Some(init);
        self
    }

    pub fn with_zp_wish(mut self, wish: ZeropageWish) -> Self {
        self.zp_wish = wish;
        self
    }

    pub fn with_align(mut self, align: u32) -> Self {
        self.align = align;
        self
    }

    pub fn mem_size(&self) -> u32 {
        mem_size(self.dt, self.length)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMappedVariable {
    pub name: String,
    pub dt: DataType,
    pub address: u32,
    pub length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySlab {
    pub name: String,
    pub size: u32,
    pub align: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSymbol(pub String);

impl fmt::Display for DuplicateSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol '{}' is declared more than once", self.0)
    }
}

impl std::error::Error for DuplicateSymbol {}

/// A resolved symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SymbolRef<'a> {
    Variable(&'a StaticVariable),
    MemoryMapped(&'a MemoryMappedVariable),
    Slab(&'a MemorySlab),
    AsmSymbol(&'a str),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IrSymbolTable {
    asm_symbols: BTreeMap<String, String>,
    variables: BTreeMap<String, StaticVariable>,
    memory_mapped: BTreeMap<String, MemoryMappedVariable>,
    slabs: BTreeMap<String, MemorySlab>,
}

impl IrSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    fn ensure_unique(&self, name: &str) -> Result<(), DuplicateSymbol> {
        if self.contains(name) {
            Err(DuplicateSymbol(name.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn add_variable(&mut self, variable: StaticVariable) -> Result<(), DuplicateSymbol> {
        self.ensure_unique(&variable.name)?;
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn add_memory_mapped(&mut self, variable: MemoryMappedVariable) -> Result<(), DuplicateSymbol> {
        self.ensure_unique(&variable.name)?;
        self.memory_mapped.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn add_slab(&mut self, slab: MemorySlab) -> Result<(), DuplicateSymbol> {
        self.ensure_unique(&slab.name)?;
        self.slabs.insert(slab.name.clone(), slab);
        Ok(())
    }

    pub fn add_asm_symbol(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<(), DuplicateSymbol> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.asm_symbols.insert(name, value.into());
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolRef<'_>> {
        if let Some(v) = self.variables.get(name) {
            return Some(SymbolRef::Variable(v));
        }
        if let Some(v) = self.memory_mapped.get(name) {
            return Some(SymbolRef::MemoryMapped(v));
        }
        if let Some(s) = self.slabs.get(name) {
            return Some(SymbolRef::Slab(s));
        }
        self.asm_symbols.get(name).map(|v| SymbolRef::AsmSymbol(v.as_str()))
    }

    /// Whether an instruction label operand can refer to a data symbol by this name.
    /// Split word arrays are addressed through their `_lsb`/`_msb` halves.
    pub fn resolves_label(&self, label: &str) -> bool {
        if self.contains(label) {
            return true;
        }
        let base = label.strip_suffix("_lsb").or_else(|| label.strip_suffix("_msb"));
        matches!(base.and_then(|b| self.variables.get(b)), Some(v) if v.dt.is_split_array())
    }

    pub fn variables(&self) -> impl Iterator<Item = &StaticVariable> {
        self.variables.values()
    }

    pub fn memory_mapped(&self) -> impl Iterator<Item = &MemoryMappedVariable> {
        self.memory_mapped.values()
    }

    pub fn slabs(&self) -> impl Iterator<Item = &MemorySlab> {
        self.slabs.values()
    }

    pub fn asm_symbols(&self) -> impl Iterator<Item = (&str, &str)> {
        self.asm_symbols.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn variable(&self, name: &str) -> Option<&StaticVariable> {
        self.variables.get(name)
    }

    pub fn slab(&self, name: &str) -> Option<&MemorySlab> {
        self.slabs.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.asm_symbols.is_empty() && self.variables.is_empty() && self.memory_mapped.is_empty() && self.slabs.is_empty()
    }
}
