//! file: core/src/vm/memory.rs
//! description: the byte-addressable memory image of the virtual machine.
//!
//! Words are little endian. Floats take four bytes in memory (IEEE single
//! precision) and are widened to `f64` when loaded into a float register.

use crate::error::MalformedProgramError;
use crate::types::{FLOAT_MEM_SIZE, IrDataType};

#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    bytes: Vec<u8>,
}

type MemResult<T> = Result<T, MalformedProgramError>;

impl Memory {
    pub fn new(size: usize) -> Self {
        Memory { bytes: vec![0; size] }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn range(&self, address: u32, size: u32) -> MemResult<std::ops::Range<usize>> {
        let start = address as usize;
        let end = start + size as usize;
        if end > self.bytes.len() {
            return Err(MalformedProgramError::new(format!(
                "memory access at ${:04x} (+{}) outside of {} bytes",
                address,
                size,
                self.bytes.len()
            )));
        }
        Ok(start..end)
    }

    pub fn read_byte(&self, address: u32) -> MemResult<u8> {
        let range = self.range(address, 1)?;
        Ok(self.bytes[range.start])
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> MemResult<()> {
        let range = self.range(address, 1)?;
        self.bytes[range.start] = value;
        Ok(())
    }

    pub fn read_word(&self, address: u32) -> MemResult<u16> {
        let range = self.range(address, 2)?;
        Ok(u16::from_le_bytes([self.bytes[range.start], self.bytes[range.start + 1]]))
    }

    pub fn write_word(&mut self, address: u32, value: u16) -> MemResult<()> {
        let range = self.range(address, 2)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn read_float(&self, address: u32) -> MemResult<f64> {
        let range = self.range(address, FLOAT_MEM_SIZE)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[range]);
        Ok(f32::from_le_bytes(raw) as f64)
    }

    pub fn write_float(&mut self, address: u32, value: f64) -> MemResult<()> {
        let range = self.range(address, FLOAT_MEM_SIZE)?;
        self.bytes[range].copy_from_slice(&(value as f32).to_le_bytes());
        Ok(())
    }

    /// Integer read of the given width.
    pub fn read_int(&self, dt: IrDataType, address: u32) -> MemResult<u16> {
        match dt {
            IrDataType::Byte => self.read_byte(address).map(u16::from),
            _ => self.read_word(address),
        }
    }

    /// Integer write of the given width; a byte write stores the low byte.
    pub fn write_int(&mut self, dt: IrDataType, address: u32, value: u16) -> MemResult<()> {
        match dt {
            IrDataType::Byte => self.write_byte(address, value as u8),
            _ => self.write_word(address, value),
        }
    }

    /// Zero `size` bytes starting at `address`.
    pub fn clear(&mut self, address: u32, size: u32) -> MemResult<()> {
        let range = self.range(address, size)?;
        self.bytes[range].fill(0);
        Ok(())
    }

    pub fn slice(&self, address: u32, size: u32) -> MemResult<&[u8]> {
        let range = self.range(address, size)?;
        Ok(&self.bytes[range])
    }

    /// Zero-terminated byte string starting at `address`.
    pub fn read_cstring(&self, address: u32) -> MemResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut address = address;
        loop {
            let byte = self.read_byte(address)?;
            if byte == 0 {
                return Ok(out);
            }
            out.push(byte);
            address += 1;
        }
    }
}
