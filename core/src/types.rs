//! file: core/src/types.rs
//! description: source datatypes, IR operand types and their memory sizes.

use serde::{Deserialize, Serialize};

/// Size of a float in VM memory (IEEE single precision).
pub const FLOAT_MEM_SIZE: u32 = 4;

/// The operand datatype tag carried by typed instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrDataType {
    Byte,
    Word,
    Float,
}

impl IrDataType {
    /// The mnemonic suffix letter, without the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            IrDataType::Byte => "b",
            IrDataType::Word => "w",
            IrDataType::Float => "f",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "b" | "B" => Some(IrDataType::Byte),
            "w" | "W" => Some(IrDataType::Word),
            "f" | "F" => Some(IrDataType::Float),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        self == IrDataType::Float
    }
}

impl std::fmt::Display for IrDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IrDataType::Byte => "byte",
            IrDataType::Word => "word",
            IrDataType::Float => "float",
        };
        write!(f, "{}", name)
    }
}

/// Fully resolved source datatype, as handed over by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    UByte,
    Byte,
    UWord,
    Word,
    Float,
    Str,
    ArrayBool,
    ArrayUB,
    ArrayB,
    ArrayUW,
    ArrayW,
    ArrayF,
    ArrayUWSplit,
    ArrayWSplit,
}

impl DataType {
    pub fn is_byte(self) -> bool {
        matches!(self, DataType::Bool | DataType::UByte | DataType::Byte)
    }

    pub fn is_word(self) -> bool {
        matches!(self, DataType::UWord | DataType::Word)
    }

    pub fn is_integer(self) -> bool {
        self.is_byte() || self.is_word()
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DataType::Byte | DataType::Word | DataType::Float)
    }

    pub fn is_array(self) -> bool {
        self.element_type().is_some() && self != DataType::Str
    }

    pub fn is_split_array(self) -> bool {
        matches!(self, DataType::ArrayUWSplit | DataType::ArrayWSplit)
    }

    /// Strings and arrays are passed around by address.
    pub fn is_pass_by_reference(self) -> bool {
        self.element_type().is_some()
    }

    pub fn element_type(self) -> Option<DataType> {
        match self {
            DataType::Str | DataType::ArrayUB => Some(DataType::UByte),
            DataType::ArrayBool => Some(DataType::Bool),
            DataType::ArrayB => Some(DataType::Byte),
            DataType::ArrayUW | DataType::ArrayUWSplit => Some(DataType::UWord),
            DataType::ArrayW | DataType::ArrayWSplit => Some(DataType::Word),
            DataType::ArrayF => Some(DataType::Float),
            _ => None,
        }
    }

    pub fn array_of(element: DataType, split: bool) -> Option<DataType> {
        match (element, split) {
            (DataType::Bool, false) => Some(DataType::ArrayBool),
            (DataType::UByte, false) => Some(DataType::ArrayUB),
            (DataType::Byte, false) => Some(DataType::ArrayB),
            (DataType::UWord, false) => Some(DataType::ArrayUW),
            (DataType::Word, false) => Some(DataType::ArrayW),
            (DataType::Float, false) => Some(DataType::ArrayF),
            (DataType::UWord, true) => Some(DataType::ArrayUWSplit),
            (DataType::Word, true) => Some(DataType::ArrayWSplit),
            _ => None,
        }
    }

    /// Operand type used when a value of this type sits in a register.
    pub fn ir_type(self) -> IrDataType {
        match self {
            DataType::Bool | DataType::UByte | DataType::Byte => IrDataType::Byte,
            DataType::Float => IrDataType::Float,
            _ => IrDataType::Word,
        }
    }

    /// Name used in the textual IR. Arrays use their element name.
    pub fn ir_name(self) -> &'static str {
        match self {
            DataType::Bool | DataType::ArrayBool => "bool",
            DataType::UByte | DataType::ArrayUB | DataType::Str => "ubyte",
            DataType::Byte | DataType::ArrayB => "byte",
            DataType::UWord | DataType::ArrayUW => "uword",
            DataType::Word | DataType::ArrayW => "word",
            DataType::Float | DataType::ArrayF => "float",
            DataType::ArrayUWSplit => "uword_split",
            DataType::ArrayWSplit => "word_split",
        }
    }

    /// Inverse of [`DataType::ir_name`]; `is_array` tells whether `[n]` followed the name.
    pub fn from_ir_name(name: &str, is_array: bool) -> Option<DataType> {
        let scalar = match name {
            "bool" => DataType::Bool,
            "ubyte" => DataType::UByte,
            "byte" => DataType::Byte,
            "uword" => DataType::UWord,
            "word" => DataType::Word,
            "float" => DataType::Float,
            "str" => return is_array.then_some(DataType::ArrayUB),
            "uword_split" => return is_array.then_some(DataType::ArrayUWSplit),
            "word_split" => return is_array.then_some(DataType::ArrayWSplit),
            _ => return None,
        };
        if is_array {
            DataType::array_of(scalar, false)
        } else {
            Some(scalar)
        }
    }
}

/// Memory footprint on the VM target. Arrays need their element count.
pub fn mem_size(dt: DataType, length: Option<u32>) -> u32 {
    match dt {
        DataType::Bool | DataType::UByte | DataType::Byte => 1,
        DataType::UWord | DataType::Word => 2,
        DataType::Float => FLOAT_MEM_SIZE,
        _ => {
            let element = dt.element_type().map(|e| mem_size(e, None)).unwrap_or(1);
            element * length.unwrap_or(0)
        }
    }
}

/// Placement preference of a static variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZeropageWish {
    RequireZeropage,
    PreferZeropage,
    DontCare,
    NotInZeropage,
}

impl ZeropageWish {
    pub fn name(self) -> &'static str {
        match self {
            ZeropageWish::RequireZeropage => "REQUIRE_ZEROPAGE",
            ZeropageWish::PreferZeropage => "PREFER_ZEROPAGE",
            ZeropageWish::DontCare => "DONTCARE",
            ZeropageWish::NotInZeropage => "NOT_IN_ZEROPAGE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "REQUIRE_ZEROPAGE" => Some(ZeropageWish::RequireZeropage),
            "PREFER_ZEROPAGE" => Some(ZeropageWish::PreferZeropage),
            "DONTCARE" => Some(ZeropageWish::DontCare),
            "NOT_IN_ZEROPAGE" => Some(ZeropageWish::NotInZeropage),
            _ => None,
        }
    }
}
