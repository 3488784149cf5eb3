//! file: core/src/ir/opcode.rs
//! description: the closed IR opcode set and its static properties.
//!
//! Each opcode knows its textual mnemonic, which operand type tags it
//! accepts and whether it transfers control. The mnemonic lookup table is
//! built once on first use.

use std::collections::HashMap;

use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    Nop,
    Load,
    Loadm,
    Loadi,
    Loadx,
    Loadr,
    Storem,
    Storei,
    Storex,
    Storezm,
    Storezi,
    Storezx,

    Jump,
    Call,
    Calli,
    Syscall,
    Return,
    Returnr,

    Bstcc,
    Bstcs,
    Bsteq,
    Bstne,
    Bstneg,
    Bstpos,
    Bstvc,
    Bstvs,
    Beqr,
    Bner,
    Bgtr,
    Bgtsr,
    Bger,
    Bgesr,
    Beq,
    Bne,
    Bgt,
    Bgts,
    Blt,
    Blts,
    Bge,
    Bges,
    Ble,
    Bles,

    Cmp,
    Cmpi,
    Seq,
    Sne,
    Slt,
    Slts,
    Sgt,
    Sgts,
    Sle,
    Sles,
    Sge,
    Sges,

    Inc,
    Incm,
    Dec,
    Decm,
    Neg,
    Negm,
    Add,
    Addr,
    Addm,
    Sub,
    Subr,
    Subm,
    Mul,
    Mulr,
    Div,
    Divr,
    Divs,
    Divsr,
    Mod,
    Modr,
    Divmod,
    Divmodr,
    Sqrt,
    Square,
    Sgn,

    And,
    Andr,
    Or,
    Orr,
    Xor,
    Xorr,
    Inv,
    Lsl,
    Lsr,
    Asr,
    Lsln,
    Lsrn,
    Asrn,
    Rol,
    Ror,
    Roxl,
    Roxr,
    Rolm,
    Rorm,
    Roxlm,
    Roxrm,
    Ext,
    Exts,
    Concat,
    Lsig,
    Msig,

    Clc,
    Sec,
    Pushst,
    Popst,
    Push,
    Pop,

    Ffromub,
    Ffromsb,
    Ffromuw,
    Ffromsw,
    Ftoub,
    Ftosb,
    Ftouw,
    Ftosw,
    Fabs,
    Fpow,
    Fsin,
    Fcos,
    Fround,
    Ffloor,
    Fceil,
    Fcomp,

    BinaryData,
}

/// Which operand type tags an opcode accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandClass {
    /// Never carries a type tag.
    Untyped,
    /// Type tag is optional (a call with or without a result register).
    OptionalType,
    /// Byte or word only.
    IntOnly,
    /// Float only.
    FloatOnly,
    /// Any of byte, word, float.
    Any,
}

pub const ALL_OPCODES: &[Opcode] = &[
    Opcode::Nop, Opcode::Load, Opcode::Loadm, Opcode::Loadi, Opcode::Loadx, Opcode::Loadr,
    Opcode::Storem, Opcode::Storei, Opcode::Storex, Opcode::Storezm, Opcode::Storezi, Opcode::Storezx,
    Opcode::Jump, Opcode::Call, Opcode::Calli, Opcode::Syscall, Opcode::Return, Opcode::Returnr,
    Opcode::Bstcc, Opcode::Bstcs, Opcode::Bsteq, Opcode::Bstne, Opcode::Bstneg, Opcode::Bstpos,
    Opcode::Bstvc, Opcode::Bstvs, Opcode::Beqr, Opcode::Bner, Opcode::Bgtr, Opcode::Bgtsr,
    Opcode::Bger, Opcode::Bgesr, Opcode::Beq, Opcode::Bne, Opcode::Bgt, Opcode::Bgts, Opcode::Blt,
    Opcode::Blts, Opcode::Bge, Opcode::Bges, Opcode::Ble, Opcode::Bles,
    Opcode::Cmp, Opcode::Cmpi, Opcode::Seq, Opcode::Sne, Opcode::Slt, Opcode::Slts, Opcode::Sgt,
    Opcode::Sgts, Opcode::Sle, Opcode::Sles, Opcode::Sge, Opcode::Sges,
    Opcode::Inc, Opcode::Incm, Opcode::Dec, Opcode::Decm, Opcode::Neg, Opcode::Negm, Opcode::Add,
    Opcode::Addr, Opcode::Addm, Opcode::Sub, Opcode::Subr, Opcode::Subm, Opcode::Mul, Opcode::Mulr,
    Opcode::Div, Opcode::Divr, Opcode::Divs, Opcode::Divsr, Opcode::Mod, Opcode::Modr,
    Opcode::Divmod, Opcode::Divmodr, Opcode::Sqrt, Opcode::Square, Opcode::Sgn,
    Opcode::And, Opcode::Andr, Opcode::Or, Opcode::Orr, Opcode::Xor, Opcode::Xorr, Opcode::Inv,
    Opcode::Lsl, Opcode::Lsr, Opcode::Asr, Opcode::Lsln, Opcode::Lsrn, Opcode::Asrn, Opcode::Rol,
    Opcode::Ror, Opcode::Roxl, Opcode::Roxr, Opcode::Rolm, Opcode::Rorm, Opcode::Roxlm,
    Opcode::Roxrm, Opcode::Ext, Opcode::Exts, Opcode::Concat, Opcode::Lsig, Opcode::Msig,
    Opcode::Clc, Opcode::Sec, Opcode::Pushst, Opcode::Popst, Opcode::Push, Opcode::Pop,
    Opcode::Ffromub, Opcode::Ffromsb, Opcode::Ffromuw, Opcode::Ffromsw, Opcode::Ftoub,
    Opcode::Ftosb, Opcode::Ftouw, Opcode::Ftosw, Opcode::Fabs, Opcode::Fpow, Opcode::Fsin,
    Opcode::Fcos, Opcode::Fround, Opcode::Ffloor, Opcode::Fceil, Opcode::Fcomp,
    Opcode::BinaryData,
];

lazy_static! {
    static ref MNEMONICS: HashMap<&'static str, Opcode> =
        ALL_OPCODES.iter().map(|op| (op.mnemonic(), *op)).collect();
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Load => "load",
            Loadm => "loadm",
            Loadi => "loadi",
            Loadx => "loadx",
            Loadr => "loadr",
            Storem => "storem",
            Storei => "storei",
            Storex => "storex",
            Storezm => "storezm",
            Storezi => "storezi",
            Storezx => "storezx",
            Jump => "jump",
            Call => "call",
            Calli => "calli",
            Syscall => "syscall",
            Return => "return",
            Returnr => "returnr",
            Bstcc => "bstcc",
            Bstcs => "bstcs",
            Bsteq => "bsteq",
            Bstne => "bstne",
            Bstneg => "bstneg",
            Bstpos => "bstpos",
            Bstvc => "bstvc",
            Bstvs => "bstvs",
            Beqr => "beqr",
            Bner => "bner",
            Bgtr => "bgtr",
            Bgtsr => "bgtsr",
            Bger => "bger",
            Bgesr => "bgesr",
            Beq => "beq",
            Bne => "bne",
            Bgt => "bgt",
            Bgts => "bgts",
            Blt => "blt",
            Blts => "blts",
            Bge => "bge",
            Bges => "bges",
            Ble => "ble",
            Bles => "bles",
            Cmp => "cmp",
            Cmpi => "cmpi",
            Seq => "seq",
            Sne => "sne",
            Slt => "slt",
            Slts => "slts",
            Sgt => "sgt",
            Sgts => "sgts",
            Sle => "sle",
            Sles => "sles",
            Sge => "sge",
            Sges => "sges",
            Inc => "inc",
            Incm => "incm",
            Dec => "dec",
            Decm => "decm",
            Neg => "neg",
            Negm => "negm",
            Add => "add",
            Addr => "addr",
            Addm => "addm",
            Sub => "sub",
            Subr => "subr",
            Subm => "subm",
            Mul => "mul",
            Mulr => "mulr",
            Div => "div",
            Divr => "divr",
            Divs => "divs",
            Divsr => "divsr",
            Mod => "mod",
            Modr => "modr",
            Divmod => "divmod",
            Divmodr => "divmodr",
            Sqrt => "sqrt",
            Square => "square",
            Sgn => "sgn",
            And => "and",
            Andr => "andr",
            Or => "or",
            Orr => "orr",
            Xor => "xor",
            Xorr => "xorr",
            Inv => "inv",
            Lsl => "lsl",
            Lsr => "lsr",
            Asr => "asr",
            Lsln => "lsln",
            Lsrn => "lsrn",
            Asrn => "asrn",
            Rol => "rol",
            Ror => "ror",
            Roxl => "roxl",
            Roxr => "roxr",
            Rolm => "rolm",
            Rorm => "rorm",
            Roxlm => "roxlm",
            Roxrm => "roxrm",
            Ext => "ext",
            Exts => "exts",
            Concat => "concat",
            Lsig => "lsig",
            Msig => "msig",
            Clc => "clc",
            Sec => "sec",
            Pushst => "pushst",
            Popst => "popst",
            Push => "push",
            Pop => "pop",
            Ffromub => "ffromub",
            Ffromsb => "ffromsb",
            Ffromuw => "ffromuw",
            Ffromsw => "ffromsw",
            Ftoub => "ftoub",
            Ftosb => "ftosb",
            Ftouw => "ftouw",
            Ftosw => "ftosw",
            Fabs => "fabs",
            Fpow => "fpow",
            Fsin => "fsin",
            Fcos => "fcos",
            Fround => "fround",
            Ffloor => "ffloor",
            Fceil => "fceil",
            Fcomp => "fcomp",
            BinaryData => "binarydata",
        }
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        MNEMONICS.get(mnemonic.to_ascii_lowercase().as_str()).copied()
    }

    pub fn operand_class(self) -> OperandClass {
        use Opcode::*;
        match self {
            Nop | Jump | Calli | Syscall | Return | Bstcc | Bstcs | Bsteq | Bstne | Bstneg
            | Bstpos | Bstvc | Bstvs | Clc | Sec | Pushst | Popst | BinaryData => OperandClass::Untyped,
            Call => OperandClass::OptionalType,
            Beqr | Bner | Bgtr | Bgtsr | Bger | Bgesr | Beq | Bne | Bgt | Bgts | Blt | Blts | Bge
            | Bges | Ble | Bles | Cmp | Cmpi | Seq | Sne | Slt | Slts | Sgt | Sgts | Sle | Sles
            | Sge | Sges | Divs | Divsr | Mod | Modr | Divmod | Divmodr | And | Andr | Or | Orr
            | Xor | Xorr | Inv | Lsl | Lsr | Asr | Lsln | Lsrn | Asrn | Rol | Ror | Roxl | Roxr
            | Rolm | Rorm | Roxlm | Roxrm | Ext | Exts | Concat | Lsig | Msig => OperandClass::IntOnly,
            Ffromub | Ffromsb | Ffromuw | Ffromsw | Ftoub | Ftosb | Ftouw | Ftosw | Fabs | Fpow
            | Fsin | Fcos | Fround | Ffloor | Fceil | Fcomp => OperandClass::FloatOnly,
            Load | Loadm | Loadi | Loadx | Loadr | Storem | Storei | Storex | Storezm | Storezi
            | Storezx | Returnr | Inc | Incm | Dec | Decm | Neg | Negm | Add | Addr | Addm | Sub
            | Subr | Subm | Mul | Mulr | Div | Divr | Sqrt | Square | Sgn | Push | Pop => OperandClass::Any,
        }
    }

    /// Jumps, calls and branches need a label or an address to go to.
    pub fn needs_target(self) -> bool {
        self == Opcode::Jump || self == Opcode::Call || self.is_branch()
    }

    pub fn is_branch(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Bstcc | Bstcs | Bsteq | Bstne | Bstneg | Bstpos | Bstvc | Bstvs | Beqr | Bner | Bgtr
                | Bgtsr | Bger | Bgesr | Beq | Bne | Bgt | Bgts | Blt | Blts | Bge | Bges | Ble | Bles
        )
    }

    /// Unconditional control transfer: nothing after it in a chunk is reachable by fall-through.
    pub fn is_unconditional_jump(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Return | Opcode::Returnr)
    }

    /// Opcodes whose result depends on the incoming carry flag.
    pub fn depends_on_carry(self) -> bool {
        matches!(self, Opcode::Roxl | Opcode::Roxr | Opcode::Roxlm | Opcode::Roxrm)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
