//! file: core/src/ir/syscall.rs
//! description: numbered system calls reachable through `syscall #n`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    CompareStrings,
    ClampUByte,
    ClampByte,
    ClampUWord,
    ClampWord,
    ClampFloat,
    CallFar,
    CallFar2,
}

impl Syscall {
    pub fn number(self) -> i32 {
        match self {
            Syscall::CompareStrings => 0,
            Syscall::ClampUByte => 1,
            Syscall::ClampByte => 2,
            Syscall::ClampUWord => 3,
            Syscall::ClampWord => 4,
            Syscall::ClampFloat => 5,
            Syscall::CallFar => 6,
            Syscall::CallFar2 => 7,
        }
    }

    pub fn from_number(number: i32) -> Option<Self> {
        match number {
            0 => Some(Syscall::CompareStrings),
            1 => Some(Syscall::ClampUByte),
            2 => Some(Syscall::ClampByte),
            3 => Some(Syscall::ClampUWord),
            4 => Some(Syscall::ClampWord),
            5 => Some(Syscall::ClampFloat),
            6 => Some(Syscall::CallFar),
            7 => Some(Syscall::CallFar2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Syscall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Syscall::CompareStrings => "compare_strings",
            Syscall::ClampUByte => "clamp_ubyte",
            Syscall::ClampByte => "clamp_byte",
            Syscall::ClampUWord => "clamp_uword",
            Syscall::ClampWord => "clamp_word",
            Syscall::ClampFloat => "clamp_float",
            Syscall::CallFar => "callfar",
            Syscall::CallFar2 => "callfar2",
        };
        write!(f, "{}", name)
    }
}
