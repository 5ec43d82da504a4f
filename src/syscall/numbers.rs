//! System call numbers
//!
//! The user-visible numbering. Directory and memory-mapping calls are
//! reserved so user programs built against the full ABI decode cleanly,
//! but the kernel has no handler for them.

use core::fmt;

use super::Fault;

/// Every number the ABI defines.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallNumber {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Create = 4,
    Remove = 5,
    Open = 6,
    Filesize = 7,
    Read = 8,
    Write = 9,
    Seek = 10,
    Tell = 11,
    Close = 12,
    Mmap = 13,
    Munmap = 14,
    Chdir = 15,
    Mkdir = 16,
    Readdir = 17,
    Isdir = 18,
    Inumber = 19,
}

impl SyscallNumber {
    /// Position in the dispatch table.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u64> for SyscallNumber {
    type Error = Fault;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        let number = match raw {
            0 => Self::Halt,
            1 => Self::Exit,
            2 => Self::Exec,
            3 => Self::Wait,
            4 => Self::Create,
            5 => Self::Remove,
            6 => Self::Open,
            7 => Self::Filesize,
            8 => Self::Read,
            9 => Self::Write,
            10 => Self::Seek,
            11 => Self::Tell,
            12 => Self::Close,
            13 => Self::Mmap,
            14 => Self::Munmap,
            15 => Self::Chdir,
            16 => Self::Mkdir,
            17 => Self::Readdir,
            18 => Self::Isdir,
            19 => Self::Inumber,
            _ => return Err(Fault::UnknownSyscall(raw)),
        };
        Ok(number)
    }
}

impl fmt::Display for SyscallNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Halt => "halt",
            Self::Exit => "exit",
            Self::Exec => "exec",
            Self::Wait => "wait",
            Self::Create => "create",
            Self::Remove => "remove",
            Self::Open => "open",
            Self::Filesize => "filesize",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "seek",
            Self::Tell => "tell",
            Self::Close => "close",
            Self::Mmap => "mmap",
            Self::Munmap => "munmap",
            Self::Chdir => "chdir",
            Self::Mkdir => "mkdir",
            Self::Readdir => "readdir",
            Self::Isdir => "isdir",
            Self::Inumber => "inumber",
        };
        f.write_str(name)
    }
}
