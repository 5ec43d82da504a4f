//! Protocol violations
//!
//! Anything in this enum means the caller broke the syscall ABI. The
//! dispatcher never returns these to user code: the caller is terminated
//! with status -1.

use core::fmt;

use super::SyscallNumber;
use crate::mm::VirtAddr;

/// A protocol violation by the calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Pointer is null, unmapped, in kernel space, or lacks the access
    /// rights the syscall needs.
    BadAddress(VirtAddr),
    /// No terminator within the string length limit.
    UnterminatedString(VirtAddr),
    /// Number outside the ABI.
    UnknownSyscall(u64),
    /// Number reserved by the ABI but not provided by this kernel.
    Unimplemented(SyscallNumber),
    /// Dispatch table and handler disagree on an argument slot.
    ArgumentMismatch(usize),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadAddress(addr) => write!(f, "bad user address {}", addr),
            Self::UnterminatedString(addr) => write!(f, "unterminated string at {}", addr),
            Self::UnknownSyscall(raw) => write!(f, "unknown syscall {}", raw),
            Self::Unimplemented(number) => write!(f, "unimplemented syscall {}", number),
            Self::ArgumentMismatch(slot) => write!(f, "argument {} has the wrong kind", slot),
        }
    }
}
