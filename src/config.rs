//! Kernel-wide limits for the syscall layer.
//!
//! Defaults are compile-time constants; a kernel image can override them by
//! handing its own `Limits` to `Kernel::new`.

use crate::mm::address::PAGE_SIZE;

/// Longest string (excluding the terminator) accepted from user space.
///
/// A command line must fit in one page, matching what the loader can copy
/// onto a fresh user stack.
pub const MAX_USER_STRING: usize = PAGE_SIZE;

/// Maximum number of files one process may hold open at once.
pub const MAX_OPEN_PER_PROCESS: usize = 128;

/// Runtime-tunable limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Upper bound on a user string scan.
    pub max_string_len: usize,
    /// Per-process open file cap.
    pub max_open_per_process: usize,
}

impl Limits {
    pub const fn new() -> Self {
        Self {
            max_string_len: MAX_USER_STRING,
            max_open_per_process: MAX_OPEN_PER_PROCESS,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}
