//! Open-File Bookkeeping
//!
//! The kernel-side view of files opened through syscalls.
//!
//! # Design
//! - The file system itself is a collaborator behind `FileSystem`
//! - Every open handle is owned by the `FileTable`; processes only hold
//!   descriptor numbers
//! - Closing a file is dropping its handle
//!
//! # Security Properties
//! - Descriptors are never reused, so a stale fd cannot alias a newer file
//! - A process can only use descriptors it opened itself

use alloc::boxed::Box;
use core::fmt;

pub mod table;

pub use table::FileTable;

/// A file descriptor number as seen by user code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Fd(i32);

impl Fd {
    /// Console input.
    pub const STDIN: Self = Self(0);
    /// Console output.
    pub const STDOUT: Self = Self(1);
    /// First descriptor handed out for a real file.
    pub const FIRST_FILE: Self = Self(2);

    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Decode a syscall argument word (low 32 bits, signed).
    #[inline]
    pub const fn from_word(word: u64) -> Self {
        Self(word as i32)
    }

    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Whether this is one of the reserved console descriptors.
    #[inline]
    pub const fn is_console(self) -> bool {
        self.0 == Self::STDIN.0 || self.0 == Self::STDOUT.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File system collaborator.
pub trait FileSystem: Send + Sync {
    /// Create `path` with `initial_size` zero bytes. False if it exists or
    /// cannot be created.
    fn create(&self, path: &str, initial_size: u32) -> bool;

    /// Remove `path`. Open handles stay usable until closed.
    fn remove(&self, path: &str) -> bool;

    /// Open `path`, or `None` if it does not exist.
    fn open(&self, path: &str) -> Option<Box<dyn OpenFile>>;
}

/// An open file. Dropping the handle closes it.
pub trait OpenFile: Send {
    /// Read at the current position, returning the byte count.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write at the current position, returning the byte count.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Move the position. Seeking past the end is allowed.
    fn seek(&mut self, position: u32);

    /// Current position.
    fn tell(&self) -> u32;

    /// Length in bytes.
    fn length(&self) -> u32;
}

/// Operational failure of a file operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// The file system could not open the path.
    NotFound,
    /// No open descriptor with that number belongs to the caller.
    BadDescriptor,
    /// The caller already holds the maximum number of open files.
    TooManyOpen,
    /// The descriptor space is used up.
    DescriptorsExhausted,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file"),
            Self::BadDescriptor => write!(f, "bad file descriptor"),
            Self::TooManyOpen => write!(f, "too many open files"),
            Self::DescriptorsExhausted => write!(f, "descriptor space exhausted"),
        }
    }
}
