//! Process Lifecycle Bookkeeping
//!
//! Tracks what the syscall layer needs to know about processes: who spawned
//! whom, and the exit status each parent may collect exactly once.
//!
//! # Design
//! - Creating and scheduling threads belongs to the loader/scheduler; this
//!   module only sees them through `ProcessLoader` and `Scheduler`
//! - A parent blocked in `wait` parks on the child's record and is woken by
//!   the child's exit
//!
//! # Security Properties
//! - Only the real parent can collect a child's status
//! - A status is consumed by the first successful `wait`

use core::fmt;

pub mod registry;

pub use registry::{ProcessRecord, ProcessRegistry, ProcessState};

/// Process identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(i32);

impl Pid {
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
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a process prints the exit notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    /// Loaded from a user program.
    User,
    /// Internal kernel thread; exits silently.
    Kernel,
}

/// Loader failure reported by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// No executable with that name.
    NotFound,
    /// The file is not a loadable executable.
    BadExecutable,
    /// Not enough memory for a new address space or thread.
    OutOfMemory,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "executable not found"),
            Self::BadExecutable => write!(f, "not a loadable executable"),
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

/// Operational failure of `exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The command line names no program.
    EmptyCommand,
    /// The pid space is used up.
    PidsExhausted,
    /// The caller is not a running process the registry knows about.
    UnknownParent,
    /// The loader refused.
    Load(LoadError),
}

impl From<LoadError> for SpawnError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCommand => write!(f, "empty command line"),
            Self::PidsExhausted => write!(f, "pid space exhausted"),
            Self::UnknownParent => write!(f, "caller is not a registered process"),
            Self::Load(err) => write!(f, "load failed: {}", err),
        }
    }
}

/// Operational failure of `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Not a live child of the caller (never was, or already reaped).
    NotChild,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotChild => write!(f, "not a waitable child"),
        }
    }
}

/// Process loader collaborator.
pub trait ProcessLoader: Send + Sync {
    /// Load and start `cmdline` as process `pid`.
    ///
    /// Returns once the executable has loaded (or failed to). The new
    /// process may already be running, and even exiting, by then.
    fn spawn(&self, pid: Pid, cmdline: &str) -> Result<(), LoadError>;
}

/// Scheduler hooks for blocking in `wait`.
///
/// `park` and `unpark` follow token semantics: an `unpark` delivered before
/// the matching `park` makes that `park` return at once. `park` may return
/// spuriously; callers re-check their condition.
pub trait Scheduler: Send + Sync {
    /// Block the current thread until it is unparked.
    fn park(&self);

    /// Make the thread of `pid` runnable again.
    fn unpark(&self, pid: Pid);
}
