//! Global Open-File Table
//!
//! Owns every file handle opened through the syscall interface and indexes
//! it twice: by descriptor (system-wide) and by owning process.
//!
//! # Design
//! - One table-wide spinlock serializes every operation, including the call
//!   into the file system; the lock doubles as the file-system lock
//! - Descriptors come from a monotonic allocator and are never reused
//! - Every lookup yields an explicit found/not-found result before anything
//!   is mutated, so a failed operation leaves both indices untouched
//!
//! # Invariants
//! - An fd is in `entries` iff it is in exactly one owner's set in `by_owner`
//! - Console descriptors never appear in either index

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::debug;
use spin::Mutex;

use super::{Fd, FileError, FileSystem, OpenFile};
use crate::config::Limits;
use crate::process::Pid;

/// Hands out descriptor numbers in increasing order, starting after the
/// console descriptors. Exhaustion is reported, never wrapped.
#[derive(Debug)]
struct FdAllocator {
    next: Option<i32>,
}

impl FdAllocator {
    const fn new() -> Self {
        Self {
            next: Some(Fd::FIRST_FILE.as_i32()),
        }
    }

    fn allocate(&mut self) -> Option<Fd> {
        let raw = self.next?;
        self.next = raw.checked_add(1);
        Some(Fd::new(raw))
    }
}

struct FileEntry {
    handle: Box<dyn OpenFile>,
    owner: Pid,
}

struct TableInner {
    entries: BTreeMap<Fd, FileEntry>,
    by_owner: BTreeMap<Pid, BTreeSet<Fd>>,
    allocator: FdAllocator,
}

impl TableInner {
    const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_owner: BTreeMap::new(),
            allocator: FdAllocator::new(),
        }
    }

    fn open_by(&self, owner: Pid) -> usize {
        self.by_owner.get(&owner).map_or(0, BTreeSet::len)
    }

    fn insert(&mut self, fd: Fd, owner: Pid, handle: Box<dyn OpenFile>) {
        self.entries.insert(fd, FileEntry { handle, owner });
        self.by_owner.entry(owner).or_default().insert(fd);
    }

    fn lookup(&mut self, owner: Pid, fd: Fd) -> Result<&mut FileEntry, FileError> {
        self.entries
            .get_mut(&fd)
            .filter(|entry| entry.owner == owner)
            .ok_or(FileError::BadDescriptor)
    }

    /// Unlink `fd` from both indices and hand back its handle.
    fn remove(&mut self, owner: Pid, fd: Fd) -> Result<Box<dyn OpenFile>, FileError> {
        self.lookup(owner, fd)?;
        let entry = self
            .entries
            .remove(&fd)
            .ok_or(FileError::BadDescriptor)?;
        if let Some(owned) = self.by_owner.get_mut(&owner) {
            owned.remove(&fd);
            if owned.is_empty() {
                self.by_owner.remove(&owner);
            }
        }
        Ok(entry.handle)
    }
}

/// The system-wide table of open files.
pub struct FileTable {
    fs: Arc<dyn FileSystem>,
    max_open_per_process: usize,
    inner: Mutex<TableInner>,
}

impl FileTable {
    /// Create an empty table over the given file system.
    pub fn new(fs: Arc<dyn FileSystem>, limits: &Limits) -> Self {
        Self {
            fs,
            max_open_per_process: limits.max_open_per_process,
            inner: Mutex::new(TableInner::new()),
        }
    }

    /// Create a file.
    pub fn create(&self, path: &str, initial_size: u32) -> bool {
        let _guard = self.inner.lock();
        self.fs.create(path, initial_size)
    }

    /// Remove a file by name.
    pub fn remove(&self, path: &str) -> bool {
        let _guard = self.inner.lock();
        self.fs.remove(path)
    }

    /// Open `path` on behalf of `owner` and return a fresh descriptor.
    ///
    /// Nothing is allocated if the file system cannot open the path.
    pub fn open(&self, owner: Pid, path: &str) -> Result<Fd, FileError> {
        let mut inner = self.inner.lock();
        if inner.open_by(owner) >= self.max_open_per_process {
            debug!("[FILES] pid {} at open-file limit", owner);
            return Err(FileError::TooManyOpen);
        }
        let handle = self.fs.open(path).ok_or(FileError::NotFound)?;
        // On exhaustion the fresh handle is dropped, which closes it.
        let fd = inner
            .allocator
            .allocate()
            .ok_or(FileError::DescriptorsExhausted)?;
        inner.insert(fd, owner, handle);
        debug!("[FILES] pid {} opened {:?} as fd {}", owner, path, fd);
        Ok(fd)
    }

    /// Close `fd`. Unknown, console, foreign and already-closed
    /// descriptors report `BadDescriptor` and change nothing.
    pub fn close(&self, owner: Pid, fd: Fd) -> Result<(), FileError> {
        let mut inner = self.inner.lock();
        let handle = inner.remove(owner, fd)?;
        drop(handle);
        Ok(())
    }

    /// Read from `fd` into a kernel buffer.
    pub fn read(&self, owner: Pid, fd: Fd, buf: &mut [u8]) -> Result<usize, FileError> {
        let mut inner = self.inner.lock();
        let entry = inner.lookup(owner, fd)?;
        Ok(entry.handle.read(buf))
    }

    /// Write a kernel buffer to `fd`.
    pub fn write(&self, owner: Pid, fd: Fd, buf: &[u8]) -> Result<usize, FileError> {
        let mut inner = self.inner.lock();
        let entry = inner.lookup(owner, fd)?;
        Ok(entry.handle.write(buf))
    }

    /// Length of the file behind `fd`.
    pub fn filesize(&self, owner: Pid, fd: Fd) -> Result<u32, FileError> {
        let mut inner = self.inner.lock();
        let entry = inner.lookup(owner, fd)?;
        Ok(entry.handle.length())
    }

    /// Move the position of `fd`.
    pub fn seek(&self, owner: Pid, fd: Fd, position: u32) -> Result<(), FileError> {
        let mut inner = self.inner.lock();
        let entry = inner.lookup(owner, fd)?;
        entry.handle.seek(position);
        Ok(())
    }

    /// Current position of `fd`.
    pub fn tell(&self, owner: Pid, fd: Fd) -> Result<u32, FileError> {
        let mut inner = self.inner.lock();
        let entry = inner.lookup(owner, fd)?;
        Ok(entry.handle.tell())
    }

    /// Close every file `owner` still has open. Used only on process exit.
    ///
    /// Returns the number of descriptors released.
    pub fn release_all(&self, owner: Pid) -> usize {
        let mut inner = self.inner.lock();
        let Some(owned) = inner.by_owner.remove(&owner) else {
            return 0;
        };
        let mut released = 0;
        for fd in owned {
            if inner.entries.remove(&fd).is_some() {
                released += 1;
            }
        }
        if released > 0 {
            debug!("[FILES] released {} descriptor(s) of pid {}", released, owner);
        }
        released
    }

    /// Number of open descriptors system-wide.
    pub fn open_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Descriptors currently owned by `owner`, in ascending order.
    pub fn owned_by(&self, owner: Pid) -> Vec<Fd> {
        self.inner
            .lock()
            .by_owner
            .get(&owner)
            .map(|owned| owned.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn assert_indices_agree(&self) {
        let inner = self.inner.lock();
        let mut indexed = 0;
        for (owner, owned) in inner.by_owner.iter() {
            assert!(!owned.is_empty());
            for fd in owned {
                let entry = inner.entries.get(fd).expect("per-process fd missing globally");
                assert_eq!(entry.owner, *owner);
                indexed += 1;
            }
        }
        assert_eq!(indexed, inner.entries.len());
        assert!(!inner.entries.keys().any(|fd| fd.is_console()));
    }
}
