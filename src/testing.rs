//! Host-side stand-ins for the kernel collaborators, shared by unit tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};

use crate::drivers::{Console, PowerControl};
use crate::fs::{FileSystem, OpenFile};
use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE};
use crate::process::registry::program_name;
use crate::process::{LoadError, Pid, ProcessLoader, Scheduler};

/// Sparse page-granular user address space.
pub struct FakeSpace {
    pages: Mutex<BTreeMap<usize, (PageFlags, Box<[u8; PAGE_SIZE]>)>>,
}

impl FakeSpace {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(BTreeMap::new()),
        }
    }

    /// Map `count` zeroed pages starting at page-aligned `addr`.
    pub fn map(&self, addr: usize, count: usize, flags: PageFlags) {
        assert_eq!(addr % PAGE_SIZE, 0);
        let mut pages = self.pages.lock().unwrap();
        for i in 0..count {
            let number = addr / PAGE_SIZE + i;
            pages.insert(number, (flags, Box::new([0u8; PAGE_SIZE])));
        }
    }

    /// Write bytes regardless of page permissions.
    pub fn poke(&self, addr: usize, bytes: &[u8]) {
        let mut pages = self.pages.lock().unwrap();
        for (i, &byte) in bytes.iter().enumerate() {
            let at = addr + i;
            let page = pages.get_mut(&(at / PAGE_SIZE)).expect("poke into unmapped page");
            page.1[at % PAGE_SIZE] = byte;
        }
    }

    /// Read bytes regardless of page permissions.
    pub fn peek(&self, addr: usize, len: usize) -> Vec<u8> {
        let pages = self.pages.lock().unwrap();
        (addr..addr + len)
            .map(|at| {
                let page = pages.get(&(at / PAGE_SIZE)).expect("peek into unmapped page");
                page.1[at % PAGE_SIZE]
            })
            .collect()
    }
}

impl AddressSpace for FakeSpace {
    fn translate(&self, page: VirtAddr) -> Option<PageFlags> {
        self.pages
            .lock()
            .unwrap()
            .get(&page.page_number())
            .map(|(flags, _)| *flags)
    }

    fn copy_in(&self, src: VirtAddr, dst: &mut [u8]) {
        let bytes = self.peek(src.as_usize(), dst.len());
        dst.copy_from_slice(&bytes);
    }

    fn copy_out(&self, dst: VirtAddr, src: &[u8]) {
        self.poke(dst.as_usize(), src);
    }
}

/// In-memory flat file system. File contents are shared by all handles,
/// so removing a name does not disturb open handles.
pub struct MemFs {
    files: Mutex<BTreeMap<String, Arc<Mutex<Vec<u8>>>>>,
    open: Arc<AtomicUsize>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn insert(&self, name: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Mutex::new(data.to_vec())));
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        let data = files.get(name)?;
        let bytes = data.lock().unwrap().clone();
        Some(bytes)
    }

    /// Handles opened and not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl FileSystem for MemFs {
    fn create(&self, path: &str, initial_size: u32) -> bool {
        let mut files = self.files.lock().unwrap();
        if path.is_empty() || files.contains_key(path) {
            return false;
        }
        let data = vec![0u8; initial_size as usize];
        files.insert(path.to_string(), Arc::new(Mutex::new(data)));
        true
    }

    fn remove(&self, path: &str) -> bool {
        self.files.lock().unwrap().remove(path).is_some()
    }

    fn open(&self, path: &str) -> Option<Box<dyn OpenFile>> {
        let data = self.files.lock().unwrap().get(path)?.clone();
        self.open.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MemFile {
            data,
            position: 0,
            open: self.open.clone(),
        }))
    }
}

struct MemFile {
    data: Arc<Mutex<Vec<u8>>>,
    position: usize,
    open: Arc<AtomicUsize>,
}

impl OpenFile for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let data = self.data.lock().unwrap();
        let start = self.position.min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        self.position += count;
        count
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let mut data = self.data.lock().unwrap();
        let end = self.position + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[self.position..end].copy_from_slice(buf);
        self.position = end;
        buf.len()
    }

    fn seek(&mut self, position: u32) {
        self.position = position as usize;
    }

    fn tell(&self) -> u32 {
        self.position as u32
    }

    fn length(&self) -> u32 {
        self.data.lock().unwrap().len() as u32
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Console with scripted input and captured output.
pub struct RecordingConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
    writes: AtomicUsize,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        Self {
            input: Mutex::new(bytes.iter().copied().collect()),
            output: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().unwrap().clone()
    }

    /// Number of `write_buffer` calls.
    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Console for RecordingConsole {
    fn read_byte(&self) -> u8 {
        self.input.lock().unwrap().pop_front().unwrap_or(0)
    }

    fn write_buffer(&self, bytes: &[u8]) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.output.lock().unwrap().extend_from_slice(bytes);
    }
}

pub struct FakePower {
    off: AtomicBool,
}

impl FakePower {
    pub fn new() -> Self {
        Self {
            off: AtomicBool::new(false),
        }
    }

    pub fn is_off(&self) -> bool {
        self.off.load(Ordering::SeqCst)
    }
}

impl PowerControl for FakePower {
    fn power_off(&self) {
        self.off.store(true, Ordering::SeqCst);
    }
}

/// Loader that knows a fixed set of program names and records every spawn.
/// It does not run anything; tests drive the child's syscalls themselves.
pub struct FakeLoader {
    programs: BTreeSet<String>,
    spawned: Mutex<Vec<(Pid, String)>>,
}

impl FakeLoader {
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(|name| name.to_string()).collect(),
            spawned: Mutex::new(Vec::new()),
        }
    }

    pub fn spawned(&self) -> Vec<(Pid, String)> {
        self.spawned.lock().unwrap().clone()
    }
}

impl ProcessLoader for FakeLoader {
    fn spawn(&self, pid: Pid, cmdline: &str) -> Result<(), LoadError> {
        let name = program_name(cmdline).ok_or(LoadError::NotFound)?;
        if !self.programs.contains(name) {
            return Err(LoadError::NotFound);
        }
        self.spawned
            .lock()
            .unwrap()
            .push((pid, cmdline.to_string()));
        Ok(())
    }
}

/// Maps pids onto host threads and parks them with `std::thread::park`,
/// which has the token semantics `Scheduler` requires.
pub struct ThreadScheduler {
    threads: Mutex<BTreeMap<Pid, Thread>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(BTreeMap::new()),
        }
    }

    /// Bind `pid` to the calling thread.
    pub fn enroll(&self, pid: Pid) {
        self.threads.lock().unwrap().insert(pid, thread::current());
    }
}

impl Scheduler for ThreadScheduler {
    fn park(&self) {
        thread::park();
    }

    fn unpark(&self, pid: Pid) {
        if let Some(thread) = self.threads.lock().unwrap().get(&pid) {
            thread.unpark();
        }
    }
}
