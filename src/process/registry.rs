//! Process Registry
//!
//! Exit-status records and parent/child links for `exec`, `wait` and `exit`.
//!
//! # Record Lifecycle
//! ```text
//!   spawn ──► Running ──exit──► Exited(status) ──parent wait──► (removed)
//!                                     │
//!                                     └──parent already gone──► (removed)
//! ```
//!
//! A record is removed as soon as nobody can observe it any more: after the
//! parent reaps it, or at exit time when the process has no parent.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

use log::{debug, info, warn};
use spin::Mutex;

use super::{Pid, ProcessKind, ProcessLoader, Scheduler, SpawnError, WaitError};
use crate::drivers::Console;
use crate::fs::FileTable;

/// Execution state of a recorded process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(i32),
}

/// What the registry remembers about one process.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: Pid,
    /// `None` for root processes and for orphans.
    pub parent: Option<Pid>,
    /// Program name, printed in the exit notice.
    pub name: String,
    pub kind: ProcessKind,
    pub state: ProcessState,
    /// Parent parked in `wait` on this record.
    waiter: Option<Pid>,
    /// Set once exit handling has started.
    exiting: bool,
}

impl ProcessRecord {
    fn new(pid: Pid, parent: Option<Pid>, name: &str, kind: ProcessKind) -> Self {
        Self {
            pid,
            parent,
            name: String::from(name),
            kind,
            state: ProcessState::Running,
            waiter: None,
            exiting: false,
        }
    }
}

/// Program name of a command line: its first whitespace-separated token.
pub fn program_name(cmdline: &str) -> Option<&str> {
    cmdline.split_whitespace().next()
}

struct RegistryInner {
    records: BTreeMap<Pid, ProcessRecord>,
    next_pid: Option<i32>,
}

impl RegistryInner {
    const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_pid: Some(1),
        }
    }

    fn allocate_pid(&mut self) -> Option<Pid> {
        let raw = self.next_pid?;
        self.next_pid = raw.checked_add(1);
        Some(Pid::new(raw))
    }

    fn insert(&mut self, parent: Option<Pid>, name: &str, kind: ProcessKind) -> Option<Pid> {
        let pid = self.allocate_pid()?;
        self.records
            .insert(pid, ProcessRecord::new(pid, parent, name, kind));
        Some(pid)
    }
}

/// Registry of live and not-yet-reaped processes.
pub struct ProcessRegistry {
    loader: Arc<dyn ProcessLoader>,
    scheduler: Arc<dyn Scheduler>,
    inner: Mutex<RegistryInner>,
}

impl ProcessRegistry {
    pub fn new(loader: Arc<dyn ProcessLoader>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            loader,
            scheduler,
            inner: Mutex::new(RegistryInner::new()),
        }
    }

    /// Record a process the kernel started itself (the initial user
    /// program, or a kernel thread). It has no parent, so nobody waits on it.
    pub fn register_initial(&self, cmdline: &str, kind: ProcessKind) -> Result<Pid, SpawnError> {
        let name = program_name(cmdline).ok_or(SpawnError::EmptyCommand)?;
        let pid = self
            .inner
            .lock()
            .insert(None, name, kind)
            .ok_or(SpawnError::PidsExhausted)?;
        info!("[PROCESS] registered {} as pid {}", name, pid);
        Ok(pid)
    }

    /// Start `cmdline` as a child of `parent`.
    ///
    /// The record exists before the loader runs the child, so a child that
    /// exits immediately still leaves a status for its parent.
    pub fn spawn(&self, parent: Pid, cmdline: &str) -> Result<Pid, SpawnError> {
        let name = program_name(cmdline).ok_or(SpawnError::EmptyCommand)?;
        let pid = {
            let mut inner = self.inner.lock();
            let live = inner
                .records
                .get(&parent)
                .is_some_and(|record| record.state == ProcessState::Running);
            if !live {
                warn!("[PROCESS] exec by unregistered pid {}", parent);
                return Err(SpawnError::UnknownParent);
            }
            inner
                .insert(Some(parent), name, ProcessKind::User)
                .ok_or(SpawnError::PidsExhausted)?
        };

        if let Err(err) = self.loader.spawn(pid, cmdline) {
            self.inner.lock().records.remove(&pid);
            debug!("[PROCESS] exec {:?} by pid {} failed: {}", cmdline, parent, err);
            return Err(err.into());
        }
        debug!("[PROCESS] pid {} spawned {} as pid {}", parent, name, pid);
        Ok(pid)
    }

    /// Wait for child `pid` of `caller` to exit and consume its status.
    ///
    /// Fails immediately, without blocking, unless `pid` is an unreaped
    /// child of `caller`.
    pub fn wait(&self, caller: Pid, pid: Pid) -> Result<i32, WaitError> {
        loop {
            {
                let mut inner = self.inner.lock();
                let record = inner
                    .records
                    .get_mut(&pid)
                    .filter(|record| record.parent == Some(caller))
                    .ok_or(WaitError::NotChild)?;
                let state = record.state;
                match state {
                    ProcessState::Exited(status) => {
                        inner.records.remove(&pid);
                        debug!("[PROCESS] pid {} reaped pid {} ({})", caller, pid, status);
                        return Ok(status);
                    }
                    ProcessState::Running => record.waiter = Some(caller),
                }
            }
            self.scheduler.park();
        }
    }

    /// Record that `pid` exited with `status`.
    ///
    /// Closes the process's files, prints the exit notice for user
    /// processes, orphans its children and wakes a parent blocked in `wait`.
    /// The notice is written before the parent is woken. Only the first
    /// exit of a running process counts; later reports are ignored.
    pub fn report_exit(&self, pid: Pid, status: i32, files: &FileTable, console: &dyn Console) {
        let identity = {
            let mut inner = self.inner.lock();
            match inner.records.get_mut(&pid) {
                Some(record) if record.exiting => {
                    warn!("[PROCESS] exit({}) of pid {} ignored: already exited", status, pid);
                    return;
                }
                Some(record) => {
                    record.exiting = true;
                    Some((record.name.clone(), record.kind))
                }
                None => None,
            }
        };

        files.release_all(pid);
        let Some((name, kind)) = identity else {
            warn!("[PROCESS] exit of unregistered pid {}", pid);
            return;
        };
        if kind == ProcessKind::User {
            console.write_buffer(format!("{}: exit({})\n", name, status).as_bytes());
        }
        info!("[PROCESS] pid {} ({}) exited with status {}", pid, name, status);

        let mut inner = self.inner.lock();

        // Children that already exited can never be waited for now.
        inner.records.retain(|_, child| {
            !(child.parent == Some(pid) && matches!(child.state, ProcessState::Exited(_)))
        });
        for child in inner.records.values_mut() {
            if child.parent == Some(pid) {
                child.parent = None;
            }
        }

        let (waiter, orphaned) = match inner.records.get_mut(&pid) {
            Some(record) => {
                record.state = ProcessState::Exited(status);
                (record.waiter.take(), record.parent.is_none())
            }
            None => (None, false),
        };
        if orphaned {
            inner.records.remove(&pid);
        }
        drop(inner);

        if let Some(parent) = waiter {
            self.scheduler.unpark(parent);
        }
    }

    /// Snapshot of the record for `pid`.
    pub fn record(&self, pid: Pid) -> Option<ProcessRecord> {
        self.inner.lock().records.get(&pid).cloned()
    }

    /// State of `pid`, or `None` once reaped or reclaimed.
    pub fn state_of(&self, pid: Pid) -> Option<ProcessState> {
        self.inner.lock().records.get(&pid).map(|record| record.state)
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::testing::{FakeLoader, MemFs, RecordingConsole, ThreadScheduler};
    use std::thread;
    use std::time::Duration;

    struct Fixture {
        registry: Arc<ProcessRegistry>,
        files: FileTable,
        fs: Arc<MemFs>,
        console: RecordingConsole,
        loader: Arc<FakeLoader>,
        scheduler: Arc<ThreadScheduler>,
    }

    fn fixture() -> Fixture {
        let loader = Arc::new(FakeLoader::with_programs(&["child", "echo"]));
        let scheduler = Arc::new(ThreadScheduler::new());
        let fs = Arc::new(MemFs::new());
        Fixture {
            registry: Arc::new(ProcessRegistry::new(loader.clone(), scheduler.clone())),
            files: FileTable::new(fs.clone(), &Limits::default()),
            fs,
            console: RecordingConsole::new(),
            loader,
            scheduler,
        }
    }

    #[test]
    fn test_program_name() {
        assert_eq!(program_name("echo x y"), Some("echo"));
        assert_eq!(program_name("  child  "), Some("child"));
        assert_eq!(program_name("   "), None);
    }

    #[test]
    fn test_spawn_records_running_child() {
        let f = fixture();
        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let child = f.registry.spawn(parent, "echo hello").unwrap();
        let record = f.registry.record(child).unwrap();
        assert_eq!(record.parent, Some(parent));
        assert_eq!(record.name, "echo");
        assert_eq!(record.state, ProcessState::Running);
        assert_eq!(f.loader.spawned(), [(child, String::from("echo hello"))]);
    }

    #[test]
    fn test_failed_spawn_leaves_no_record() {
        let f = fixture();
        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let before = f.registry.len();
        assert!(matches!(
            f.registry.spawn(parent, "no-such-program"),
            Err(SpawnError::Load(_))
        ));
        assert_eq!(f.registry.spawn(parent, ""), Err(SpawnError::EmptyCommand));
        assert_eq!(f.registry.len(), before);
    }

    #[test]
    fn test_wait_on_non_child_fails_without_blocking() {
        let f = fixture();
        let a = f.registry.register_initial("a", ProcessKind::User).unwrap();
        let b = f.registry.register_initial("b", ProcessKind::User).unwrap();
        let child_of_b = f.registry.spawn(b, "child").unwrap();
        assert_eq!(f.registry.wait(a, child_of_b), Err(WaitError::NotChild));
        assert_eq!(f.registry.wait(a, Pid::new(999)), Err(WaitError::NotChild));
        assert_eq!(f.registry.wait(a, Pid::new(-1)), Err(WaitError::NotChild));
        assert_eq!(f.registry.wait(a, a), Err(WaitError::NotChild));
    }

    #[test]
    fn test_wait_twice_after_exit() {
        let f = fixture();
        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let child = f.registry.spawn(parent, "child").unwrap();
        f.registry.report_exit(child, 7, &f.files, &f.console);
        assert_eq!(f.registry.state_of(child), Some(ProcessState::Exited(7)));
        assert_eq!(f.registry.wait(parent, child), Ok(7));
        assert_eq!(f.registry.wait(parent, child), Err(WaitError::NotChild));
        assert_eq!(f.registry.state_of(child), None);
    }

    #[test]
    fn test_wait_blocks_until_child_exits() {
        let f = fixture();
        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let child = f.registry.spawn(parent, "child").unwrap();

        let registry = f.registry.clone();
        let scheduler = f.scheduler.clone();
        let waiter = thread::spawn(move || {
            scheduler.enroll(parent);
            registry.wait(parent, child)
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(f.registry.state_of(child), Some(ProcessState::Running));
        f.registry.report_exit(child, 42, &f.files, &f.console);

        assert_eq!(waiter.join().unwrap(), Ok(42));
        assert_eq!(f.registry.state_of(child), None);
    }

    #[test]
    fn test_exit_notice_for_user_processes_only() {
        let f = fixture();
        let user = f.registry.register_initial("echo a b", ProcessKind::User).unwrap();
        let kthread = f.registry.register_initial("idle", ProcessKind::Kernel).unwrap();
        f.registry.report_exit(user, 0, &f.files, &f.console);
        f.registry.report_exit(kthread, 0, &f.files, &f.console);
        assert_eq!(f.console.output(), b"echo: exit(0)\n");
    }

    #[test]
    fn test_exit_releases_files() {
        let f = fixture();
        f.fs.insert("f", b"data");
        let pid = f.registry.register_initial("init", ProcessKind::User).unwrap();
        f.files.open(pid, "f").unwrap();
        f.files.open(pid, "f").unwrap();
        f.registry.report_exit(pid, 0, &f.files, &f.console);
        assert!(f.files.owned_by(pid).is_empty());
        assert_eq!(f.fs.open_handles(), 0);
    }

    #[test]
    fn test_root_exit_reclaims_its_own_record() {
        let f = fixture();
        let root = f.registry.register_initial("init", ProcessKind::User).unwrap();
        f.registry.report_exit(root, 0, &f.files, &f.console);
        assert_eq!(f.registry.state_of(root), None);
    }

    #[test]
    fn test_orphans_are_reclaimed() {
        let f = fixture();
        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let exited = f.registry.spawn(parent, "child").unwrap();
        let running = f.registry.spawn(parent, "child").unwrap();
        f.registry.report_exit(exited, 1, &f.files, &f.console);

        f.registry.report_exit(parent, 0, &f.files, &f.console);
        // Exited child can no longer be observed
        assert_eq!(f.registry.state_of(exited), None);
        // Running child lost its parent and goes away when it exits
        assert_eq!(f.registry.record(running).unwrap().parent, None);
        f.registry.report_exit(running, 3, &f.files, &f.console);
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_second_exit_is_ignored() {
        let f = fixture();
        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let child = f.registry.spawn(parent, "child").unwrap();
        f.registry.report_exit(child, 7, &f.files, &f.console);
        f.registry.report_exit(child, -1, &f.files, &f.console);
        assert_eq!(f.console.output(), b"child: exit(7)\n");
        assert_eq!(f.registry.wait(parent, child), Ok(7));

        // Reaped, then reported again
        f.registry.report_exit(child, -1, &f.files, &f.console);
        assert_eq!(f.console.output(), b"child: exit(7)\n");
    }

    #[test]
    fn test_spawn_needs_a_running_parent() {
        let f = fixture();
        let ghost = Pid::new(40);
        assert_eq!(f.registry.spawn(ghost, "child"), Err(SpawnError::UnknownParent));
        assert!(f.registry.is_empty());
        assert!(f.loader.spawned().is_empty());

        let parent = f.registry.register_initial("init", ProcessKind::User).unwrap();
        let child = f.registry.spawn(parent, "child").unwrap();
        f.registry.report_exit(child, 0, &f.files, &f.console);
        assert_eq!(f.registry.spawn(child, "child"), Err(SpawnError::UnknownParent));
    }

    #[test]
    fn test_exit_of_unknown_pid_is_harmless() {
        let f = fixture();
        f.registry.report_exit(Pid::new(77), 0, &f.files, &f.console);
        assert!(f.console.output().is_empty());
        assert!(f.registry.is_empty());
    }
}
