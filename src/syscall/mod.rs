//! System Call Interface
//!
//! The trap entry point for SVC from user mode.
//!
//! # Per-Trap Flow
//! ```text
//!   Decode ──► ValidateArgs ──► Extract ──► Execute ──► WriteResult
//!      │             │              │           │
//!      └─────────────┴──────────────┴───────────┴──► TerminateCaller
//! ```
//!
//! # Security Model
//! - Whitelist approach: only numbers in the dispatch table run
//! - The stack word holding the number, the argument block, and every
//!   pointee are validated before they are read
//! - Any protocol violation terminates the caller with status -1 and has
//!   no other effect
//! - Operational failures return -1 (or 0) and the caller keeps running

mod fault;
mod handler;
mod numbers;
mod table;
mod validate;

use alloc::sync::Arc;

use log::{info, trace, warn};

use crate::config::Limits;
use crate::drivers::{Console, PowerControl};
use crate::fs::{FileSystem, FileTable};
use crate::mm::{AddressSpace, VirtAddr};
use crate::process::{Pid, ProcessKind, ProcessLoader, ProcessRegistry, Scheduler, SpawnError};
use crate::trap::{TrapFrame, TrapOutcome};

pub use fault::Fault;
pub use numbers::SyscallNumber;
pub use table::{ArgKind, Completion, SyscallSpec, MAX_ARGS};
pub use validate::{UserBuffer, UserBufferMut, UserStr, Validator, WORD_SIZE};

use table::Invocation;

/// Collaborators supplied by the kernel image.
pub struct Services {
    pub fs: Arc<dyn FileSystem>,
    pub loader: Arc<dyn ProcessLoader>,
    pub scheduler: Arc<dyn Scheduler>,
    pub console: Arc<dyn Console>,
    pub power: Arc<dyn PowerControl>,
}

/// The syscall layer: file table, process registry and the devices the
/// handlers talk to.
pub struct Kernel {
    files: FileTable,
    processes: ProcessRegistry,
    console: Arc<dyn Console>,
    power: Arc<dyn PowerControl>,
    limits: Limits,
}

impl Kernel {
    pub fn new(services: Services, limits: Limits) -> Self {
        Self {
            files: FileTable::new(services.fs, &limits),
            processes: ProcessRegistry::new(services.loader, services.scheduler),
            console: services.console,
            power: services.power,
            limits,
        }
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    /// Register a process started by the kernel itself (the first user
    /// program, or a kernel thread).
    pub fn start_process(&self, cmdline: &str, kind: ProcessKind) -> Result<Pid, SpawnError> {
        self.processes.register_initial(cmdline, kind)
    }

    /// Handle an SVC from `caller`.
    ///
    /// `space` is the caller's address space. On `Resume` the frame holds
    /// the result; on `Exited` the caller's bookkeeping is done and the
    /// trap exit path must tear its context down.
    pub fn handle_trap(
        &self,
        caller: Pid,
        space: &dyn AddressSpace,
        frame: &mut TrapFrame,
    ) -> TrapOutcome {
        let validator = Validator::new(space, &self.limits);
        match self.dispatch(caller, &validator, frame) {
            Ok(Completion::Value(value)) => {
                frame.set_return(value);
                TrapOutcome::Resume
            }
            Ok(Completion::Void) => TrapOutcome::Resume,
            Ok(Completion::Exit(status)) => self.exit(caller, status),
            Ok(Completion::Halt) => {
                info!("[SYSCALL] halt requested by pid {}", caller);
                self.power.power_off();
                TrapOutcome::Halted
            }
            Err(fault) => {
                warn!("[SYSCALL] pid {} terminated: {}", caller, fault);
                self.exit(caller, -1)
            }
        }
    }

    /// Terminate `caller` with `status`.
    ///
    /// Also the entry point for the architecture's user fault path, which
    /// kills the faulting process with status -1.
    pub fn exit(&self, caller: Pid, status: i32) -> TrapOutcome {
        self.processes
            .report_exit(caller, status, &self.files, self.console.as_ref());
        TrapOutcome::Exited(status)
    }

    fn dispatch(
        &self,
        caller: Pid,
        validator: &Validator<'_>,
        frame: &TrapFrame,
    ) -> Result<Completion, Fault> {
        // Decode
        let sp = VirtAddr::from(frame.user_sp());
        let number = SyscallNumber::try_from(validator.read_word(sp)?)?;
        let spec = table::lookup(number).ok_or(Fault::Unimplemented(number))?;

        // ValidateArgs: exactly the declared argument block
        let base = sp.checked_add(WORD_SIZE).ok_or(Fault::BadAddress(sp))?;
        let mut words = [0u64; MAX_ARGS];
        let words = &mut words[..spec.arity()];
        validator.read_words(base, words)?;

        // Extract
        let args = table::extract(spec, words, validator)?;
        trace!("[SYSCALL] pid {}: {}{:x?}", caller, number, words);

        // Execute
        let mut invocation = Invocation { caller, args };
        (spec.handler)(self, &mut invocation)
    }
}
