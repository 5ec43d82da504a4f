//! trapgate - System-Call Boundary for a Teaching Kernel
//!
//! The only trusted gateway from user code into the kernel: the trap
//! dispatcher, the user-pointer validator, and the file and process tables
//! that back the Pintos-style syscall set.
//!
//! # Components
//! - `mm`: address-space view used to validate user memory
//! - `syscall`: trap entry, argument validation, dispatch table, handlers
//! - `fs`: open-file table with global and per-process indices
//! - `process`: exit status records and parent/child bookkeeping
//!
//! # Security Model
//! - Every user pointer is validated before the kernel reads through it
//! - Protocol violations terminate the caller with status -1
//! - Operational failures return a sentinel to a caller that keeps running
//! - No failure path leaves a table partially updated
//!
//! # Collaborators
//! The file system, process loader, scheduler, console and power control
//! are supplied by the surrounding kernel through the traits in `fs`,
//! `process` and `drivers`.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod drivers;
pub mod fs;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use config::Limits;
pub use syscall::{Kernel, Services};
pub use trap::{TrapFrame, TrapOutcome};
