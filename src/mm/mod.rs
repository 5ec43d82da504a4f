//! Memory management view used by the syscall layer
//!
//! Provides:
//! - User virtual addresses and the kernel/user split
//! - Page permission flags
//! - The `AddressSpace` query/copy interface
//!
//! # Security Principles
//! - User addresses are never dereferenced directly
//! - Permission checks happen per page, before any copy

pub mod address;
pub mod paging;

pub use address::{VirtAddr, PAGE_SIZE, USER_TOP};
pub use paging::{Access, AddressSpace, PageFlags};
