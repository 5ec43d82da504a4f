//! Page-Table View of a User Address Space
//!
//! The syscall layer never walks hardware page tables itself. It asks the
//! owning process's `AddressSpace` what a page's leaf entry says and copies
//! bytes through it once a range has been validated.
//!
//! # Security Properties
//! - `translate` is a pure query: it never touches the page it describes
//! - `copy_in` / `copy_out` are only reached through validated buffers

use bitflags::bitflags;

use super::address::VirtAddr;

bitflags! {
    /// Permissions of a mapped leaf entry, as seen by the validator.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        /// Entry is present.
        const VALID = 1 << 0;
        /// Accessible from EL0.
        const USER = 1 << 1;
        /// Writable from EL0.
        const WRITE = 1 << 2;
    }
}

impl PageFlags {
    /// Read-only user data.
    pub const USER_RO: Self = Self::VALID.union(Self::USER);
    /// Read/write user data.
    pub const USER_RW: Self = Self::USER_RO.union(Self::WRITE);

    /// Whether user code may read through this entry.
    #[inline]
    pub const fn user_readable(self) -> bool {
        self.contains(Self::USER_RO)
    }

    /// Whether user code may write through this entry.
    #[inline]
    pub const fn user_writable(self) -> bool {
        self.contains(Self::USER_RW)
    }
}

/// Kind of access a syscall will make to a user range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Kernel reads user memory (write buffers, strings, stack words).
    Read,
    /// Kernel writes user memory (read buffers).
    Write,
}

impl Access {
    /// Check a leaf entry against this access kind.
    #[inline]
    pub const fn permitted_by(self, flags: PageFlags) -> bool {
        match self {
            Access::Read => flags.user_readable(),
            Access::Write => flags.user_writable(),
        }
    }
}

/// The address space of the process that trapped.
///
/// Implementations sit on the real page tables: `translate` reads the leaf
/// entry for a page, and the copy routines run with the process's
/// translation regime active. The copy routines may assume every byte they
/// are asked to touch lies on a page `translate` reported as accessible.
pub trait AddressSpace {
    /// Look up the leaf entry covering `page`; `None` if unmapped.
    fn translate(&self, page: VirtAddr) -> Option<PageFlags>;

    /// Copy `dst.len()` bytes starting at user address `src`.
    fn copy_in(&self, src: VirtAddr, dst: &mut [u8]);

    /// Copy `src` to user memory starting at `dst`.
    fn copy_out(&self, dst: VirtAddr, src: &[u8]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_checks() {
        assert!(Access::Read.permitted_by(PageFlags::USER_RO));
        assert!(!Access::Write.permitted_by(PageFlags::USER_RO));
        assert!(Access::Write.permitted_by(PageFlags::USER_RW));
    }

    #[test]
    fn test_kernel_only_page_rejected() {
        // Present but not user-accessible
        let kernel_rw = PageFlags::VALID | PageFlags::WRITE;
        assert!(!Access::Read.permitted_by(kernel_rw));
        assert!(!Access::Write.permitted_by(kernel_rw));
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let stale = PageFlags::USER | PageFlags::WRITE;
        assert!(!Access::Read.permitted_by(stale));
    }
}
