//! System Call Input Validation
//!
//! Provides secure validation for every pointer a syscall receives.
//!
//! # Security Principles
//! - Validate ALL user addresses before use
//! - Fail-secure: deny by default
//! - Prevent common vulnerabilities:
//!   - Kernel memory disclosure (kernel-half addresses always rejected)
//!   - Faults inside the kernel (every page checked before any copy)
//!   - TOCTOU races (data is copied to kernel space before use)
//!   - Null pointer dereference (explicit checks)
//!
//! Validation has no side effects. A failure is a `Fault`, which the
//! dispatcher turns into termination of the caller.

use alloc::vec::Vec;

use super::Fault;
use crate::config::Limits;
use crate::mm::{Access, AddressSpace, VirtAddr, PAGE_SIZE, USER_TOP};

/// Size of one word on the user stack.
pub const WORD_SIZE: usize = core::mem::size_of::<u64>();

/// A validated user-space buffer the kernel will read from
///
/// This type guarantees that:
/// - The buffer is within user space
/// - Every page it touches is mapped and user-readable
/// - The length doesn't overflow
///
/// Only constructed after validation passes.
pub struct UserBuffer<'a> {
    space: &'a dyn AddressSpace,
    addr: VirtAddr,
    len: usize,
}

impl<'a> UserBuffer<'a> {
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy part of the buffer, starting `offset` bytes in, into kernel
    /// memory. Returns how many bytes were copied; never reads past the
    /// validated range.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.len.saturating_sub(offset));
        if count == 0 {
            return 0;
        }
        // In range: offset < len, so this cannot wrap
        let src = VirtAddr::new(self.addr.as_usize() + offset);
        self.space.copy_in(src, &mut dst[..count]);
        count
    }

    /// Copy the whole buffer into kernel memory.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = alloc::vec![0u8; self.len];
        self.read_at(0, &mut bytes);
        bytes
    }
}

impl core::fmt::Debug for UserBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "UserBuffer({}, {})", self.addr, self.len)
    }
}

/// A validated user-space buffer the kernel will write into
///
/// Same guarantees as `UserBuffer`, with every page user-writable.
pub struct UserBufferMut<'a> {
    space: &'a dyn AddressSpace,
    addr: VirtAddr,
    len: usize,
}

impl<'a> UserBufferMut<'a> {
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `src` into the buffer starting `offset` bytes in. Returns how
    /// many bytes were copied; never writes past the validated range.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> usize {
        let count = src.len().min(self.len.saturating_sub(offset));
        if count == 0 {
            return 0;
        }
        let dst = VirtAddr::new(self.addr.as_usize() + offset);
        self.space.copy_out(dst, &src[..count]);
        count
    }

    /// Store a single byte at `offset`.
    pub fn store_byte(&mut self, offset: usize, byte: u8) -> bool {
        self.write_at(offset, &[byte]) == 1
    }
}

impl core::fmt::Debug for UserBufferMut<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "UserBufferMut({}, {})", self.addr, self.len)
    }
}

/// A NUL-terminated user string, copied into kernel memory.
///
/// The bytes are whatever the user wrote before the terminator. Whether
/// they name anything is up to the syscall that receives them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStr {
    addr: VirtAddr,
    bytes: Vec<u8>,
}

impl UserStr {
    /// Where the string starts in user memory.
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }

    /// Length excluding the terminator.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The string as text, or `None` if it is not valid UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.bytes).ok()
    }
}

/// Validator bound to the address space of the trapping process.
pub struct Validator<'a> {
    space: &'a dyn AddressSpace,
    max_string_len: usize,
}

impl<'a> Validator<'a> {
    pub fn new(space: &'a dyn AddressSpace, limits: &Limits) -> Self {
        Self {
            space,
            max_string_len: limits.max_string_len,
        }
    }

    /// Check that `[addr, addr + len)` may be accessed by the kernel on the
    /// caller's behalf.
    ///
    /// # Security Checks
    /// 1. Pointer is not null
    /// 2. Pointer + length doesn't overflow
    /// 3. End address is within user space
    /// 4. Every page in the range is mapped with the needed user rights
    ///
    /// Zero-length ranges are always valid and never examined.
    pub fn validate_range(&self, addr: VirtAddr, len: usize, access: Access) -> Result<(), Fault> {
        if len == 0 {
            return Ok(());
        }
        if addr.is_null() {
            return Err(Fault::BadAddress(addr));
        }
        let end = addr.checked_add(len).ok_or(Fault::BadAddress(addr))?;
        if end.as_usize() > USER_TOP {
            return Err(Fault::BadAddress(addr));
        }

        let mut page = addr.page_base();
        while page < end {
            self.check_page(page, access)?;
            // end <= USER_TOP, so the next page base cannot overflow
            page = VirtAddr::new(page.as_usize() + PAGE_SIZE);
        }
        Ok(())
    }

    /// Validate a buffer the kernel will read from.
    pub fn validate_user_read(&self, addr: VirtAddr, len: usize) -> Result<UserBuffer<'a>, Fault> {
        self.validate_range(addr, len, Access::Read)?;
        Ok(UserBuffer {
            space: self.space,
            addr,
            len,
        })
    }

    /// Validate a buffer the kernel will write into.
    pub fn validate_user_write(
        &self,
        addr: VirtAddr,
        len: usize,
    ) -> Result<UserBufferMut<'a>, Fault> {
        self.validate_range(addr, len, Access::Write)?;
        Ok(UserBufferMut {
            space: self.space,
            addr,
            len,
        })
    }

    /// Validate and copy a NUL-terminated string.
    ///
    /// Each page is checked before any byte on it is read, and the scan
    /// stops at the length limit, at the first unmapped page, or at the
    /// kernel/user boundary, whichever comes first.
    pub fn validate_c_string(&self, addr: VirtAddr) -> Result<UserStr, Fault> {
        if addr.is_null() {
            return Err(Fault::BadAddress(addr));
        }

        // Budget includes the terminator
        let budget = self.max_string_len.saturating_add(1);
        let mut bytes: Vec<u8> = Vec::new();
        let mut cursor = addr;
        loop {
            if cursor.is_kernel() {
                return Err(Fault::BadAddress(cursor));
            }
            self.check_page(cursor.page_base(), Access::Read)?;

            let chunk = (PAGE_SIZE - cursor.page_offset()).min(budget - bytes.len());
            let start = bytes.len();
            bytes.resize(start + chunk, 0);
            self.space.copy_in(cursor, &mut bytes[start..]);

            if let Some(nul) = bytes[start..].iter().position(|&b| b == 0) {
                bytes.truncate(start + nul);
                return Ok(UserStr { addr, bytes });
            }
            if bytes.len() >= budget {
                return Err(Fault::UnterminatedString(addr));
            }
            cursor = cursor.checked_add(chunk).ok_or(Fault::BadAddress(cursor))?;
        }
    }

    /// Validate and read one little-endian word from the user stack.
    pub fn read_word(&self, addr: VirtAddr) -> Result<u64, Fault> {
        let mut word = [0u64; 1];
        self.read_words(addr, &mut word)?;
        Ok(word[0])
    }

    /// Validate the whole block `[addr, addr + 8 * out.len())` and only
    /// then read it.
    pub fn read_words(&self, addr: VirtAddr, out: &mut [u64]) -> Result<(), Fault> {
        let len = out.len() * WORD_SIZE;
        self.validate_range(addr, len, Access::Read)?;
        let mut raw = [0u8; WORD_SIZE];
        for (i, word) in out.iter_mut().enumerate() {
            let at = VirtAddr::new(addr.as_usize() + i * WORD_SIZE);
            self.space.copy_in(at, &mut raw);
            *word = u64::from_le_bytes(raw);
        }
        Ok(())
    }

    fn check_page(&self, page: VirtAddr, access: Access) -> Result<(), Fault> {
        match self.space.translate(page) {
            Some(flags) if access.permitted_by(flags) => Ok(()),
            _ => Err(Fault::BadAddress(page)),
        }
    }
}
