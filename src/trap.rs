//! Trap Frame and Trap Outcome
//!
//! The register state saved by the architecture's SVC entry stub and the
//! verdict the syscall layer hands back to it.
//!
//! # Calling Convention
//! - The user stack pointer (`SP_EL0`) points at the syscall number,
//!   followed by up to three 8-byte argument words
//! - The result is returned in `x0`
//!
//! # Security Considerations
//! - Nothing in the frame is trusted: the stack pointer is validated like
//!   any other user pointer before the number is read

/// Register state saved on SVC entry from EL0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    /// General purpose registers x0-x30
    pub gpr: [u64; 31],
    /// User stack pointer (SP_EL0)
    pub sp_el0: u64,
    /// Exception Link Register (return address)
    pub elr: u64,
    /// Saved Program Status Register
    pub spsr: u64,
}

impl TrapFrame {
    /// Frame for a trap taken with the given user stack pointer.
    pub fn with_user_sp(sp: u64) -> Self {
        Self {
            sp_el0: sp,
            ..Self::default()
        }
    }

    /// User stack pointer at trap time.
    #[inline]
    pub fn user_sp(&self) -> u64 {
        self.sp_el0
    }

    /// Store the syscall result in the return register.
    #[inline]
    pub fn set_return(&mut self, value: i64) {
        self.gpr[0] = value as u64;
    }

    /// Current contents of the return register, as the user will see it.
    #[inline]
    pub fn return_value(&self) -> i64 {
        self.gpr[0] as i64
    }
}

/// What the trap exit path must do after the syscall layer returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Return to user mode with the frame as updated.
    Resume,
    /// The caller has exited with this status; tear its context down.
    Exited(i32),
    /// Power-off was requested.
    Halted,
}
