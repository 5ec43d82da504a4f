//! Device interfaces consumed by the syscall layer
//!
//! The kernel image provides the concrete drivers (PL011 UART, PSCI power
//! control). The syscall layer only needs these narrow views:
//! - `Console`: the reserved descriptors 0 and 1
//! - `PowerControl`: HALT

/// Console device backing stdin/stdout.
pub trait Console: Send + Sync {
    /// Block until one byte of keyboard/serial input is available.
    fn read_byte(&self) -> u8;

    /// Write the whole buffer to the console in one call.
    fn write_buffer(&self, bytes: &[u8]);
}

/// Machine power control.
pub trait PowerControl: Send + Sync {
    /// Power the machine off. On hardware this does not return.
    fn power_off(&self);
}
