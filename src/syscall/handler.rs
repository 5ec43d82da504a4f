//! System Call Handlers
//!
//! Implements the individual syscalls. Every pointer argument has already
//! been validated by the time a handler runs; handlers only report
//! operational failures, as -1 or 0 in the return register.
//!
//! # Security Considerations
//! - File data moves through a kernel bounce buffer, so user memory is never
//!   touched while the file table lock is held
//! - Console descriptors are routed before the file table is consulted

use alloc::vec;

use log::debug;

use super::table::{Completion, Invocation};
use super::{Fault, Kernel};
use crate::fs::Fd;
use crate::mm::PAGE_SIZE;

/// Size of the kernel bounce buffer for file I/O.
const BOUNCE_SIZE: usize = PAGE_SIZE;

/// Halt system call
///
/// Powers the machine off.
pub fn sys_halt(_kernel: &Kernel, _inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    Ok(Completion::Halt)
}

/// Exit system call
///
/// Terminates the caller with the given status. No validation needed; any
/// status is acceptable.
pub fn sys_exit(_kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    Ok(Completion::Exit(inv.args.int(0)?))
}

/// Exec system call
///
/// Returns the child's pid, or -1 if it could not be loaded.
pub fn sys_exec(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let Some(cmdline) = inv.args.str(0)?.to_str() else {
        return Ok(Completion::Value(-1));
    };
    let result = kernel.processes().spawn(inv.caller, cmdline);
    Ok(Completion::or_fail(result.map(|pid| pid.as_i32())))
}

/// Wait system call
///
/// Blocks until the child exits; -1 for anything that is not an unreaped
/// child of the caller.
pub fn sys_wait(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let pid = inv.args.pid(0)?;
    let result = kernel.processes().wait(inv.caller, pid);
    if let Err(err) = &result {
        debug!("[SYSCALL] wait({}) by pid {}: {}", pid, inv.caller, err);
    }
    Ok(Completion::or_fail(result))
}

pub fn sys_create(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let Some(path) = inv.args.str(0)?.to_str() else {
        return Ok(Completion::flag(false));
    };
    let initial_size = inv.args.unsigned(1)?;
    Ok(Completion::flag(kernel.files().create(path, initial_size)))
}

pub fn sys_remove(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let Some(path) = inv.args.str(0)?.to_str() else {
        return Ok(Completion::flag(false));
    };
    Ok(Completion::flag(kernel.files().remove(path)))
}

/// Open system call
///
/// Returns a fresh descriptor, or -1.
pub fn sys_open(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    // No file has a name that is not UTF-8
    let Some(path) = inv.args.str(0)?.to_str() else {
        debug!("[SYSCALL] open by pid {}: name is not UTF-8", inv.caller);
        return Ok(Completion::Value(-1));
    };
    let result = kernel.files().open(inv.caller, path);
    if let Err(err) = &result {
        debug!("[SYSCALL] open({:?}) by pid {}: {}", path, inv.caller, err);
    }
    Ok(Completion::or_fail(result.map(Fd::as_i32)))
}

pub fn sys_filesize(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let fd = inv.args.fd(0)?;
    Ok(Completion::or_fail(kernel.files().filesize(inv.caller, fd)))
}

/// Read system call
///
/// fd 0 reads `size` bytes from the console one at a time. Other
/// descriptors read from the file until `size` bytes or end of file.
pub fn sys_read(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let fd = inv.args.fd(0)?;
    let caller = inv.caller;
    let buffer = inv.args.output(1)?;
    let size = buffer.len();

    if fd == Fd::STDIN {
        let console = kernel.console();
        for offset in 0..size {
            buffer.store_byte(offset, console.read_byte());
        }
        return Ok(Completion::Value(size as i64));
    }

    let mut bounce = vec![0u8; BOUNCE_SIZE.min(size)];
    let mut total = 0;
    loop {
        let want = bounce.len().min(size - total);
        let got = match kernel.files().read(caller, fd, &mut bounce[..want]) {
            Ok(got) => got,
            Err(err) if total == 0 => {
                debug!("[SYSCALL] read(fd {}) by pid {}: {}", fd, caller, err);
                return Ok(Completion::Value(-1));
            }
            Err(_) => break,
        };
        total += buffer.write_at(total, &bounce[..got]);
        if got < want || total == size {
            break;
        }
    }
    Ok(Completion::Value(total as i64))
}

/// Write system call
///
/// fd 1 writes the whole buffer to the console in one call. Other
/// descriptors write to the file until it stops accepting bytes.
pub fn sys_write(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let fd = inv.args.fd(0)?;
    let caller = inv.caller;
    let buffer = inv.args.input(1)?;
    let size = buffer.len();

    if fd == Fd::STDOUT {
        kernel.console().write_buffer(&buffer.to_vec());
        return Ok(Completion::Value(size as i64));
    }

    let mut bounce = vec![0u8; BOUNCE_SIZE.min(size)];
    let mut total = 0;
    loop {
        let chunk = buffer.read_at(total, &mut bounce);
        let put = match kernel.files().write(caller, fd, &bounce[..chunk]) {
            Ok(put) => put,
            Err(err) if total == 0 => {
                debug!("[SYSCALL] write(fd {}) by pid {}: {}", fd, caller, err);
                return Ok(Completion::Value(-1));
            }
            Err(_) => break,
        };
        total += put;
        if put < chunk || total == size {
            break;
        }
    }
    Ok(Completion::Value(total as i64))
}

/// Seek system call
///
/// A bad descriptor is silently ignored.
pub fn sys_seek(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let fd = inv.args.fd(0)?;
    let position = inv.args.unsigned(1)?;
    if let Err(err) = kernel.files().seek(inv.caller, fd, position) {
        debug!("[SYSCALL] seek(fd {}) by pid {}: {}", fd, inv.caller, err);
    }
    Ok(Completion::Void)
}

pub fn sys_tell(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let fd = inv.args.fd(0)?;
    Ok(Completion::or_fail(kernel.files().tell(inv.caller, fd)))
}

/// Close system call
///
/// Closing an unknown descriptor is a no-op.
pub fn sys_close(kernel: &Kernel, inv: &mut Invocation<'_>) -> Result<Completion, Fault> {
    let fd = inv.args.fd(0)?;
    if let Err(err) = kernel.files().close(inv.caller, fd) {
        debug!("[SYSCALL] close(fd {}) by pid {}: {}", fd, inv.caller, err);
    }
    Ok(Completion::Void)
}
