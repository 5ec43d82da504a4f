//! Dispatch table
//!
//! One entry per implemented syscall: its argument layout and its handler.
//! The layout drives validation and extraction, so no handler ever sees an
//! unchecked pointer.
//!
//! # Argument Kinds
//! - `Word`: plain value, passed through
//! - `Str`: pointer to a NUL-terminated string, copied in
//! - `Input { len }`: buffer the kernel reads, sized by argument `len`
//! - `Output { len }`: buffer the kernel writes, sized by argument `len`

use alloc::vec::Vec;

use super::handler;
use super::validate::{UserBuffer, UserBufferMut, UserStr, Validator};
use super::{Fault, Kernel, SyscallNumber};
use crate::fs::Fd;
use crate::mm::VirtAddr;
use crate::process::Pid;

/// Most arguments any syscall takes.
pub const MAX_ARGS: usize = 3;

/// Layout of one argument word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Word,
    Str,
    Input { len: usize },
    Output { len: usize },
}

/// An argument after validation.
#[derive(Debug)]
pub enum Arg<'a> {
    Word(u64),
    Str(UserStr),
    Input(UserBuffer<'a>),
    Output(UserBufferMut<'a>),
}

/// Validated arguments of one invocation.
#[derive(Debug)]
pub struct Args<'a> {
    slots: Vec<Arg<'a>>,
}

impl<'a> Args<'a> {
    /// Raw word in `slot`.
    pub fn word(&self, slot: usize) -> Result<u64, Fault> {
        match self.slots.get(slot) {
            Some(Arg::Word(word)) => Ok(*word),
            _ => Err(Fault::ArgumentMismatch(slot)),
        }
    }

    /// Signed 32-bit value (status).
    pub fn int(&self, slot: usize) -> Result<i32, Fault> {
        self.word(slot).map(|word| word as i32)
    }

    /// Unsigned 32-bit value (size, position).
    pub fn unsigned(&self, slot: usize) -> Result<u32, Fault> {
        self.word(slot).map(|word| word as u32)
    }

    pub fn fd(&self, slot: usize) -> Result<Fd, Fault> {
        self.word(slot).map(Fd::from_word)
    }

    pub fn pid(&self, slot: usize) -> Result<Pid, Fault> {
        self.word(slot).map(Pid::from_word)
    }

    pub fn str(&self, slot: usize) -> Result<&UserStr, Fault> {
        match self.slots.get(slot) {
            Some(Arg::Str(s)) => Ok(s),
            _ => Err(Fault::ArgumentMismatch(slot)),
        }
    }

    pub fn input(&self, slot: usize) -> Result<&UserBuffer<'a>, Fault> {
        match self.slots.get(slot) {
            Some(Arg::Input(buf)) => Ok(buf),
            _ => Err(Fault::ArgumentMismatch(slot)),
        }
    }

    pub fn output(&mut self, slot: usize) -> Result<&mut UserBufferMut<'a>, Fault> {
        match self.slots.get_mut(slot) {
            Some(Arg::Output(buf)) => Ok(buf),
            _ => Err(Fault::ArgumentMismatch(slot)),
        }
    }
}

/// What a handler asks the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Store this in the return register and resume.
    Value(i64),
    /// Resume without touching the return register.
    Void,
    /// Terminate the caller with this status.
    Exit(i32),
    /// Power off.
    Halt,
}

impl Completion {
    /// Encode an operational result: the value on success, -1 on failure.
    pub fn or_fail<T: Into<i64>, E>(result: Result<T, E>) -> Self {
        Self::Value(result.map_or(-1, Into::into))
    }

    pub fn flag(ok: bool) -> Self {
        Self::Value(i64::from(ok))
    }
}

/// One invocation as seen by a handler.
pub struct Invocation<'a> {
    pub caller: Pid,
    pub args: Args<'a>,
}

/// Type alias for a syscall handler.
pub type Handler = fn(&Kernel, &mut Invocation<'_>) -> Result<Completion, Fault>;

/// Dispatch table entry.
pub struct SyscallSpec {
    pub number: SyscallNumber,
    pub args: &'static [ArgKind],
    pub handler: Handler,
}

impl SyscallSpec {
    /// Number of argument words on the user stack.
    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

const NO_ARGS: &[ArgKind] = &[];
const WORD: &[ArgKind] = &[ArgKind::Word];
const STR: &[ArgKind] = &[ArgKind::Str];
const STR_WORD: &[ArgKind] = &[ArgKind::Str, ArgKind::Word];
const WORD_WORD: &[ArgKind] = &[ArgKind::Word, ArgKind::Word];
const READ_ARGS: &[ArgKind] = &[ArgKind::Word, ArgKind::Output { len: 2 }, ArgKind::Word];
const WRITE_ARGS: &[ArgKind] = &[ArgKind::Word, ArgKind::Input { len: 2 }, ArgKind::Word];

/// Indexed by syscall number.
static SYSCALL_TABLE: [SyscallSpec; 13] = [
    SyscallSpec { number: SyscallNumber::Halt, args: NO_ARGS, handler: handler::sys_halt },
    SyscallSpec { number: SyscallNumber::Exit, args: WORD, handler: handler::sys_exit },
    SyscallSpec { number: SyscallNumber::Exec, args: STR, handler: handler::sys_exec },
    SyscallSpec { number: SyscallNumber::Wait, args: WORD, handler: handler::sys_wait },
    SyscallSpec { number: SyscallNumber::Create, args: STR_WORD, handler: handler::sys_create },
    SyscallSpec { number: SyscallNumber::Remove, args: STR, handler: handler::sys_remove },
    SyscallSpec { number: SyscallNumber::Open, args: STR, handler: handler::sys_open },
    SyscallSpec { number: SyscallNumber::Filesize, args: WORD, handler: handler::sys_filesize },
    SyscallSpec { number: SyscallNumber::Read, args: READ_ARGS, handler: handler::sys_read },
    SyscallSpec { number: SyscallNumber::Write, args: WRITE_ARGS, handler: handler::sys_write },
    SyscallSpec { number: SyscallNumber::Seek, args: WORD_WORD, handler: handler::sys_seek },
    SyscallSpec { number: SyscallNumber::Tell, args: WORD, handler: handler::sys_tell },
    SyscallSpec { number: SyscallNumber::Close, args: WORD, handler: handler::sys_close },
];

/// Entry for `number`, or `None` if the kernel does not implement it.
pub fn lookup(number: SyscallNumber) -> Option<&'static SyscallSpec> {
    SYSCALL_TABLE
        .get(number.index())
        .filter(|spec| spec.number == number)
}

/// Turn raw argument words into validated arguments.
///
/// Pointer arguments are validated here, after every word has been read
/// and before any handler runs.
pub fn extract<'a>(
    spec: &SyscallSpec,
    words: &[u64],
    validator: &Validator<'a>,
) -> Result<Args<'a>, Fault> {
    let size_of = |slot: usize| -> Result<usize, Fault> {
        words
            .get(slot)
            .map(|&word| word as u32 as usize)
            .ok_or(Fault::ArgumentMismatch(slot))
    };

    let mut slots = Vec::with_capacity(spec.arity());
    for (slot, kind) in spec.args.iter().enumerate() {
        let word = *words.get(slot).ok_or(Fault::ArgumentMismatch(slot))?;
        let arg = match *kind {
            ArgKind::Word => Arg::Word(word),
            ArgKind::Str => Arg::Str(validator.validate_c_string(VirtAddr::from(word))?),
            ArgKind::Input { len } => {
                Arg::Input(validator.validate_user_read(VirtAddr::from(word), size_of(len)?)?)
            }
            ArgKind::Output { len } => {
                Arg::Output(validator.validate_user_write(VirtAddr::from(word), size_of(len)?)?)
            }
        };
        slots.push(arg);
    }
    Ok(Args { slots })
}
