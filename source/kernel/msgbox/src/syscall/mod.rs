// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Syscall dispatcher and error encoding
//! OWNERS: @kernel-team
//! PUBLIC API: SyscallTable, Args, Error, Handler, entry(), SYSCALL_* IDs
//! DEPENDS_ON: syscall::api, msgbox_abi
//! INVARIANTS: Fixed MAX_SYSCALL window; stable IDs; decode/check/execute discipline;
//!             one negative errno per error kind

pub mod api;

use core::fmt;

use msgbox_abi::{errno, neg_errno, MsgboxError};

pub use msgbox_abi::{SYSCALL_MSGBOX_GET, SYSCALL_MSGBOX_PUT};

/// Maximum number of syscalls supported by this increment.
const MAX_SYSCALL: usize = 8;

/// Result type used by syscall handlers.
pub type SysResult<T> = Result<T, Error>;

/// Syscall arguments passed in registers a0-a5.
#[derive(Default, Clone, Copy, Debug)]
pub struct Args {
    regs: [usize; 6],
}

impl Args {
    /// Creates a new argument pack from the provided registers.
    pub const fn new(regs: [usize; 6]) -> Self {
        Self { regs }
    }

    /// Packs a user pointer and a signed length into a0/a1.
    pub const fn buffer(addr: usize, len: isize) -> Self {
        Self::new([addr, len as usize, 0, 0, 0, 0])
    }

    /// Returns the raw register at `index`.
    pub fn get(&self, index: usize) -> usize {
        self.regs[index]
    }

    /// Returns the register at `index` reinterpreted as a signed value.
    pub fn get_signed(&self, index: usize) -> isize {
        self.regs[index] as isize
    }
}

/// Error returned by the dispatcher and handler stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Syscall number not present in the dispatch table.
    InvalidSyscall,
    /// Message box operation failed.
    Msgbox(MsgboxError),
}

impl From<MsgboxError> for Error {
    fn from(value: MsgboxError) -> Self {
        Self::Msgbox(value)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSyscall => write!(f, "invalid syscall"),
            Self::Msgbox(err) => write!(f, "{err}"),
        }
    }
}

impl Error {
    /// Negative errno placed in a0 on return to user mode.
    pub const fn to_raw(self) -> isize {
        match self {
            Self::InvalidSyscall => neg_errno(errno::ENOSYS),
            Self::Msgbox(err) => neg_errno(err.errno()),
        }
    }
}

/// Type alias for a syscall handler.
pub type Handler = fn(&mut api::Context<'_>, &Args) -> SysResult<usize>;

/// Dispatch table storing handlers by syscall number.
pub struct SyscallTable {
    handlers: [Option<Handler>; MAX_SYSCALL],
}

impl SyscallTable {
    /// Creates an empty dispatch table.
    pub const fn new() -> Self {
        const NONE: Option<Handler> = None;
        Self { handlers: [NONE; MAX_SYSCALL] }
    }

    /// Registers a handler.
    pub fn register(&mut self, number: usize, handler: Handler) {
        if number < MAX_SYSCALL {
            self.handlers[number] = Some(handler);
        }
    }

    /// Executes the handler referenced by `number`.
    #[must_use]
    pub fn dispatch(
        &self,
        number: usize,
        ctx: &mut api::Context<'_>,
        args: &Args,
    ) -> SysResult<usize> {
        self.handlers
            .get(number)
            .and_then(|entry| *entry)
            .ok_or(Error::InvalidSyscall)
            .and_then(|handler| handler(ctx, args))
    }
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Trap-level entry: dispatches `number` and encodes the result for a0.
pub fn entry(table: &SyscallTable, ctx: &mut api::Context<'_>, number: usize, args: &Args) -> isize {
    match table.dispatch(number, ctx, args) {
        Ok(value) => value as isize,
        Err(err) => {
            log_trace!(target: "syscall", "nr={} failed: {}", number, err);
            err.to_raw()
        }
    }
}
