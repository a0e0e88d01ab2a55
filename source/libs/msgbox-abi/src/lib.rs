// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! CONTEXT: Shared ABI definitions for the message box syscalls
//! OWNERS: @runtime
//! PUBLIC API: SYSCALL_MSGBOX_*, MsgboxError, AbiError, encode(), decode()
//! DEPENDS_ON: no_std, static_assertions
//! INVARIANTS: Stable syscall IDs; one errno per error kind; encode/decode are inverses

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use static_assertions::const_assert;

/// Pushes a message onto the mailbox (a0 = buffer, a1 = length).
pub const SYSCALL_MSGBOX_PUT: usize = 0;
/// Pops the most recent message (a0 = buffer, a1 = capacity).
pub const SYSCALL_MSGBOX_GET: usize = 1;

/// errno values used on the syscall boundary.
pub mod errno {
    /// Permission denied on a user buffer.
    pub const EACCES: usize = 13;
    /// Kernel heap exhausted.
    pub const ENOMEM: usize = 12;
    /// Invalid argument.
    pub const EINVAL: usize = 22;
    /// Function not implemented.
    pub const ENOSYS: usize = 38;
    /// No message of the desired type.
    pub const ENOMSG: usize = 42;
    /// Message too long for the receive buffer.
    pub const EMSGSIZE: usize = 90;
}

// Every error kind must own a distinct errno.
const_assert!(errno::EACCES != errno::ENOMEM);
const_assert!(errno::ENOMSG != errno::EINVAL);
const_assert!(errno::ENOMSG != errno::EMSGSIZE);
const_assert!(errno::ENOMSG != errno::ENOSYS);

/// Result type returned by message box operations.
pub type Result<T> = core::result::Result<T, MsgboxError>;

/// Errors surfaced by the message box syscalls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MsgboxError {
    /// Requested length is negative.
    InvalidArgument,
    /// Caller buffer failed the read/write permission check.
    AccessDenied,
    /// Node or payload allocation failed; nothing was queued.
    OutOfMemory,
    /// Receive buffer is smaller than the queued message; the message is kept.
    MessageTooLarge,
    /// No message is queued.
    Empty,
}

impl MsgboxError {
    /// Every error kind, in errno order.
    pub const ALL: [MsgboxError; 5] = [
        MsgboxError::OutOfMemory,
        MsgboxError::AccessDenied,
        MsgboxError::InvalidArgument,
        MsgboxError::Empty,
        MsgboxError::MessageTooLarge,
    ];

    /// Positive errno for this error kind.
    pub const fn errno(self) -> usize {
        match self {
            MsgboxError::InvalidArgument => errno::EINVAL,
            MsgboxError::AccessDenied => errno::EACCES,
            MsgboxError::OutOfMemory => errno::ENOMEM,
            MsgboxError::MessageTooLarge => errno::EMSGSIZE,
            MsgboxError::Empty => errno::ENOMSG,
        }
    }

    /// Maps a positive errno back to an error kind.
    pub const fn from_errno(code: usize) -> Option<Self> {
        match code {
            errno::EINVAL => Some(MsgboxError::InvalidArgument),
            errno::EACCES => Some(MsgboxError::AccessDenied),
            errno::ENOMEM => Some(MsgboxError::OutOfMemory),
            errno::EMSGSIZE => Some(MsgboxError::MessageTooLarge),
            errno::ENOMSG => Some(MsgboxError::Empty),
            _ => None,
        }
    }

    /// Returns `true` for conditions callers are expected to retry or probe on.
    pub const fn is_retryable(self) -> bool {
        matches!(self, MsgboxError::MessageTooLarge | MsgboxError::Empty)
    }
}

impl fmt::Display for MsgboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::AccessDenied => write!(f, "access to user buffer denied"),
            Self::OutOfMemory => write!(f, "out of kernel memory"),
            Self::MessageTooLarge => write!(f, "message larger than receive buffer"),
            Self::Empty => write!(f, "mailbox is empty"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MsgboxError {}

/// Error produced when decoding a raw syscall return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbiError {
    /// A message box error kind.
    Msgbox(MsgboxError),
    /// The kernel does not implement the requested syscall.
    NoSys,
    /// Negative return value with an errno this ABI does not know.
    Unknown(usize),
}

impl From<MsgboxError> for AbiError {
    fn from(value: MsgboxError) -> Self {
        Self::Msgbox(value)
    }
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Msgbox(err) => write!(f, "{err}"),
            Self::NoSys => write!(f, "syscall not implemented"),
            Self::Unknown(code) => write!(f, "unknown errno {code}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AbiError {}

/// Converts a positive errno into the raw negative return value.
pub const fn neg_errno(code: usize) -> isize {
    -(code as isize)
}

/// Encodes a message box result as a syscall return value.
pub fn encode(result: Result<usize>) -> isize {
    match result {
        Ok(value) => value as isize,
        Err(err) => neg_errno(err.errno()),
    }
}

/// Decodes a raw syscall return value.
///
/// Non-negative values are byte counts (GET) or zero (PUT).
pub fn decode(value: isize) -> core::result::Result<usize, AbiError> {
    if value >= 0 {
        return Ok(value as usize);
    }
    let code = value.unsigned_abs();
    if code == errno::ENOSYS {
        return Err(AbiError::NoSys);
    }
    match MsgboxError::from_errno(code) {
        Some(kind) => Err(AbiError::Msgbox(kind)),
        None => Err(AbiError::Unknown(code)),
    }
}
