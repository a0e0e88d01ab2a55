// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Kernel message box: a shared LIFO of byte messages behind two syscalls
//! OWNERS: @kernel-team
//! PUBLIC API: mailbox::Mailbox, uaccess::{UserMemory, UserSpace}, syscall::{SyscallTable, entry}
//! DEPENDS_ON: msgbox-abi, spin, bitflags, static_assertions
//! INVARIANTS: Payloads are always copied across the user boundary; the guard never spans a copy

#![cfg_attr(not(test), no_std)]
#![forbid(clippy::unwrap_used)]

extern crate alloc;

#[macro_use]
pub mod diag;

pub mod mailbox;
pub mod sync;
pub mod syscall;
pub mod uaccess;

pub use mailbox::{Mailbox, MailboxConfig, MessageId};
pub use msgbox_abi::MsgboxError;
pub use uaccess::{Access, UserAddr, UserMemory, UserSpace};
