// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Message box syscall handlers exposed to the dispatcher
//! OWNERS: @kernel-team
//! PUBLIC API: install_handlers(table), Context
//! DEPENDS_ON: mailbox::Mailbox, uaccess::UserMemory
//! INVARIANTS: Stable syscall IDs; Decode→Check→Execute pattern; lengths decoded as signed

use super::{Args, SysResult, SyscallTable, SYSCALL_MSGBOX_GET, SYSCALL_MSGBOX_PUT};
use crate::mailbox::Mailbox;
use crate::uaccess::{UserAddr, UserMemory};

/// State a handler may touch: the shared mailbox and the calling task's memory.
pub struct Context<'a> {
    pub mailbox: &'a Mailbox,
    pub memory: &'a mut dyn UserMemory,
}

impl<'a> Context<'a> {
    /// Creates a new context for the current task.
    pub fn new(mailbox: &'a Mailbox, memory: &'a mut dyn UserMemory) -> Self {
        Self { mailbox, memory }
    }
}

/// Registers the message box handlers.
pub fn install_handlers(table: &mut SyscallTable) {
    table.register(SYSCALL_MSGBOX_PUT, sys_msgbox_put);
    table.register(SYSCALL_MSGBOX_GET, sys_msgbox_get);
}

// Typed decoders for seL4-style Decode→Check→Execute

#[derive(Copy, Clone)]
struct BufferArgsTyped {
    buffer: UserAddr,
    len: isize,
}

impl BufferArgsTyped {
    #[inline]
    fn decode(args: &Args) -> Self {
        Self { buffer: UserAddr::new(args.get(0)), len: args.get_signed(1) }
    }
}

fn sys_msgbox_put(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = BufferArgsTyped::decode(args);
    // The mailbox rejects a negative length before it looks at the buffer.
    ctx.mailbox.submit(&*ctx.memory, typed.buffer, typed.len)?;
    Ok(0)
}

fn sys_msgbox_get(ctx: &mut Context<'_>, args: &Args) -> SysResult<usize> {
    let typed = BufferArgsTyped::decode(args);
    let len = ctx.mailbox.retrieve(&mut *ctx.memory, typed.buffer, typed.len)?;
    Ok(len)
}
