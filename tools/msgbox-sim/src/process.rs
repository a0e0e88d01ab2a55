// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulated tasks calling into the kernel through the syscall table.

use std::sync::Arc;

use msgbox::syscall::{self, api, Args, SyscallTable, SYSCALL_MSGBOX_GET, SYSCALL_MSGBOX_PUT};
use msgbox::{Access, Mailbox, MailboxConfig, UserAddr, UserSpace};
use msgbox_abi::{decode, AbiError};

use crate::{SimError, SimResult};

/// Base of the window a process stages outgoing messages in.
pub const TX_BASE: UserAddr = UserAddr::new(0x1000_0000);
/// Base of the window a process receives messages into.
pub const RX_BASE: UserAddr = UserAddr::new(0x2000_0000);
/// Size of each staging window. Pages are materialised lazily.
pub const WINDOW: usize = 1 << 20;

/// The simulated kernel: one dispatch table and the mailbox every process shares.
pub struct Kernel {
    table: SyscallTable,
    mailbox: Mailbox,
}

impl Kernel {
    pub fn new(config: MailboxConfig) -> Arc<Self> {
        let mut table = SyscallTable::new();
        api::install_handlers(&mut table);
        Arc::new(Self { table, mailbox: Mailbox::with_config(config) })
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Creates a process with readable/writable TX and RX windows.
    pub fn spawn(self: &Arc<Self>) -> SimResult<Process> {
        self.attach(UserSpace::new())
    }

    /// Adopts an existing address space, adding the TX and RX windows to it.
    pub fn attach(self: &Arc<Self>, mut memory: UserSpace) -> SimResult<Process> {
        memory.map(TX_BASE, WINDOW, Access::READ | Access::WRITE)?;
        memory.map(RX_BASE, WINDOW, Access::READ | Access::WRITE)?;
        Ok(Process { kernel: Arc::clone(self), memory })
    }
}

/// A task with its own protection domain.
pub struct Process {
    kernel: Arc<Kernel>,
    memory: UserSpace,
}

impl Process {
    pub fn memory_mut(&mut self) -> &mut UserSpace {
        &mut self.memory
    }

    /// Traps into the kernel and returns the raw a0 value.
    pub fn syscall(&mut self, number: usize, args: Args) -> isize {
        let mut ctx = api::Context::new(&self.kernel.mailbox, &mut self.memory);
        syscall::entry(&self.kernel.table, &mut ctx, number, &args)
    }

    /// `msgbox_put(addr, len)` with caller-chosen arguments.
    pub fn put_raw(&mut self, addr: UserAddr, len: isize) -> Result<(), AbiError> {
        decode(self.syscall(SYSCALL_MSGBOX_PUT, Args::buffer(addr.raw(), len))).map(|_| ())
    }

    /// `msgbox_get(addr, capacity)` with caller-chosen arguments; returns the length copied.
    pub fn get_raw(&mut self, addr: UserAddr, capacity: isize) -> Result<usize, AbiError> {
        decode(self.syscall(SYSCALL_MSGBOX_GET, Args::buffer(addr.raw(), capacity)))
    }

    /// Stages `bytes` in the TX window and submits them.
    pub fn put(&mut self, bytes: &[u8]) -> SimResult<()> {
        if bytes.len() > WINDOW {
            return Err(SimError::Window { len: bytes.len(), window: WINDOW });
        }
        self.memory.write_bytes(TX_BASE, bytes)?;
        self.put_raw(TX_BASE, bytes.len() as isize)?;
        Ok(())
    }

    /// Retrieves into the RX window with `capacity` and returns the copied bytes.
    pub fn get(&mut self, capacity: usize) -> SimResult<Vec<u8>> {
        if capacity > WINDOW {
            return Err(SimError::Capacity { capacity, window: WINDOW });
        }
        let len = self.get_raw(RX_BASE, capacity as isize)?;
        Ok(self.memory.read_bytes(RX_BASE, len)?)
    }
}
