// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::sync::Arc;

use msgbox::MailboxConfig;
use msgbox_abi::{AbiError, MsgboxError};
use msgbox_sim::{Kernel, Process};

/// Boots a kernel with an unlimited heap and spawns one process on it.
pub fn boot() -> (Arc<Kernel>, Process) {
    boot_with(MailboxConfig::default())
}

/// Boots a kernel with `config` and spawns one process on it.
pub fn boot_with(config: MailboxConfig) -> (Arc<Kernel>, Process) {
    let kernel = Kernel::new(config);
    let process = kernel.spawn().expect("spawn process");
    (kernel, process)
}

/// Expected decode result for a message box error kind.
pub fn abi_err<T>(kind: MsgboxError) -> Result<T, AbiError> {
    Err(AbiError::Msgbox(kind))
}
