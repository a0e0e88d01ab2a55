// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host simulation of the message box syscalls
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests + tests/msgbox_e2e
//!
//! PUBLIC API:
//!   - Kernel: syscall table plus one shared mailbox
//!   - Process: a simulated task with its own address space
//!   - scenario::{demo, drain, flush, stress}
//!   - SimError: host-side error type
//!
//! DEPENDENCIES:
//!   - msgbox-kernel: mailbox, user access, syscall dispatcher
//!   - msgbox-abi: errno decoding
//!   - thiserror: error derive

#![forbid(unsafe_code)]

pub mod process;
pub mod scenario;

use msgbox::uaccess::{Fault, MapError};
use msgbox_abi::{AbiError, MsgboxError};

pub use process::{Kernel, Process};

/// Errors produced by the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("msgbox syscall failed: {0}")]
    Abi(#[from] AbiError),
    #[error("{len} byte message exceeds the {window} byte staging window")]
    Window { len: usize, window: usize },
    #[error("{capacity} byte receive capacity exceeds the {window} byte staging window")]
    Capacity { capacity: usize, window: usize },
    #[error("user memory fault: {0:?}")]
    Fault(Fault),
    #[error("cannot map process window: {0:?}")]
    Map(MapError),
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("tally is {tally} after draining, expected 0")]
    Imbalance { tally: i64 },
}

impl From<Fault> for SimError {
    fn from(value: Fault) -> Self {
        Self::Fault(value)
    }
}

impl From<MapError> for SimError {
    fn from(value: MapError) -> Self {
        Self::Map(value)
    }
}

impl SimError {
    /// Returns the message box error kind, if this is one.
    pub fn kind(&self) -> Option<MsgboxError> {
        match self {
            Self::Abi(AbiError::Msgbox(kind)) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind() == Some(MsgboxError::Empty)
    }
}

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;

/// Log sink that writes kernel diagnostics to stderr.
pub fn stderr_sink(level: msgbox::diag::log::Level, target: &str, args: core::fmt::Arguments<'_>) {
    eprintln!("[{} {}] {}", level.tag(), target, args);
}
