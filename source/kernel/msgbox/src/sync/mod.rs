// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Kernel synchronisation primitives
//! OWNERS: @kernel-sync-team
//! PUBLIC API: CriticalSection, CriticalGuard, LockStats
//! DEPENDS_ON: spin, riscv time CSR (OS)
//! INVARIANTS: Cross-core mutual exclusion; guards protect bookkeeping only, never user copies

pub mod critical;

pub use critical::{CriticalGuard, CriticalSection, LockStats};
