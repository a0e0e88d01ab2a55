// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! One-shot allocation failure switches, scoped to a single mailbox.

use core::sync::atomic::{AtomicBool, Ordering};

pub struct Failpoints {
    deny_node: AtomicBool,
    deny_payload: AtomicBool,
}

impl Failpoints {
    pub(super) const fn new() -> Self {
        Self { deny_node: AtomicBool::new(false), deny_payload: AtomicBool::new(false) }
    }

    /// Forces the next node allocation in submit to fail with `OutOfMemory`.
    pub fn fail_next_node_alloc(&self) {
        self.deny_node.store(true, Ordering::SeqCst);
    }

    /// Forces the next payload allocation in submit to fail with `OutOfMemory`.
    pub fn fail_next_payload_alloc(&self) {
        self.deny_payload.store(true, Ordering::SeqCst);
    }

    pub(super) fn take_node(&self) -> bool {
        self.deny_node.swap(false, Ordering::SeqCst)
    }

    pub(super) fn take_payload(&self) -> bool {
        self.deny_payload.swap(false, Ordering::SeqCst)
    }
}
