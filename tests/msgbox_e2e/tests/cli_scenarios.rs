// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Canned scenarios behind the msgbox-sim subcommands

use msgbox::MailboxConfig;
use msgbox_abi::MsgboxError;
use msgbox_sim::{scenario, Kernel};

#[test]
fn demo_prints_kage_then_hej() {
    let kernel = Kernel::new(MailboxConfig::default());
    assert_eq!(scenario::demo(&kernel).unwrap(), ["Msg: Kage!", "Msg: Hej!"]);
}

#[test]
fn drain_lists_messages_in_reverse() {
    let kernel = Kernel::new(MailboxConfig::default());
    let messages = ["first".to_string(), "second".to_string(), "third".to_string()];
    assert_eq!(
        scenario::drain(&kernel, &messages).unwrap(),
        ["1: \"third\"", "2: \"second\"", "3: \"first\""]
    );
}

#[test]
fn drain_respects_heap_limit() {
    // Too small for a kilobyte payload.
    let kernel = Kernel::new(MailboxConfig::with_heap_limit(512));
    let err = scenario::drain(&kernel, &["x".repeat(1024)]).unwrap_err();
    assert_eq!(err.kind(), Some(MsgboxError::OutOfMemory));
}
