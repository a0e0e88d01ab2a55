// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Message box syscalls driven end to end from a simulated task
//! TESTS: LIFO order, argument validation, heap exhaustion, empty signalling,
//!        non-destructive undersized reads, permission checks

use msgbox::{Access, MailboxConfig, UserAddr};
use msgbox_abi::{AbiError, MsgboxError};
use msgbox_e2e::{abi_err, boot, boot_with};
use msgbox_sim::process::{RX_BASE, TX_BASE};
use msgbox_sim::scenario;

const READ_ONLY: UserAddr = UserAddr::new(0x3000_0000);
const HUGE: UserAddr = UserAddr::new(0x4000_0000);

#[test]
fn greetings_come_back_newest_first() {
    let (_kernel, mut task) = boot();
    task.put(b"Hej!\0").unwrap();
    task.put(b"Kage!\0").unwrap();
    assert_eq!(task.get(6).unwrap(), b"Kage!\0");
    assert_eq!(task.get(5).unwrap(), b"Hej!\0");
    assert!(task.get(64).unwrap_err().is_empty());
}

#[test]
fn negative_length_is_invalid_and_queues_nothing() {
    let (kernel, mut task) = boot();
    assert_eq!(task.put_raw(TX_BASE, -10), abi_err(MsgboxError::InvalidArgument));
    assert!(kernel.mailbox().is_empty());
    assert_eq!(kernel.mailbox().stats().heap_used, 0);
}

#[test]
fn gigabyte_submit_exhausts_bounded_heap() {
    let (kernel, mut task) = boot_with(MailboxConfig::with_heap_limit(1 << 20));
    // Lazily backed, so validation passes without touching a gigabyte of pages.
    task.memory_mut().map(HUGE, 1 << 30, Access::READ).unwrap();
    assert_eq!(task.put_raw(HUGE, 1 << 30), abi_err(MsgboxError::OutOfMemory));
    assert!(kernel.mailbox().is_empty());
    assert_eq!(kernel.mailbox().stats().heap_used, 0);

    // A failed submission leaves the mailbox usable.
    task.put(b"still here").unwrap();
    assert_eq!(task.get(16).unwrap(), b"still here");
}

#[test]
fn flush_then_get_reports_empty() {
    let (_kernel, mut task) = boot();
    for word in [&b"a"[..], b"bb", b"ccc"] {
        task.put(word).unwrap();
    }
    assert_eq!(scenario::flush(&mut task).unwrap(), 3);
    assert_eq!(task.get_raw(RX_BASE, 16), abi_err(MsgboxError::Empty));
}

#[test]
fn undersized_buffer_keeps_the_message() {
    let (kernel, mut task) = boot();
    task.put(b"!TEST!\0").unwrap();
    assert_eq!(task.get_raw(RX_BASE, 3), abi_err(MsgboxError::MessageTooLarge));
    assert_eq!(kernel.mailbox().depth(), 1);
    assert_eq!(task.get(7).unwrap(), b"!TEST!\0");
    assert!(kernel.mailbox().is_empty());
}

#[test]
fn unmapped_source_is_denied() {
    let (kernel, mut task) = boot();
    assert_eq!(task.put_raw(UserAddr::new(0x10), 8), abi_err(MsgboxError::AccessDenied));
    assert!(kernel.mailbox().is_empty());
}

#[test]
fn read_only_destination_is_denied_and_message_kept() {
    let (kernel, mut task) = boot();
    task.memory_mut().map(READ_ONLY, 4096, Access::READ).unwrap();
    task.put(b"keep me").unwrap();
    assert_eq!(task.get_raw(READ_ONLY, 64), abi_err(MsgboxError::AccessDenied));
    assert_eq!(kernel.mailbox().depth(), 1);
    assert_eq!(task.get(64).unwrap(), b"keep me");
}

#[test]
fn unknown_syscall_is_nosys() {
    let (_kernel, mut task) = boot();
    let raw = task.syscall(7, msgbox::syscall::Args::buffer(TX_BASE.raw(), 1));
    assert_eq!(msgbox_abi::decode(raw), Err(AbiError::NoSys));
}

#[test]
fn messages_cross_process_boundaries() {
    let (kernel, mut sender) = boot();
    let mut receiver = kernel.spawn().unwrap();
    sender.put(b"from one").unwrap();
    assert_eq!(receiver.get(32).unwrap(), b"from one");
    assert!(sender.get(32).unwrap_err().is_empty());
}
