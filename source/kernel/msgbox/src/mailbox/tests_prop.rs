// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the message box store
//! OWNERS: @kernel-ipc-team
//! NOTE: Tests only; no kernel logic. Exercises ordering and fidelity over arbitrary payloads.
//!
//! TEST_SCOPE:
//!   - Strict LIFO order for any sequence of submissions
//!   - Byte-exact copy-out with reported length equal to the submitted length
//!   - Undersized receive buffers never consume the message
//!
//! TEST_SCENARIOS:
//!   - lifo_for_any_sequence(): n submits then n retrieves yield the reverse sequence
//!   - undersized_buffer_is_non_destructive(): capacity < len fails, capacity >= len succeeds
//!   - interleaved_ops_match_vec_model(): random push/pop mix agrees with a Vec stack

use super::Mailbox;
use crate::uaccess::{Access, UserAddr, UserSpace};
use msgbox_abi::MsgboxError;
use proptest::prelude::*;

const SRC: UserAddr = UserAddr::new(0x1000);
const DST: UserAddr = UserAddr::new(0x10_0000);
const WINDOW: usize = 4096;

fn process() -> UserSpace {
    let mut space = UserSpace::new();
    space.map(SRC, WINDOW, Access::READ | Access::WRITE).unwrap();
    space.map(DST, WINDOW, Access::READ | Access::WRITE).unwrap();
    space
}

fn submit(mailbox: &Mailbox, space: &mut UserSpace, bytes: &[u8]) -> Result<(), MsgboxError> {
    space.write_bytes(SRC, bytes).unwrap();
    mailbox.submit(space, SRC, bytes.len() as isize).map(|_| ())
}

fn retrieve(mailbox: &Mailbox, space: &mut UserSpace, capacity: usize) -> Result<Vec<u8>, MsgboxError> {
    let len = mailbox.retrieve(space, DST, capacity as isize)?;
    Ok(space.read_bytes(DST, len).unwrap())
}

fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..256)
}

#[derive(Debug, Clone)]
enum Op {
    Push(Vec<u8>),
    Pop,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![arb_payload().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    #[test]
    fn lifo_for_any_sequence(payloads in proptest::collection::vec(arb_payload(), 1..32)) {
        let mailbox = Mailbox::new();
        let mut space = process();
        for payload in &payloads {
            prop_assert_eq!(submit(&mailbox, &mut space, payload), Ok(()));
        }
        for payload in payloads.iter().rev() {
            let got = retrieve(&mailbox, &mut space, WINDOW).unwrap();
            prop_assert_eq!(&got, payload);
        }
        prop_assert_eq!(retrieve(&mailbox, &mut space, WINDOW), Err(MsgboxError::Empty));
        prop_assert_eq!(mailbox.stats().heap_used, 0);
    }

    #[test]
    fn undersized_buffer_is_non_destructive(payload in proptest::collection::vec(any::<u8>(), 1..256), short in 0usize..256) {
        let short = short % payload.len();
        let mailbox = Mailbox::new();
        let mut space = process();
        submit(&mailbox, &mut space, &payload).unwrap();
        prop_assert_eq!(retrieve(&mailbox, &mut space, short), Err(MsgboxError::MessageTooLarge));
        prop_assert_eq!(mailbox.depth(), 1);
        prop_assert_eq!(retrieve(&mailbox, &mut space, payload.len()).unwrap(), payload);
    }

    #[test]
    fn interleaved_ops_match_vec_model(ops in proptest::collection::vec(arb_op(), 1..64)) {
        let mailbox = Mailbox::new();
        let mut space = process();
        let mut model: Vec<Vec<u8>> = Vec::new();
        for op in ops {
            match op {
                Op::Push(payload) => {
                    submit(&mailbox, &mut space, &payload).unwrap();
                    model.push(payload);
                }
                Op::Pop => {
                    let got = retrieve(&mailbox, &mut space, WINDOW);
                    prop_assert_eq!(got.ok(), model.pop());
                }
            }
            prop_assert_eq!(mailbox.audit(), Ok(model.len()));
        }
    }
}
