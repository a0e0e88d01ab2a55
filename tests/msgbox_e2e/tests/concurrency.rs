// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Producers and a consumer sharing one mailbox from separate threads
//! TESTS: token conservation for several loads, undersized reads racing other callers,
//!        audit after contention

use msgbox::MailboxConfig;
use msgbox_abi::MsgboxError;
use msgbox_sim::scenario::{self, StressReport};
use msgbox_sim::Kernel;

#[test]
fn tokens_are_conserved_under_contention() {
    for count in [1, 100, 2_000] {
        let kernel = Kernel::new(MailboxConfig::default());
        let report = scenario::stress(&kernel, count).unwrap();
        assert_eq!(report, StressReport { tally: 0, received: 2 * count, pills: 2 });

        let mailbox = kernel.mailbox();
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.audit(), Ok(0));
        let stats = mailbox.stats();
        assert_eq!(stats.submitted, stats.retrieved);
        assert_eq!(stats.submitted, 2 * count as u64 + 2);
        assert_eq!(stats.heap_used, 0);
    }
}

#[test]
fn producers_without_a_consumer_leave_every_message_queued() {
    let kernel = Kernel::new(MailboxConfig::default());
    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let mut task = kernel.spawn().unwrap();
            std::thread::spawn(move || {
                for _ in 0..250 {
                    task.put(&[i]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(kernel.mailbox().depth(), 1000);
    assert_eq!(kernel.mailbox().audit(), Ok(1000));

    let mut reader = kernel.spawn().unwrap();
    assert_eq!(scenario::flush(&mut reader).unwrap(), 1000);
}

#[test]
fn undersized_reads_under_contention_keep_the_large_message() {
    const WORKERS: usize = 4;
    const ROUNDS: usize = 300;
    let large: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();

    let kernel = Kernel::new(MailboxConfig::default());
    kernel.spawn().unwrap().put(&large).unwrap();

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let mut task = kernel.spawn().unwrap();
            std::thread::spawn(move || {
                let (mut small, mut too_large) = (0usize, 0usize);
                for _ in 0..ROUNDS {
                    task.put(&[worker as u8]).unwrap();
                    // Drain every 1-byte message above the large one; stop once it is on top.
                    loop {
                        match task.get(1) {
                            Ok(msg) => {
                                assert_eq!(msg.len(), 1);
                                small += 1;
                            }
                            Err(err) => {
                                assert_eq!(err.kind(), Some(MsgboxError::MessageTooLarge));
                                too_large += 1;
                                break;
                            }
                        }
                    }
                }
                (small, too_large)
            })
        })
        .collect();

    let (mut small, mut too_large) = (0, 0);
    for worker in workers {
        let (s, t) = worker.join().unwrap();
        small += s;
        too_large += t;
    }
    assert_eq!(small, WORKERS * ROUNDS);
    assert_eq!(too_large, WORKERS * ROUNDS);

    let mailbox = kernel.mailbox();
    assert_eq!(mailbox.depth(), 1);
    assert_eq!(mailbox.top_len(), Some(large.len()));

    let mut reader = kernel.spawn().unwrap();
    assert_eq!(reader.get(large.len()).unwrap(), large);
    assert!(reader.get(large.len()).unwrap_err().is_empty());
    assert_eq!(mailbox.audit(), Ok(0));
    assert_eq!(mailbox.stats().heap_used, 0);
}
