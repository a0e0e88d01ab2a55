// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canned workloads driven through simulated processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::process::{Kernel, Process, WINDOW};
use crate::{SimError, SimResult};

/// Receive buffer used by [`drain`].
pub const DRAIN_CAPACITY: usize = 1024;

/// Increments the stress tally.
pub const PLUS: u8 = b'+';
/// Decrements the stress tally.
pub const MINUS: u8 = b'-';
/// Sent once by each producer after its last token.
pub const PILL: u8 = b'!';

/// Renders a NUL-terminated payload as text.
fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Two messages in, two out, newest first.
pub fn demo(kernel: &Arc<Kernel>) -> SimResult<Vec<String>> {
    let mut process = kernel.spawn()?;
    process.put(b"Hej!\0")?;
    process.put(b"Kage!\0")?;

    let mut lines = Vec::with_capacity(2);
    for capacity in [6, 5] {
        let msg = process.get(capacity)?;
        lines.push(format!("Msg: {}", text(&msg)));
    }
    Ok(lines)
}

/// Submits every message NUL-terminated, then retrieves until the mailbox is empty.
///
/// Lines are numbered in retrieval order, starting at 1.
pub fn drain(kernel: &Arc<Kernel>, messages: &[String]) -> SimResult<Vec<String>> {
    let mut process = kernel.spawn()?;
    for message in messages {
        let mut bytes = Vec::with_capacity(message.len() + 1);
        bytes.extend_from_slice(message.as_bytes());
        bytes.push(0);
        process.put(&bytes)?;
    }

    let mut lines = Vec::new();
    loop {
        match process.get(DRAIN_CAPACITY) {
            Ok(msg) => lines.push(format!("{}: \"{}\"", lines.len() + 1, text(&msg))),
            Err(err) if err.is_empty() => break,
            Err(err) => return Err(err),
        }
    }
    Ok(lines)
}

/// Retrieves and discards until the mailbox reports empty. Returns the number discarded.
pub fn flush(process: &mut Process) -> SimResult<usize> {
    let mut count = 0;
    loop {
        match process.get(WINDOW) {
            Ok(_) => count += 1,
            Err(err) if err.is_empty() => return Ok(count),
            Err(err) => return Err(err),
        }
    }
}

/// Outcome of [`stress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    /// `+` count minus `-` count.
    pub tally: i64,
    /// Tokens received, excluding pills.
    pub received: usize,
    /// Pills received.
    pub pills: usize,
}

/// Two producers each send `count` tokens and a pill while one consumer drains.
///
/// The consumer stops only after both producers have exited and the mailbox
/// reports empty, so every token sent is counted exactly once.
pub fn stress(kernel: &Arc<Kernel>, count: usize) -> SimResult<StressReport> {
    let finished = Arc::new(AtomicUsize::new(0));
    let mut consumer = kernel.spawn()?;
    let mut producers = Vec::with_capacity(2);
    for token in [PLUS, MINUS] {
        let mut process = kernel.spawn()?;
        let finished = Arc::clone(&finished);
        producers.push(thread::spawn(move || {
            let result = produce(&mut process, token, count);
            finished.fetch_add(1, Ordering::Release);
            result
        }));
    }

    let mut report = StressReport { tally: 0, received: 0, pills: 0 };
    let outcome = loop {
        // Sampled before the call: if every producer had exited, an empty reply is final.
        let done = finished.load(Ordering::Acquire) == producers.len();
        match consumer.get(1) {
            Ok(msg) => match msg.first() {
                Some(&PLUS) => {
                    report.tally += 1;
                    report.received += 1;
                }
                Some(&MINUS) => {
                    report.tally -= 1;
                    report.received += 1;
                }
                Some(&PILL) => report.pills += 1,
                _ => {}
            },
            Err(err) if err.is_empty() => {
                if done {
                    break Ok(());
                }
                thread::yield_now();
            }
            Err(err) => break Err(err),
        }
    };

    for producer in producers {
        producer.join().map_err(|_| SimError::WorkerPanicked("producer"))??;
    }
    outcome.map(|()| report)
}

fn produce(process: &mut Process, token: u8, count: usize) -> SimResult<()> {
    for _ in 0..count {
        process.put(&[token])?;
    }
    process.put(&[PILL])
}
