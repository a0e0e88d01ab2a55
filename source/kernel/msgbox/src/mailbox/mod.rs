// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: LIFO message box shared by every task (submit / retrieve)
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: Mailbox, MailboxConfig, MailboxStats, MessageId, AuditError
//! DEPENDS_ON: sync::CriticalSection, uaccess::{UserMemory, validate_*}, msgbox_abi::MsgboxError
//! INVARIANTS: top empty <=> no nodes; previous-chain from top ends at bottom; guard held for
//!             pointer bookkeeping only; failed calls leave the store untouched

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::mem::size_of;
use core::sync::atomic::{AtomicUsize, Ordering};

use msgbox_abi::MsgboxError;
use static_assertions::assert_impl_all;

use crate::sync::{CriticalSection, LockStats};
use crate::uaccess::{self, Fault, UserAddr, UserMemory};

#[cfg(feature = "failpoints")]
pub mod failpoints;

/// Identifier assigned to each message when it is pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Heap bytes charged for a node besides its payload.
pub const NODE_OVERHEAD: usize = size_of::<Node>();

/// Tunables for a [`Mailbox`] instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MailboxConfig {
    /// Kernel heap bytes (node overhead plus payload) the mailbox may hold at once.
    pub heap_limit: usize,
}

impl MailboxConfig {
    pub const fn new() -> Self {
        Self { heap_limit: usize::MAX }
    }

    pub const fn with_heap_limit(heap_limit: usize) -> Self {
        Self { heap_limit }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Node {
    id: MessageId,
    payload: Box<[u8]>,
    previous: Option<Box<Node>>,
}

impl Node {
    fn len(&self) -> usize {
        self.payload.len()
    }

    fn charge(&self) -> usize {
        NODE_OVERHEAD + self.len()
    }
}

struct Stack {
    top: Option<Box<Node>>,
    /// Oldest node of the current chain. Maintained on insertion, never read by retrieve.
    bottom: Option<MessageId>,
    depth: usize,
    bytes: usize,
    next_id: u64,
    submitted: u64,
    retrieved: u64,
}

impl Stack {
    const fn new() -> Self {
        Self {
            top: None,
            bottom: None,
            depth: 0,
            bytes: 0,
            next_id: 1,
            submitted: 0,
            retrieved: 0,
        }
    }

    fn push(&mut self, mut node: Box<Node>) {
        node.previous = self.top.take();
        if node.previous.is_none() {
            self.bottom = Some(node.id);
        }
        self.depth += 1;
        self.bytes += node.len();
        self.top = Some(node);
    }

    fn pop(&mut self) -> Option<Box<Node>> {
        let mut node = self.top.take()?;
        self.top = node.previous.take();
        if self.top.is_none() {
            self.bottom = None;
        }
        self.depth -= 1;
        self.bytes -= node.len();
        Some(node)
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // Unlink iteratively; recursive Box drops would scale stack use with depth.
        let mut next = self.top.take();
        while let Some(mut node) = next {
            next = node.previous.take();
        }
    }
}

struct HeapBudget {
    limit: usize,
    used: AtomicUsize,
}

impl HeapBudget {
    const fn new(limit: usize) -> Self {
        Self { limit, used: AtomicUsize::new(0) }
    }

    fn reserve(&self, bytes: usize) -> Result<(), MsgboxError> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|total| *total <= self.limit)
            })
            .map(|_| ())
            .map_err(|_| MsgboxError::OutOfMemory)
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

/// Why a retrieve left the newest message in place.
enum Refusal {
    Empty,
    TooSmall { len: usize },
    NotWritable(MsgboxError),
}

/// Point-in-time counters of a [`Mailbox`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub depth: usize,
    pub queued_bytes: usize,
    pub heap_used: usize,
    pub submitted: u64,
    pub retrieved: u64,
    pub lock: LockStats,
}

/// Structural inconsistency found by [`Mailbox::audit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    /// Walking the chain visited a different number of nodes than recorded.
    DepthMismatch { recorded: usize, walked: usize },
    /// Payload bytes in the chain differ from the recorded total.
    BytesMismatch { recorded: usize, walked: usize },
    /// The chain does not end at the recorded bottom.
    BottomMismatch { recorded: Option<MessageId>, walked: Option<MessageId> },
}

/// The message box: a LIFO of owned byte messages shared by all callers.
///
/// One instance is constructed by the kernel and handed to every syscall context; tests
/// build as many independent instances as they need.
pub struct Mailbox {
    stack: CriticalSection<Stack>,
    budget: HeapBudget,
    #[cfg(feature = "failpoints")]
    failpoints: failpoints::Failpoints,
}

assert_impl_all!(Mailbox: Send, Sync);

impl Mailbox {
    /// Creates an empty mailbox without a heap limit.
    pub const fn new() -> Self {
        Self::with_config(MailboxConfig::new())
    }

    pub const fn with_config(config: MailboxConfig) -> Self {
        Self {
            stack: CriticalSection::new(Stack::new()),
            budget: HeapBudget::new(config.heap_limit),
            #[cfg(feature = "failpoints")]
            failpoints: failpoints::Failpoints::new(),
        }
    }

    /// Copies `length` bytes from the caller at `buffer` and pushes them as the newest message.
    ///
    /// On any error nothing is queued and no heap charge remains.
    pub fn submit(
        &self,
        memory: &dyn UserMemory,
        buffer: UserAddr,
        length: isize,
    ) -> Result<MessageId, MsgboxError> {
        let len = usize::try_from(length).map_err(|_| {
            log_debug!(target: "msgbox", "submit: negative length {}", length);
            MsgboxError::InvalidArgument
        })?;
        uaccess::validate_readable(memory, buffer, len).map_err(|err| {
            log_debug!(target: "msgbox", "submit: {} +{} not readable", buffer, len);
            err
        })?;
        self.enqueue_with(len, |payload| memory.copy_from_user(payload, buffer))
    }

    /// Pushes a kernel-owned message.
    pub fn push_bytes(&self, bytes: &[u8]) -> Result<MessageId, MsgboxError> {
        self.enqueue_with(bytes.len(), |payload| {
            payload.copy_from_slice(bytes);
            Ok(())
        })
    }

    /// Pops the newest message into the caller's buffer and returns its length.
    ///
    /// `capacity` is the usable size of `buffer`; the whole of it must be writable even when
    /// the message is shorter. A message longer than `capacity` stays queued.
    pub fn retrieve(
        &self,
        memory: &mut dyn UserMemory,
        buffer: UserAddr,
        capacity: isize,
    ) -> Result<usize, MsgboxError> {
        let node = match self.detach_top(&*memory, buffer, capacity) {
            Ok(node) => node,
            Err(Refusal::Empty) => return Err(MsgboxError::Empty),
            Err(Refusal::TooSmall { len }) => {
                log_debug!(target: "msgbox", "retrieve: {} byte message, capacity {}", len, capacity);
                return Err(MsgboxError::MessageTooLarge);
            }
            Err(Refusal::NotWritable(err)) => {
                log_debug!(target: "msgbox", "retrieve: {} +{} not writable", buffer, capacity);
                return Err(err);
            }
        };

        let len = node.len();
        if let Err(fault) = memory.copy_to_user(buffer, &node.payload) {
            let id = node.id;
            {
                let mut stack = self.stack.lock();
                stack.retrieved -= 1;
                stack.push(node);
            }
            log_warn!(target: "msgbox", "retrieve: copy-out of {} faulted ({:?}); restored", id, fault);
            return Err(MsgboxError::AccessDenied);
        }
        #[cfg(feature = "trace_msgbox")]
        log_trace!(target: "msgbox", "retrieve: {} ({} bytes)", node.id, len);
        self.budget.release(node.charge());
        Ok(len)
    }

    /// Number of queued messages.
    pub fn depth(&self) -> usize {
        self.stack.lock().depth
    }

    pub fn is_empty(&self) -> bool {
        self.stack.lock().top.is_none()
    }

    /// Payload bytes currently queued.
    pub fn queued_bytes(&self) -> usize {
        self.stack.lock().bytes
    }

    /// Length of the newest message, if any.
    pub fn top_len(&self) -> Option<usize> {
        self.stack.lock().top.as_ref().map(|node| node.len())
    }

    /// Identifier of the oldest message in the current chain.
    pub fn bottom(&self) -> Option<MessageId> {
        self.stack.lock().bottom
    }

    pub fn stats(&self) -> MailboxStats {
        let (depth, queued_bytes, submitted, retrieved) = {
            let stack = self.stack.lock();
            (stack.depth, stack.bytes, stack.submitted, stack.retrieved)
        };
        MailboxStats {
            depth,
            queued_bytes,
            heap_used: self.budget.used(),
            submitted,
            retrieved,
            lock: self.stack.stats(),
        }
    }

    /// Identifiers from newest to oldest.
    pub fn ids(&self) -> Vec<MessageId> {
        let stack = self.stack.lock();
        let mut ids = Vec::with_capacity(stack.depth);
        let mut cursor = stack.top.as_deref();
        while let Some(node) = cursor {
            ids.push(node.id);
            cursor = node.previous.as_deref();
        }
        ids
    }

    /// Walks the chain and cross-checks it against the recorded bookkeeping.
    pub fn audit(&self) -> Result<usize, AuditError> {
        let stack = self.stack.lock();
        let mut walked = 0;
        let mut bytes = 0;
        let mut last = None;
        let mut cursor = stack.top.as_deref();
        while let Some(node) = cursor {
            walked += 1;
            bytes += node.len();
            last = Some(node.id);
            cursor = node.previous.as_deref();
        }
        if walked != stack.depth {
            return Err(AuditError::DepthMismatch { recorded: stack.depth, walked });
        }
        if bytes != stack.bytes {
            return Err(AuditError::BytesMismatch { recorded: stack.bytes, walked: bytes });
        }
        if last != stack.bottom {
            return Err(AuditError::BottomMismatch { recorded: stack.bottom, walked: last });
        }
        Ok(walked)
    }

    #[cfg(feature = "failpoints")]
    pub fn failpoints(&self) -> &failpoints::Failpoints {
        &self.failpoints
    }

    /// Unlinks the newest message if it fits `capacity` and the whole buffer is writable.
    ///
    /// Every refusal leaves the chain untouched; the caller logs once the guard is gone.
    fn detach_top(
        &self,
        memory: &dyn UserMemory,
        buffer: UserAddr,
        capacity: isize,
    ) -> Result<Box<Node>, Refusal> {
        let mut stack = self.stack.lock();
        let len = stack.top.as_ref().map(|node| node.len()).ok_or(Refusal::Empty)?;
        let capacity = usize::try_from(capacity)
            .ok()
            .filter(|capacity| *capacity >= len)
            .ok_or(Refusal::TooSmall { len })?;
        uaccess::validate_writable(memory, buffer, capacity).map_err(Refusal::NotWritable)?;
        let node = stack.pop().ok_or(Refusal::Empty)?;
        stack.retrieved += 1;
        Ok(node)
    }

    fn enqueue_with(
        &self,
        len: usize,
        fill: impl FnOnce(&mut [u8]) -> Result<(), Fault>,
    ) -> Result<MessageId, MsgboxError> {
        let mut payload = self.allocate(len)?;
        if let Err(fault) = fill(&mut payload[..]) {
            log_debug!(target: "msgbox", "submit: copy-in faulted ({:?})", fault);
            self.budget.release(NODE_OVERHEAD + len);
            return Err(MsgboxError::AccessDenied);
        }
        let mut node = Box::new(Node { id: MessageId(0), payload, previous: None });

        let mut stack = self.stack.lock();
        node.id = MessageId(stack.next_id);
        stack.next_id += 1;
        stack.submitted += 1;
        let id = node.id;
        stack.push(node);
        drop(stack);

        #[cfg(feature = "trace_msgbox")]
        log_trace!(target: "msgbox", "submit: {} ({} bytes)", id, len);
        Ok(id)
    }

    /// Charges the node and then its payload; a payload failure rolls back the node charge.
    ///
    /// Only the payload buffer is allocated fallibly. The node header is a small fixed-size
    /// `Box` with no stable fallible constructor, so running out of room for it is modelled by
    /// the heap budget charge (`NODE_OVERHEAD`) and the node failpoint, both of which return
    /// `OutOfMemory` before anything is queued.
    fn allocate(&self, len: usize) -> Result<Box<[u8]>, MsgboxError> {
        #[cfg(feature = "failpoints")]
        if self.failpoints.take_node() {
            log_debug!(target: "msgbox", "submit: node allocation failpoint");
            return Err(MsgboxError::OutOfMemory);
        }
        self.budget.reserve(NODE_OVERHEAD)?;

        match self.allocate_payload(len) {
            Ok(payload) => Ok(payload),
            Err(err) => {
                log_debug!(target: "msgbox", "submit: {} byte payload allocation failed", len);
                self.budget.release(NODE_OVERHEAD);
                Err(err)
            }
        }
    }

    fn allocate_payload(&self, len: usize) -> Result<Box<[u8]>, MsgboxError> {
        #[cfg(feature = "failpoints")]
        if self.failpoints.take_payload() {
            return Err(MsgboxError::OutOfMemory);
        }
        self.budget.reserve(len)?;
        let mut payload = Vec::new();
        if payload.try_reserve_exact(len).is_err() {
            self.budget.release(len);
            return Err(MsgboxError::OutOfMemory);
        }
        payload.resize(len, 0u8);
        Ok(payload.into_boxed_slice())
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests_prop;
