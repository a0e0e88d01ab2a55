// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Critical section guard for short pointer bookkeeping
//! OWNERS: @kernel-sync-team
//! PUBLIC API: CriticalSection::new(), CriticalSection::lock(), CriticalSection::stats()
//! DEPENDS_ON: spin::Mutex, riscv time CSR (OS)
//! INVARIANTS: Safe across harts (spin lock, not interrupt masking); long holds reported in debug

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, Ordering};

/// Warn on holds longer than ~50ms on a 10 MHz timebase.
const LONG_HOLD_TICKS: u64 = 500_000;

/// Minimal time source wrapper (10 MHz on QEMU virt).
#[inline(always)]
fn read_time() -> u64 {
    #[cfg(all(target_arch = "riscv64", target_os = "none"))]
    {
        riscv::register::time::read() as u64
    }
    #[cfg(not(all(target_arch = "riscv64", target_os = "none")))]
    {
        0
    }
}

/// Acquisition counters for a [`CriticalSection`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Total successful acquisitions.
    pub acquisitions: u64,
    /// Acquisitions that found the lock already held and had to spin.
    pub contended: u64,
    /// Holds that exceeded `LONG_HOLD_TICKS`.
    pub long_holds: u64,
}

/// Mutual exclusion over `T`, valid across every hart that can enter the kernel.
pub struct CriticalSection<T> {
    inner: spin::Mutex<T>,
    acquisitions: AtomicU64,
    contended: AtomicU64,
    long_holds: AtomicU64,
}

impl<T> CriticalSection<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
            acquisitions: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            long_holds: AtomicU64::new(0),
        }
    }

    /// Enters the critical section, spinning while another context holds it.
    pub fn lock(&self) -> CriticalGuard<'_, T> {
        let guard = match self.inner.try_lock() {
            Some(guard) => guard,
            None => {
                self.contended.fetch_add(1, Ordering::Relaxed);
                self.inner.lock()
            }
        };
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        CriticalGuard {
            guard,
            _hold: HoldTimer { start_ticks: read_time(), long_holds: &self.long_holds },
        }
    }

    /// Snapshot of the acquisition counters.
    pub fn stats(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            long_holds: self.long_holds.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

pub struct CriticalGuard<'a, T> {
    guard: spin::MutexGuard<'a, T>,
    // Fields drop in declaration order: the lock is free before the hold is reported.
    _hold: HoldTimer<'a>,
}

impl<'a, T> Deref for CriticalGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<'a, T> DerefMut for CriticalGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

struct HoldTimer<'a> {
    start_ticks: u64,
    long_holds: &'a AtomicU64,
}

impl Drop for HoldTimer<'_> {
    fn drop(&mut self) {
        let delta = read_time().wrapping_sub(self.start_ticks);
        if delta > LONG_HOLD_TICKS {
            self.long_holds.fetch_add(1, Ordering::Relaxed);
            if cfg!(debug_assertions) {
                log_warn!(target: "sync", "critical section held for {} ticks", delta);
            }
        }
    }
}
