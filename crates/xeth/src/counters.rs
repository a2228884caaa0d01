//! Per-session message counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the session's tasks.
#[derive(Debug, Default)]
pub struct Counters {
    cloned: AtomicU64,
    parsed: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    unknown: AtomicU64,
}

/// A point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CounterSnapshot {
    /// Received messages and frames copied for delivery.
    pub cloned: u64,
    /// Deliveries handed to the consumer.
    pub parsed: u64,
    /// Low-priority messages shed on a full queue.
    pub dropped: u64,
    /// Messages written to the driver.
    pub sent: u64,
    /// Messages naming an xid that could not be resolved.
    pub unknown: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_cloned(&self) {
        self.cloned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_parsed(&self) {
        self.parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_unknown(&self) {
        self.unknown.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter. Each is read separately, so the set is not atomic.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            cloned: self.cloned.load(Ordering::Relaxed),
            parsed: self.parsed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
        }
    }
}
