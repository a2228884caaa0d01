//! Two-tier transmit queues and their scheduler.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use super::StopSignal;
use super::socket::ControlSocket;
use crate::buffer::Buffer;
use crate::cache::{InterfaceCache, Update};
use crate::counters::Counters;
use crate::error::{Error, Result};
use crate::message::{CARRIER_ON, Kind, classify, wire};
use crate::xid::Xid;

/// Which transmit queue a message goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Never dropped. Enqueueing waits for space.
    High,
    /// Shed when the queue is full. Writes carry a deadline.
    Low,
}

/// The sending side of a session's transmit queues.
#[derive(Debug, Clone)]
pub struct TxQueue {
    high: mpsc::Sender<Buffer>,
    low: mpsc::Sender<Buffer>,
    counters: Arc<Counters>,
    stop: StopSignal,
}

impl TxQueue {
    /// Enqueue a message at `priority`.
    pub async fn send(&self, buf: Buffer, priority: Priority) -> Result<()> {
        match priority {
            Priority::High => self.send_high(buf).await,
            Priority::Low => {
                self.send_low(buf);
                Ok(())
            }
        }
    }

    /// Wait for room in the high-priority queue, or for stop.
    pub async fn send_high(&self, buf: Buffer) -> Result<()> {
        let mut stop = self.stop.clone();
        if stop.is_stopped() {
            return Err(Error::Stopped);
        }
        tokio::select! {
            biased;
            _ = stop.stopped() => Err(Error::Stopped),
            sent = self.high.send(buf) => sent.map_err(|_| Error::Stopped),
        }
    }

    /// Enqueue without waiting. Returns false if the message was dropped.
    ///
    /// A full or closed queue releases the buffer and counts a drop.
    pub fn send_low(&self, buf: Buffer) -> bool {
        match self.low.try_send(buf) {
            Ok(()) => true,
            Err(TrySendError::Full(buf)) | Err(TrySendError::Closed(buf)) => {
                trace!(kind = ?classify(&buf).ok(), "low priority queue full, dropping");
                drop(buf);
                self.counters.inc_dropped();
                false
            }
        }
    }
}

/// Drains the transmit queues into the control socket.
pub(crate) struct Scheduler {
    sock: Arc<ControlSocket>,
    high: mpsc::Receiver<Buffer>,
    low: mpsc::Receiver<Buffer>,
    stop: StopSignal,
    counters: Arc<Counters>,
    cache: Arc<InterfaceCache>,
    low_timeout: Duration,
}

/// Queue capacities and write deadline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TxLimits {
    pub high_capacity: usize,
    pub low_capacity: usize,
    pub low_timeout: Duration,
}

pub(crate) fn channel(
    sock: Arc<ControlSocket>,
    limits: TxLimits,
    stop: StopSignal,
    counters: Arc<Counters>,
    cache: Arc<InterfaceCache>,
) -> (TxQueue, Scheduler) {
    let (high_tx, high_rx) = mpsc::channel(limits.high_capacity.max(1));
    let (low_tx, low_rx) = mpsc::channel(limits.low_capacity.max(1));
    let queue = TxQueue {
        high: high_tx,
        low: low_tx,
        counters: counters.clone(),
        stop: stop.clone(),
    };
    let scheduler = Scheduler {
        sock,
        high: high_rx,
        low: low_rx,
        stop,
        counters,
        cache,
        low_timeout: limits.low_timeout,
    };
    (queue, scheduler)
}

impl Scheduler {
    /// Run until stop, until both queues close, or until a write fails.
    ///
    /// Stop wins over pending messages, and high priority over low.
    pub(crate) async fn run(self) -> Result<()> {
        let Self {
            sock,
            mut high,
            mut low,
            mut stop,
            counters,
            cache,
            low_timeout,
        } = self;
        let mut high_open = true;
        let mut low_open = true;

        while high_open || low_open {
            let (buf, deadline) = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                msg = high.recv(), if high_open => match msg {
                    Some(buf) => (buf, None),
                    None => {
                        high_open = false;
                        continue;
                    }
                },
                msg = low.recv(), if low_open => match msg {
                    Some(buf) => (buf, Some(low_timeout)),
                    None => {
                        low_open = false;
                        continue;
                    }
                },
            };

            let kind = classify(&buf).ok();
            // Stop abandons a write the peer is not draining.
            let written = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                written = write(&sock, &buf, deadline) => written,
            };
            if let Err(source) = written {
                debug!(?kind, error = %source, "transmit failed");
                return Err(Error::Transmit { kind, source });
            }
            counters.inc_sent();
            if kind == Some(Kind::Carrier) {
                carrier_ack(&cache, &buf);
            }
        }
        Ok(())
    }
}

async fn write(sock: &ControlSocket, buf: &[u8], deadline: Option<Duration>) -> io::Result<usize> {
    match deadline {
        None => sock.send(buf).await,
        Some(d) => tokio::time::timeout(d, sock.send(buf))
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))),
    }
}

/// Record a delivered carrier change on the cached entry.
fn carrier_ack(cache: &InterfaceCache, buf: &[u8]) {
    if let Ok(m) = wire::parse::<wire::Carrier>(Kind::Carrier, buf) {
        let xid = Xid(m.xid.get());
        let on = m.flag == CARRIER_ON;
        if !cache.update(xid, Update::Carrier(on)) {
            trace!(%xid, "carrier sent for uncached interface");
        }
    }
}
