//! Sockets, dialing and the per-session tasks.
//!
//! A running session is four tokio tasks: the control receive loop, the
//! raw frame receive loop, the transmit scheduler and a closer that tears
//! the sockets down once stop is signalled. They share nothing but bounded
//! queues, the interface cache and a [`StopHandle`].

mod dial;
pub mod socket;
mod task;
mod tx;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::Error;

pub(crate) use dial::dial;
pub(crate) use task::Task;
pub use tx::{Priority, TxQueue};

/// Requests and observes the stop of a session.
///
/// Cloning shares the signal. Stopping is idempotent.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    /// A handle that has not been stopped.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal stop to every [`StopSignal`] from this handle. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver side for tasks to await.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// The awaiting side of a [`StopHandle`].
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once stop is signalled or every handle is gone.
    pub async fn stopped(&mut self) {
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Draining = 3,
    Closed = 4,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn get(&self) -> SessionState {
        match self.0.load(Ordering::Acquire) {
            0 => SessionState::Disconnected,
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::Draining,
            _ => SessionState::Closed,
        }
    }
}

/// The first fatal error seen in each direction.
#[derive(Debug, Default)]
pub(crate) struct TaskErrors {
    rx: Mutex<Option<Arc<Error>>>,
    tx: Mutex<Option<Arc<Error>>>,
}

impl TaskErrors {
    fn record(slot: &Mutex<Option<Arc<Error>>>, err: Error) {
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(Arc::new(err));
        }
    }

    pub(crate) fn set_rx(&self, err: Error) {
        Self::record(&self.rx, err)
    }

    pub(crate) fn set_tx(&self, err: Error) {
        Self::record(&self.tx, err)
    }

    pub(crate) fn rx(&self) -> Option<Arc<Error>> {
        self.rx.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn tx(&self) -> Option<Arc<Error>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
