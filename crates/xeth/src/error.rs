//! Error types for sideband operations.

use std::io;

use crate::message::Kind;
use crate::xid::Xid;

/// Result type for sideband operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A buffer was too short or otherwise invalid for its kind.
    #[error("malformed {kind} message: {reason}")]
    MalformedMessage {
        /// Kind name, or "unknown" when the header itself is bad.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Socket resolution or dial failed with a non-transient error.
    #[error("connect to @{device}: {source}")]
    Connect {
        /// Driver device name.
        device: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A write to the control socket failed or timed out.
    #[error("transmit {kind:?}: {source}")]
    Transmit {
        /// Kind of the message being sent.
        kind: Option<Kind>,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A read from the control or raw socket failed.
    #[error("receive: {0}")]
    Receive(#[source] io::Error),

    /// An interface that could not be resolved, even through the host.
    ///
    /// Decoding never returns this: unknown xids in driver messages are
    /// counted in [`CounterSnapshot::unknown`](crate::CounterSnapshot) and
    /// the event is still delivered. It is here for callers that want to
    /// treat a lookup miss as an error.
    #[error("unknown xid {0}")]
    UnknownXid(Xid),

    /// The driver interface does not exist.
    #[error("interface not found: {name}")]
    InterfaceNotFound {
        /// The interface name that was not found.
        name: String,
    },

    /// The session was stopped before the operation completed.
    #[error("session stopped")]
    Stopped,
}

impl Error {
    /// Create a malformed-message error.
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            kind,
            reason: reason.into(),
        }
    }

    /// Create a truncation error for a buffer shorter than its layout.
    pub fn truncated(kind: &'static str, expected: usize, actual: usize) -> Self {
        Self::malformed(
            kind,
            format!("expected at least {} bytes, got {}", expected, actual),
        )
    }

    /// Check if this is a malformed-message error.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedMessage { .. })
    }

    /// Check if this error is a condition that is retried internally
    /// (timeouts, EAGAIN, ECONNREFUSED).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) | Self::Receive(e) => is_transient_io(e),
            Self::Connect { source, .. } | Self::Transmit { source, .. } => {
                is_transient_io(source)
            }
            _ => false,
        }
    }

    /// Check if this is the result of a stop request.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Get the errno value if this wraps an OS error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Io(e) | Self::Receive(e) => e.raw_os_error(),
            Self::Connect { source, .. } | Self::Transmit { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Timeouts and would-block conditions, plus a refused dial.
pub(crate) fn is_transient_io(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::ConnectionRefused
    ) || matches!(e.raw_os_error(), Some(libc::EAGAIN) | Some(libc::ECONNREFUSED))
}
