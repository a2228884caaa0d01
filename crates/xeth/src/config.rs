//! Session configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::buffer::DEFAULT_MAX_FREE;
use crate::cache::InterfaceCache;
use crate::error::Result;
use crate::session::Session;
use crate::transport::StopHandle;

/// Interval between dial attempts while the driver is not listening.
pub const DEFAULT_DIAL_INTERVAL: Duration = Duration::from_millis(100);
/// Initial and reset value of the adaptive receive timeout.
pub const DEFAULT_MIN_RX_TIMEOUT: Duration = Duration::from_millis(10);
/// Ceiling of the adaptive receive timeout.
pub const DEFAULT_MAX_RX_TIMEOUT: Duration = Duration::from_millis(320);
/// Write deadline for low-priority messages.
pub const DEFAULT_LOW_PRIORITY_TIMEOUT: Duration = Duration::from_millis(10);
pub const DEFAULT_HIGH_QUEUE_CAPACITY: usize = 4;
pub const DEFAULT_LOW_QUEUE_CAPACITY: usize = 4;
pub const DEFAULT_RX_QUEUE_CAPACITY: usize = 1024;

/// Settings for one driver session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Driver device name; the control socket is `@device`.
    pub device: String,
    /// Open the raw socket and deliver mirrored frames.
    pub raw_frames: bool,
    /// Request a FIB dump once the interface dump completes.
    pub dump_fib: bool,
    pub dial_interval: Duration,
    pub min_rx_timeout: Duration,
    pub max_rx_timeout: Duration,
    pub low_priority_timeout: Duration,
    pub high_queue_capacity: usize,
    pub low_queue_capacity: usize,
    pub rx_queue_capacity: usize,
    /// Idle buffers kept by the session's pool.
    pub max_free_buffers: usize,
}

impl SessionConfig {
    /// Defaults for the driver named `device`.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            raw_frames: true,
            dump_fib: false,
            dial_interval: DEFAULT_DIAL_INTERVAL,
            min_rx_timeout: DEFAULT_MIN_RX_TIMEOUT,
            max_rx_timeout: DEFAULT_MAX_RX_TIMEOUT,
            low_priority_timeout: DEFAULT_LOW_PRIORITY_TIMEOUT,
            high_queue_capacity: DEFAULT_HIGH_QUEUE_CAPACITY,
            low_queue_capacity: DEFAULT_LOW_QUEUE_CAPACITY,
            rx_queue_capacity: DEFAULT_RX_QUEUE_CAPACITY,
            max_free_buffers: DEFAULT_MAX_FREE,
        }
    }
}

/// Builder for a [`Session`].
///
/// # Example
///
/// ```ignore
/// use xeth::Session;
///
/// let mut session = Session::builder("platina-mk1")
///     .raw_frames(false)
///     .dump_fib(true)
///     .start()
///     .await?;
/// session.dump_ifinfo().await?;
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    config: SessionConfig,
    stop: Option<StopHandle>,
    cache: Option<Arc<InterfaceCache>>,
}

impl SessionBuilder {
    /// A builder with default settings for `device`.
    pub fn new(device: impl Into<String>) -> Self {
        Self::from_config(SessionConfig::new(device))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        Self {
            config,
            stop: None,
            cache: None,
        }
    }

    /// Open the raw frame socket on the driver link (default: on).
    pub fn raw_frames(mut self, enabled: bool) -> Self {
        self.config.raw_frames = enabled;
        self
    }

    /// Request a FIB dump once an interface dump ends (default: off).
    pub fn dump_fib(mut self, enabled: bool) -> Self {
        self.config.dump_fib = enabled;
        self
    }

    /// Delay between connection attempts while the driver is not listening.
    pub fn dial_interval(mut self, interval: Duration) -> Self {
        self.config.dial_interval = interval;
        self
    }

    /// Bounds of the adaptive receive timeout.
    pub fn rx_timeout(mut self, min: Duration, max: Duration) -> Self {
        self.config.min_rx_timeout = min;
        self.config.max_rx_timeout = max.max(min);
        self
    }

    /// Write deadline for low-priority messages.
    pub fn low_priority_timeout(mut self, timeout: Duration) -> Self {
        self.config.low_priority_timeout = timeout;
        self
    }

    /// Capacities of the high and low priority transmit queues.
    pub fn tx_queues(mut self, high: usize, low: usize) -> Self {
        self.config.high_queue_capacity = high;
        self.config.low_queue_capacity = low;
        self
    }

    /// Capacity of the queue between the receive loops and the consumer.
    pub fn rx_queue(mut self, capacity: usize) -> Self {
        self.config.rx_queue_capacity = capacity;
        self
    }

    /// Upper bound on idle buffers kept for reuse.
    pub fn max_free_buffers(mut self, n: usize) -> Self {
        self.config.max_free_buffers = n;
        self
    }

    /// Share an existing stop signal, e.g. to abort dialing from outside.
    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Use a caller-provided cache instead of a fresh sysfs-backed one.
    pub fn cache(mut self, cache: Arc<InterfaceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Finish without starting a session.
    pub fn build(self) -> SessionConfig {
        self.config
    }

    /// Connect to the driver and start the session's tasks.
    pub async fn start(self) -> Result<Session> {
        let stop = self.stop.unwrap_or_default();
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InterfaceCache::new()));
        Session::start(self.config, stop, cache).await
    }
}
