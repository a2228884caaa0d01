//! Connection setup and the per-session loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::socket::{ControlSocket, RawSocket};
use super::tx::{self, TxLimits, TxQueue};
use super::{SessionState, StateCell, StopHandle, StopSignal, TaskErrors, dial};
use crate::buffer::{Buffer, BufferPool, MAX_BUFFER_SIZE};
use crate::cache::InterfaceCache;
use crate::config::SessionConfig;
use crate::counters::Counters;
use crate::error::{Error, Result, is_transient_io};
use crate::message::validate;
use crate::util::SysClassNet;

/// A connected session's sockets, queues and running loops.
pub(crate) struct Task {
    pub(crate) tx: TxQueue,
    pub(crate) rx: mpsc::Receiver<Buffer>,
    pub(crate) raw: Option<Arc<RawSocket>>,
    pub(crate) handles: Vec<JoinHandle<()>>,
}

impl Task {
    /// Open the raw socket if wanted, dial the driver, then spawn the loops.
    pub(crate) async fn start(
        config: &SessionConfig,
        stop: &StopHandle,
        counters: Arc<Counters>,
        cache: Arc<InterfaceCache>,
        state: Arc<StateCell>,
        errors: Arc<TaskErrors>,
    ) -> Result<Self> {
        state.set(SessionState::Connecting);
        let device = config.device.as_str();

        let raw = if config.raw_frames {
            let ifindex = SysClassNet::default().name_to_index(device)?;
            let sock = RawSocket::bind(ifindex).map_err(|source| Error::Connect {
                device: device.to_string(),
                source,
            })?;
            debug!(device, ifindex, "raw socket bound");
            Some(Arc::new(sock))
        } else {
            None
        };

        let mut signal = stop.signal();
        let control = dial(device, config.dial_interval, &mut signal, || {
            ControlSocket::connect(device)
        })
        .await?;
        let control = Arc::new(control);
        state.set(SessionState::Connected);

        let limits = TxLimits {
            high_capacity: config.high_queue_capacity,
            low_capacity: config.low_queue_capacity,
            low_timeout: config.low_priority_timeout,
        };
        let (queue, scheduler) = tx::channel(
            control.clone(),
            limits,
            stop.signal(),
            counters.clone(),
            cache,
        );
        let (deliver, rx) = mpsc::channel(config.rx_queue_capacity.max(1));
        let control_done = StopHandle::new();
        let mut handles = Vec::with_capacity(4);

        handles.push(tokio::spawn(control_rx(
            control.clone(),
            deliver.clone(),
            stop.signal(),
            control_done.clone(),
            RxBackoff::new(config.min_rx_timeout, config.max_rx_timeout),
            counters.clone(),
            errors.clone(),
        )));

        if let Some(raw) = &raw {
            handles.push(tokio::spawn(raw_rx(
                raw.clone(),
                deliver,
                stop.signal(),
                control_done.signal(),
                counters,
                errors.clone(),
            )));
        } else {
            drop(deliver);
        }

        let tx_errors = errors;
        handles.push(tokio::spawn(async move {
            if let Err(e) = scheduler.run().await {
                warn!(error = %e, "transmit stopped");
                tx_errors.set_tx(e);
            }
        }));

        handles.push(tokio::spawn(closer(
            control,
            raw.clone(),
            stop.signal(),
            state,
        )));

        Ok(Self {
            tx: queue,
            rx,
            raw,
            handles,
        })
    }
}

/// Receive timeout that doubles while the driver is idle.
#[derive(Debug, Clone, Copy)]
struct RxBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl RxBackoff {
    fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    fn current(&self) -> Duration {
        self.current
    }

    /// An idle read: double the timeout, up to the maximum.
    fn idle(&mut self) -> Duration {
        self.current = (self.current * 2).min(self.max);
        self.current
    }

    /// Data arrived: back to the minimum.
    fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Send `buf` to the consumer unless stop comes first.
async fn deliver_or_stop(
    deliver: &mpsc::Sender<Buffer>,
    stop: &mut StopSignal,
    buf: Buffer,
) -> bool {
    tokio::select! {
        biased;
        _ = stop.stopped() => false,
        sent = deliver.send(buf) => sent.is_ok(),
    }
}

async fn control_rx(
    sock: Arc<ControlSocket>,
    deliver: mpsc::Sender<Buffer>,
    mut stop: StopSignal,
    done: StopHandle,
    mut backoff: RxBackoff,
    counters: Arc<Counters>,
    errors: Arc<TaskErrors>,
) {
    let mut rxbuf = vec![0u8; MAX_BUFFER_SIZE];

    while !stop.is_stopped() {
        let received = tokio::select! {
            biased;
            _ = stop.stopped() => break,
            r = tokio::time::timeout(backoff.current(), sock.recv(&mut rxbuf)) => r,
        };
        let n = match received {
            Err(_idle) => {
                backoff.idle();
                continue;
            }
            Ok(Ok(0)) => {
                debug!("control socket closed by driver");
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) if is_transient_io(&e) => {
                backoff.idle();
                continue;
            }
            Ok(Err(e)) => {
                if !stop.is_stopped() {
                    warn!(error = %e, "control receive failed");
                    errors.set_rx(Error::Receive(e));
                }
                break;
            }
        };
        backoff.reset();

        let msg = &rxbuf[..n];
        if let Err(e) = validate(msg) {
            warn!(len = n, error = %e, "skipping invalid message");
            continue;
        }
        let buf = BufferPool::clone_from_slice(msg);
        counters.inc_cloned();
        if !deliver_or_stop(&deliver, &mut stop, buf).await {
            break;
        }
    }
    done.stop();
    trace!("control receive loop done");
}

async fn raw_rx(
    sock: Arc<RawSocket>,
    deliver: mpsc::Sender<Buffer>,
    mut stop: StopSignal,
    mut control_done: StopSignal,
    counters: Arc<Counters>,
    errors: Arc<TaskErrors>,
) {
    let mut rxbuf = vec![0u8; MAX_BUFFER_SIZE];
    let ifindex = sock.ifindex();

    loop {
        let received = tokio::select! {
            biased;
            _ = stop.stopped() => break,
            _ = control_done.stopped() => break,
            r = sock.recv_from(&mut rxbuf) => r,
        };
        let n = match received {
            Ok((n, from)) if from == ifindex && n > 0 => n,
            Ok(_) => continue,
            Err(e) if is_transient_io(&e) => continue,
            Err(e) => {
                warn!(error = %e, "raw receive failed");
                errors.set_rx(Error::Receive(e));
                break;
            }
        };
        let buf = BufferPool::clone_from_slice(&rxbuf[..n]);
        counters.inc_cloned();
        if !deliver_or_stop(&deliver, &mut stop, buf).await {
            break;
        }
    }
    trace!("raw receive loop done");
}

/// Wait for stop, then shut the control socket down.
///
/// Shutting down wakes the receive loop and fails any blocked write, so
/// the sockets close once the other loops drop their references.
async fn closer(
    control: Arc<ControlSocket>,
    raw: Option<Arc<RawSocket>>,
    mut stop: StopSignal,
    state: Arc<StateCell>,
) {
    stop.stopped().await;
    if state.get() == SessionState::Connected {
        state.set(SessionState::Draining);
    }
    if let Err(e) = control.shutdown() {
        debug!(error = %e, "control shutdown");
    }
    drop(raw);
    drop(control);
}
