//! The session facade.
//!
//! A [`Session`] is one attachment to the driver. It owns the transport
//! tasks, decodes what they deliver, and encodes requests into the
//! transmit queues. Events are decoded on the consumer's side, so the
//! cache reflects an event by the time the caller sees it.
//!
//! # Example
//!
//! ```ignore
//! use xeth::{Event, Session};
//! use tokio_stream::StreamExt;
//!
//! let mut session = Session::builder("platina-mk1").start().await?;
//! session.dump_ifinfo().await?;
//!
//! while let Some(event) = session.try_next().await? {
//!     if let Event::Break = event {
//!         break;
//!     }
//! }
//! for entry in session.cache().snapshot() {
//!     println!("{entry}");
//! }
//! session.stop();
//! session.join().await;
//! ```

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::buffer::{Buffer, BufferPool};
use crate::cache::InterfaceCache;
use crate::config::{SessionBuilder, SessionConfig};
use crate::counters::{CounterSnapshot, Counters};
use crate::error::{Error, Result};
use crate::frame::mark_exception;
use crate::message::{Codec, Event, Request};
use crate::transport::socket::RawSocket;
use crate::transport::{SessionState, StateCell, StopHandle, Task, TaskErrors, TxQueue};
use crate::xid::Xid;

/// A live attachment to the driver.
pub struct Session {
    config: SessionConfig,
    codec: Codec,
    counters: Arc<Counters>,
    tx: TxQueue,
    rx: mpsc::Receiver<Buffer>,
    raw: Option<Arc<RawSocket>>,
    handles: Vec<JoinHandle<()>>,
    stop: StopHandle,
    state: Arc<StateCell>,
    errors: Arc<TaskErrors>,
    fib_pending: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.config.device)
            .field("state", &self.state.get())
            .field("counters", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Configure a session for the driver named `device`.
    pub fn builder(device: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(device)
    }

    pub(crate) async fn start(
        config: SessionConfig,
        stop: StopHandle,
        cache: Arc<InterfaceCache>,
    ) -> Result<Self> {
        let counters = Arc::new(Counters::new());
        let codec = Codec::new(
            cache.clone(),
            counters.clone(),
            BufferPool::new(config.max_free_buffers),
        );
        let state = Arc::new(StateCell::new(SessionState::Disconnected));
        let errors = Arc::new(TaskErrors::default());

        let task = match Task::start(
            &config,
            &stop,
            counters.clone(),
            cache,
            state.clone(),
            errors.clone(),
        )
        .await
        {
            Ok(task) => task,
            Err(e) => {
                state.set(SessionState::Closed);
                return Err(e);
            }
        };
        debug!(device = %config.device, raw = task.raw.is_some(), "session started");

        Ok(Self {
            config,
            codec,
            counters,
            tx: task.tx,
            rx: task.rx,
            raw: task.raw,
            handles: task.handles,
            stop,
            state,
            errors,
            fib_pending: false,
        })
    }

    /// Next decoded event, or `None` once both receive loops are done.
    ///
    /// A malformed message yields `Some(Err(_))` and the stream goes on.
    pub async fn recv(&mut self) -> Option<Result<Event>> {
        poll_fn(|cx| self.poll_event(cx)).await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Event>>> {
        match ready!(self.rx.poll_recv(cx)) {
            Some(buf) => Poll::Ready(Some(self.handle(buf))),
            None => Poll::Ready(None),
        }
    }

    fn handle(&mut self, buf: Buffer) -> Result<Event> {
        self.counters.inc_parsed();
        let event = self.codec.decode(buf);
        if self.fib_pending && matches!(event, Ok(Event::Break)) {
            self.fib_pending = false;
            self.queue_fib_dump();
        }
        event
    }

    /// Follow an interface dump with a FIB dump without blocking the reader.
    fn queue_fib_dump(&self) {
        let buf = self.codec.encode(&Request::DumpFibInfo);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tx.send_high(buf).await {
                debug!(error = %e, "fib dump not sent");
            }
        });
    }

    /// Encode and enqueue `req` at its priority.
    ///
    /// Low-priority requests never wait; a full queue drops them and
    /// counts the drop.
    pub async fn request(&self, req: Request) -> Result<()> {
        let buf = self.codec.encode(&req);
        self.tx.send(buf, req.priority()).await
    }

    /// Ask the driver to describe every interface, ending with a break.
    pub async fn dump_ifinfo(&mut self) -> Result<()> {
        if self.config.dump_fib {
            self.fib_pending = true;
        }
        self.request(Request::DumpIfInfo).await
    }

    /// Ask the driver for every route and neighbor it knows, ending with a break.
    pub async fn dump_fib(&self) -> Result<()> {
        self.request(Request::DumpFibInfo).await
    }

    /// Set carrier on `xid`. The cached entry records it once the write succeeds.
    pub async fn set_carrier(&self, xid: Xid, on: bool) -> Result<()> {
        self.request(Request::Carrier { xid, on }).await
    }

    /// Report the negotiated speed of `xid` in Mb/s.
    pub async fn set_speed(&self, xid: Xid, mbps: u32) -> Result<()> {
        self.request(Request::Speed { xid, mbps }).await
    }

    /// Queue a link statistic. Returns false if it was dropped.
    pub fn set_link_stat(&self, xid: Xid, index: u32, count: u64) -> bool {
        self.tx
            .send_low(self.codec.encode(&Request::LinkStat { xid, index, count }))
    }

    /// Queue an ethtool statistic. Returns false if it was dropped.
    pub fn set_ethtool_stat(&self, xid: Xid, index: u32, count: u64) -> bool {
        self.tx
            .send_low(self.codec.encode(&Request::EthtoolStat { xid, index, count }))
    }

    /// Hand a tagged frame back to the driver for its upper device.
    pub async fn exception_frame(&self, frame: &mut [u8]) -> Result<()> {
        let raw = self.raw.as_ref().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "raw frames are disabled for this session",
            ))
        })?;
        mark_exception(frame)?;
        raw.send_exception(frame)
            .await
            .map_err(|source| Error::Transmit { kind: None, source })?;
        Ok(())
    }

    /// Signal every task to finish. Idempotent.
    pub fn stop(&self) {
        if self.state.get() == SessionState::Connected {
            self.state.set(SessionState::Draining);
        }
        self.stop.stop();
    }

    /// A handle that stops this session from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Wait for all tasks to exit. Call [`stop`](Self::stop) first.
    pub async fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "session task failed");
            }
        }
        self.state.set(SessionState::Closed);
    }

    /// Where the session is in its lifecycle.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// The error that ended a receive loop, if any.
    pub fn rx_error(&self) -> Option<Arc<Error>> {
        self.errors.rx()
    }

    /// The error that ended the transmit scheduler, if any.
    pub fn tx_error(&self) -> Option<Arc<Error>> {
        self.errors.tx()
    }

    /// Current message counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// The interface cache this session keeps up to date.
    pub fn cache(&self) -> &Arc<InterfaceCache> {
        self.codec.cache()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }
}

impl Stream for Session {
    type Item = Result<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.stop();
    }
}
