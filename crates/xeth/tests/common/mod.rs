//! Common test utilities for integration tests.
//!
//! Provides a `FakeDriver` that listens on an abstract control socket the
//! way the kernel driver does, plus builders for driver messages.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use xeth::cache::{InterfaceCache, SystemInterface, SystemLookup};
use xeth::message::wire::{self, Header};
use xeth::message::{DevKind, Kind, Reason};
use xeth::transport::socket::{ControlListener, ControlSocket};
use xeth::{Session, SessionBuilder, Xid};
use zerocopy::IntoBytes;
use zerocopy::byteorder::network_endian::{I16, I32, U16, U32, U64};

static DEVICE_COUNTER: AtomicU32 = AtomicU32::new(0);
static TRACING: Once = Once::new();

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Generate a unique driver device name for this test.
pub fn unique_device(prefix: &str) -> String {
    let id = DEVICE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("xeth-{}-{}-{}", prefix, std::process::id(), id)
}

/// A lookup that knows no host interfaces.
#[derive(Debug)]
pub struct NoLookup;

impl SystemLookup for NoLookup {
    fn by_index(&self, _: i32) -> Option<SystemInterface> {
        None
    }
}

pub fn empty_cache() -> Arc<InterfaceCache> {
    Arc::new(InterfaceCache::with_lookup(Arc::new(NoLookup)))
}

/// Session builder for `device` with raw frames off and an isolated cache.
pub fn builder(device: &str) -> SessionBuilder {
    init_tracing();
    Session::builder(device)
        .raw_frames(false)
        .cache(empty_cache())
        .dial_interval(Duration::from_millis(20))
}

/// Stand-in for the driver's end of the control socket.
pub struct FakeDriver {
    pub device: String,
    listener: ControlListener,
}

impl FakeDriver {
    pub fn new(prefix: &str) -> Self {
        let device = unique_device(prefix);
        Self::bind(device)
    }

    pub fn bind(device: String) -> Self {
        let listener = ControlListener::bind(&device).expect("bind fake driver");
        Self { device, listener }
    }

    pub async fn accept(&self) -> DriverConn {
        let sock = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .expect("session did not connect")
            .expect("accept");
        DriverConn { sock }
    }
}

/// One accepted session, seen from the driver.
pub struct DriverConn {
    sock: ControlSocket,
}

impl DriverConn {
    pub async fn send(&self, msg: &[u8]) {
        self.sock.send(msg).await.expect("driver send");
    }

    /// Next message from the session, with its kind.
    pub async fn recv(&self) -> (Kind, Vec<u8>) {
        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(Duration::from_secs(5), self.sock.recv(&mut buf))
            .await
            .expect("no message from session")
            .expect("driver recv");
        buf.truncate(n);
        let kind = Kind::try_from(buf[15]).expect("known kind");
        (kind, buf)
    }
}

pub fn break_msg() -> Vec<u8> {
    Header::new(Kind::Break).as_bytes().to_vec()
}

pub fn ifinfo(xid: Xid, name: &str, kind: DevKind, reason: Reason) -> Vec<u8> {
    let mut ifname = [0u8; wire::IFNAMSIZ];
    ifname[..name.len()].copy_from_slice(name.as_bytes());
    let m = wire::IfInfo {
        header: Header::new(Kind::IfInfo),
        ifname,
        net: U64::new(0),
        ifindex: I32::new(xid.get() as i32),
        xid: U32::new(xid.get()),
        iflinkindex: I32::new(0),
        flags: U32::new(0),
        addr: [0x02, 0, 0, 0, 0, xid.get() as u8],
        kind: kind as u8,
        reason: reason as u8,
        features: U64::new(0),
        port: I16::new(1),
        subport: I16::new(-1),
        id: U16::new(0),
        pad: [0; 2],
    };
    m.as_bytes().to_vec()
}

pub fn change_upper(lower: Xid, upper: Xid, linking: bool) -> Vec<u8> {
    let m = wire::ChangeUpperXid {
        header: Header::new(Kind::ChangeUpperXid),
        upper: U32::new(upper.get()),
        lower: U32::new(lower.get()),
        linking: linking as u8,
        pad: [0; 7],
    };
    m.as_bytes().to_vec()
}
