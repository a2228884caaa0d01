//! Requests reaching the driver.

use std::time::{Duration, Instant};

use xeth::message::wire;
use xeth::message::{DevKind, Kind, Reason};
use xeth::{Session, Xid};
use zerocopy::FromBytes;

use crate::common::{DriverConn, FakeDriver, builder, ifinfo};

async fn connected(prefix: &str) -> (Session, DriverConn) {
    let driver = FakeDriver::new(prefix);
    let session = builder(&driver.device).start().await.unwrap();
    let conn = driver.accept().await;
    (session, conn)
}

/// Poll `cond` until it holds or a few seconds pass.
async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

#[tokio::test]
async fn test_carrier_reaches_driver_and_cache() {
    let (mut session, conn) = connected("carrier").await;
    let xid = Xid(3);

    conn.send(&ifinfo(xid, "xeth1", DevKind::Port, Reason::New)).await;
    session.recv().await.unwrap().unwrap();
    assert_eq!(session.cache().get(xid).unwrap().carrier, None);

    session.set_carrier(xid, true).await.unwrap();
    let (kind, msg) = conn.recv().await;
    assert_eq!(kind, Kind::Carrier);
    assert_eq!(msg.len(), wire::Carrier::SIZE);
    let carrier = wire::Carrier::read_from_bytes(&msg).unwrap();
    assert_eq!(carrier.xid.get(), 3);
    assert_eq!(carrier.flag, xeth::message::CARRIER_ON);

    let cache = session.cache().clone();
    assert!(eventually(|| cache.get(xid).unwrap().carrier == Some(true)).await);
    assert!(eventually(|| session.counters().sent == 1).await);

    session.stop();
    session.join().await;
}

#[tokio::test]
async fn test_speed_and_stats() {
    let (mut session, conn) = connected("stats").await;
    let xid = Xid::pack(3, 2);

    session.set_speed(xid, 100_000).await.unwrap();
    let (kind, msg) = conn.recv().await;
    assert_eq!(kind, Kind::Speed);
    let speed = wire::Speed::read_from_bytes(&msg).unwrap();
    assert_eq!(speed.xid.get(), xid.get());
    assert_eq!(speed.mbps.get(), 100_000);

    assert!(session.set_link_stat(xid, 5, 1234));
    let (kind, msg) = conn.recv().await;
    assert_eq!(kind, Kind::LinkStat);
    let stat = wire::Stat::read_from_bytes(&msg).unwrap();
    assert_eq!(stat.index.get(), 5);
    assert_eq!(stat.count.get(), 1234);

    assert!(session.set_ethtool_stat(xid, 1, 9));
    assert_eq!(conn.recv().await.0, Kind::EthtoolStat);

    session.stop();
    session.join().await;
    assert_eq!(session.counters().sent, 3);
    assert_eq!(session.counters().dropped, 0);
}

#[tokio::test]
async fn test_requests_after_stop() {
    let (mut session, _conn) = connected("late").await;
    session.stop();

    let err = session.dump_fib().await.unwrap_err();
    assert!(err.is_stopped());
    session.join().await;

    // Low priority sends never block, they are just shed.
    assert!(!session.set_link_stat(Xid(3), 0, 0));
    assert_eq!(session.counters().dropped, 1);
}
