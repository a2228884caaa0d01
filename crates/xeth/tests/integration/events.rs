//! Driver events reaching the consumer and the cache.

use std::time::Duration;

use tokio_stream::StreamExt;
use xeth::message::{DevKind, Kind, Reason};
use xeth::{Event, Session, Xid};

use crate::common::{DriverConn, FakeDriver, break_msg, builder, change_upper, ifinfo};

async fn next(session: &mut Session) -> Event {
    tokio::time::timeout(Duration::from_secs(5), session.recv())
        .await
        .expect("no event")
        .expect("stream ended")
        .expect("decode failed")
}

async fn connected(prefix: &str) -> (Session, DriverConn) {
    let driver = FakeDriver::new(prefix);
    let session = builder(&driver.device).start().await.unwrap();
    let conn = driver.accept().await;
    (session, conn)
}

#[tokio::test]
async fn test_dump_populates_cache() {
    let (mut session, conn) = connected("dump").await;

    session.dump_ifinfo().await.unwrap();
    let (kind, _) = conn.recv().await;
    assert_eq!(kind, Kind::DumpIfInfo);

    conn.send(&ifinfo(Xid(3), "xeth1", DevKind::Port, Reason::Dump)).await;
    conn.send(&ifinfo(Xid(4), "xeth2", DevKind::Port, Reason::Dump)).await;
    conn.send(&break_msg()).await;

    match next(&mut session).await {
        Event::DevDump(info) => {
            assert_eq!(info.xid, Xid(3));
            assert_eq!(info.name, "xeth1");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(next(&mut session).await, Event::DevDump(_)));
    assert!(next(&mut session).await.is_break());

    let cache = session.cache();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.by_name("xeth2").unwrap().xid, Xid(4));
    let counters = session.counters();
    assert_eq!(counters.cloned, 3);
    assert_eq!(counters.parsed, 3);
    assert_eq!(counters.unknown, 0);

    session.stop();
    session.join().await;
}

#[tokio::test]
async fn test_join_quit_round_trip() {
    let (mut session, conn) = connected("upper").await;
    let (lower, upper) = (Xid(3), Xid(50));

    conn.send(&ifinfo(lower, "xeth1", DevKind::Port, Reason::New)).await;
    conn.send(&ifinfo(upper, "br0", DevKind::Bridge, Reason::New)).await;
    conn.send(&change_upper(lower, upper, true)).await;
    for _ in 0..2 {
        assert!(matches!(next(&mut session).await, Event::DevNew(_)));
    }
    assert!(matches!(
        next(&mut session).await,
        Event::Join { lower: l, upper: u } if l == lower && u == upper
    ));
    assert!(session.cache().get(lower).unwrap().uppers.contains(upper));
    assert!(session.cache().get(upper).unwrap().lowers.contains(lower));
    // Only ports are reachable by name.
    assert!(session.cache().by_name("br0").is_none());

    conn.send(&change_upper(lower, upper, false)).await;
    assert!(matches!(next(&mut session).await, Event::Quit { .. }));
    assert!(session.cache().get(lower).unwrap().uppers.is_empty());
    assert!(session.cache().get(upper).unwrap().lowers.is_empty());

    session.stop();
    session.join().await;
}

#[tokio::test]
async fn test_invalid_messages_are_skipped() {
    let (mut session, conn) = connected("invalid").await;

    let truncated = ifinfo(Xid(3), "xeth1", DevKind::Port, Reason::New);
    conn.send(&truncated[..24]).await;
    let mut wrong_version = break_msg();
    wrong_version[14] = 0x7f;
    conn.send(&wrong_version).await;
    conn.send(&break_msg()).await;

    assert!(next(&mut session).await.is_break());
    assert!(session.cache().is_empty());
    assert_eq!(session.counters().cloned, 1);

    session.stop();
    session.join().await;
}

#[tokio::test]
async fn test_events_as_stream() {
    let (mut session, conn) = connected("stream").await;

    conn.send(&ifinfo(Xid(7), "xeth7", DevKind::Port, Reason::New)).await;
    conn.send(&break_msg()).await;
    drop(conn);

    let events: Vec<_> = tokio::time::timeout(Duration::from_secs(5), (&mut session).collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Ok(Event::DevNew(_))));
    assert!(matches!(events[1], Ok(Event::Break)));

    session.stop();
    session.join().await;
}

#[tokio::test]
async fn test_fib_dump_follows_ifinfo_dump() {
    let driver = FakeDriver::new("fib");
    let mut session = builder(&driver.device).dump_fib(true).start().await.unwrap();
    let conn = driver.accept().await;

    session.dump_ifinfo().await.unwrap();
    assert_eq!(conn.recv().await.0, Kind::DumpIfInfo);

    conn.send(&break_msg()).await;
    assert!(next(&mut session).await.is_break());
    assert_eq!(conn.recv().await.0, Kind::DumpFibInfo);

    // Only the first break after a dump triggers it.
    conn.send(&break_msg()).await;
    assert!(next(&mut session).await.is_break());
    session.dump_fib().await.unwrap();
    assert_eq!(conn.recv().await.0, Kind::DumpFibInfo);

    session.stop();
    session.join().await;
}
