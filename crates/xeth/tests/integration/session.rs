//! Session lifecycle tests.

use std::time::Duration;

use xeth::{CounterSnapshot, Session, SessionState, StopHandle};

use crate::common::{FakeDriver, builder, init_tracing, unique_device};

#[tokio::test]
async fn test_dial_retries_until_driver_listens() {
    let device = unique_device("dial");
    let start = tokio::spawn(builder(&device).start());

    // Several attempts are refused before anyone listens.
    tokio::time::sleep(Duration::from_millis(70)).await;
    let driver = FakeDriver::bind(device);
    let _conn = driver.accept().await;

    let mut session = start.await.unwrap().unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.counters(), CounterSnapshot::default());
    assert!(session.rx_error().is_none());
    assert!(session.tx_error().is_none());

    session.stop();
    session.join().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stop_ends_stream() {
    let driver = FakeDriver::new("stop");
    let mut session = builder(&driver.device).start().await.unwrap();
    let _conn = driver.accept().await;

    session.stop();
    session.stop();
    assert_eq!(session.state(), SessionState::Draining);
    assert!(session.recv().await.is_none());

    session.join().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.rx_error().is_none());
    assert!(session.tx_error().is_none());
}

#[tokio::test]
async fn test_driver_hangup_ends_stream() {
    let driver = FakeDriver::new("hangup");
    let mut session = builder(&driver.device).start().await.unwrap();
    let conn = driver.accept().await;

    drop(conn);
    let end = tokio::time::timeout(Duration::from_secs(5), session.recv()).await;
    assert!(end.unwrap().is_none());
    assert!(session.rx_error().is_none());

    session.stop();
    session.join().await;
}

#[tokio::test]
async fn test_stop_aborts_dial() {
    let device = unique_device("abort");
    let stop = StopHandle::new();
    let start = tokio::spawn(builder(&device).stop_handle(stop.clone()).start());

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop.stop();

    let err = start.await.unwrap().unwrap_err();
    assert!(err.is_stopped());
}

#[tokio::test]
async fn test_raw_frames_need_the_interface() {
    init_tracing();
    let err = Session::builder("xethmissing0")
        .raw_frames(true)
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, xeth::Error::InterfaceNotFound { .. }));
}

#[tokio::test]
async fn test_exception_frame_needs_raw_socket() {
    let driver = FakeDriver::new("exception");
    let mut session = builder(&driver.device).start().await.unwrap();
    let _conn = driver.accept().await;

    let mut frame = [0u8; 64];
    assert!(session.exception_frame(&mut frame).await.is_err());

    session.stop();
    session.join().await;
}
