//! Event Bridge Integration Tests
//!
//! Tests for the async channel bridge between the host thread and Tokio.
//!
//! # Test Scenarios
//! - Events published from a plain thread reach an async consumer
//! - Ordering is preserved
//! - A full bridge drops instead of blocking the publisher
//! - Closing the publisher ends the stream
//!
//! Run with: `cargo test -p common --test event_bridge_tests`

use common::test_utils::{DEFAULT_TEST_TIMEOUT, with_timeout};
use common::{DEFAULT_EVENT_CAPACITY, create_event_bridge};
use protocol::{MouseButtons, MouseEvent, MouseReport};
use std::thread;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_events_cross_thread_in_order() {
    let (publisher, subscriber) = create_event_bridge(DEFAULT_EVENT_CAPACITY);

    let handle = thread::spawn(move || {
        for x in 1..=10i8 {
            assert!(publisher.publish(MouseEvent::X(x)));
        }
    });

    for expected in 1..=10i8 {
        let event = with_timeout(DEFAULT_TEST_TIMEOUT, subscriber.recv())
            .await
            .expect("Timed out")
            .expect("Bridge closed");
        assert_eq!(event, MouseEvent::X(expected));
    }

    handle.join().expect("Publisher thread panicked");
}

#[test]
fn test_publish_never_blocks_when_full() {
    let (publisher, _subscriber) = create_event_bridge(4);

    let start = Instant::now();
    let accepted = (0..100)
        .filter(|_| publisher.publish(MouseEvent::Buttons(MouseButtons::LEFT)))
        .count();

    assert_eq!(accepted, 4);
    assert_eq!(publisher.dropped(), 96);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_dropping_publisher_closes_stream() {
    let (publisher, subscriber) = create_event_bridge(8);

    let report = MouseReport::parse(&[0x01, 2, 3, 0]).unwrap();
    publisher.publish(MouseEvent::Update(report));
    drop(publisher);

    let first = subscriber.recv().await.expect("Buffered event lost");
    assert_eq!(first, MouseEvent::Update(report));
    assert!(subscriber.recv().await.is_err());
}

#[test]
fn test_zero_capacity_is_rounded_up() {
    let (publisher, subscriber) = create_event_bridge(0);

    assert!(publisher.publish(MouseEvent::Z(-1)));
    assert_eq!(subscriber.try_recv(), Some(MouseEvent::Z(-1)));
}
