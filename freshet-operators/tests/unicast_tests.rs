// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use freshet_core::{FlowError, FusionMode, FusionRequest, Stage};
use freshet_operators::Unicast;
use freshet_test_utils::TestSubscriber;

#[test]
fn replays_pushes_within_demand() {
    // Arrange
    let processor = Unicast::new(8);
    let subscriber = Arc::new(TestSubscriber::with_request(1));
    processor.subscribe(subscriber.clone());

    // Act
    assert!(processor.emit(1));
    assert!(processor.emit(2));
    assert!(processor.emit(3));

    // Assert: one covered, two buffered
    subscriber.assert_values(&[1]);

    subscriber.request(5);
    subscriber.assert_values(&[1, 2, 3]);

    processor.complete();
    subscriber.assert_complete();
}

#[test]
fn buffers_pushes_that_precede_the_subscriber() {
    // Arrange
    let processor = Unicast::new(8);
    assert!(processor.emit(1));
    assert!(processor.emit(2));
    processor.complete();

    // Act
    let subscriber = Arc::new(TestSubscriber::new());
    processor.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_values(&[1, 2]);
    subscriber.assert_complete();
}

#[test]
fn rejects_pushes_past_capacity() {
    // Arrange: capacity rounds up to a power of two
    let processor = Unicast::new(2);
    let subscriber = Arc::new(TestSubscriber::with_request(0));
    processor.subscribe(subscriber.clone());

    // Act
    assert!(processor.emit(1));
    assert!(processor.emit(2));
    let accepted = processor.emit(3);

    // Assert
    assert!(!accepted);
    subscriber.request(10);
    subscriber.assert_values(&[1, 2]);
}

#[test]
fn second_subscriber_is_refused() {
    // Arrange
    let processor: Unicast<i32> = Unicast::new(4);
    let first = Arc::new(TestSubscriber::new());
    processor.subscribe(first.clone());

    // Act
    let second = Arc::new(TestSubscriber::new());
    processor.subscribe(second.clone());

    // Assert
    second.assert_error_contains("single subscriber");
    first.assert_not_terminated();
}

#[test]
fn error_discards_buffered_elements() {
    // Arrange
    let processor = Unicast::new(8);
    let subscriber = Arc::new(TestSubscriber::with_request(0));
    processor.subscribe(subscriber.clone());

    // Act
    assert!(processor.emit(1));
    processor.fail(FlowError::user_msg("producer failed"));

    // Assert
    subscriber.assert_error_contains("producer failed");
    subscriber.assert_values(&[]);
}

#[test]
fn grants_async_fusion_with_wakeups() {
    // Arrange
    let processor = Unicast::new(8);
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::ASYNC));
    processor.subscribe(subscriber.clone());
    assert_eq!(subscriber.fusion_mode(), FusionMode::Async);

    // Act: each push wakes the consumer to poll
    assert!(processor.emit(1));
    assert!(processor.emit(2));
    subscriber.assert_values(&[1, 2]);

    processor.complete();

    // Assert: terminal stays on the push path
    subscriber.assert_complete();
}

#[test]
fn refuses_sync_only_fusion() {
    // Arrange
    let processor = Unicast::new(8);
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::SYNC));

    // Act
    processor.subscribe(subscriber.clone());
    assert!(processor.emit(5));
    processor.complete();

    // Assert: fell back to the push path
    assert_eq!(subscriber.fusion_mode(), FusionMode::None);
    subscriber.assert_values(&[5]);
    subscriber.assert_complete();
}

#[test]
fn pushes_after_terminal_are_refused() {
    // Arrange
    let processor = Unicast::new(8);
    let subscriber = Arc::new(TestSubscriber::new());
    processor.subscribe(subscriber.clone());
    processor.complete();

    // Act & Assert
    assert!(!processor.emit(9));
    subscriber.assert_values(&[]);
    subscriber.assert_complete();
}

#[test]
fn producer_and_consumer_on_separate_threads() {
    use std::thread;
    use std::time::Duration;

    // Arrange
    let processor = Unicast::new(1024);
    let subscriber = Arc::new(TestSubscriber::new());
    processor.subscribe(subscriber.clone());

    // Act
    let producer = {
        let processor = processor.clone();
        thread::spawn(move || {
            for value in 0..1000 {
                while !processor.emit(value) {
                    thread::yield_now();
                }
            }
            processor.complete();
        })
    };
    producer.join().unwrap();
    subscriber.await_terminal(Duration::from_secs(5));

    // Assert: everything arrived, in order
    let values = subscriber.values();
    assert_eq!(values.len(), 1000);
    assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
    subscriber.assert_complete();
}
