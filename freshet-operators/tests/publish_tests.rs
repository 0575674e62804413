// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use freshet_core::{ConnectableStage, Stage};
use freshet_operators::{Publish, Range, RefCount};
use freshet_test_utils::{TestSource, TestSubscriber};

fn publish_over(source: &TestSource<i32>) -> Arc<Publish<i32>> {
    Arc::new(Publish::new(Arc::new(source.clone()), 16))
}

#[test]
fn nothing_flows_before_connect() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let subscriber = Arc::new(TestSubscriber::new());

    // Act
    publish.subscribe(subscriber.clone());

    // Assert: the source has not even been subscribed
    assert_eq!(source.subscribe_count(), 0);
    subscriber.assert_not_terminated();
    assert_eq!(subscriber.subscription_count(), 1);
}

#[test]
fn connect_subscribes_the_source_exactly_once() {
    // Arrange
    let source = TestSource::<i32>::new();
    let publish = publish_over(&source);
    publish.subscribe(Arc::new(TestSubscriber::new()));

    // Act
    let _connection = publish.connect();
    let _again = publish.connect();

    // Assert
    assert_eq!(source.subscribe_count(), 1);
    assert_eq!(source.requested(), 16);
}

#[test]
fn late_subscribers_see_only_future_values() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let first = Arc::new(TestSubscriber::new());
    publish.subscribe(first.clone());
    let _connection = publish.connect();

    // Act
    source.emit(1);
    source.emit(2);
    let second = Arc::new(TestSubscriber::new());
    publish.subscribe(second.clone());
    source.emit(3);
    source.complete();

    // Assert
    first.assert_values(&[1, 2, 3]);
    first.assert_complete();
    second.assert_values(&[3]);
    second.assert_complete();
}

#[test]
fn distribution_is_bounded_by_the_slowest_subscriber() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let fast = Arc::new(TestSubscriber::new());
    let slow = Arc::new(TestSubscriber::with_request(1));
    publish.subscribe(fast.clone());
    publish.subscribe(slow.clone());
    let _connection = publish.connect();

    // Act
    source.emit(1);
    source.emit(2);

    // Assert: lockstep at the slow subscriber's window
    fast.assert_values(&[1]);
    slow.assert_values(&[1]);

    slow.request(5);
    fast.assert_values(&[1, 2]);
    slow.assert_values(&[1, 2]);
}

#[test]
fn cancelled_subscriber_unblocks_the_rest() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let keeper = Arc::new(TestSubscriber::new());
    let quitter = Arc::new(TestSubscriber::with_request(0));
    publish.subscribe(keeper.clone());
    publish.subscribe(quitter.clone());
    let _connection = publish.connect();

    // Act: the zero-demand subscriber walks away
    source.emit(1);
    keeper.assert_values(&[]);
    quitter.cancel();
    source.emit(2);

    // Assert
    keeper.assert_values(&[1, 2]);
    quitter.assert_values(&[]);
}

#[test]
fn terminal_error_reaches_every_subscriber() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let first = Arc::new(TestSubscriber::new());
    let second = Arc::new(TestSubscriber::new());
    publish.subscribe(first.clone());
    publish.subscribe(second.clone());
    let _connection = publish.connect();

    // Act
    source.emit(1);
    source.error(freshet_core::FlowError::user_msg("shared failure"));

    // Assert
    first.assert_error_contains("shared failure");
    second.assert_error_contains("shared failure");
}

#[test]
fn subscribers_after_termination_get_a_fresh_record() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let first = Arc::new(TestSubscriber::new());
    publish.subscribe(first.clone());
    let _connection = publish.connect();
    source.emit(1);
    source.complete();
    first.assert_complete();

    // Act: a new subscriber attaches to an idle record
    let second = Arc::new(TestSubscriber::new());
    publish.subscribe(second.clone());
    second.assert_not_terminated();
    let _reconnection = publish.connect();

    // Assert: the source was subscribed a second time
    assert_eq!(source.subscribe_count(), 2);
}

#[test]
fn disconnecting_cancels_the_upstream() {
    // Arrange
    let source = TestSource::<i32>::new();
    let publish = publish_over(&source);
    publish.subscribe(Arc::new(TestSubscriber::new()));
    let connection = publish.connect();

    // Act
    connection.cancel();

    // Assert
    assert!(source.is_cancelled());
}

#[test]
fn sync_fused_source_terminates_the_connection_on_exhaustion() {
    // Arrange: range grants sync fusion to the connection
    let publish: Arc<Publish<i64>> = Arc::new(Publish::new(Arc::new(Range::new(0, 3)), 8));
    let subscriber = Arc::new(TestSubscriber::new());
    publish.subscribe(subscriber.clone());

    // Act
    let _connection = publish.connect();

    // Assert: the queue drained to exhaustion and completed the record
    subscriber.assert_values(&[0, 1, 2]);
    subscriber.assert_complete();
}

#[test]
fn ref_count_connects_on_first_and_disconnects_on_last() {
    // Arrange
    let source = TestSource::new();
    let publish = publish_over(&source);
    let stage: Arc<dyn Stage<i32>> =
        Arc::new(RefCount::new(publish as Arc<dyn ConnectableStage<i32>>));

    // Act: first subscriber connects
    let first = Arc::new(TestSubscriber::new());
    stage.subscribe(first.clone());
    assert_eq!(source.subscribe_count(), 1);

    let second = Arc::new(TestSubscriber::new());
    stage.subscribe(second.clone());
    assert_eq!(source.subscribe_count(), 1);

    source.emit(7);
    first.assert_values(&[7]);
    second.assert_values(&[7]);

    // last one out tears the connection down
    first.cancel();
    assert!(!source.is_cancelled());
    second.cancel();

    // Assert
    assert!(source.is_cancelled());
}
