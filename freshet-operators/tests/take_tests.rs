// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use freshet_core::{demand, Stage};
use freshet_operators::{Range, Take};
use freshet_test_utils::{collect_values, DroppedSignals, TestSource, TestSubscriber};

#[test]
fn takes_the_first_n_elements() -> anyhow::Result<()> {
    // Arrange
    let stage: Arc<dyn Stage<i64>> = Arc::new(Take::new(Arc::new(Range::new(0, 100)), 4));

    // Act & Assert
    assert_eq!(collect_values(&stage)?, vec![0, 1, 2, 3]);
    Ok(())
}

#[test]
fn short_sources_just_complete() -> anyhow::Result<()> {
    // value count is the shorter of source length and the cut-off
    let stage: Arc<dyn Stage<i64>> = Arc::new(Take::new(Arc::new(Range::new(0, 2)), 10));
    assert_eq!(collect_values(&stage)?, vec![0, 1]);
    Ok(())
}

#[test]
fn take_zero_cancels_before_any_emission() {
    // Arrange
    let source = TestSource::<i32>::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 0));
    let subscriber = Arc::new(TestSubscriber::new());

    // Act
    stage.subscribe(subscriber.clone());

    // Assert: on_subscribe then on_complete downstream; cancel upstream
    assert_eq!(subscriber.subscription_count(), 1);
    subscriber.assert_values(&[]);
    subscriber.assert_complete();
    assert!(source.is_cancelled());
}

#[test]
fn cancels_the_source_when_the_cutoff_is_reached() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 2));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    assert!(!source.is_cancelled());
    source.emit(2);

    // Assert
    subscriber.assert_values(&[1, 2]);
    subscriber.assert_complete();
    assert!(source.is_cancelled());
}

#[test]
fn late_values_go_to_the_dropped_sink() {
    // Arrange
    let dropped = DroppedSignals::install();
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 1));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act: the source keeps pushing past the cut-off
    source.emit(1);
    source.emit(2);
    source.emit(3);

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_complete();
    assert_eq!(dropped.values(), vec!["2", "3"]);
}

#[test]
fn covering_request_is_forwarded_as_unbounded() {
    // Arrange
    let source = TestSource::<i32>::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 3));
    let subscriber = Arc::new(TestSubscriber::with_request(5));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert
    assert_eq!(source.requested(), demand::UNBOUNDED);
}

#[test]
fn partial_requests_are_forwarded_verbatim() {
    // Arrange
    let source = TestSource::<i32>::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 10));
    let subscriber = Arc::new(TestSubscriber::with_request(4));

    // Act
    stage.subscribe(subscriber.clone());
    subscriber.request(2);

    // Assert: 4 at subscribe, then 2 more
    assert_eq!(source.requested(), 6);
}

#[test]
fn zero_request_errors_and_cancels() {
    // Arrange
    let source = TestSource::<i32>::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 3));
    let subscriber = Arc::new(TestSubscriber::with_request(0));
    stage.subscribe(subscriber.clone());

    // Act
    subscriber.request(0);

    // Assert
    subscriber.assert_error_contains("must be positive");
    assert!(source.is_cancelled());
}

#[test]
fn upstream_errors_pass_through_before_the_cutoff() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Take::new(Arc::new(source.clone()), 5));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.error(freshet_core::FlowError::user_msg("upstream failed"));

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_error_contains("upstream failed");
}
