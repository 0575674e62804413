// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::{Arc, Mutex};

use freshet_core::{demand, FlowError, Stage};
use freshet_operators::DropOnBackpressure;
use freshet_test_utils::{TestSource, TestSubscriber};

#[test]
fn requests_the_source_unbounded() {
    // Arrange
    let source = TestSource::<i32>::new();
    let stage: Arc<dyn Stage<i32>> =
        Arc::new(DropOnBackpressure::new(Arc::new(source.clone())));

    // Act
    stage.subscribe(Arc::new(TestSubscriber::with_request(0)));

    // Assert
    assert_eq!(source.requested(), demand::UNBOUNDED);
}

#[test]
fn discards_everything_without_demand() {
    // Arrange
    let dropped = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&dropped);
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(DropOnBackpressure::with_callback(
        Arc::new(source.clone()),
        move |value| {
            sink.lock().unwrap().push(value);
            Ok(())
        },
    ));
    let subscriber = Arc::new(TestSubscriber::with_request(0));
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.emit(2);
    source.emit(3);

    // Assert
    subscriber.assert_values(&[]);
    assert_eq!(*dropped.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn delivers_while_demand_is_outstanding() {
    // Arrange
    let dropped = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&dropped);
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(DropOnBackpressure::with_callback(
        Arc::new(source.clone()),
        move |value| {
            sink.lock().unwrap().push(value);
            Ok(())
        },
    ));
    let subscriber = Arc::new(TestSubscriber::with_request(2));
    stage.subscribe(subscriber.clone());

    // Act: two covered, one dropped, then fresh demand
    source.emit(1);
    source.emit(2);
    source.emit(3);
    subscriber.request(1);
    source.emit(4);
    source.complete();

    // Assert
    subscriber.assert_values(&[1, 2, 4]);
    assert_eq!(*dropped.lock().unwrap(), vec![3]);
    subscriber.assert_complete();
}

#[test]
fn failing_drop_callback_terminates_the_flow() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(DropOnBackpressure::with_callback(
        Arc::new(source.clone()),
        |value| Err(FlowError::user_msg(format!("could not shed {value}"))),
    ));
    let subscriber = Arc::new(TestSubscriber::with_request(0));
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(5);

    // Assert
    subscriber.assert_error_contains("could not shed 5");
    assert!(source.is_cancelled());
}

#[test]
fn silent_variant_sheds_without_side_effects() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> =
        Arc::new(DropOnBackpressure::new(Arc::new(source.clone())));
    let subscriber = Arc::new(TestSubscriber::with_request(1));
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.emit(2);
    source.complete();

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_complete();
}
