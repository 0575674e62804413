// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::{Arc, Mutex};

use freshet_core::{FlowError, FusionMode, FusionRequest, Stage};
use freshet_operators::{Peek, PeekCallbacks, Range};
use freshet_test_utils::{TestSource, TestSubscriber};

/// Shared journal the hooks append to, for ordering assertions.
fn journal() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Clone) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let writer = {
        let log = Arc::clone(&log);
        move |entry: &str| log.lock().unwrap().push(entry.to_string())
    };
    (log, writer)
}

#[test]
fn hooks_fire_in_signal_order() {
    // Arrange
    let (log, write) = journal();
    let callbacks = {
        let (s, n, c, a, r) = (
            write.clone(),
            write.clone(),
            write.clone(),
            write.clone(),
            write.clone(),
        );
        PeekCallbacks::new()
            .on_subscribe(move || {
                s("subscribe");
                Ok(())
            })
            .on_next(move |value: &i32| {
                n(&format!("next {value}"));
                Ok(())
            })
            .on_complete(move || {
                c("complete");
                Ok(())
            })
            .after_terminate(move || {
                a("after");
                Ok(())
            })
            .on_request(move |amount| {
                r(&format!("request {amount}"));
                Ok(())
            })
    };
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Peek::new(Arc::new(source.clone()), callbacks));
    let subscriber = Arc::new(TestSubscriber::with_request(10));

    // Act
    stage.subscribe(subscriber.clone());
    source.emit(1);
    source.complete();

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_complete();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["subscribe", "request 10", "next 1", "complete", "after"]
    );
}

#[test]
fn cancel_hook_observes_teardown() {
    // Arrange
    let (log, write) = journal();
    let callbacks = PeekCallbacks::new().on_cancel(move || {
        write("cancel");
        Ok(())
    });
    let source = TestSource::<i32>::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Peek::new(Arc::new(source.clone()), callbacks));
    let subscriber = Arc::new(TestSubscriber::with_request(0));
    stage.subscribe(subscriber.clone());

    // Act
    subscriber.cancel();

    // Assert
    assert!(source.is_cancelled());
    assert_eq!(*log.lock().unwrap(), vec!["cancel"]);
}

#[test]
fn failing_next_hook_cancels_and_errors() {
    // Arrange
    let source = TestSource::new();
    let callbacks = PeekCallbacks::new().on_next(|value: &i32| {
        if *value == 2 {
            Err(FlowError::user_msg("hook rejected 2"))
        } else {
            Ok(())
        }
    });
    let stage: Arc<dyn Stage<i32>> = Arc::new(Peek::new(Arc::new(source.clone()), callbacks));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.emit(2);

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_error_contains("hook rejected 2");
    assert!(source.is_cancelled());
}

#[test]
fn failing_error_hook_is_attached_as_suppressed() {
    // Arrange
    let source = TestSource::<i32>::new();
    let callbacks = PeekCallbacks::new()
        .on_error(|_error| Err(FlowError::user_msg("error hook failed")));
    let stage: Arc<dyn Stage<i32>> = Arc::new(Peek::new(Arc::new(source.clone()), callbacks));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.error(FlowError::user_msg("original"));

    // Assert: both failures in one terminal error
    subscriber.assert_error_contains("original");
    let rendered = subscriber.error_messages().pop().unwrap();
    assert!(rendered.contains("suppressed"));
    assert!(rendered.contains("error hook failed"));
}

#[test]
fn failing_subscribe_hook_errors_before_any_signal() {
    // Arrange
    let source = TestSource::<i32>::new();
    let callbacks =
        PeekCallbacks::new().on_subscribe(|| Err(FlowError::user_msg("subscribe veto")));
    let stage: Arc<dyn Stage<i32>> = Arc::new(Peek::new(Arc::new(source.clone()), callbacks));
    let subscriber = Arc::new(TestSubscriber::new());

    // Act
    stage.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_error_contains("subscribe veto");
    assert!(source.is_cancelled());
}

#[test]
fn failing_complete_hook_turns_into_an_error() {
    // Arrange
    let source = TestSource::<i32>::new();
    let callbacks =
        PeekCallbacks::new().on_complete(|| Err(FlowError::user_msg("complete hook failed")));
    let stage: Arc<dyn Stage<i32>> = Arc::new(Peek::new(Arc::new(source.clone()), callbacks));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.complete();

    // Assert
    subscriber.assert_error_contains("complete hook failed");
}

#[test]
fn fused_peek_fires_hooks_from_poll() {
    // Arrange
    let (log, write) = journal();
    let callbacks = {
        let (n, c, a) = (write.clone(), write.clone(), write.clone());
        PeekCallbacks::new()
            .on_next(move |value: &i64| {
                n(&format!("next {value}"));
                Ok(())
            })
            .on_complete(move || {
                c("complete");
                Ok(())
            })
            .after_terminate(move || {
                a("after");
                Ok(())
            })
    };
    let stage: Arc<dyn Stage<i64>> = Arc::new(Peek::new(Arc::new(Range::new(0, 2)), callbacks));
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::SYNC));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert: sync exhaustion fires the terminal hooks exactly once
    assert_eq!(subscriber.fusion_mode(), FusionMode::Sync);
    subscriber.assert_values(&[0, 1]);
    subscriber.assert_complete();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["next 0", "next 1", "complete", "after"]
    );
}

#[test]
fn peek_refuses_fusion_across_a_thread_barrier() {
    // Arrange: callbacks must run on the producing side
    let stage: Arc<dyn Stage<i64>> = Arc::new(Peek::new(
        Arc::new(Range::new(0, 3)),
        PeekCallbacks::new().on_next(|_value| Ok(())),
    ));
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::ANY.boundary()));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert
    assert_eq!(subscriber.fusion_mode(), FusionMode::None);
    subscriber.assert_values(&[0, 1, 2]);
    subscriber.assert_complete();
}
