// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use freshet_core::{FlowError, FusionMode, FusionRequest, Stage};
use freshet_operators::{Filter, Map, Range};
use freshet_test_utils::{collect_values, TestSource, TestSubscriber};

#[test]
fn map_transforms_on_the_push_path() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Map::new(
        Arc::new(source.clone()),
        |value: i32| Ok(value * 2),
    ));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.emit(2);
    source.complete();

    // Assert
    subscriber.assert_values(&[2, 4]);
    subscriber.assert_complete();
}

#[test]
fn map_failure_cancels_and_errors() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Map::new(Arc::new(source.clone()), |value: i32| {
        if value == 2 {
            Err(FlowError::user_msg("cannot map 2"))
        } else {
            Ok(value)
        }
    }));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.emit(2);
    source.emit(3);

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_error_contains("cannot map 2");
    assert!(source.is_cancelled());
}

#[test]
fn map_brokers_sync_fusion() {
    // Arrange: range is sync-fuseable, map passes the capability through
    let stage: Arc<dyn Stage<i64>> = Arc::new(Map::new(
        Arc::new(Range::new(0, 4)),
        |value: i64| Ok(value + 100),
    ));
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::SYNC));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert: transformed values arrive through poll
    assert_eq!(subscriber.fusion_mode(), FusionMode::Sync);
    subscriber.assert_values(&[100, 101, 102, 103]);
    subscriber.assert_complete();
}

#[test]
fn map_refuses_fusion_across_a_thread_barrier() {
    // Arrange
    let stage: Arc<dyn Stage<i64>> =
        Arc::new(Map::new(Arc::new(Range::new(0, 4)), |value: i64| Ok(value)));
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::SYNC.boundary()));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert: push path instead
    assert_eq!(subscriber.fusion_mode(), FusionMode::None);
    subscriber.assert_values(&[0, 1, 2, 3]);
    subscriber.assert_complete();
}

#[test]
fn filter_keeps_matching_elements() -> anyhow::Result<()> {
    // Arrange
    let stage: Arc<dyn Stage<i64>> = Arc::new(Filter::new(Arc::new(Range::new(0, 10)), |value| {
        Ok(value % 3 == 0)
    }));

    // Act & Assert
    assert_eq!(collect_values(&stage)?, vec![0, 3, 6, 9]);
    Ok(())
}

#[test]
fn filter_replenishes_rejections_on_the_push_path() {
    // Arrange: a manual source so the replenish requests are visible
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Filter::new(Arc::new(source.clone()), |value| {
        Ok(value % 2 == 0)
    }));
    let subscriber = Arc::new(TestSubscriber::with_request(2));
    stage.subscribe(subscriber.clone());

    // Act: two rejects in between
    source.emit(2);
    source.emit(3);
    source.emit(5);
    source.emit(4);

    // Assert: 2 initial + 1 per rejected element
    subscriber.assert_values(&[2, 4]);
    assert_eq!(source.requested(), 4);
}

#[test]
fn filter_satisfies_bounded_demand_through_a_conditional_source() {
    // Arrange: range drives try_on_next, so rejections cost no demand
    let stage: Arc<dyn Stage<i64>> = Arc::new(Filter::new(Arc::new(Range::new(0, 100)), |value| {
        Ok(value % 10 == 0)
    }));
    let subscriber = Arc::new(TestSubscriber::with_request(3));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert: exactly the demanded number of accepted elements
    subscriber.assert_values(&[0, 10, 20]);
    subscriber.assert_not_terminated();
}

#[test]
fn filter_predicate_failure_cancels_and_errors() {
    // Arrange
    let source = TestSource::new();
    let stage: Arc<dyn Stage<i32>> = Arc::new(Filter::new(Arc::new(source.clone()), |value| {
        if *value < 0 {
            Err(FlowError::user_msg("negative input"))
        } else {
            Ok(true)
        }
    }));
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    source.emit(-1);

    // Assert
    subscriber.assert_values(&[1]);
    subscriber.assert_error_contains("negative input");
    assert!(source.is_cancelled());
}

#[test]
fn filter_skips_rejections_inside_poll() {
    // Arrange
    let stage: Arc<dyn Stage<i64>> = Arc::new(Filter::new(Arc::new(Range::new(0, 6)), |value| {
        Ok(value % 2 == 1)
    }));
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::SYNC));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert
    assert_eq!(subscriber.fusion_mode(), FusionMode::Sync);
    subscriber.assert_values(&[1, 3, 5]);
    subscriber.assert_complete();
}

#[test]
fn fused_chain_surfaces_mapper_errors_through_poll() {
    // Arrange: map inside a fused chain fails mid-run
    let stage: Arc<dyn Stage<i64>> = Arc::new(Map::new(Arc::new(Range::new(0, 5)), |value| {
        if value == 3 {
            Err(FlowError::user_msg("poll failure"))
        } else {
            Ok(value)
        }
    }));
    let subscriber = Arc::new(TestSubscriber::fused(FusionRequest::SYNC));

    // Act
    stage.subscribe(subscriber.clone());

    // Assert: values before the failure, then the error
    subscriber.assert_values(&[0, 1, 2]);
    subscriber.assert_error_contains("poll failure");
}
