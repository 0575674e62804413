// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;
use std::time::Duration;

use freshet_core::{Element, FlowError, Stage};

use crate::TestSubscriber;

/// Subscribe with unbounded demand and collect every value until terminal.
///
/// Waits up to five seconds for a terminal signal, which synchronous stages
/// deliver before `subscribe` even returns.
///
/// # Errors
/// Returns the stage's terminal error, if it errored.
///
/// # Panics
/// Panics when no terminal signal arrives within the timeout.
pub fn collect_values<T: Element + Clone>(stage: &Arc<dyn Stage<T>>) -> Result<Vec<T>, FlowError> {
    let subscriber = Arc::new(TestSubscriber::new());
    stage.subscribe(subscriber.clone());
    subscriber.await_terminal(Duration::from_secs(5));
    let mut errors = subscriber.take_errors();
    match errors.pop() {
        Some(error) => Err(error),
        None => Ok(subscriber.values()),
    }
}
