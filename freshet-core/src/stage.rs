// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Stage: the immutable, subscribable operator factory.

use std::sync::Arc;

use crate::subscriber::Subscriber;
use crate::subscription::Subscription;

/// An immutable factory producing one independent subscription per
/// subscriber.
///
/// Stages compose by wrapping: an operator stage holds its source stage(s)
/// and, on subscribe, instantiates its per-subscription state machine
/// between the source and the given subscriber.
pub trait Stage<T>: Send + Sync {
    /// Wire `subscriber` to this stage. The subscriber receives
    /// `on_subscribe` exactly once, either during this call or later.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// A stage whose single upstream subscription is shared by all subscribers
/// and starts on an explicit [`ConnectableStage::connect`].
pub trait ConnectableStage<T>: Stage<T> {
    /// Start (or join) the shared upstream subscription.
    ///
    /// The first call per connection subscribes the source exactly once;
    /// subsequent calls return a handle to the same connection. Cancelling
    /// the returned handle tears the shared subscription down.
    fn connect(&self) -> Arc<dyn Subscription>;
}
