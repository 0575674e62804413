// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The fluent [`Flow`] wrapper.

use std::sync::Arc;

use freshet_core::{
    ConnectableStage, Element, FlowError, Result, Stage, Subscriber, Subscription,
};
use freshet_operators::{
    CombineLatest, DropOnBackpressure, Empty, Fail, Filter, FromVec, Just, Latest, Map, Peek,
    PeekCallbacks, Publish, Range, RefCount, Take, Unicast, ZipIterable,
};

use crate::lambda_subscriber::LambdaSubscriber;

/// A composable flow of values: a cheap handle around an immutable stage.
///
/// Cloning shares the stage; every `subscribe` yields an independent
/// subscription.
pub struct Flow<T> {
    stage: Arc<dyn Stage<T>>,
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
        }
    }
}

impl Flow<i64> {
    /// `count` consecutive integers starting at `start`.
    #[must_use]
    pub fn range(start: i64, count: u64) -> Self {
        Self::from_stage(Arc::new(Range::new(start, count)))
    }
}

impl<T: Element> Flow<T> {
    /// Wrap an existing stage.
    #[must_use]
    pub fn from_stage(stage: Arc<dyn Stage<T>>) -> Self {
        Self { stage }
    }

    /// The underlying stage.
    #[must_use]
    pub fn stage(&self) -> &Arc<dyn Stage<T>> {
        &self.stage
    }

    /// A flow of exactly one value.
    #[must_use]
    pub fn just(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_stage(Arc::new(Just::new(value)))
    }

    /// A flow of the given values, in order.
    #[must_use]
    pub fn from_vec(values: Vec<T>) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_stage(Arc::new(FromVec::new(values)))
    }

    /// A flow that completes immediately.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_stage(Arc::new(Empty::new()))
    }

    /// A flow that errors immediately.
    pub fn fail(factory: impl Fn() -> FlowError + Send + Sync + 'static) -> Self {
        Self::from_stage(Arc::new(Fail::new(factory)))
    }

    /// A single-subscriber processor plus the flow view onto it.
    #[must_use]
    pub fn unicast(capacity: usize) -> (Unicast<T>, Self) {
        let processor = Unicast::new(capacity);
        let flow = Self::from_stage(Arc::new(processor.clone()));
        (processor, flow)
    }

    /// Transform every element with a fallible mapper.
    pub fn map<R: Element>(
        self,
        mapper: impl Fn(T) -> Result<R> + Send + Sync + 'static,
    ) -> Flow<R> {
        Flow::from_stage(Arc::new(Map::new(self.stage, mapper)))
    }

    /// Keep elements satisfying a fallible predicate.
    #[must_use]
    pub fn filter(self, predicate: impl Fn(&T) -> Result<bool> + Send + Sync + 'static) -> Self {
        Self::from_stage(Arc::new(Filter::new(self.stage, predicate)))
    }

    /// The first `count` elements.
    #[must_use]
    pub fn take(self, count: u64) -> Self {
        Self::from_stage(Arc::new(Take::new(self.stage, count)))
    }

    /// Keep only the newest element while the downstream lags.
    #[must_use]
    pub fn latest(self) -> Self {
        Self::from_stage(Arc::new(Latest::new(self.stage)))
    }

    /// Discard elements silently while the downstream lags.
    #[must_use]
    pub fn drop_on_backpressure(self) -> Self {
        Self::from_stage(Arc::new(DropOnBackpressure::new(self.stage)))
    }

    /// Discard elements through `on_drop` while the downstream lags.
    #[must_use]
    pub fn drop_on_backpressure_with(
        self,
        on_drop: impl Fn(T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::from_stage(Arc::new(DropOnBackpressure::with_callback(
            self.stage, on_drop,
        )))
    }

    /// Pair each element with the next item of `iterable`.
    pub fn zip_iterable<U, R, I>(
        self,
        iterable: I,
        zipper: impl Fn(T, U) -> Result<R> + Send + Sync + 'static,
    ) -> Flow<R>
    where
        U: Send + 'static,
        R: Element,
        I: IntoIterator<Item = U> + Clone + Send + Sync + 'static,
        I::IntoIter: Send,
    {
        Flow::from_stage(Arc::new(ZipIterable::new(self.stage, iterable, zipper)))
    }

    /// Observe lifecycle signals without changing the flow.
    #[must_use]
    pub fn peek(self, callbacks: PeekCallbacks<T>) -> Self {
        Self::from_stage(Arc::new(Peek::new(self.stage, callbacks)))
    }

    /// Multicast through a connectable stage buffering `prefetch` elements.
    #[must_use]
    pub fn publish(self, prefetch: usize) -> Connectable<T>
    where
        T: Clone,
    {
        Connectable {
            stage: Arc::new(Publish::new(self.stage, prefetch)),
        }
    }

    /// Combine the latest values of several flows through `combiner`.
    pub fn combine_latest<R: Element>(
        sources: Vec<Flow<T>>,
        combiner: impl Fn(&[T]) -> Result<R> + Send + Sync + 'static,
    ) -> Flow<R>
    where
        T: Clone,
    {
        let stages = sources.into_iter().map(|flow| flow.stage).collect();
        Flow::from_stage(Arc::new(CombineLatest::new(stages, combiner)))
    }

    /// Subscribe a full protocol subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.stage.subscribe(subscriber);
    }

    /// Subscribe with callbacks and unbounded demand.
    ///
    /// The returned handle cancels the subscription when asked.
    pub fn subscribe_fn(
        &self,
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(FlowError) + Send + Sync + 'static,
        on_complete: impl Fn() + Send + Sync + 'static,
    ) -> Arc<LambdaSubscriber<T>> {
        let subscriber = Arc::new(LambdaSubscriber::new(on_next, on_error, on_complete));
        self.stage.subscribe(subscriber.clone() as Arc<dyn Subscriber<T>>);
        subscriber
    }
}

/// A flow whose upstream subscription is shared and started explicitly.
pub struct Connectable<T> {
    stage: Arc<Publish<T>>,
}

impl<T: Element + Clone> Connectable<T> {
    /// Start (or join) the shared subscription; cancelling the handle
    /// disconnects it.
    pub fn connect(&self) -> Arc<dyn Subscription> {
        self.stage.connect()
    }

    /// Subscribe to the shared flow.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.stage.subscribe(subscriber);
    }

    /// View the connectable as a plain flow (subscribers wait for
    /// `connect`).
    #[must_use]
    pub fn flow(&self) -> Flow<T> {
        Flow::from_stage(Arc::clone(&self.stage) as Arc<dyn Stage<T>>)
    }

    /// Connect while at least one subscriber is attached.
    #[must_use]
    pub fn ref_count(self) -> Flow<T> {
        let connectable = self.stage as Arc<dyn ConnectableStage<T>>;
        Flow::from_stage(Arc::new(RefCount::new(connectable)))
    }
}

impl<T> Clone for Connectable<T> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
        }
    }
}
