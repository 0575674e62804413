// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use freshet_core::{demand, Element, FlowError, Stage, Subscriber, Subscription, Upstream};

/// Manual stage driven by the test.
///
/// Records cumulative requested demand and cancellation; emission is up to
/// the test, which may deliberately ignore demand to exercise an operator's
/// overflow policy. Re-subscribing replaces the driven subscriber (the
/// subscribe count keeps connection-sharing tests honest).
pub struct TestSource<T> {
    inner: Arc<TestSourceInner<T>>,
}

impl<T> Clone for TestSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct TestSourceInner<T> {
    downstream: Mutex<Option<Arc<dyn Subscriber<T>>>>,
    requested: AtomicU64,
    cancellations: AtomicUsize,
    subscribes: AtomicUsize,
}

struct TestSourceSubscription<T> {
    inner: Arc<TestSourceInner<T>>,
    cancelled: AtomicBool,
}

impl<T: Element> TestSource<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TestSourceInner {
                downstream: Mutex::new(None),
                requested: AtomicU64::new(0),
                cancellations: AtomicUsize::new(0),
                subscribes: AtomicUsize::new(0),
            }),
        }
    }

    /// Push one element to the current subscriber, demand or no demand.
    pub fn emit(&self, value: T) {
        let downstream = self.inner.downstream.lock().clone();
        if let Some(downstream) = downstream {
            downstream.on_next(value);
        }
    }

    /// Complete the current subscriber.
    pub fn complete(&self) {
        let downstream = self.inner.downstream.lock().clone();
        if let Some(downstream) = downstream {
            downstream.on_complete();
        }
    }

    /// Error the current subscriber.
    pub fn error(&self, error: FlowError) {
        let downstream = self.inner.downstream.lock().clone();
        if let Some(downstream) = downstream {
            downstream.on_error(error);
        }
    }

    /// Cumulative demand received across `request` calls.
    #[must_use]
    pub fn requested(&self) -> u64 {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Whether any subscription was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellations.load(Ordering::Acquire) > 0
    }

    /// How many times `subscribe` ran.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribes.load(Ordering::Acquire)
    }
}

impl<T: Element> Default for TestSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Stage<T> for TestSource<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.inner.subscribes.fetch_add(1, Ordering::AcqRel);
        *self.inner.downstream.lock() = Some(Arc::clone(&subscriber));
        let subscription = Arc::new(TestSourceSubscription {
            inner: Arc::clone(&self.inner),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(Upstream::Plain(subscription));
    }
}

impl<T: Element> Subscription for TestSourceSubscription<T> {
    fn request(&self, n: u64) {
        demand::add_cap(&self.inner.requested, n);
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.cancellations.fetch_add(1, Ordering::AcqRel);
        }
    }
}
