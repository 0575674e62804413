// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Callback-based subscriber with a cancellation handle.

use std::sync::atomic::{AtomicBool, Ordering};

use freshet_core::{demand, hooks, Element, FlowError, Subscriber, Upstream, UpstreamCell};

/// Subscriber delegating each signal to a closure.
///
/// Requests unbounded demand on subscribe; backpressure-sensitive
/// consumption needs a real [`Subscriber`] implementation instead. The
/// handle returned by `subscribe_fn` exposes [`LambdaSubscriber::cancel`].
pub struct LambdaSubscriber<T> {
    on_next: Box<dyn Fn(T) + Send + Sync>,
    on_error: Box<dyn Fn(FlowError) + Send + Sync>,
    on_complete: Box<dyn Fn() + Send + Sync>,
    upstream: UpstreamCell<T>,
    done: AtomicBool,
}

impl<T: Element> LambdaSubscriber<T> {
    pub fn new(
        on_next: impl Fn(T) + Send + Sync + 'static,
        on_error: impl Fn(FlowError) + Send + Sync + 'static,
        on_complete: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_next: Box::new(on_next),
            on_error: Box::new(on_error),
            on_complete: Box::new(on_complete),
            upstream: UpstreamCell::new(),
            done: AtomicBool::new(false),
        }
    }

    /// Stop the subscription; no further callbacks run.
    pub fn cancel(&self) {
        self.done.store(true, Ordering::Release);
        self.upstream.terminate();
    }

    /// Whether a terminal signal was received or `cancel` was called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl<T: Element> Subscriber<T> for LambdaSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        self.upstream.request(demand::UNBOUNDED);
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) {
            hooks::on_value_dropped(&value);
            return;
        }
        (self.on_next)(value);
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        (self.on_error)(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            (self.on_complete)();
        }
    }
}
