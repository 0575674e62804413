// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Take operator limiting a flow to its first n elements.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use freshet_core::{
    demand, hooks, Element, FlowError, Stage, Subscriber, Subscription, Upstream, UpstreamCell,
};

/// Emits only the first `count` elements, then cancels the source and
/// completes.
///
/// With `count == 0` the source is cancelled before a single element is
/// delivered. Demand is translated on the first request: a request covering
/// the whole remainder is forwarded as unbounded, anything smaller is
/// forwarded as-is.
pub struct Take<T> {
    source: Arc<dyn Stage<T>>,
    count: u64,
}

impl<T> Take<T> {
    #[must_use]
    pub fn new(source: Arc<dyn Stage<T>>, count: u64) -> Self {
        Self { source, count }
    }
}

impl<T: Element> Stage<T> for Take<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let take = Arc::new_cyclic(|me| TakeSubscriber {
            me: me.clone(),
            downstream: subscriber,
            upstream: UpstreamCell::new(),
            remaining: AtomicU64::new(self.count),
            count: self.count,
            done: AtomicBool::new(false),
            first_request: AtomicBool::new(false),
        });
        self.source.subscribe(take);
    }
}

struct TakeSubscriber<T> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: UpstreamCell<T>,
    remaining: AtomicU64,
    count: u64,
    done: AtomicBool,
    first_request: AtomicBool,
}

impl<T: Element> TakeSubscriber<T> {
    fn fail_invalid(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.upstream.terminate();
            self.downstream
                .on_error(FlowError::illegal_argument("request amount must be positive"));
        }
    }
}

impl<T: Element> Subscriber<T> for TakeSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        self.downstream.on_subscribe(Upstream::Plain(me));
        if self.count == 0 {
            self.done.store(true, Ordering::Release);
            self.upstream.terminate();
            self.downstream.on_complete();
        }
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return;
        }
        let before = self.remaining.fetch_sub(1, Ordering::AcqRel);
        if before == 0 {
            // over-produced past the cut-off; restore and drop
            self.remaining.store(0, Ordering::Release);
            hooks::on_value_dropped(&value);
            return;
        }
        self.downstream.on_next(value);
        if before == 1 && !self.done.swap(true, Ordering::AcqRel) {
            self.upstream.terminate();
            self.downstream.on_complete();
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.downstream.on_complete();
        }
    }
}

impl<T: Element> Subscription for TakeSubscriber<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.fail_invalid();
            return;
        }
        if !self.first_request.swap(true, Ordering::AcqRel) && n >= self.count {
            // the whole remainder is covered; backpressure is ours alone
            self.upstream.request(demand::UNBOUNDED);
            return;
        }
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.terminate();
    }
}
