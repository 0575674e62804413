// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Drop-on-overflow backpressure policy.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, hooks, Element, FlowError, Result, Stage, Subscriber, Subscription, Upstream,
    UpstreamCell,
};

/// Callback receiving elements discarded for lack of demand.
pub type DropHook<T> = dyn Fn(T) -> Result<()> + Send + Sync;

/// Requests the upstream unbounded and discards elements that arrive while
/// the downstream has no demand.
///
/// Discarded elements go to the optional `on_drop` callback; without one
/// they are silently dropped (this is policy, not a protocol violation, so
/// the dropped-signal sink is not involved). A failing callback cancels the
/// upstream and becomes the downstream error.
pub struct DropOnBackpressure<T> {
    source: Arc<dyn Stage<T>>,
    on_drop: Option<Arc<DropHook<T>>>,
}

impl<T> DropOnBackpressure<T> {
    /// Silent variant.
    #[must_use]
    pub fn new(source: Arc<dyn Stage<T>>) -> Self {
        Self {
            source,
            on_drop: None,
        }
    }

    /// Variant invoking `on_drop` for every discarded element.
    pub fn with_callback(
        source: Arc<dyn Stage<T>>,
        on_drop: impl Fn(T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            on_drop: Some(Arc::new(on_drop)),
        }
    }
}

impl<T: Element> Stage<T> for DropOnBackpressure<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let drop_sub = Arc::new_cyclic(|me| DropSubscriber {
            me: me.clone(),
            downstream: subscriber,
            upstream: UpstreamCell::new(),
            on_drop: self.on_drop.clone(),
            requested: CachePadded::new(AtomicU64::new(0)),
            done: AtomicBool::new(false),
        });
        self.source.subscribe(drop_sub);
    }
}

struct DropSubscriber<T> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: UpstreamCell<T>,
    on_drop: Option<Arc<DropHook<T>>>,
    requested: CachePadded<AtomicU64>,
    done: AtomicBool,
}

impl<T: Element> DropSubscriber<T> {
    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.upstream.terminate();
        self.downstream.on_error(error);
    }
}

impl<T: Element> Subscriber<T> for DropSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        self.downstream.on_subscribe(Upstream::Plain(me));
        self.upstream.request(demand::UNBOUNDED);
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return;
        }
        if self.requested.load(Ordering::Acquire) > 0 {
            self.downstream.on_next(value);
            demand::produced(&self.requested, 1);
            return;
        }
        if let Some(on_drop) = &self.on_drop {
            if let Err(error) = on_drop(value) {
                self.fail(error);
            }
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

impl<T: Element> Subscription for DropSubscriber<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.fail(FlowError::illegal_argument("request amount must be positive"));
            return;
        }
        demand::add_cap(&self.requested, n);
    }

    fn cancel(&self) {
        self.upstream.terminate();
    }
}
