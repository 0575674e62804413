// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Latest-value backpressure policy.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, hooks, Element, FlowError, Slot, Stage, Subscriber, Subscription, Upstream,
    UpstreamCell, Wip,
};

/// Requests the upstream unbounded and keeps only the newest element while
/// the downstream has no demand.
///
/// Every upstream element overwrites the slot; the drain hands the slot's
/// content over whenever demand is outstanding. A slow downstream therefore
/// observes the most recent value at each request, never a stale backlog.
pub struct Latest<T> {
    source: Arc<dyn Stage<T>>,
}

impl<T> Latest<T> {
    #[must_use]
    pub fn new(source: Arc<dyn Stage<T>>) -> Self {
        Self { source }
    }
}

impl<T: Element> Stage<T> for Latest<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let latest = Arc::new_cyclic(|me| LatestSubscriber {
            me: me.clone(),
            downstream: subscriber,
            upstream: UpstreamCell::new(),
            slot: Slot::new(),
            error: Slot::new(),
            requested: CachePadded::new(AtomicU64::new(0)),
            wip: Wip::new(),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        });
        self.source.subscribe(latest);
    }
}

struct LatestSubscriber<T> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: UpstreamCell<T>,
    slot: Slot<T>,
    error: Slot<FlowError>,
    requested: CachePadded<AtomicU64>,
    wip: Wip,
    done: AtomicBool,
    cancelled: AtomicBool,
}

impl<T: Element> LatestSubscriber<T> {
    fn drain(&self) {
        if !self.wip.enter() {
            return;
        }
        let mut missed = 1;
        loop {
            loop {
                if self.cancelled.load(Ordering::Acquire) {
                    self.slot.clear();
                    return;
                }
                let done = self.done.load(Ordering::Acquire);
                if done {
                    // error outranks any value still in the slot
                    if let Some(error) = self.error.take() {
                        self.slot.clear();
                        self.downstream.on_error(error);
                        return;
                    }
                    if self.slot.is_empty() {
                        self.downstream.on_complete();
                        return;
                    }
                }
                if self.slot.is_empty() || self.requested.load(Ordering::Acquire) == 0 {
                    break;
                }
                if let Some(value) = self.slot.take() {
                    self.downstream.on_next(value);
                    demand::produced(&self.requested, 1);
                }
            }
            missed = self.wip.leave(missed);
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: Element> Subscriber<T> for LatestSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        self.downstream.on_subscribe(Upstream::Plain(me));
        // backpressure is entirely downstream; drink the source dry
        self.upstream.request(demand::UNBOUNDED);
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) || self.cancelled.load(Ordering::Acquire) {
            hooks::on_value_dropped(&value);
            return;
        }
        self.slot.set(value);
        self.drain();
    }

    fn on_error(&self, error: FlowError) {
        if self.done.load(Ordering::Acquire) {
            hooks::on_error_dropped(error);
            return;
        }
        // the error must be visible before the done flag is
        self.error.try_set(error);
        self.done.store(true, Ordering::Release);
        self.drain();
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.drain();
        }
    }
}

impl<T: Element> Subscription for LatestSubscriber<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.error
                .try_set(FlowError::illegal_argument("request amount must be positive"));
            self.done.store(true, Ordering::Release);
            self.upstream.terminate();
            self.drain();
            return;
        }
        demand::add_cap(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.upstream.terminate();
        if self.wip.enter() {
            // we own the drain now; nobody else will release the value
            self.slot.clear();
        }
    }
}
