// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Connectable multicast.
//!
//! A [`Publish`] stage shares one upstream subscription among any number of
//! subscribers. Subscribers attach to the current *connection record*; the
//! source is subscribed exactly once per record, when someone calls
//! `connect`. The record buffers elements (its own ring, or the upstream's
//! queue when fusion is granted) and a serialized drain distributes each
//! element to every live subscriber in lockstep, bounded by the smallest
//! outstanding demand.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::{ArcSwapOption, Guard};
use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, hooks, queue::SpscRing, ConnectableStage, DrainCell, Element, FlowError, FusionMode,
    FusionRequest, QueueSubscription, Stage, Subscriber, Subscription, Upstream, UpstreamCell, Wip,
};

const IDLE: u8 = 0;
const STARTED: u8 = 1;
const TERMINATED: u8 = 2;

fn same_list<T>(a: &Guard<Option<Arc<T>>>, b: &Guard<Option<Arc<T>>>) -> bool {
    match (a.as_ref(), b.as_ref()) {
        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
        (None, None) => true,
        _ => false,
    }
}

/// Connectable stage multicasting its source.
pub struct Publish<T> {
    source: Arc<dyn Stage<T>>,
    prefetch: usize,
    current: ArcSwapOption<PublishConnection<T>>,
}

impl<T: Element + Clone> Publish<T> {
    /// Multicast `source`, buffering up to `prefetch` elements per
    /// connection.
    #[must_use]
    pub fn new(source: Arc<dyn Stage<T>>, prefetch: usize) -> Self {
        Self {
            source,
            prefetch: prefetch.max(1),
            current: ArcSwapOption::new(None),
        }
    }

    /// The live connection record, installing a fresh one over a missing or
    /// terminated record.
    fn current_connection(&self) -> Arc<PublishConnection<T>> {
        loop {
            let guard = self.current.load();
            if let Some(connection) = guard.as_ref() {
                if !connection.is_terminated() {
                    return Arc::clone(connection);
                }
            }
            let fresh = Arc::new(PublishConnection::new(self.prefetch));
            let previous = self
                .current
                .compare_and_swap(&guard, Some(Arc::clone(&fresh)));
            if same_list(&previous, &guard) {
                return fresh;
            }
        }
    }
}

impl<T: Element + Clone> Stage<T> for Publish<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let inner = Arc::new(InnerSubscription {
            parent: OnceLock::new(),
            subscriber: Arc::clone(&subscriber),
            requested: CachePadded::new(AtomicU64::new(0)),
            cancelled: AtomicBool::new(false),
        });
        // the subscription handle must be downstream before the registry can
        // expose the subscriber to a racing terminal
        subscriber.on_subscribe(Upstream::Plain(Arc::clone(&inner) as Arc<dyn Subscription>));
        loop {
            let connection = self.current_connection();
            if connection.add(&inner) {
                let _ = inner.parent.set(Arc::clone(&connection));
                if inner.cancelled.load(Ordering::Acquire) {
                    // cancelled before the parent was known
                    connection.remove(&inner);
                }
                connection.drain();
                return;
            }
            // the record terminated under us; retry against a fresh one
        }
    }
}

impl<T: Element + Clone> ConnectableStage<T> for Publish<T> {
    fn connect(&self) -> Arc<dyn Subscription> {
        let connection = self.current_connection();
        if connection.try_connect() {
            self.source.subscribe(Arc::clone(&connection) as Arc<dyn Subscriber<T>>);
        }
        connection
    }
}

enum Buffer<T> {
    Own(SpscRing<T>),
    Fused(Arc<dyn QueueSubscription<T>>),
}

/// One shared subscription to the source, plus its subscriber registry.
struct PublishConnection<T> {
    state: AtomicU8,
    prefetch: usize,
    upstream: UpstreamCell<T>,
    buffer: OnceLock<Buffer<T>>,
    mode: AtomicU8,
    /// `None` is the sealed sentinel installed when the terminal signal has
    /// been handed out; `add` fails against it.
    subscribers: ArcSwapOption<Vec<Arc<InnerSubscription<T>>>>,
    wip: Wip,
    done: AtomicBool,
    error: freshet_core::Slot<FlowError>,
    /// Drain-owned replenish accounting toward the upstream window.
    consumed: DrainCell<usize>,
}

impl<T: Element + Clone> PublishConnection<T> {
    fn new(prefetch: usize) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            prefetch,
            upstream: UpstreamCell::new(),
            buffer: OnceLock::new(),
            mode: AtomicU8::new(FusionMode::None.as_u8()),
            subscribers: ArcSwapOption::new(Some(Arc::new(Vec::new()))),
            wip: Wip::new(),
            done: AtomicBool::new(false),
            error: freshet_core::Slot::new(),
            consumed: DrainCell::new(0),
        }
    }

    fn is_terminated(&self) -> bool {
        self.state.load(Ordering::Acquire) == TERMINATED
    }

    fn try_connect(&self) -> bool {
        self.state
            .compare_exchange(IDLE, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn add(&self, inner: &Arc<InnerSubscription<T>>) -> bool {
        loop {
            let guard = self.subscribers.load();
            let Some(list) = guard.as_ref() else {
                return false;
            };
            let mut next = Vec::with_capacity(list.len() + 1);
            next.extend(list.iter().cloned());
            next.push(Arc::clone(inner));
            let previous = self
                .subscribers
                .compare_and_swap(&guard, Some(Arc::new(next)));
            if same_list(&previous, &guard) {
                return true;
            }
        }
    }

    fn remove(&self, target: &InnerSubscription<T>) {
        loop {
            let guard = self.subscribers.load();
            let Some(list) = guard.as_ref() else { return };
            let next: Vec<_> = list
                .iter()
                .filter(|inner| !std::ptr::eq(Arc::as_ptr(inner), target))
                .cloned()
                .collect();
            let previous = self
                .subscribers
                .compare_and_swap(&guard, Some(Arc::new(next)));
            if same_list(&previous, &guard) {
                return;
            }
        }
    }

    /// Seal the registry and hand the terminal signal to every subscriber.
    fn finish(&self, error: Option<FlowError>) {
        self.state.store(TERMINATED, Ordering::Release);
        let Some(list) = self.subscribers.swap(None) else {
            if let Some(error) = error {
                hooks::on_error_dropped(error);
            }
            return;
        };
        match error {
            Some(error) => {
                let shared = Arc::new(error);
                for inner in list.iter() {
                    if !inner.cancelled.load(Ordering::Acquire) {
                        inner
                            .subscriber
                            .on_error(FlowError::Shared(Arc::clone(&shared)));
                    }
                }
            }
            None => {
                for inner in list.iter() {
                    if !inner.cancelled.load(Ordering::Acquire) {
                        inner.subscriber.on_complete();
                    }
                }
            }
        }
    }

    fn drain(&self) {
        if !self.wip.enter() {
            return;
        }
        let mut missed = 1;
        loop {
            if self.drain_pass() {
                // terminal: leave the counter raised so no drain re-enters
                return;
            }
            missed = self.wip.leave(missed);
            if missed == 0 {
                return;
            }
        }
    }

    /// One drain iteration; `true` means the connection reached its end.
    fn drain_pass(&self) -> bool {
        if self.is_terminated() {
            if let Some(Buffer::Own(ring)) = self.buffer.get() {
                ring.clear();
            }
            return true;
        }
        let Some(buffer) = self.buffer.get() else {
            // not connected yet; nothing to move
            return false;
        };
        let guard = self.subscribers.load();
        let Some(list) = guard.as_ref() else {
            return true;
        };

        let mut min_demand = u64::MAX;
        let mut live = 0usize;
        for inner in list.iter() {
            if inner.cancelled.load(Ordering::Acquire) {
                continue;
            }
            live += 1;
            min_demand = min_demand.min(inner.requested.load(Ordering::Acquire));
        }
        if live == 0 {
            min_demand = 0;
        }

        let sync_mode =
            FusionMode::from_u8(self.mode.load(Ordering::Acquire)) == FusionMode::Sync;
        let mut emitted = 0u64;
        loop {
            if self.is_terminated() {
                if let Buffer::Own(ring) = buffer {
                    ring.clear();
                }
                return true;
            }
            let done = self.done.load(Ordering::Acquire);
            if done && !self.error.is_empty() {
                // an error cuts ahead of anything still buffered
                if let Buffer::Own(ring) = buffer {
                    ring.clear();
                }
                self.upstream.terminate();
                self.finish(self.error.take());
                return true;
            }
            if emitted == min_demand {
                let empty = match buffer {
                    Buffer::Own(ring) => ring.is_empty(),
                    Buffer::Fused(queue) => queue.is_empty(),
                };
                if empty && (sync_mode || done) {
                    self.finish(self.error.take());
                    return true;
                }
                break;
            }
            let polled = match buffer {
                Buffer::Own(ring) => Ok(ring.poll()),
                Buffer::Fused(queue) => queue.poll(),
            };
            match polled {
                Err(error) => {
                    self.upstream.terminate();
                    self.finish(Some(error));
                    return true;
                }
                Ok(Some(value)) => {
                    for inner in list.iter() {
                        if !inner.cancelled.load(Ordering::Acquire) {
                            inner.subscriber.on_next(value.clone());
                        }
                    }
                    emitted += 1;
                }
                Ok(None) => {
                    if sync_mode || done {
                        self.finish(self.error.take());
                        return true;
                    }
                    break;
                }
            }
        }

        if emitted > 0 {
            for inner in list.iter() {
                if !inner.cancelled.load(Ordering::Acquire) {
                    demand::produced(&inner.requested, emitted);
                }
            }
            if !sync_mode {
                // WIP exclusivity makes this drain the counter's only user.
                unsafe {
                    self.consumed.with_mut(|consumed| {
                        *consumed += emitted as usize;
                        let limit = self.prefetch - (self.prefetch >> 2);
                        if *consumed >= limit {
                            let batch = *consumed as u64;
                            *consumed = 0;
                            match buffer {
                                Buffer::Fused(queue) => queue.request(batch),
                                Buffer::Own(_) => self.upstream.request(batch),
                            }
                        }
                    });
                }
            }
        }
        false
    }
}

impl<T: Element + Clone> Subscriber<T> for PublishConnection<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream.clone()) {
            return;
        }
        if let Some(queue) = upstream.fused() {
            match queue.request_fusion(FusionRequest::ANY) {
                FusionMode::Sync => {
                    self.mode.store(FusionMode::Sync.as_u8(), Ordering::Release);
                    let _ = self.buffer.set(Buffer::Fused(Arc::clone(queue)));
                    self.drain();
                    return;
                }
                FusionMode::Async => {
                    self.mode
                        .store(FusionMode::Async.as_u8(), Ordering::Release);
                    let _ = self.buffer.set(Buffer::Fused(Arc::clone(queue)));
                    queue.request(self.prefetch as u64);
                    return;
                }
                FusionMode::None => {}
            }
        }
        let _ = self.buffer.set(Buffer::Own(SpscRing::new(self.prefetch)));
        upstream.request(self.prefetch as u64);
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) || self.is_terminated() {
            hooks::on_value_dropped(&value);
            return;
        }
        match self.buffer.get() {
            Some(Buffer::Own(ring)) => {
                if ring.offer(value).is_err() {
                    self.upstream.terminate();
                    self.on_error(FlowError::illegal_argument(
                        "publish buffer overflow: upstream ignored the requested window",
                    ));
                    return;
                }
            }
            _ => {
                // a fused upstream pushes wakeups, not values
                hooks::on_value_dropped(&value);
                return;
            }
        }
        self.drain();
    }

    fn on_available(&self) {
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

/// Connection handle returned by `connect`: cancelling it disconnects the
/// shared subscription.
impl<T: Element + Clone> Subscription for PublishConnection<T> {
    fn request(&self, _n: u64) {
        // demand is governed per subscriber, not per connection
    }

    fn cancel(&self) {
        if self.state.swap(TERMINATED, Ordering::AcqRel) != TERMINATED {
            self.upstream.terminate();
            self.drain();
        }
    }
}

/// Per-subscriber demand ledger attached to a connection record.
///
/// The parent is bound after `on_subscribe` has been delivered; demand
/// issued before then accumulates and is drained once the registry accepts
/// the subscriber.
struct InnerSubscription<T> {
    parent: OnceLock<Arc<PublishConnection<T>>>,
    subscriber: Arc<dyn Subscriber<T>>,
    requested: CachePadded<AtomicU64>,
    cancelled: AtomicBool,
}

impl<T: Element + Clone> Subscription for InnerSubscription<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            if !self.cancelled.swap(true, Ordering::AcqRel) {
                if let Some(connection) = self.parent.get() {
                    connection.remove(self);
                }
                self.subscriber
                    .on_error(FlowError::illegal_argument("request amount must be positive"));
                if let Some(connection) = self.parent.get() {
                    connection.drain();
                }
            }
            return;
        }
        demand::add_cap(&self.requested, n);
        if let Some(connection) = self.parent.get() {
            connection.drain();
        }
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            if let Some(connection) = self.parent.get() {
                connection.remove(self);
                // unblock the lockstep window for the remaining subscribers
                connection.drain();
            }
        }
    }
}
