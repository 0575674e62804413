// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Single-subscriber processor bridging a push producer into a flow.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, hooks, queue::SpscRing, Element, EmptySubscription, FlowError, FusionMode,
    FusionRequest, QueueSubscription, Result, Stage, Subscriber, Subscription, Upstream, Wip,
};

/// Buffering processor accepting pushes from one producer and replaying
/// them, backpressured, to one subscriber.
///
/// This is the in-tree producer of `Async` fusion: a fused subscriber polls
/// the buffer directly and is woken through `on_available`, while terminal
/// signals stay on the push path.
pub struct Unicast<T> {
    inner: Arc<UnicastInner<T>>,
}

impl<T> Clone for Unicast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> Unicast<T> {
    /// Processor buffering up to `capacity` elements.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(UnicastInner {
                queue: SpscRing::new(capacity),
                wip: Wip::new(),
                requested: CachePadded::new(AtomicU64::new(0)),
                done: AtomicBool::new(false),
                error: freshet_core::Slot::new(),
                cancelled: AtomicBool::new(false),
                downstream: OnceLock::new(),
                subscribed: AtomicBool::new(false),
                async_fused: AtomicBool::new(false),
            }),
        }
    }

    /// Push one element. Returns `false` — dropping the element — when the
    /// processor is terminated, cancelled, or its buffer is full.
    ///
    /// Pushes must come from one producer at a time.
    pub fn emit(&self, value: T) -> bool {
        if self.inner.done.load(Ordering::Acquire) || self.inner.cancelled.load(Ordering::Acquire)
        {
            hooks::on_value_dropped(&value);
            return false;
        }
        if let Err(rejected) = self.inner.queue.offer(value) {
            hooks::on_value_dropped(&rejected);
            return false;
        }
        self.inner.drain();
        true
    }

    /// Complete the processor; buffered elements are still delivered.
    pub fn complete(&self) {
        if !self.inner.done.swap(true, Ordering::AcqRel) {
            self.inner.drain();
        }
    }

    /// Fail the processor; buffered elements are discarded.
    pub fn fail(&self, error: FlowError) {
        if self.inner.done.load(Ordering::Acquire) {
            hooks::on_error_dropped(error);
            return;
        }
        self.inner.error.try_set(error);
        self.inner.done.store(true, Ordering::Release);
        self.inner.drain();
    }
}

impl<T: Element> Stage<T> for Unicast<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        if self.inner.subscribed.swap(true, Ordering::AcqRel) {
            EmptySubscription::error(
                &*subscriber,
                FlowError::illegal_argument("unicast supports a single subscriber"),
            );
            return;
        }
        subscriber.on_subscribe(Upstream::Fused(
            Arc::clone(&self.inner) as Arc<dyn QueueSubscription<T>>
        ));
        let _ = self.inner.downstream.set(subscriber);
        self.inner.drain();
    }
}

struct UnicastInner<T> {
    queue: SpscRing<T>,
    wip: Wip,
    requested: CachePadded<AtomicU64>,
    done: AtomicBool,
    error: freshet_core::Slot<FlowError>,
    cancelled: AtomicBool,
    downstream: OnceLock<Arc<dyn Subscriber<T>>>,
    subscribed: AtomicBool,
    async_fused: AtomicBool,
}

impl<T: Element> UnicastInner<T> {
    fn drain(&self) {
        if !self.wip.enter() {
            return;
        }
        let mut missed = 1;
        loop {
            if self.drain_pass() {
                return;
            }
            missed = self.wip.leave(missed);
            if missed == 0 {
                return;
            }
        }
    }

    /// One drain iteration; `true` means terminal was delivered.
    fn drain_pass(&self) -> bool {
        let Some(downstream) = self.downstream.get() else {
            return false;
        };
        if self.cancelled.load(Ordering::Acquire) {
            self.queue.clear();
            return true;
        }
        if self.async_fused.load(Ordering::Acquire) {
            // the consumer pulls; we only wake it and relay terminals
            if !self.queue.is_empty() {
                downstream.on_available();
            }
            if self.done.load(Ordering::Acquire) && self.queue.is_empty() {
                match self.error.take() {
                    Some(error) => downstream.on_error(error),
                    None => downstream.on_complete(),
                }
                return true;
            }
            return false;
        }
        let mut emitted = 0u64;
        let target = self.requested.load(Ordering::Acquire);
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                self.queue.clear();
                return true;
            }
            let done = self.done.load(Ordering::Acquire);
            if done {
                if let Some(error) = self.error.take() {
                    self.queue.clear();
                    downstream.on_error(error);
                    return true;
                }
            }
            if emitted == target {
                if done && self.queue.is_empty() {
                    downstream.on_complete();
                    return true;
                }
                break;
            }
            match self.queue.poll() {
                Some(value) => {
                    downstream.on_next(value);
                    emitted += 1;
                }
                None => {
                    if done {
                        downstream.on_complete();
                        return true;
                    }
                    break;
                }
            }
        }
        if emitted > 0 {
            demand::produced(&self.requested, emitted);
        }
        false
    }
}

impl<T: Element> Subscription for UnicastInner<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.error
                .try_set(FlowError::illegal_argument("request amount must be positive"));
            self.done.store(true, Ordering::Release);
            self.drain();
            return;
        }
        demand::add_cap(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if self.wip.enter() {
            self.queue.clear();
        }
    }
}

impl<T: Element> QueueSubscription<T> for UnicastInner<T> {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.wants_async() {
            self.async_fused.store(true, Ordering::Release);
            FusionMode::Async
        } else {
            FusionMode::None
        }
    }

    fn poll(&self) -> Result<Option<T>> {
        Ok(self.queue.poll())
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn clear(&self) {
        self.queue.clear();
    }
}
