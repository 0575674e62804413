// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Filter operator keeping elements that satisfy a fallible predicate.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use freshet_core::{
    hooks, Element, FlowError, FusionMode, FusionRequest, QueueSubscription, Result, Stage,
    Subscriber, Subscription, Upstream, UpstreamCell,
};

/// Fallible element predicate.
pub type Predicate<T> = dyn Fn(&T) -> Result<bool> + Send + Sync;

/// Keeps elements for which `predicate` returns `Ok(true)`.
///
/// This is the canonical conditional subscriber: on the push path a rejected
/// element is replenished with `request(1)`, while a source driving
/// `try_on_next` gets `false` back and skips the produced accounting
/// entirely. Under fusion the predicate runs inside `poll`, skipping
/// rejected elements in place.
pub struct Filter<T> {
    source: Arc<dyn Stage<T>>,
    predicate: Arc<Predicate<T>>,
}

impl<T> Filter<T> {
    pub fn new(
        source: Arc<dyn Stage<T>>,
        predicate: impl Fn(&T) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            predicate: Arc::new(predicate),
        }
    }
}

impl<T: Element> Stage<T> for Filter<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let filter = Arc::new_cyclic(|me| FilterSubscriber {
            me: me.clone(),
            downstream: subscriber,
            predicate: Arc::clone(&self.predicate),
            upstream: UpstreamCell::new(),
            queue: OnceLock::new(),
            mode: AtomicU8::new(FusionMode::None.as_u8()),
            done: AtomicBool::new(false),
        });
        self.source.subscribe(filter);
    }
}

struct FilterSubscriber<T> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<T>>,
    predicate: Arc<Predicate<T>>,
    upstream: UpstreamCell<T>,
    queue: OnceLock<Arc<dyn QueueSubscription<T>>>,
    mode: AtomicU8,
    done: AtomicBool,
}

impl<T: Element> FilterSubscriber<T> {
    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.upstream.terminate();
        self.downstream.on_error(error);
    }
}

impl<T: Element> Subscriber<T> for FilterSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if let Some(queue) = upstream.fused() {
            let _ = self.queue.set(Arc::clone(queue));
        }
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        if self.queue.get().is_some() {
            self.downstream.on_subscribe(Upstream::Fused(me));
        } else {
            self.downstream.on_subscribe(Upstream::Plain(me));
        }
    }

    fn on_next(&self, value: T) {
        if !self.try_on_next(value) {
            // rejected without counting; keep the upstream window open
            self.upstream.request(1);
        }
    }

    fn try_on_next(&self, value: T) -> bool {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return true;
        }
        match (self.predicate)(&value) {
            Ok(true) => self.downstream.try_on_next(value),
            Ok(false) => false,
            Err(error) => {
                self.fail(error);
                true
            }
        }
    }

    fn on_available(&self) {
        self.downstream.on_available();
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

impl<T: Element> Subscription for FilterSubscriber<T> {
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.terminate();
    }
}

impl<T: Element> QueueSubscription<T> for FilterSubscriber<T> {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.has_barrier() {
            return FusionMode::None;
        }
        let Some(queue) = self.queue.get() else {
            return FusionMode::None;
        };
        let granted = queue.request_fusion(request);
        self.mode.store(granted.as_u8(), Ordering::Release);
        granted
    }

    fn poll(&self) -> Result<Option<T>> {
        let Some(queue) = self.queue.get() else {
            return Ok(None);
        };
        loop {
            match queue.poll()? {
                Some(value) => match (self.predicate)(&value) {
                    Ok(true) => return Ok(Some(value)),
                    Ok(false) => {
                        // consumed from an async queue without being emitted
                        if FusionMode::from_u8(self.mode.load(Ordering::Acquire))
                            == FusionMode::Async
                        {
                            queue.request(1);
                        }
                    }
                    Err(error) => {
                        self.upstream.terminate();
                        return Err(error);
                    }
                },
                None => return Ok(None),
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.get().map_or(true, |queue| queue.is_empty())
    }

    fn len(&self) -> usize {
        self.queue.get().map_or(0, |queue| queue.len())
    }

    fn clear(&self) {
        if let Some(queue) = self.queue.get() {
            queue.clear();
        }
    }
}
