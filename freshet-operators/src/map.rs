// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Map operator applying a fallible transform to each element.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use freshet_core::{
    hooks, Element, FlowError, FusionMode, FusionRequest, QueueSubscription, Result, Stage,
    Subscriber, Subscription, Upstream, UpstreamCell,
};

/// Fallible element transform.
pub type Mapper<T, R> = dyn Fn(T) -> Result<R> + Send + Sync;

/// Applies `mapper` to each element.
///
/// A mapper returning `Err` cancels the upstream and terminates the
/// subscription with that error. When the upstream offers a queue the
/// operator brokers fusion through itself, applying the transform inside
/// `poll`; fusion is refused across a thread barrier because the mapper must
/// run on the producing side.
pub struct Map<T, R> {
    source: Arc<dyn Stage<T>>,
    mapper: Arc<Mapper<T, R>>,
}

impl<T, R> Map<T, R> {
    pub fn new(source: Arc<dyn Stage<T>>, mapper: impl Fn(T) -> Result<R> + Send + Sync + 'static) -> Self {
        Self {
            source,
            mapper: Arc::new(mapper),
        }
    }
}

impl<T: Element, R: Element> Stage<R> for Map<T, R> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<R>>) {
        let map = Arc::new_cyclic(|me| MapSubscriber {
            me: me.clone(),
            downstream: subscriber,
            mapper: Arc::clone(&self.mapper),
            upstream: UpstreamCell::new(),
            queue: OnceLock::new(),
            done: AtomicBool::new(false),
        });
        self.source.subscribe(map);
    }
}

struct MapSubscriber<T, R> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<R>>,
    mapper: Arc<Mapper<T, R>>,
    upstream: UpstreamCell<T>,
    queue: OnceLock<Arc<dyn QueueSubscription<T>>>,
    done: AtomicBool,
}

impl<T: Element, R: Element> MapSubscriber<T, R> {
    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.upstream.terminate();
        self.downstream.on_error(error);
    }
}

impl<T: Element, R: Element> Subscriber<T> for MapSubscriber<T, R> {
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
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return;
        }
        match (self.mapper)(value) {
            Ok(mapped) => self.downstream.on_next(mapped),
            Err(error) => self.fail(error),
        }
    }

    fn try_on_next(&self, value: T) -> bool {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return true;
        }
        match (self.mapper)(value) {
            Ok(mapped) => self.downstream.try_on_next(mapped),
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

impl<T: Element, R: Element> Subscription for MapSubscriber<T, R> {
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.terminate();
    }
}

impl<T: Element, R: Element> QueueSubscription<R> for MapSubscriber<T, R> {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.has_barrier() {
            return FusionMode::None;
        }
        match self.queue.get() {
            Some(queue) => queue.request_fusion(request),
            None => FusionMode::None,
        }
    }

    fn poll(&self) -> Result<Option<R>> {
        let Some(queue) = self.queue.get() else {
            return Ok(None);
        };
        match queue.poll()? {
            Some(value) => match (self.mapper)(value) {
                Ok(mapped) => Ok(Some(mapped)),
                Err(error) => {
                    self.upstream.terminate();
                    Err(error)
                }
            },
            None => Ok(None),
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
