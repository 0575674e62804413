// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Combine-latest coordination across several sources.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, queue::MpscQueue, DrainCell, Element, EmptySubscription, FlowError, Result, Slot,
    Stage, Subscriber, Subscription, Upstream, UpstreamCell, Wip,
};

/// Fallible row combiner over the latest value of every source.
pub type Combiner<T, R> = dyn Fn(&[T]) -> Result<R> + Send + Sync;

/// Emits a combined row whenever any source emits, once every source has
/// emitted at least once.
///
/// Inner subscriptions are unbounded; their events funnel through one MPSC
/// queue into a serialized drain that owns the latest-value array, so rows
/// reflect event arrival order. A source completing without ever emitting
/// completes the whole flow; the first inner error wins and cancels the
/// rest. Downstream demand gates row emission only.
pub struct CombineLatest<T, R> {
    sources: Vec<Arc<dyn Stage<T>>>,
    combiner: Arc<Combiner<T, R>>,
}

impl<T, R> CombineLatest<T, R> {
    pub fn new(
        sources: Vec<Arc<dyn Stage<T>>>,
        combiner: impl Fn(&[T]) -> Result<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sources,
            combiner: Arc::new(combiner),
        }
    }
}

impl<T: Element + Clone, R: Element> Stage<R> for CombineLatest<T, R> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<R>>) {
        if self.sources.is_empty() {
            EmptySubscription::complete(&*subscriber);
            return;
        }
        let width = self.sources.len();
        let coordinator = Arc::new(Coordinator {
            downstream: Arc::clone(&subscriber),
            combiner: Arc::clone(&self.combiner),
            queue: MpscQueue::new(),
            state: DrainCell::new(CombineState {
                values: vec![None; width],
                filled: 0,
                completions: 0,
                pending: None,
            }),
            requested: CachePadded::new(AtomicU64::new(0)),
            wip: Wip::new(),
            cancelled: AtomicBool::new(false),
            error: Slot::new(),
            inners: OnceLock::new(),
        });
        let inners: Vec<_> = (0..width)
            .map(|index| {
                Arc::new(CombineInner {
                    index,
                    parent: Arc::downgrade(&coordinator),
                    upstream: UpstreamCell::new(),
                })
            })
            .collect();
        let _ = coordinator.inners.set(inners.clone());
        subscriber.on_subscribe(Upstream::Plain(Arc::clone(&coordinator) as Arc<dyn Subscription>));
        for (inner, source) in inners.into_iter().zip(&self.sources) {
            if coordinator.cancelled.load(Ordering::Acquire) {
                return;
            }
            source.subscribe(inner);
        }
    }
}

enum InnerEvent<T> {
    Value(usize, T),
    Complete(usize),
}

struct CombineState<T, R> {
    values: Vec<Option<T>>,
    filled: usize,
    completions: usize,
    /// A combined row awaiting downstream demand.
    pending: Option<R>,
}

struct Coordinator<T, R> {
    downstream: Arc<dyn Subscriber<R>>,
    combiner: Arc<Combiner<T, R>>,
    queue: MpscQueue<InnerEvent<T>>,
    state: DrainCell<CombineState<T, R>>,
    requested: CachePadded<AtomicU64>,
    wip: Wip,
    cancelled: AtomicBool,
    error: Slot<FlowError>,
    inners: OnceLock<Vec<Arc<CombineInner<T, R>>>>,
}

impl<T: Element + Clone, R: Element> Coordinator<T, R> {
    fn cancel_all(&self) {
        if let Some(inners) = self.inners.get() {
            for inner in inners {
                inner.upstream.terminate();
            }
        }
    }

    fn discard(&self, state: &mut CombineState<T, R>) {
        state.pending = None;
        for value in &mut state.values {
            *value = None;
        }
        while self.queue.pop().is_some() {}
    }

    fn drain(&self) {
        if !self.wip.enter() {
            return;
        }
        // WIP ownership makes this drain the sole accessor of the combine
        // state and the queue's consumer side.
        unsafe {
            self.state.with_mut(|state| self.drain_loop(state));
        }
    }

    fn drain_loop(&self, state: &mut CombineState<T, R>) {
        let mut missed = 1;
        loop {
            loop {
                if self.cancelled.load(Ordering::Acquire) {
                    self.discard(state);
                    return;
                }
                if let Some(error) = self.error.take() {
                    self.cancel_all();
                    self.discard(state);
                    self.downstream.on_error(error);
                    return;
                }
                if let Some(row) = state.pending.take() {
                    if self.requested.load(Ordering::Acquire) > 0 {
                        self.downstream.on_next(row);
                        demand::produced(&self.requested, 1);
                    } else {
                        state.pending = Some(row);
                        break;
                    }
                }
                if state.completions == state.values.len() && self.queue.is_empty() {
                    self.cancel_all();
                    self.downstream.on_complete();
                    return;
                }
                match self.queue.pop() {
                    Some(InnerEvent::Value(index, value)) => {
                        if state.values[index].is_none() {
                            state.filled += 1;
                        }
                        state.values[index] = Some(value);
                        if state.filled == state.values.len() {
                            let row: Vec<T> =
                                state.values.iter().filter_map(Clone::clone).collect();
                            match (self.combiner)(&row) {
                                Ok(combined) => state.pending = Some(combined),
                                Err(error) => {
                                    self.cancel_all();
                                    self.discard(state);
                                    self.downstream.on_error(error);
                                    return;
                                }
                            }
                        }
                    }
                    Some(InnerEvent::Complete(index)) => {
                        if state.values[index].is_none() {
                            // never emitted: no row can ever complete again
                            self.cancel_all();
                            self.discard(state);
                            self.downstream.on_complete();
                            return;
                        }
                        state.completions += 1;
                    }
                    None => break,
                }
            }
            missed = self.wip.leave(missed);
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: Element + Clone, R: Element> Subscription for Coordinator<T, R> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.error
                .try_set(FlowError::illegal_argument("request amount must be positive"));
            self.drain();
            return;
        }
        demand::add_cap(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancel_all();
        if self.wip.enter() {
            // we own the drain now; release whatever is staged
            unsafe {
                self.state.with_mut(|state| self.discard(state));
            }
        }
    }
}

struct CombineInner<T, R> {
    index: usize,
    parent: Weak<Coordinator<T, R>>,
    upstream: UpstreamCell<T>,
}

impl<T: Element + Clone, R: Element> Subscriber<T> for CombineInner<T, R> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        self.upstream.request(demand::UNBOUNDED);
    }

    fn on_next(&self, value: T) {
        let Some(parent) = self.parent.upgrade() else { return };
        parent.queue.push(InnerEvent::Value(self.index, value));
        parent.drain();
    }

    fn on_error(&self, error: FlowError) {
        let Some(parent) = self.parent.upgrade() else {
            freshet_core::hooks::on_error_dropped(error);
            return;
        };
        parent.error.try_set(error);
        parent.drain();
    }

    fn on_complete(&self) {
        let Some(parent) = self.parent.upgrade() else { return };
        parent.queue.push(InnerEvent::Complete(self.index));
        parent.drain();
    }
}
