// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Source emitting the elements of a shared vector.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, Element, EmptySubscription, FlowError, FusionMode, FusionRequest, QueueSubscription,
    Result, Stage, Subscriber, Subscription, Upstream,
};

/// Emits the elements of a vector in order, then completes.
///
/// The vector is shared across subscriptions; elements are cloned out per
/// subscriber. Like [`crate::Range`] this is a pure synchronous source: it
/// grants `Sync` fusion natively and runs the same fast/slow push paths.
pub struct FromVec<T> {
    values: Arc<Vec<T>>,
}

impl<T> FromVec<T> {
    /// Stage emitting `values` front to back.
    #[must_use]
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }
}

impl<T: Element + Clone + Sync> Stage<T> for FromVec<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        if self.values.is_empty() {
            EmptySubscription::complete(&*subscriber);
            return;
        }
        let subscription = Arc::new(VecSubscription {
            downstream: Arc::clone(&subscriber),
            values: Arc::clone(&self.values),
            index: CachePadded::new(AtomicUsize::new(0)),
            requested: CachePadded::new(AtomicU64::new(0)),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(Upstream::Fused(subscription));
    }
}

struct VecSubscription<T> {
    downstream: Arc<dyn Subscriber<T>>,
    values: Arc<Vec<T>>,
    index: CachePadded<AtomicUsize>,
    requested: CachePadded<AtomicU64>,
    cancelled: AtomicBool,
}

impl<T: Element + Clone + Sync> VecSubscription<T> {
    fn fail_invalid(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.downstream
                .on_error(FlowError::illegal_argument("request amount must be positive"));
        }
    }

    fn fast_path(&self) {
        for index in self.index.load(Ordering::Relaxed)..self.values.len() {
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            self.downstream.try_on_next(self.values[index].clone());
        }
        if !self.cancelled.load(Ordering::Acquire) {
            self.downstream.on_complete();
        }
    }

    fn slow_path(&self, mut target: u64) {
        let mut emitted: u64 = 0;
        let mut index = self.index.load(Ordering::Relaxed);
        loop {
            while emitted != target && index != self.values.len() {
                if self.cancelled.load(Ordering::Acquire) {
                    return;
                }
                if self.downstream.try_on_next(self.values[index].clone()) {
                    emitted += 1;
                }
                index += 1;
            }
            if index == self.values.len() {
                if !self.cancelled.load(Ordering::Acquire) {
                    self.downstream.on_complete();
                }
                return;
            }
            target = self.requested.load(Ordering::Acquire);
            if target == emitted {
                self.index.store(index, Ordering::Release);
                target = demand::produced(&self.requested, emitted);
                if target == 0 {
                    return;
                }
                emitted = 0;
            }
        }
    }
}

impl<T: Element + Clone + Sync> Subscription for VecSubscription<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            self.fail_invalid();
            return;
        }
        if demand::add_cap(&self.requested, n) == 0 {
            if n == demand::UNBOUNDED {
                self.fast_path();
            } else {
                self.slow_path(n);
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl<T: Element + Clone + Sync> QueueSubscription<T> for VecSubscription<T> {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.wants_sync() {
            FusionMode::Sync
        } else {
            FusionMode::None
        }
    }

    fn poll(&self) -> Result<Option<T>> {
        let index = self.index.load(Ordering::Relaxed);
        if index == self.values.len() {
            return Ok(None);
        }
        self.index.store(index + 1, Ordering::Release);
        Ok(Some(self.values[index].clone()))
    }

    fn is_empty(&self) -> bool {
        self.index.load(Ordering::Acquire) == self.values.len()
    }

    fn len(&self) -> usize {
        self.values.len() - self.index.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.index.store(self.values.len(), Ordering::Release);
    }
}
