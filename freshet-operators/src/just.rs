// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Single-value source.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use freshet_core::{
    Element, FlowError, FusionMode, FusionRequest, QueueSubscription, Result, Stage, Subscriber,
    Subscription, Upstream,
};

const IDLE: u8 = 0;
const CONSUMED: u8 = 1;
const CANCELLED: u8 = 2;

/// Emits one value, then completes.
pub struct Just<T> {
    value: T,
}

impl<T> Just<T> {
    /// Stage emitting `value` to every subscriber.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Element + Clone + Sync> Stage<T> for Just<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let subscription = Arc::new(ScalarSubscription {
            downstream: Arc::clone(&subscriber),
            value: self.value.clone(),
            state: AtomicU8::new(IDLE),
        });
        subscriber.on_subscribe(Upstream::Fused(subscription));
    }
}

/// Single-shot subscription: the first positive request emits and completes.
struct ScalarSubscription<T> {
    downstream: Arc<dyn Subscriber<T>>,
    value: T,
    state: AtomicU8,
}

impl<T: Element + Clone + Sync> Subscription for ScalarSubscription<T> {
    fn request(&self, n: u64) {
        if n == 0 {
            if self.state.swap(CANCELLED, Ordering::AcqRel) != CANCELLED {
                self.downstream
                    .on_error(FlowError::illegal_argument("request amount must be positive"));
            }
            return;
        }
        if self
            .state
            .compare_exchange(IDLE, CONSUMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.downstream.on_next(self.value.clone());
            if self.state.load(Ordering::Acquire) != CANCELLED {
                self.downstream.on_complete();
            }
        }
    }

    fn cancel(&self) {
        self.state.store(CANCELLED, Ordering::Release);
    }
}

impl<T: Element + Clone + Sync> QueueSubscription<T> for ScalarSubscription<T> {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.wants_sync() {
            FusionMode::Sync
        } else {
            FusionMode::None
        }
    }

    fn poll(&self) -> Result<Option<T>> {
        if self
            .state
            .compare_exchange(IDLE, CONSUMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(Some(self.value.clone()))
        } else {
            Ok(None)
        }
    }

    fn is_empty(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    fn len(&self) -> usize {
        usize::from(self.state.load(Ordering::Acquire) == IDLE)
    }

    fn clear(&self) {
        let _ = self
            .state
            .compare_exchange(IDLE, CONSUMED, Ordering::AcqRel, Ordering::Acquire);
    }
}
