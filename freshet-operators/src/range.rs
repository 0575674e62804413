// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Source emitting a run of consecutive integers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use freshet_core::{
    demand, EmptySubscription, FlowError, FusionMode, FusionRequest, QueueSubscription, Result,
    Stage, Subscriber, Subscription, Upstream,
};

/// Emits `count` integers starting at `start`, then completes.
///
/// The whole run must stay representable: `start + count` may not exceed
/// `i64::MAX`. An out-of-range pair surfaces as an `on_error` at subscribe
/// time rather than a panic at assembly time.
///
/// The subscription grants `Sync` fusion natively: a fused downstream pulls
/// the run with `poll` and treats exhaustion as completion. On the push path
/// demand drives two loops — a fast one once demand goes unbounded, and a
/// re-entrant slow one where `requested` doubles as the work-in-progress
/// counter.
#[derive(Debug, Clone)]
pub struct Range {
    start: i64,
    count: u64,
}

impl Range {
    /// Stage emitting `start, start + 1, …` for `count` elements.
    #[must_use]
    pub fn new(start: i64, count: u64) -> Self {
        Self { start, count }
    }
}

impl Stage<i64> for Range {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<i64>>) {
        if self.count == 0 {
            EmptySubscription::complete(&*subscriber);
            return;
        }
        if i128::from(self.start) + i128::from(self.count) > i128::from(i64::MAX) {
            EmptySubscription::error(
                &*subscriber,
                FlowError::illegal_argument(format!(
                    "range end overflows: start {} count {}",
                    self.start, self.count
                )),
            );
            return;
        }
        let subscription = Arc::new(RangeSubscription {
            downstream: Arc::clone(&subscriber),
            start: self.start,
            count: self.count,
            index: CachePadded::new(AtomicU64::new(0)),
            requested: CachePadded::new(AtomicU64::new(0)),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(Upstream::Fused(subscription));
    }
}

struct RangeSubscription {
    downstream: Arc<dyn Subscriber<i64>>,
    start: i64,
    count: u64,
    /// Offset of the next element, in `0..=count`.
    index: CachePadded<AtomicU64>,
    requested: CachePadded<AtomicU64>,
    cancelled: AtomicBool,
}

impl RangeSubscription {
    fn value_at(&self, offset: u64) -> i64 {
        // in range by the subscribe-time bound check
        (i128::from(self.start) + i128::from(offset)) as i64
    }

    fn fail_invalid(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.downstream
                .on_error(FlowError::illegal_argument("request amount must be positive"));
        }
    }

    fn fast_path(&self) {
        for offset in self.index.load(Ordering::Relaxed)..self.count {
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            self.downstream.try_on_next(self.value_at(offset));
        }
        if !self.cancelled.load(Ordering::Acquire) {
            self.downstream.on_complete();
        }
    }

    fn slow_path(&self, mut target: u64) {
        // `requested` doubles as the WIP counter: only the caller that saw
        // the 0 -> n transition runs this loop, and the counter going back
        // to zero at the bottom is what lets it exit.
        let mut emitted: u64 = 0;
        let mut offset = self.index.load(Ordering::Relaxed);
        loop {
            while emitted != target && offset != self.count {
                if self.cancelled.load(Ordering::Acquire) {
                    return;
                }
                if self.downstream.try_on_next(self.value_at(offset)) {
                    emitted += 1;
                }
                offset += 1;
            }
            if offset == self.count {
                if !self.cancelled.load(Ordering::Acquire) {
                    self.downstream.on_complete();
                }
                return;
            }
            target = self.requested.load(Ordering::Acquire);
            if target == emitted {
                self.index.store(offset, Ordering::Release);
                target = demand::produced(&self.requested, emitted);
                if target == 0 {
                    return;
                }
                emitted = 0;
            }
        }
    }
}

impl Subscription for RangeSubscription {
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

impl QueueSubscription<i64> for RangeSubscription {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.wants_sync() {
            FusionMode::Sync
        } else {
            FusionMode::None
        }
    }

    fn poll(&self) -> Result<Option<i64>> {
        let offset = self.index.load(Ordering::Relaxed);
        if offset == self.count {
            return Ok(None);
        }
        self.index.store(offset + 1, Ordering::Release);
        Ok(Some(self.value_at(offset)))
    }

    fn is_empty(&self) -> bool {
        self.index.load(Ordering::Acquire) == self.count
    }

    fn len(&self) -> usize {
        (self.count - self.index.load(Ordering::Acquire)) as usize
    }

    fn clear(&self) {
        self.index.store(self.count, Ordering::Release);
    }
}
