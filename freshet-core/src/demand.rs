// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Saturating demand arithmetic.
//!
//! Demand is a per-subscription `u64` that accumulates `request(n)` calls and
//! is spent as elements are emitted. [`UNBOUNDED`] is the absorbing sentinel:
//! once a subscription is unbounded it never counts again.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::hooks;
use crate::FlowError;

/// Demand sentinel meaning "no backpressure".
pub const UNBOUNDED: u64 = u64::MAX;

/// Add `n` to `requested`, saturating at [`UNBOUNDED`].
///
/// Returns the value observed *before* the addition, so callers can detect
/// the 0 → n transition that hands them the emission loop.
pub fn add_cap(requested: &AtomicU64, n: u64) -> u64 {
    let mut current = requested.load(Ordering::Acquire);
    loop {
        if current == UNBOUNDED {
            return UNBOUNDED;
        }
        let next = current.saturating_add(n);
        match requested.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return current,
            Err(actual) => current = actual,
        }
    }
}

/// Subtract `n` produced elements from `requested`.
///
/// Returns the remaining demand. A no-op at the [`UNBOUNDED`] sentinel.
/// Producing more than was requested is a bug in the producing operator; the
/// excess is reported to the dropped-signal sink and demand clamps at zero.
pub fn produced(requested: &AtomicU64, n: u64) -> u64 {
    let mut current = requested.load(Ordering::Acquire);
    loop {
        if current == UNBOUNDED {
            return UNBOUNDED;
        }
        if n > current {
            hooks::on_error_dropped(FlowError::illegal_argument(format!(
                "produced {n} elements with only {current} requested"
            )));
        }
        let next = current.saturating_sub(n);
        match requested.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return next,
            Err(actual) => current = actual,
        }
    }
}
