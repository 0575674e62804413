// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The downstream-facing half of the protocol.

use crate::error::FlowError;
use crate::subscription::Upstream;

/// Receiver of the downstream signal set.
///
/// # Ordering contract
///
/// For a given subscription:
///
/// - `on_subscribe` happens before every other signal and is delivered at
///   most once;
/// - at most one terminal signal (`on_error` or `on_complete`) is delivered,
///   and no `on_next` follows it;
/// - the count of `on_next` calls never exceeds the cumulative demand the
///   subscriber requested, unless it requested the unbounded sentinel;
/// - signals are serialized: implementations never observe two of these
///   methods executing concurrently for the same subscription, even when the
///   upstream has multiple producing threads.
///
/// Implementations use `&self` with interior mutability: signals may arrive
/// on any thread (one at a time).
pub trait Subscriber<T>: Send + Sync {
    /// Receive the upstream handle. Demand may be issued from inside this
    /// call or any time later.
    fn on_subscribe(&self, upstream: Upstream<T>);

    /// Receive one element. Only called while requested demand is
    /// outstanding.
    fn on_next(&self, value: T);

    /// Conditional delivery: like [`Subscriber::on_next`], but the return
    /// value reports whether the element counted against demand.
    ///
    /// Sources use this in their emission loops to let rejecting
    /// intermediaries (a fused filter) skip produced accounting without a
    /// round-trip through `request`. The default accepts every element.
    fn try_on_next(&self, value: T) -> bool {
        self.on_next(value);
        true
    }

    /// Wakeup from an `Async`-fused upstream: one or more elements became
    /// pollable. Only delivered after the subscriber negotiated async
    /// fusion; the default does nothing.
    fn on_available(&self) {}

    /// Terminal failure. The subscription is over; no signal follows.
    fn on_error(&self, error: FlowError);

    /// Terminal completion. The subscription is over; no signal follows.
    fn on_complete(&self);
}
