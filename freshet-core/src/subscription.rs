// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The upstream-facing half of the protocol: demand and cancellation, plus
//! the queue-fusion extension.

use std::sync::Arc;

use crate::error::{FlowError, Result};
use crate::fusion::{FusionMode, FusionRequest};
use crate::hooks;
use crate::subscriber::Subscriber;

/// Demand and teardown channel from a subscriber to its upstream.
///
/// # Protocol
///
/// - `request(n)` with `n == 0` is a protocol violation; the upstream
///   surfaces it as an `on_error` with [`FlowError::IllegalArgument`].
/// - Demand accumulates with saturating addition; [`crate::demand::UNBOUNDED`]
///   is absorbing.
/// - `cancel` is idempotent, never blocks and never signals downstream. An
///   in-flight value racing the cancellation may still arrive once; the
///   receiving operator routes it to the dropped-signal sink.
pub trait Subscription: Send + Sync {
    /// Ask the upstream for `n` more elements.
    fn request(&self, n: u64);

    /// Stop the upstream. No downstream signal follows from this call.
    fn cancel(&self);
}

/// A subscription that additionally exposes its buffer for queue fusion.
///
/// Once [`QueueSubscription::request_fusion`] grants a non-`None` mode the
/// push path changes shape: in `Sync` mode it is not used at all and `poll`
/// returning `Ok(None)` is the completion signal; in `Async` mode elements
/// are announced with [`Subscriber::on_available`] and pulled here, while
/// terminal signals still arrive on the push path.
pub trait QueueSubscription<T>: Subscription {
    /// Negotiate a fusion mode; called at most once, before any demand.
    fn request_fusion(&self, request: FusionRequest) -> FusionMode;

    /// Pull the next element.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the source failed; the caller treats it exactly as
    /// an `on_error` arriving on the push path.
    fn poll(&self) -> Result<Option<T>>;

    /// Whether a `poll` would currently return `Ok(None)`.
    fn is_empty(&self) -> bool;

    /// Number of immediately pollable elements.
    fn len(&self) -> usize;

    /// Drop all buffered elements.
    fn clear(&self);

    /// Poll one element and discard it.
    fn discard(&self) {
        match self.poll() {
            Ok(_) => {}
            Err(error) => hooks::on_error_dropped(error),
        }
    }
}

/// The capability handle a subscriber receives in `on_subscribe`.
///
/// Fusion capability travels as a typed variant: a downstream that wants the
/// pull path matches on `Fused` instead of downcasting.
pub enum Upstream<T> {
    /// Push-only upstream.
    Plain(Arc<dyn Subscription>),
    /// Upstream offering the queue interface.
    Fused(Arc<dyn QueueSubscription<T>>),
}

impl<T> Upstream<T> {
    /// Forward demand to the upstream.
    pub fn request(&self, n: u64) {
        match self {
            Self::Plain(subscription) => subscription.request(n),
            Self::Fused(subscription) => subscription.request(n),
        }
    }

    /// Cancel the upstream.
    pub fn cancel(&self) {
        match self {
            Self::Plain(subscription) => subscription.cancel(),
            Self::Fused(subscription) => subscription.cancel(),
        }
    }

    /// The queue interface, when the upstream offers one.
    pub fn fused(&self) -> Option<&Arc<dyn QueueSubscription<T>>> {
        match self {
            Self::Plain(_) => None,
            Self::Fused(subscription) => Some(subscription),
        }
    }
}

impl<T> Clone for Upstream<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(subscription) => Self::Plain(Arc::clone(subscription)),
            Self::Fused(subscription) => Self::Fused(Arc::clone(subscription)),
        }
    }
}

impl<T> std::fmt::Debug for Upstream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Upstream::Plain"),
            Self::Fused(_) => f.write_str("Upstream::Fused"),
        }
    }
}

/// Subscription for stages that terminate before producing anything.
///
/// It validates demand and ignores everything else; stages hand it out right
/// before an immediate `on_complete` or `on_error`.
#[derive(Debug, Default)]
pub struct EmptySubscription;

impl EmptySubscription {
    /// Deliver `on_subscribe` followed by `on_complete`.
    pub fn complete<T>(subscriber: &dyn Subscriber<T>) {
        subscriber.on_subscribe(Upstream::Plain(Arc::new(Self)));
        subscriber.on_complete();
    }

    /// Deliver `on_subscribe` followed by `on_error(error)`.
    pub fn error<T>(subscriber: &dyn Subscriber<T>, error: FlowError) {
        subscriber.on_subscribe(Upstream::Plain(Arc::new(Self)));
        subscriber.on_error(error);
    }
}

impl Subscription for EmptySubscription {
    fn request(&self, n: u64) {
        if n == 0 {
            hooks::on_error_dropped(FlowError::illegal_argument(
                "request amount must be positive",
            ));
        }
    }

    fn cancel(&self) {}
}
