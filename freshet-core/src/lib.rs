// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Core traits and lock-free machinery for freshet flows.
//!
//! A flow is a push-based, backpressured pipeline: a [`Stage`] is an
//! immutable factory that, once subscribed, wires a chain of per-subscription
//! state machines between a producer and a [`Subscriber`]. Values, errors and
//! completion travel downstream; demand ([`Subscription::request`]) and
//! cancellation travel upstream.
//!
//! This crate holds only the protocol surface and the building blocks the
//! operator crate assembles:
//!
//! - the signal traits ([`Stage`], [`Subscriber`], [`Subscription`]) and the
//!   queue-fusion extension ([`QueueSubscription`], [`FusionMode`]);
//! - demand arithmetic saturating at the unbounded sentinel ([`demand`]);
//! - the work-in-progress serializer used by every multi-producer drain
//!   loop ([`Wip`]);
//! - the single-assignment upstream reference cell ([`UpstreamCell`]);
//! - lock-free queues and cells ([`queue`], [`Slot`], [`DrainCell`]);
//! - the process-wide dropped-signal sink ([`hooks`]).

#![allow(clippy::multiple_crate_versions)]

pub mod cell;
pub mod demand;
pub mod element;
pub mod error;
pub mod fusion;
pub mod hooks;
pub mod queue;
pub mod stage;
pub mod subscriber;
pub mod subscription;
pub mod upstream_cell;
pub mod wip;

// Re-export commonly used types
pub use cell::{DrainCell, Slot};
pub use element::Element;
pub use error::{FlowError, Result};
pub use fusion::{FusionMode, FusionRequest};
pub use stage::{ConnectableStage, Stage};
pub use subscriber::Subscriber;
pub use subscription::{EmptySubscription, QueueSubscription, Subscription, Upstream};
pub use upstream_cell::{DeferredUpstream, UpstreamCell};
pub use wip::Wip;
