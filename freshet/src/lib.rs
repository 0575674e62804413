// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Fluent facade over freshet reactive flows.
//!
//! [`Flow`] wraps a stage and chains operators:
//!
//! ```
//! use freshet_rx::Flow;
//!
//! let evens = Flow::range(0, 10)
//!     .filter(|n| Ok(n % 2 == 0))
//!     .map(|n| Ok(n * 10))
//!     .take(3);
//! ```
//!
//! Subscribing drives the chain: implement
//! [`Subscriber`](freshet_core::Subscriber) for full protocol control, or
//! use [`Flow::subscribe_fn`] for callback-style consumption with unbounded
//! demand.

#![allow(clippy::multiple_crate_versions)]

pub mod flow;
pub mod lambda_subscriber;

pub use flow::{Connectable, Flow};
pub use lambda_subscriber::LambdaSubscriber;

// Re-export the protocol surface alongside the facade
pub use freshet_core::{
    demand, hooks, Element, FlowError, FusionMode, FusionRequest, QueueSubscription, Result,
    Stage, Subscriber, Subscription, Upstream,
};
pub use freshet_exec::{Executor, Scheduler, Worker};
pub use freshet_operators::{PeekCallbacks, Unicast};
