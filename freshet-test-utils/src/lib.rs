// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Test fixtures for freshet flows.
//!
//! - [`TestSubscriber`]: records every signal, with scripted initial demand,
//!   optional conditional rejection, and optional fusion negotiation;
//! - [`TestSource`]: a manual stage that records requested demand and
//!   cancellation while the test drives emission by hand;
//! - [`DroppedSignals`]: RAII capture of the process-wide dropped-signal
//!   sink;
//! - [`collect_values`]: blocking collector for round-trip assertions.

#![allow(clippy::multiple_crate_versions)]

pub mod dropped;
pub mod helpers;
pub mod test_source;
pub mod test_subscriber;

pub use dropped::DroppedSignals;
pub use helpers::collect_values;
pub use test_source::TestSource;
pub use test_subscriber::TestSubscriber;
