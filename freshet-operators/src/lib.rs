// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Operator state machines for freshet flows.
//!
//! Each module holds one stage: an immutable factory plus the
//! per-subscription state machine it instantiates. Sources (`range`,
//! `from_vec`, `just`, `unicast`) drive emission from demand; transforms
//! (`map`, `filter`, `take`, `peek`, `zip_iterable`) sit between an upstream
//! and a downstream; the backpressure policies (`latest`,
//! `drop_on_backpressure`) absorb an unbounded upstream; `publish` and
//! `ref_count` share one upstream subscription across subscribers; and
//! `combine_latest` coordinates several upstreams into one serialized
//! downstream.

#![allow(clippy::multiple_crate_versions)]

pub mod combine_latest;
pub mod drop_on_backpressure;
pub mod empty;
pub mod fail;
pub mod filter;
pub mod from_vec;
pub mod just;
pub mod latest;
pub mod map;
pub mod peek;
pub mod publish;
pub mod range;
pub mod ref_count;
pub mod take;
pub mod unicast;
pub mod zip_iterable;

// Re-export commonly used types
pub use combine_latest::CombineLatest;
pub use drop_on_backpressure::DropOnBackpressure;
pub use empty::Empty;
pub use fail::Fail;
pub use filter::Filter;
pub use from_vec::FromVec;
pub use just::Just;
pub use latest::Latest;
pub use map::Map;
pub use peek::{Peek, PeekCallbacks};
pub use publish::Publish;
pub use range::Range;
pub use ref_count::RefCount;
pub use take::Take;
pub use unicast::Unicast;
pub use zip_iterable::ZipIterable;
