// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Lock-free queues backing operator buffers.
//!
//! Both queues rely on role discipline rather than internal locking: the
//! protocol guarantees a single producer per serialized upstream and a
//! single consumer (the WIP drain owner). See the per-type documentation for
//! the exact contract.

mod mpsc;
mod spsc;

pub use mpsc::MpscQueue;
pub use spsc::SpscRing;
