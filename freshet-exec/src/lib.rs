// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Scheduler worker for freshet flows.
//!
//! Operators never block and never spawn; anything that must run elsewhere
//! goes through a [`Worker`], which adapts an external [`Executor`] into a
//! cancellable, panic-isolated task scheduler. The worker's task registry is
//! the only lock in the whole library.

#![allow(clippy::multiple_crate_versions)]

pub mod worker;

pub use worker::{Executor, Job, Scheduler, TaskHandle, Worker};
