// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Work-in-progress serializer.
//!
//! The lock-free "trylock with deferred re-entry" at the heart of every
//! serialized drain loop. Any number of producer threads may call
//! [`Wip::enter`]; exactly one of them wins the drain and the others leave a
//! bump behind that forces the winner to re-examine state before exiting:
//!
//! ```
//! use freshet_core::Wip;
//!
//! let wip = Wip::new();
//! if wip.enter() {
//!     let mut missed = 1;
//!     loop {
//!         // ... drain available work ...
//!         missed = wip.leave(missed);
//!         if missed == 0 {
//!             break;
//!         }
//!     }
//! }
//! ```
//!
//! The acquire/release pairing on the counter is the publication edge for
//! state written by a signalling thread and read by the drainer.

use std::sync::atomic::{AtomicU32, Ordering};

/// Work-in-progress counter guaranteeing a single active drainer.
#[derive(Debug, Default)]
pub struct Wip(AtomicU32);

impl Wip {
    /// Create an idle counter.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Announce work. Returns `true` if the caller acquired the drain;
    /// `false` means a concurrent drainer will pick the work up.
    pub fn enter(&self) -> bool {
        self.0.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Retire `missed` iterations. Returns the remaining count; non-zero
    /// means more work arrived while draining and the caller must iterate
    /// again with the returned value.
    pub fn leave(&self, missed: u32) -> u32 {
        self.0.fetch_sub(missed, Ordering::AcqRel) - missed
    }
}
