// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Queue-fusion negotiation types.
//!
//! Adjacent stages may elide the per-element push path: the downstream asks
//! its [`crate::QueueSubscription`] for a fusion mode and, when granted,
//! pulls elements with `poll` from inside its own drain loop.
//!
//! - [`FusionMode::Sync`]: the source is fully materialized; `poll`
//!   returning `None` *is* the completion signal and no terminal push
//!   signals are sent.
//! - [`FusionMode::Async`]: the queue is filled concurrently; terminal
//!   signals still arrive on the push path and new elements are announced
//!   with [`crate::Subscriber::on_available`].
//! - [`FusionMode::None`]: no fusion, regular push delivery.

const SYNC_BIT: u8 = 1;
const ASYNC_BIT: u8 = 1 << 1;
const BARRIER_BIT: u8 = 1 << 2;

/// The fusion mode granted by an upstream, fixed for the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionMode {
    /// No fusion; elements travel on the push path.
    None,
    /// Pull-only: `poll() == None` means the source is complete.
    Sync,
    /// Pull with push wakeups; terminal signals stay on the push path.
    Async,
}

impl FusionMode {
    /// Whether any fusion was established.
    #[must_use]
    pub const fn is_fused(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Stable numeric form for storage in an atomic.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Sync => 1,
            Self::Async => 2,
        }
    }

    /// Inverse of [`FusionMode::as_u8`]; unknown values decode to `None`.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Sync,
            2 => Self::Async,
            _ => Self::None,
        }
    }
}

/// The modes a consumer is willing to accept, plus the thread-barrier bit.
///
/// The barrier bit marks a consumer that will poll from a different thread
/// than the producing one; stages that run user callbacks on the producing
/// side must refuse fusion when it is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionRequest(u8);

impl FusionRequest {
    /// Accept only synchronous fusion.
    pub const SYNC: Self = Self(SYNC_BIT);
    /// Accept only asynchronous fusion.
    pub const ASYNC: Self = Self(ASYNC_BIT);
    /// Accept either mode.
    pub const ANY: Self = Self(SYNC_BIT | ASYNC_BIT);

    /// Mark the request as crossing a thread boundary.
    #[must_use]
    pub const fn boundary(self) -> Self {
        Self(self.0 | BARRIER_BIT)
    }

    /// Whether the consumer accepts [`FusionMode::Sync`].
    #[must_use]
    pub const fn wants_sync(self) -> bool {
        self.0 & SYNC_BIT != 0
    }

    /// Whether the consumer accepts [`FusionMode::Async`].
    #[must_use]
    pub const fn wants_async(self) -> bool {
        self.0 & ASYNC_BIT != 0
    }

    /// Whether the thread-barrier bit is set.
    #[must_use]
    pub const fn has_barrier(self) -> bool {
        self.0 & BARRIER_BIT != 0
    }
}
