// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Error types for freshet flows.
//!
//! The protocol distinguishes three failure tiers:
//!
//! - **Protocol violations** (`request(0)`, a second upstream subscription,
//!   out-of-range operator arguments) surface as
//!   [`FlowError::IllegalArgument`] through the regular `on_error` channel.
//! - **User-code failures** (a mapper, zipper, predicate or lifecycle hook
//!   returning `Err`) are wrapped in [`FlowError::User`], cancel the upstream
//!   and terminate the subscription.
//! - **Dropped signals** — errors arriving after a terminal signal — never
//!   reach a subscriber; they are routed to the [`crate::hooks`] sink.
//!
//! Panics are deliberately not caught anywhere in the pipeline; they are the
//! fatal tier and unwind through operator frames untouched.

use std::sync::Arc;

/// Boxed error type accepted from user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Root error type for all flow signals.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A caller violated the subscription protocol or passed an out-of-range
    /// operator argument.
    #[error("Illegal argument: {context}")]
    IllegalArgument {
        /// Description of the violated rule
        context: String,
    },

    /// A user-provided callback failed.
    ///
    /// The failing subscription is cancelled upstream and this error is
    /// delivered downstream in lieu of completion.
    #[error("User callback failed: {0}")]
    User(#[source] BoxError),

    /// A terminal error with a second failure attached.
    ///
    /// Produced when an after-terminate hook fails while an error is already
    /// being delivered; the original error stays primary.
    #[error("{primary} (suppressed: {suppressed})")]
    Suppressed {
        /// The error being delivered when the second failure occurred
        primary: Box<FlowError>,
        /// The failure that could no longer be signalled on its own
        suppressed: Box<FlowError>,
    },

    /// One terminal error fanned out to the subscribers of a shared
    /// connection.
    #[error("{0}")]
    Shared(Arc<FlowError>),
}

impl FlowError {
    /// Create an illegal-argument error with the given context
    pub fn illegal_argument(context: impl Into<String>) -> Self {
        Self::IllegalArgument {
            context: context.into(),
        }
    }

    /// Wrap a user-callback error
    pub fn user(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::User(Box::new(error))
    }

    /// Create a user-callback error from a plain message
    pub fn user_msg(message: impl Into<String>) -> Self {
        Self::User(message.into().into())
    }

    /// Attach a suppressed failure to this error, keeping `self` primary
    #[must_use]
    pub fn with_suppressed(self, suppressed: FlowError) -> Self {
        Self::Suppressed {
            primary: Box::new(self),
            suppressed: Box::new(suppressed),
        }
    }

    /// Check whether this error is a protocol violation
    #[must_use]
    pub fn is_illegal_argument(&self) -> bool {
        matches!(self, Self::IllegalArgument { .. })
    }
}

/// Specialized Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
