// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Single-assignment reference cell for "the upstream subscription".
//!
//! Every operator that holds its upstream does so through an
//! [`UpstreamCell`]: a lock-free cell with three states — empty, set,
//! cancelled — where cancelled is terminal and absorbing. The cell is what
//! makes cancellation idempotent and keeps a second `on_subscribe` from ever
//! reaching an operator's state machine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwapOption, Guard};

use crate::demand;
use crate::error::FlowError;
use crate::hooks;
use crate::subscription::Upstream;

enum CellState<T> {
    Cancelled,
    Active(Upstream<T>),
}

/// Lock-free upstream reference with empty / set / cancelled sentinels.
pub struct UpstreamCell<T> {
    state: ArcSwapOption<CellState<T>>,
}

fn same_target<T>(a: &Guard<Option<Arc<T>>>, b: &Guard<Option<Arc<T>>>) -> bool {
    match (a.as_ref(), b.as_ref()) {
        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
        (None, None) => true,
        _ => false,
    }
}

impl<T> UpstreamCell<T> {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwapOption::new(None),
        }
    }

    /// Install the upstream, once.
    ///
    /// Returns `true` on the first successful installation. If the cell was
    /// already cancelled the new upstream is cancelled and `false` is
    /// returned. A second installation attempt is a protocol violation: the
    /// new upstream is cancelled and the violation is reported to the
    /// dropped-signal sink once.
    pub fn set_once(&self, upstream: Upstream<T>) -> bool {
        loop {
            let current = self.state.load();
            match current.as_deref() {
                None => {
                    let next = Arc::new(CellState::Active(upstream.clone()));
                    let prev = self.state.compare_and_swap(&current, Some(next));
                    if same_target(&prev, &current) {
                        return true;
                    }
                }
                Some(CellState::Cancelled) => {
                    upstream.cancel();
                    return false;
                }
                Some(CellState::Active(_)) => {
                    upstream.cancel();
                    hooks::on_error_dropped(FlowError::illegal_argument(
                        "upstream subscription already set",
                    ));
                    return false;
                }
            }
        }
    }

    /// Swap in a new upstream, cancelling the previous one if any.
    ///
    /// Returns `false` (cancelling the new upstream) when the cell was
    /// already cancelled.
    pub fn replace(&self, upstream: Upstream<T>) -> bool {
        loop {
            let current = self.state.load();
            if matches!(current.as_deref(), Some(CellState::Cancelled)) {
                upstream.cancel();
                return false;
            }
            let next = Arc::new(CellState::Active(upstream.clone()));
            let prev = self.state.compare_and_swap(&current, Some(next));
            if same_target(&prev, &current) {
                if let Some(CellState::Active(old)) = current.as_deref() {
                    old.cancel();
                }
                return true;
            }
        }
    }

    /// Install the cancelled sentinel, cancelling any held upstream.
    ///
    /// Returns `true` the first time only; later calls are no-ops.
    pub fn terminate(&self) -> bool {
        let prev = self.state.swap(Some(Arc::new(CellState::Cancelled)));
        match prev.as_deref() {
            Some(CellState::Cancelled) => false,
            Some(CellState::Active(upstream)) => {
                upstream.cancel();
                true
            }
            None => true,
        }
    }

    /// Whether the cancelled sentinel is installed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state.load().as_deref(), Some(CellState::Cancelled))
    }

    /// Forward demand to the held upstream, if set and not cancelled.
    pub fn request(&self, n: u64) {
        if let Some(CellState::Active(upstream)) = self.state.load().as_deref() {
            upstream.request(n);
        }
    }

    /// Clone out the held upstream, if set and not cancelled.
    pub fn get(&self) -> Option<Upstream<T>> {
        match self.state.load().as_deref() {
            Some(CellState::Active(upstream)) => Some(upstream.clone()),
            _ => None,
        }
    }
}

impl<T> Default for UpstreamCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`UpstreamCell`] that additionally buffers demand issued before the
/// upstream arrives.
///
/// Operators whose upstream shows up asynchronously route `request` through
/// here: demand accumulates in a side counter and is drained to the upstream
/// the moment it is installed.
pub struct DeferredUpstream<T> {
    cell: UpstreamCell<T>,
    pending: AtomicU64,
}

impl<T> DeferredUpstream<T> {
    /// Create an empty cell with zero pending demand.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: UpstreamCell::new(),
            pending: AtomicU64::new(0),
        }
    }

    /// Install the upstream and flush accumulated demand to it.
    pub fn set_once(&self, upstream: Upstream<T>) -> bool {
        if self.cell.set_once(upstream) {
            let accumulated = self.pending.swap(0, Ordering::AcqRel);
            if accumulated != 0 {
                self.cell.request(accumulated);
            }
            true
        } else {
            false
        }
    }

    /// Request `n`, either directly or into the pending counter.
    pub fn request(&self, n: u64) {
        if let Some(upstream) = self.cell.get() {
            upstream.request(n);
            return;
        }
        demand::add_cap(&self.pending, n);
        // The upstream may have been installed while we were accumulating;
        // whoever sees both the demand and the upstream flushes.
        if self.cell.get().is_some() {
            let accumulated = self.pending.swap(0, Ordering::AcqRel);
            if accumulated != 0 {
                self.cell.request(accumulated);
            }
        }
    }

    /// See [`UpstreamCell::terminate`].
    pub fn terminate(&self) -> bool {
        self.cell.terminate()
    }

    /// See [`UpstreamCell::is_cancelled`].
    pub fn is_cancelled(&self) -> bool {
        self.cell.is_cancelled()
    }
}

impl<T> Default for DeferredUpstream<T> {
    fn default() -> Self {
        Self::new()
    }
}
