// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Process-wide sink for signals that had nowhere to go.
//!
//! The subscription protocol allows at most one terminal signal per
//! subscription and nothing after a cancellation. Signals that arrive late —
//! a value raced against `cancel`, an error raised after `on_complete`, a
//! panic inside a scheduler task — must still surface somewhere, so they are
//! routed here instead of being silently discarded.
//!
//! The hooks are global state with simple lifecycle rules: install them at
//! program start, [`reset`] on teardown. The default behaviour logs dropped
//! errors at `error` level and dropped values at `debug` level via `tracing`.
//! Test fixtures install capturing hooks and reset on drop.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::FlowError;

type ErrorHook = dyn Fn(&FlowError) + Send + Sync;
type ValueHook = dyn Fn(&dyn Debug) + Send + Sync;

#[derive(Default)]
struct Hooks {
    on_error: Option<Arc<ErrorHook>>,
    on_value: Option<Arc<ValueHook>>,
}

static HOOKS: RwLock<Hooks> = RwLock::new(Hooks {
    on_error: None,
    on_value: None,
});

/// Install the hook invoked with errors that could not be delivered.
pub fn set_dropped_error_hook(hook: impl Fn(&FlowError) + Send + Sync + 'static) {
    HOOKS.write().on_error = Some(Arc::new(hook));
}

/// Install the hook invoked with values dropped after terminal or cancel.
pub fn set_dropped_value_hook(hook: impl Fn(&dyn Debug) + Send + Sync + 'static) {
    HOOKS.write().on_value = Some(Arc::new(hook));
}

/// Restore the default log-and-drop behaviour for both hooks.
pub fn reset() {
    let mut hooks = HOOKS.write();
    hooks.on_error = None;
    hooks.on_value = None;
}

/// Route an error that had no subscriber left to receive it.
pub fn on_error_dropped(error: FlowError) {
    let hook = HOOKS.read().on_error.clone();
    match hook {
        Some(hook) => hook(&error),
        None => tracing::error!(%error, "error dropped after terminal signal"),
    }
}

/// Route a value that arrived after a terminal signal or cancellation.
pub fn on_value_dropped(value: &dyn Debug) {
    let hook = HOOKS.read().on_value.clone();
    match hook {
        Some(hook) => hook(value),
        None => tracing::debug!(?value, "value dropped after terminal signal"),
    }
}
