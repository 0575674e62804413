// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use freshet_core::hooks;

// One fixture at a time: the hooks are process-wide.
static FIXTURE_LOCK: Mutex<()> = Mutex::new(());

/// RAII capture of the process-wide dropped-signal sink.
///
/// Installing the fixture serializes against other fixtures in the same
/// process; dropping it resets the hooks to their defaults.
pub struct DroppedSignals {
    _guard: MutexGuard<'static, ()>,
    errors: Arc<Mutex<Vec<String>>>,
    values: Arc<Mutex<Vec<String>>>,
}

impl DroppedSignals {
    /// Install capturing hooks for both dropped errors and dropped values.
    #[must_use]
    pub fn install() -> Self {
        let guard = FIXTURE_LOCK.lock();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let values = Arc::new(Mutex::new(Vec::new()));
        let error_sink = Arc::clone(&errors);
        hooks::set_dropped_error_hook(move |error| {
            error_sink.lock().push(error.to_string());
        });
        let value_sink = Arc::clone(&values);
        hooks::set_dropped_value_hook(move |value| {
            value_sink.lock().push(format!("{value:?}"));
        });
        Self {
            _guard: guard,
            errors,
            values,
        }
    }

    /// Messages of the errors dropped so far.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Debug renderings of the values dropped so far.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.values.lock().clone()
    }
}

impl Drop for DroppedSignals {
    fn drop(&mut self) {
        hooks::reset();
    }
}
