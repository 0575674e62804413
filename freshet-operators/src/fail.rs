// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Source that errors immediately.

use std::marker::PhantomData;
use std::sync::Arc;

use freshet_core::{Element, EmptySubscription, FlowError, Stage, Subscriber};

type ErrorFactory = dyn Fn() -> FlowError + Send + Sync;

/// Errors every subscriber without emitting anything.
///
/// Takes a factory rather than a value so each subscription receives its own
/// error instance.
pub struct Fail<T> {
    factory: Box<ErrorFactory>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Fail<T> {
    pub fn new(factory: impl Fn() -> FlowError + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> Stage<T> for Fail<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        EmptySubscription::error(&*subscriber, (self.factory)());
    }
}
