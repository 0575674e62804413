// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Refcounted connection management for a connectable stage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;

use freshet_core::{
    ConnectableStage, Element, FlowError, Stage, Subscriber, Subscription, Upstream, UpstreamCell,
};

/// Connects a [`ConnectableStage`] while at least one subscriber is
/// attached.
///
/// The first subscriber triggers `connect`; when the last subscriber cancels
/// (or terminates) the shared connection is cancelled. A later subscriber
/// starts a fresh connection.
pub struct RefCount<T> {
    shared: Arc<RefCountShared<T>>,
}

struct RefCountShared<T> {
    connectable: Arc<dyn ConnectableStage<T>>,
    count: AtomicUsize,
    connection: ArcSwapOption<ConnectionHandle>,
}

struct ConnectionHandle(Arc<dyn Subscription>);

impl<T> RefCount<T> {
    #[must_use]
    pub fn new(connectable: Arc<dyn ConnectableStage<T>>) -> Self {
        Self {
            shared: Arc::new(RefCountShared {
                connectable,
                count: AtomicUsize::new(0),
                connection: ArcSwapOption::new(None),
            }),
        }
    }
}

impl<T> RefCountShared<T> {
    fn release(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(handle) = self.connection.swap(None) {
                handle.0.cancel();
            }
        }
    }
}

impl<T: Element> Stage<T> for RefCount<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let wrapped = Arc::new_cyclic(|me| RefCountSubscriber {
            me: me.clone(),
            shared: Arc::clone(&self.shared),
            downstream: subscriber,
            upstream: UpstreamCell::new(),
            released: AtomicBool::new(false),
        });
        self.shared.connectable.subscribe(wrapped);
        if self.shared.count.fetch_add(1, Ordering::AcqRel) == 0 {
            let handle = self.shared.connectable.connect();
            self.shared
                .connection
                .store(Some(Arc::new(ConnectionHandle(handle))));
        }
    }
}

struct RefCountSubscriber<T> {
    me: Weak<Self>,
    shared: Arc<RefCountShared<T>>,
    downstream: Arc<dyn Subscriber<T>>,
    upstream: UpstreamCell<T>,
    released: AtomicBool,
}

impl<T: Element> RefCountSubscriber<T> {
    fn release_once(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.shared.release();
        }
    }
}

impl<T: Element> Subscriber<T> for RefCountSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        self.downstream.on_subscribe(Upstream::Plain(me));
    }

    fn on_next(&self, value: T) {
        self.downstream.on_next(value);
    }

    fn try_on_next(&self, value: T) -> bool {
        self.downstream.try_on_next(value)
    }

    fn on_error(&self, error: FlowError) {
        self.downstream.on_error(error);
        self.release_once();
    }

    fn on_complete(&self) {
        self.downstream.on_complete();
        self.release_once();
    }
}

impl<T: Element> Subscription for RefCountSubscriber<T> {
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.terminate();
        self.release_once();
    }
}
