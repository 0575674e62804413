// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Zip operator pairing a flow with an in-memory iterable.

use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use freshet_core::{
    hooks, DrainCell, Element, EmptySubscription, FlowError, Result, Stage, Subscriber,
    Subscription, Upstream, UpstreamCell,
};

/// Fallible pairing function.
pub type Zipper<T, U, R> = dyn Fn(T, U) -> Result<R> + Send + Sync;

/// Pairs each upstream element with the next iterator element.
///
/// The iterator is probed before the source is subscribed: an empty iterable
/// completes immediately without touching the source. After the iterator's
/// last pairing the upstream is cancelled and the flow completes, so the
/// output length is the shorter of the two inputs. A zipper failure cancels
/// the upstream and becomes the downstream error.
pub struct ZipIterable<T, U, R, I> {
    source: Arc<dyn Stage<T>>,
    iterable: I,
    zipper: Arc<Zipper<T, U, R>>,
}

impl<T, U, R, I> ZipIterable<T, U, R, I> {
    pub fn new(
        source: Arc<dyn Stage<T>>,
        iterable: I,
        zipper: impl Fn(T, U) -> Result<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            iterable,
            zipper: Arc::new(zipper),
        }
    }
}

impl<T, U, R, I> Stage<R> for ZipIterable<T, U, R, I>
where
    T: Element,
    U: Send + 'static,
    R: Element,
    I: IntoIterator<Item = U> + Clone + Send + Sync + 'static,
    I::IntoIter: Send,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<R>>) {
        let mut iter = self.iterable.clone().into_iter().peekable();
        if iter.peek().is_none() {
            EmptySubscription::complete(&*subscriber);
            return;
        }
        let zip = Arc::new_cyclic(|me| ZipIterableSubscriber {
            me: me.clone(),
            downstream: subscriber,
            zipper: Arc::clone(&self.zipper),
            iter: DrainCell::new(iter),
            upstream: UpstreamCell::new(),
            done: AtomicBool::new(false),
        });
        self.source.subscribe(zip);
    }
}

struct ZipIterableSubscriber<T, U, R, It: Iterator<Item = U>> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<R>>,
    zipper: Arc<Zipper<T, U, R>>,
    iter: DrainCell<Peekable<It>>,
    upstream: UpstreamCell<T>,
    done: AtomicBool,
}

impl<T, U, R, It> ZipIterableSubscriber<T, U, R, It>
where
    T: Element,
    U: Send + 'static,
    R: Element,
    It: Iterator<Item = U> + Send,
{
    fn finish(&self, signal: impl FnOnce(&dyn Subscriber<R>)) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.upstream.terminate();
            signal(&*self.downstream);
        }
    }
}

impl<T, U, R, It> Subscriber<T> for ZipIterableSubscriber<T, U, R, It>
where
    T: Element,
    U: Send + 'static,
    R: Element,
    It: Iterator<Item = U> + Send + 'static,
{
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        self.downstream.on_subscribe(Upstream::Plain(me));
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return;
        }
        // Upstream signals are serialized; this path is the iterator's only
        // accessor.
        let Some(other) = (unsafe { self.iter.with_mut(Iterator::next) }) else {
            hooks::on_value_dropped(&value);
            return;
        };
        match (self.zipper)(value, other) {
            Ok(zipped) => {
                self.downstream.on_next(zipped);
                let exhausted = unsafe { self.iter.with_mut(|iter| iter.peek().is_none()) };
                if exhausted {
                    self.finish(|downstream| downstream.on_complete());
                }
            }
            Err(error) => self.finish(move |downstream| downstream.on_error(error)),
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.downstream.on_complete();
        }
    }
}

impl<T, U, R, It> Subscription for ZipIterableSubscriber<T, U, R, It>
where
    T: Element,
    U: Send + 'static,
    R: Element,
    It: Iterator<Item = U> + Send,
{
    fn request(&self, n: u64) {
        if n == 0 {
            self.finish(|downstream| {
                downstream
                    .on_error(FlowError::illegal_argument("request amount must be positive"));
            });
            return;
        }
        // one upstream element yields exactly one pairing
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.terminate();
    }
}
