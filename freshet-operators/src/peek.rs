// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Peek operator invoking lifecycle callbacks without modifying the flow.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use freshet_core::{
    hooks, Element, EmptySubscription, FlowError, FusionMode, FusionRequest, QueueSubscription,
    Result, Stage, Subscriber, Subscription, Upstream, UpstreamCell,
};

type SignalHook = dyn Fn() -> Result<()> + Send + Sync;
type ValueHook<T> = dyn Fn(&T) -> Result<()> + Send + Sync;
type ErrorHook = dyn Fn(&FlowError) -> Result<()> + Send + Sync;
type RequestHook = dyn Fn(u64) -> Result<()> + Send + Sync;

/// The lifecycle callbacks a [`Peek`] stage can tap.
///
/// All hooks are optional and fallible. A failing non-terminal hook cancels
/// the upstream and becomes the downstream error; a failing `on_error` hook
/// is attached to the error being delivered as a suppressed cause; a failing
/// `after_terminate` or `on_cancel` hook can only go to the dropped-signal
/// sink.
pub struct PeekCallbacks<T> {
    subscribe_hook: Option<Box<SignalHook>>,
    next_hook: Option<Box<ValueHook<T>>>,
    error_hook: Option<Box<ErrorHook>>,
    complete_hook: Option<Box<SignalHook>>,
    after_terminate_hook: Option<Box<SignalHook>>,
    request_hook: Option<Box<RequestHook>>,
    cancel_hook: Option<Box<SignalHook>>,
}

impl<T> PeekCallbacks<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribe_hook: None,
            next_hook: None,
            error_hook: None,
            complete_hook: None,
            after_terminate_hook: None,
            request_hook: None,
            cancel_hook: None,
        }
    }

    /// Run before the downstream receives `on_subscribe`.
    #[must_use]
    pub fn on_subscribe(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.subscribe_hook = Some(Box::new(hook));
        self
    }

    /// Run for each element, before the downstream sees it.
    #[must_use]
    pub fn on_next(mut self, hook: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
        self.next_hook = Some(Box::new(hook));
        self
    }

    /// Run before an error is delivered downstream.
    #[must_use]
    pub fn on_error(
        mut self,
        hook: impl Fn(&FlowError) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.error_hook = Some(Box::new(hook));
        self
    }

    /// Run before completion is delivered downstream.
    #[must_use]
    pub fn on_complete(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.complete_hook = Some(Box::new(hook));
        self
    }

    /// Run after either terminal signal has been delivered.
    #[must_use]
    pub fn after_terminate(
        mut self,
        hook: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_terminate_hook = Some(Box::new(hook));
        self
    }

    /// Observe demand flowing upstream.
    #[must_use]
    pub fn on_request(mut self, hook: impl Fn(u64) -> Result<()> + Send + Sync + 'static) -> Self {
        self.request_hook = Some(Box::new(hook));
        self
    }

    /// Observe cancellation flowing upstream.
    #[must_use]
    pub fn on_cancel(mut self, hook: impl Fn() -> Result<()> + Send + Sync + 'static) -> Self {
        self.cancel_hook = Some(Box::new(hook));
        self
    }
}

impl<T> Default for PeekCallbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pass-through stage invoking [`PeekCallbacks`] at each lifecycle point.
///
/// When the upstream offers a queue the operator brokers fusion and fires
/// the `on_next` hook from inside `poll`. Because hooks run on the producing
/// side, fusion is refused when the consumer flags a thread barrier. A
/// `Sync`-fused downstream observing exhaustion triggers the completion
/// hooks exactly once.
pub struct Peek<T> {
    source: Arc<dyn Stage<T>>,
    callbacks: Arc<PeekCallbacks<T>>,
}

impl<T> Peek<T> {
    #[must_use]
    pub fn new(source: Arc<dyn Stage<T>>, callbacks: PeekCallbacks<T>) -> Self {
        Self {
            source,
            callbacks: Arc::new(callbacks),
        }
    }
}

impl<T: Element> Stage<T> for Peek<T> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let peek = Arc::new_cyclic(|me| PeekSubscriber {
            me: me.clone(),
            downstream: subscriber,
            callbacks: Arc::clone(&self.callbacks),
            upstream: UpstreamCell::new(),
            queue: OnceLock::new(),
            mode: AtomicU8::new(FusionMode::None.as_u8()),
            done: AtomicBool::new(false),
            sync_terminated: AtomicBool::new(false),
        });
        self.source.subscribe(peek);
    }
}

struct PeekSubscriber<T> {
    me: Weak<Self>,
    downstream: Arc<dyn Subscriber<T>>,
    callbacks: Arc<PeekCallbacks<T>>,
    upstream: UpstreamCell<T>,
    queue: OnceLock<Arc<dyn QueueSubscription<T>>>,
    mode: AtomicU8,
    done: AtomicBool,
    sync_terminated: AtomicBool,
}

impl<T: Element> PeekSubscriber<T> {
    /// Run the error hook over `error`, folding a hook failure in as a
    /// suppressed cause.
    fn through_error_hook(&self, error: FlowError) -> FlowError {
        match &self.callbacks.error_hook {
            Some(hook) => match hook(&error) {
                Ok(()) => error,
                Err(secondary) => error.with_suppressed(secondary),
            },
            None => error,
        }
    }

    fn run_after_terminate(&self) {
        if let Some(hook) = &self.callbacks.after_terminate_hook {
            if let Err(error) = hook() {
                hooks::on_error_dropped(error);
            }
        }
    }

    fn deliver_error(&self, error: FlowError) {
        let error = self.through_error_hook(error);
        self.downstream.on_error(error);
        self.run_after_terminate();
    }

    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.upstream.terminate();
        self.deliver_error(error);
    }
}

impl<T: Element> Subscriber<T> for PeekSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        if let Some(hook) = &self.callbacks.subscribe_hook {
            if let Err(error) = hook() {
                upstream.cancel();
                self.done.store(true, Ordering::Release);
                EmptySubscription::error(&*self.downstream, self.through_error_hook(error));
                self.run_after_terminate();
                return;
            }
        }
        if let Some(queue) = upstream.fused() {
            let _ = self.queue.set(Arc::clone(queue));
        }
        if !self.upstream.set_once(upstream) {
            return;
        }
        let Some(me) = self.me.upgrade() else { return };
        if self.queue.get().is_some() {
            self.downstream.on_subscribe(Upstream::Fused(me));
        } else {
            self.downstream.on_subscribe(Upstream::Plain(me));
        }
    }

    fn on_next(&self, value: T) {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return;
        }
        if let Some(hook) = &self.callbacks.next_hook {
            if let Err(error) = hook(&value) {
                self.fail(error);
                return;
            }
        }
        self.downstream.on_next(value);
    }

    fn try_on_next(&self, value: T) -> bool {
        if self.done.load(Ordering::Acquire) || self.upstream.is_cancelled() {
            hooks::on_value_dropped(&value);
            return true;
        }
        if let Some(hook) = &self.callbacks.next_hook {
            if let Err(error) = hook(&value) {
                self.fail(error);
                // the element was taken and the subscription terminated;
                // counting it keeps the source's accounting consistent
                return true;
            }
        }
        self.downstream.try_on_next(value)
    }

    fn on_available(&self) {
        self.downstream.on_available();
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error_dropped(error);
            return;
        }
        self.deliver_error(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(hook) = &self.callbacks.complete_hook {
            if let Err(error) = hook() {
                self.upstream.terminate();
                self.deliver_error(error);
                return;
            }
        }
        self.downstream.on_complete();
        self.run_after_terminate();
    }
}

impl<T: Element> Subscription for PeekSubscriber<T> {
    fn request(&self, n: u64) {
        if let Some(hook) = &self.callbacks.request_hook {
            if let Err(error) = hook(n) {
                self.fail(error);
                return;
            }
        }
        self.upstream.request(n);
    }

    fn cancel(&self) {
        if let Some(hook) = &self.callbacks.cancel_hook {
            if let Err(error) = hook() {
                // cancellation has no downstream channel left
                hooks::on_error_dropped(error);
            }
        }
        self.upstream.terminate();
    }
}

impl<T: Element> QueueSubscription<T> for PeekSubscriber<T> {
    fn request_fusion(&self, request: FusionRequest) -> FusionMode {
        if request.has_barrier() {
            return FusionMode::None;
        }
        let Some(queue) = self.queue.get() else {
            return FusionMode::None;
        };
        let granted = queue.request_fusion(request);
        self.mode.store(granted.as_u8(), Ordering::Release);
        granted
    }

    fn poll(&self) -> Result<Option<T>> {
        let Some(queue) = self.queue.get() else {
            return Ok(None);
        };
        match queue.poll() {
            Ok(Some(value)) => {
                if let Some(hook) = &self.callbacks.next_hook {
                    if let Err(error) = hook(&value) {
                        self.upstream.terminate();
                        return Err(self.through_error_hook(error));
                    }
                }
                Ok(Some(value))
            }
            Ok(None) => {
                if FusionMode::from_u8(self.mode.load(Ordering::Acquire)) == FusionMode::Sync
                    && !self.sync_terminated.swap(true, Ordering::AcqRel)
                {
                    // exhaustion is the terminal signal in sync mode
                    if let Some(hook) = &self.callbacks.complete_hook {
                        if let Err(error) = hook() {
                            self.run_after_terminate();
                            return Err(self.through_error_hook(error));
                        }
                    }
                    self.run_after_terminate();
                }
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.get().map_or(true, |queue| queue.is_empty())
    }

    fn len(&self) -> usize {
        self.queue.get().map_or(0, |queue| queue.len())
    }

    fn clear(&self) {
        if let Some(queue) = self.queue.get() {
            queue.clear();
        }
    }
}
