// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use freshet_core::{
    demand, Element, FlowError, FusionMode, FusionRequest, Subscriber, Upstream, UpstreamCell,
};

type AcceptFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// Recording subscriber driving a flow under test.
///
/// By default it requests unbounded demand on subscribe. Use
/// [`TestSubscriber::with_request`] to script initial demand and issue the
/// rest by hand, [`TestSubscriber::conditional`] to reject elements through
/// `try_on_next`, and [`TestSubscriber::fused`] to negotiate queue fusion.
pub struct TestSubscriber<T> {
    values: Mutex<Vec<T>>,
    errors: Mutex<Vec<FlowError>>,
    completions: AtomicUsize,
    subscriptions: AtomicUsize,
    upstream: UpstreamCell<T>,
    initial_request: u64,
    accept: Option<Box<AcceptFn<T>>>,
    fusion: Option<FusionRequest>,
    granted: AtomicU8,
}

impl<T: Element> TestSubscriber<T> {
    /// Subscriber with unbounded initial demand.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request(demand::UNBOUNDED)
    }

    /// Subscriber issuing `initial` demand on subscribe.
    #[must_use]
    pub fn with_request(initial: u64) -> Self {
        Self {
            values: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
            upstream: UpstreamCell::new(),
            initial_request: initial,
            accept: None,
            fusion: None,
            granted: AtomicU8::new(FusionMode::None.as_u8()),
        }
    }

    /// Conditional subscriber accepting only elements `accept` approves;
    /// rejected elements are recorded nowhere and reported unconsumed.
    #[must_use]
    pub fn conditional(accept: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        let mut subscriber = Self::new();
        subscriber.accept = Some(Box::new(accept));
        subscriber
    }

    /// Subscriber negotiating `request` fusion on subscribe. In `Sync` mode
    /// it drains the queue eagerly; in `Async` mode it polls on every
    /// wakeup.
    #[must_use]
    pub fn fused(request: FusionRequest) -> Self {
        let mut subscriber = Self::new();
        subscriber.fusion = Some(request);
        subscriber
    }

    /// The fusion mode the upstream granted.
    #[must_use]
    pub fn fusion_mode(&self) -> FusionMode {
        FusionMode::from_u8(self.granted.load(Ordering::Acquire))
    }

    /// Issue additional demand.
    pub fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    /// Cancel the subscription.
    pub fn cancel(&self) {
        self.upstream.terminate();
    }

    /// Snapshot of the received values.
    #[must_use]
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.values.lock().clone()
    }

    /// Number of values received so far.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.lock().len()
    }

    /// Rendered messages of the received errors.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().iter().map(ToString::to_string).collect()
    }

    /// Number of `on_complete` signals received.
    #[must_use]
    pub fn completion_count(&self) -> usize {
        self.completions.load(Ordering::Acquire)
    }

    /// Number of `on_subscribe` signals received.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::Acquire)
    }

    /// Assert the exact sequence of received values.
    ///
    /// # Panics
    /// Panics when the received values differ from `expected`.
    pub fn assert_values(&self, expected: &[T])
    where
        T: PartialEq,
    {
        let values = self.values.lock();
        assert_eq!(values.as_slice(), expected, "received values mismatch");
    }

    /// Assert completion was signalled exactly once and no error arrived.
    ///
    /// # Panics
    /// Panics on missing or duplicated completion, or on any error.
    pub fn assert_complete(&self) {
        assert_eq!(
            self.completions.load(Ordering::Acquire),
            1,
            "expected exactly one completion"
        );
        let errors = self.errors.lock();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    /// Assert no terminal signal arrived yet.
    ///
    /// # Panics
    /// Panics when a completion or error was already received.
    pub fn assert_not_terminated(&self) {
        assert_eq!(
            self.completions.load(Ordering::Acquire),
            0,
            "unexpected completion"
        );
        let errors = self.errors.lock();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    /// Assert exactly one error whose message contains `needle`, and no
    /// completion.
    ///
    /// # Panics
    /// Panics when the error is missing, duplicated, or mismatched.
    pub fn assert_error_contains(&self, needle: &str) {
        let errors = self.errors.lock();
        assert_eq!(errors.len(), 1, "expected exactly one error, got {errors:?}");
        let message = errors[0].to_string();
        assert!(
            message.contains(needle),
            "error {message:?} does not contain {needle:?}"
        );
        assert_eq!(
            self.completions.load(Ordering::Acquire),
            0,
            "error and completion both signalled"
        );
    }

    /// Spin until a terminal signal arrives or `timeout` elapses.
    ///
    /// # Panics
    /// Panics on timeout.
    pub fn await_terminal(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            if self.completions.load(Ordering::Acquire) > 0 || !self.errors.lock().is_empty() {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "no terminal signal within {timeout:?}"
            );
            std::thread::yield_now();
        }
    }

    /// Spin until at least `count` values arrived or `timeout` elapses.
    ///
    /// # Panics
    /// Panics on timeout.
    pub fn await_values(&self, count: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.values.lock().len() < count {
            assert!(
                Instant::now() < deadline,
                "fewer than {count} values within {timeout:?}"
            );
            std::thread::yield_now();
        }
    }

    /// Take the received errors out for structural matching.
    #[must_use]
    pub fn take_errors(&self) -> Vec<FlowError> {
        std::mem::take(&mut *self.errors.lock())
    }

    fn drain_sync(&self, queue: &std::sync::Arc<dyn freshet_core::QueueSubscription<T>>) {
        loop {
            match queue.poll() {
                Ok(Some(value)) => self.values.lock().push(value),
                Ok(None) => {
                    // sync exhaustion is completion
                    self.completions.fetch_add(1, Ordering::AcqRel);
                    return;
                }
                Err(error) => {
                    self.errors.lock().push(error);
                    return;
                }
            }
        }
    }

    fn drain_async(&self, queue: &std::sync::Arc<dyn freshet_core::QueueSubscription<T>>) {
        loop {
            match queue.poll() {
                Ok(Some(value)) => self.values.lock().push(value),
                Ok(None) => return,
                Err(error) => {
                    self.errors.lock().push(error);
                    return;
                }
            }
        }
    }
}

impl<T: Element> Default for TestSubscriber<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Subscriber<T> for TestSubscriber<T> {
    fn on_subscribe(&self, upstream: Upstream<T>) {
        self.subscriptions.fetch_add(1, Ordering::AcqRel);
        let queue = upstream.fused().cloned();
        if !self.upstream.set_once(upstream) {
            return;
        }
        if let (Some(request), Some(queue)) = (self.fusion, queue) {
            let granted = queue.request_fusion(request);
            self.granted.store(granted.as_u8(), Ordering::Release);
            match granted {
                FusionMode::Sync => {
                    self.drain_sync(&queue);
                    return;
                }
                FusionMode::Async => {
                    self.drain_async(&queue);
                    return;
                }
                FusionMode::None => {}
            }
        }
        if self.initial_request > 0 {
            self.upstream.request(self.initial_request);
        }
    }

    fn on_next(&self, value: T) {
        self.values.lock().push(value);
    }

    fn try_on_next(&self, value: T) -> bool {
        if let Some(accept) = &self.accept {
            if !accept(&value) {
                return false;
            }
        }
        self.values.lock().push(value);
        true
    }

    fn on_available(&self) {
        if let Some(Upstream::Fused(queue)) = self.upstream.get() {
            self.drain_async(&queue);
        }
    }

    fn on_error(&self, error: FlowError) {
        self.errors.lock().push(error);
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::AcqRel);
    }
}

impl<T: Element> Debug for TestSubscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSubscriber")
            .field("values", &self.values.lock().len())
            .field("errors", &self.errors.lock().len())
            .field("completions", &self.completions.load(Ordering::Acquire))
            .finish()
    }
}
