// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Cancellable worker over an external executor.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use freshet_core::{hooks, FlowError};

/// A unit of work accepted by an executor.
pub type Job = Box<dyn FnOnce() + Send>;

/// External execution resource. The worker never runs jobs on the caller's
/// thread; everything is handed here.
pub trait Executor: Send + Sync {
    /// Run `job` at some point, on some thread.
    fn execute(&self, job: Job);
}

/// Factory of workers over a shared execution resource.
pub trait Scheduler: Send + Sync {
    /// A fresh worker; each worker tracks and terminates its own tasks.
    fn worker(&self) -> Worker;
}

impl<E: Executor + 'static> Scheduler for Arc<E> {
    fn worker(&self) -> Worker {
        Worker::new(Arc::clone(self) as Arc<dyn Executor>)
    }
}

const WAITING: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;

/// At-most-once cancellable wrapper around one scheduled job.
///
/// The state cell resolves the run/cancel race: `run` claims the job with a
/// waiting → running exchange, `cancel` with waiting → cancelled; finished
/// is absorbing against both.
pub struct TaskHandle {
    id: u64,
    state: AtomicU8,
    job: Mutex<Option<Job>>,
    worker: Weak<WorkerInner>,
}

impl TaskHandle {
    /// Prevent a not-yet-started job from running. Returns `true` when the
    /// job will never run; a finished task is left untouched.
    pub fn cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(WAITING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.job.lock() = None;
            self.deregister();
            true
        } else {
            false
        }
    }

    /// Whether the job ran to completion.
    pub fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == FINISHED
    }

    /// Whether the job was cancelled before it started.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn run(&self) {
        if self
            .state
            .compare_exchange(WAITING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let job = self.job.lock().take();
        if let Some(job) = job {
            // a panicking task must not take the executor thread down
            if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "scheduled task panicked".to_string());
                hooks::on_error_dropped(FlowError::user_msg(message));
            }
        }
        self.state.store(FINISHED, Ordering::Release);
        self.deregister();
    }

    fn deregister(&self) {
        if let Some(worker) = self.worker.upgrade() {
            worker.tasks.lock().tasks.remove(&self.id);
        }
    }
}

struct TaskSet {
    terminated: bool,
    next_id: u64,
    tasks: HashMap<u64, Arc<TaskHandle>>,
}

struct WorkerInner {
    executor: Arc<dyn Executor>,
    tasks: Mutex<TaskSet>,
}

/// Serialized task scheduler bound to one executor.
///
/// Scheduling after [`Worker::shutdown`] is refused; shutting down cancels
/// every task that has not started yet.
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// A worker submitting its tasks to `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                executor,
                tasks: Mutex::new(TaskSet {
                    terminated: false,
                    next_id: 0,
                    tasks: HashMap::new(),
                }),
            }),
        }
    }

    /// Submit a job. Returns its handle, or `None` when the worker has been
    /// shut down.
    pub fn schedule(&self, job: impl FnOnce() + Send + 'static) -> Option<Arc<TaskHandle>> {
        let handle = {
            let mut set = self.inner.tasks.lock();
            if set.terminated {
                return None;
            }
            let id = set.next_id;
            set.next_id += 1;
            let handle = Arc::new(TaskHandle {
                id,
                state: AtomicU8::new(WAITING),
                job: Mutex::new(Some(Box::new(job))),
                worker: Arc::downgrade(&self.inner),
            });
            set.tasks.insert(id, Arc::clone(&handle));
            handle
        };
        let runner = Arc::clone(&handle);
        self.inner.executor.execute(Box::new(move || runner.run()));
        Some(handle)
    }

    /// Refuse further work and cancel every pending task.
    pub fn shutdown(&self) {
        let pending: Vec<Arc<TaskHandle>> = {
            let mut set = self.inner.tasks.lock();
            if set.terminated {
                return;
            }
            set.terminated = true;
            set.tasks.drain().map(|(_, handle)| handle).collect()
        };
        for handle in pending {
            handle.cancel();
        }
    }

    /// Whether [`Worker::shutdown`] has run.
    pub fn is_terminated(&self) -> bool {
        self.inner.tasks.lock().terminated
    }

    /// Number of tasks scheduled but not yet finished or cancelled.
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.lock().tasks.len()
    }
}
