// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use freshet_exec::{Executor, Job, Scheduler, Worker};

/// Runs jobs inline, on the caller's thread.
struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Parks jobs until the test releases them.
#[derive(Default)]
struct ManualExecutor {
    jobs: Mutex<Vec<Job>>,
}

impl ManualExecutor {
    fn run_all(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        for job in jobs {
            job();
        }
    }
}

impl Executor for ManualExecutor {
    fn execute(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }
}

#[test]
fn scheduled_tasks_run_and_deregister() {
    // Arrange
    let worker = Worker::new(Arc::new(ImmediateExecutor));
    let counter = Arc::new(AtomicUsize::new(0));

    // Act
    let handle = {
        let counter = Arc::clone(&counter);
        worker
            .schedule(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
            .expect("worker accepts work")
    };

    // Assert
    assert_eq!(counter.load(Ordering::Acquire), 1);
    assert!(handle.is_finished());
    assert_eq!(worker.pending_tasks(), 0);
}

#[test]
fn cancelled_tasks_never_run() {
    // Arrange
    let executor = Arc::new(ManualExecutor::default());
    let worker = Worker::new(executor.clone());
    let counter = Arc::new(AtomicUsize::new(0));
    let handle = {
        let counter = Arc::clone(&counter);
        worker
            .schedule(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
            .expect("worker accepts work")
    };

    // Act: cancel while the job is still parked
    assert!(handle.cancel());
    executor.run_all();

    // Assert
    assert_eq!(counter.load(Ordering::Acquire), 0);
    assert!(handle.is_cancelled());
    assert_eq!(worker.pending_tasks(), 0);
}

#[test]
fn finished_tasks_absorb_late_cancels() {
    // Arrange
    let worker = Worker::new(Arc::new(ImmediateExecutor));
    let handle = worker.schedule(|| {}).expect("worker accepts work");

    // Act & Assert
    assert!(handle.is_finished());
    assert!(!handle.cancel());
    assert!(handle.is_finished());
}

#[test]
fn shutdown_refuses_new_work_and_cancels_pending() {
    // Arrange
    let executor = Arc::new(ManualExecutor::default());
    let worker = Worker::new(executor.clone());
    let counter = Arc::new(AtomicUsize::new(0));
    let parked = {
        let counter = Arc::clone(&counter);
        worker
            .schedule(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
            .expect("worker accepts work")
    };

    // Act
    worker.shutdown();
    let refused = worker.schedule(|| {});
    executor.run_all();

    // Assert
    assert!(worker.is_terminated());
    assert!(refused.is_none());
    assert!(parked.is_cancelled());
    assert_eq!(counter.load(Ordering::Acquire), 0);
}

#[test]
fn shutdown_is_idempotent() {
    let worker = Worker::new(Arc::new(ImmediateExecutor));
    worker.shutdown();
    worker.shutdown();
    assert!(worker.is_terminated());
}

#[test]
fn panicking_tasks_reach_the_dropped_sink_not_the_caller() {
    use freshet_test_utils::DroppedSignals;

    // Arrange
    let dropped = DroppedSignals::install();
    let worker = Worker::new(Arc::new(ImmediateExecutor));

    // Act: the panic must not unwind into this thread
    let handle = worker
        .schedule(|| panic!("task exploded"))
        .expect("worker accepts work");

    // Assert
    assert!(handle.is_finished());
    let errors = dropped.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("task exploded"));
}

#[test]
fn scheduler_trait_builds_workers_over_a_shared_executor() {
    // Arrange
    let executor = Arc::new(ImmediateExecutor);
    let scheduler: &dyn Scheduler = &executor;

    // Act
    let worker = scheduler.worker();
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let counter = Arc::clone(&counter);
        worker
            .schedule(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
            .expect("worker accepts work");
    }

    // Assert
    assert_eq!(counter.load(Ordering::Acquire), 1);
}

#[test]
fn threaded_executor_runs_off_the_calling_thread() {
    use std::time::{Duration, Instant};

    struct ThreadExecutor;

    impl Executor for ThreadExecutor {
        fn execute(&self, job: Job) {
            std::thread::spawn(job);
        }
    }

    // Arrange
    let worker = Worker::new(Arc::new(ThreadExecutor));
    let seen = Arc::new(Mutex::new(None));

    // Act
    {
        let seen = Arc::clone(&seen);
        worker
            .schedule(move || {
                *seen.lock().unwrap() = Some(std::thread::current().id());
            })
            .expect("worker accepts work");
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while seen.lock().unwrap().is_none() {
        assert!(Instant::now() < deadline, "task did not run");
        std::thread::yield_now();
    }

    // Assert
    let task_thread = seen.lock().unwrap().expect("task ran");
    assert_ne!(task_thread, std::thread::current().id());
}
