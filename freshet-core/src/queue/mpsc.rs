// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn boxed(value: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value,
        }))
    }
}

/// Unbounded lock-free multi-producer single-consumer linked queue.
///
/// Exchange-head layout: producers swap themselves in at the head and link
/// the previous node to themselves; the consumer walks `next` pointers from
/// a stub tail. A producer pre-empted between the swap and the link makes
/// `pop` transiently return `None`; callers that bump a WIP counter after
/// pushing re-drive the drain, so nothing is lost.
///
/// # Contract
///
/// `push` is safe from any number of threads; `pop` and `is_empty` belong to
/// the single consumer role (the WIP drain owner).
pub struct MpscQueue<T> {
    /// Producers swap new nodes in here.
    head: AtomicPtr<Node<T>>,
    /// Consumer cursor; always points at the current stub.
    tail: UnsafeCell<*mut Node<T>>,
}

unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let stub = Node::boxed(None);
        Self {
            head: AtomicPtr::new(stub),
            tail: UnsafeCell::new(stub),
        }
    }

    /// Enqueue a value. Safe from any thread.
    pub fn push(&self, value: T) {
        let node = Node::boxed(Some(value));
        let prev = self.head.swap(node, Ordering::AcqRel);
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
    }

    /// Dequeue the oldest value. Consumer-side.
    pub fn pop(&self) -> Option<T> {
        unsafe {
            let tail = *self.tail.get();
            let next = (*tail).next.load(Ordering::Acquire);
            if next.is_null() {
                return None;
            }
            let value = (*next).value.take();
            *self.tail.get() = next;
            drop(Box::from_raw(tail));
            value
        }
    }

    /// Whether a `pop` would currently return `None`. Consumer-side.
    pub fn is_empty(&self) -> bool {
        unsafe { (*(*self.tail.get())).next.load(Ordering::Acquire).is_null() }
    }
}

impl<T> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
        unsafe {
            drop(Box::from_raw(*self.tail.get()));
        }
    }
}
