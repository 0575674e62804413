// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

/// Bounded lock-free single-producer single-consumer ring.
///
/// Capacity is rounded up to a power of two so indexing reduces to a mask.
/// Cursors only ever grow; occupancy is `head - tail` with wrapping
/// arithmetic.
///
/// # Contract
///
/// `offer` may be called by one thread at a time (the serialized upstream)
/// and `poll`/`clear` by one thread at a time (the drain owner). Operators
/// uphold this through signal serialization and the WIP counter; the ring
/// itself does not check it.
pub struct SpscRing<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Producer cursor: next slot to write. Only the producer advances it.
    head: CachePadded<AtomicUsize>,
    /// Consumer cursor: next slot to read. Only the consumer advances it.
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Create a ring holding at least `capacity` elements.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let size = capacity.max(2).next_power_of_two();
        let buffer = (0..size)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            mask: size - 1,
            buffer,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueue a value; gives it back when the ring is full.
    pub fn offer(&self, value: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) == self.buffer.len() {
            return Err(value);
        }
        unsafe {
            (*self.buffer[head & self.mask].get()).write(value);
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Dequeue the oldest value.
    pub fn poll(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let value = unsafe { (*self.buffer[tail & self.mask].get()).assume_init_read() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Whether the ring currently holds no elements.
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Acquire) == self.head.load(Ordering::Acquire)
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Drop all buffered elements. Consumer-side.
    pub fn clear(&self) {
        while self.poll().is_some() {}
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        self.clear();
    }
}
