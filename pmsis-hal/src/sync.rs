// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Mutex-like primitive with a bare `take`/`release` handshake.
///
/// Unlike a regular mutex the lock is not owned by the context that took
/// it: a task takes its lock when it is issued and the driver releases it
/// from whatever context completes the operation.
pub trait WaitLock {
    /// Block until the lock is acquired.
    fn take(&self);

    /// Acquire the lock if it is free, without blocking.
    fn try_take(&self) -> bool;

    /// Release the lock. May be called from a different context than the
    /// one that took it.
    fn release(&self);
}

/// [`WaitLock`] built on a single atomic flag.
///
/// Used when the underlying runtime provides nothing better. Waiting spins.
pub struct SpinWaitLock {
    locked: AtomicBool,
}

impl SpinWaitLock {
    pub const fn new() -> Self {
        SpinWaitLock {
            locked: AtomicBool::new(false),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for SpinWaitLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitLock for SpinWaitLock {
    fn take(&self) {
        while !self.try_take() {
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    fn try_take(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Minimal spinning mutex guarding a value, for driver state shared between
/// execution contexts (e.g. the console behind the logger).
pub struct SpinMutex<T> {
    lock: SpinWaitLock,
    value: UnsafeCell<T>,
}

// Access to `value` is serialized by `lock`.
unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        SpinMutex {
            lock: SpinWaitLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        self.lock.take();
        SpinMutexGuard { mutex: self }
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
}

impl<T> Deref for SpinMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for SpinMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.lock.release();
    }
}
