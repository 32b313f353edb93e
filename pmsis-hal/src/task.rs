// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

/*! Completion records for asynchronous driver operations.

Every long-latency operation (a memory transfer, a remote allocation, a GPIO
edge) reports its end through a [`Task`]. The caller owns the task and lends
it to the driver for the duration of one operation:

 - *issue*: the driver takes the wait lock of the task and marks it pending,
 - *complete*: the driver marks it done, runs the stored callback (if any)
   and releases the lock,
 - the caller either [`Task::wait`]s, polls [`Task::is_done`], or relies on
   the callback. Pick one per operation; nothing guards against consuming a
   completion twice.
*/

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use ufmt::derive::uDebug;

use crate::sync::{SpinWaitLock, WaitLock};

/// Number of inline argument words carried by a task.
pub const TASK_ARGS: usize = 4;

/// Function invoked by the driver when a callback task completes.
pub type Callback = fn(&[usize; TASK_ARGS]);

const IDLE: u8 = 0;
const PENDING: u8 = 1;
const DONE: u8 = 2;

#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Never issued, or reset.
    Idle,
    /// Owned by a driver until the operation finishes.
    Pending,
    /// Finished; buffers referenced by the operation belong to the caller again.
    Done,
}

/// How the completion of a task is consumed besides its `done` flag.
#[derive(uDebug, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskId {
    /// Completion is observed by waiting or polling.
    Wait,
    /// The driver calls the stored function once the operation finishes.
    Callback,
}

/// A completion record.
///
/// `Task` is `Sync`; the issuing context and the completing context may be
/// different cores or threads.
pub struct Task<L: WaitLock = SpinWaitLock> {
    state: AtomicU8,
    wait_on: L,
    callback: Option<Callback>,
    args: [AtomicUsize; TASK_ARGS],
}

const fn atomic_args(args: [usize; TASK_ARGS]) -> [AtomicUsize; TASK_ARGS] {
    [
        AtomicUsize::new(args[0]),
        AtomicUsize::new(args[1]),
        AtomicUsize::new(args[2]),
        AtomicUsize::new(args[3]),
    ]
}

impl Task<SpinWaitLock> {
    /// A task completed by waiting or polling.
    pub const fn new() -> Self {
        Task::with_lock(SpinWaitLock::new())
    }

    /// A task whose completion invokes `callback` with `args`.
    pub const fn with_callback(callback: Callback, args: [usize; TASK_ARGS]) -> Self {
        Task {
            state: AtomicU8::new(IDLE),
            wait_on: SpinWaitLock::new(),
            callback: Some(callback),
            args: atomic_args(args),
        }
    }
}

impl Default for Task<SpinWaitLock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: WaitLock> Task<L> {
    /// A waitable task using a lock supplied by the runtime.
    pub const fn with_lock(wait_on: L) -> Self {
        Task {
            state: AtomicU8::new(IDLE),
            wait_on,
            callback: None,
            args: atomic_args([0; TASK_ARGS]),
        }
    }

    pub fn id(&self) -> TaskId {
        match self.callback {
            Some(_) => TaskId::Callback,
            None => TaskId::Wait,
        }
    }

    pub fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            IDLE => TaskState::Idle,
            PENDING => TaskState::Pending,
            _ => TaskState::Done,
        }
    }

    /// Non-blocking completion check, for cooperative polling loops.
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    pub fn wait_lock(&self) -> &L {
        &self.wait_on
    }

    /// Read argument word `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= TASK_ARGS`.
    pub fn arg(&self, index: usize) -> usize {
        self.args[index].load(Ordering::Acquire)
    }

    /// Write argument word `index`. Drivers use this to hand results back.
    ///
    /// # Panics
    ///
    /// Panics if `index >= TASK_ARGS`.
    pub fn set_arg(&self, index: usize, value: usize) {
        self.args[index].store(value, Ordering::Release);
    }

    /// Snapshot of all argument words.
    pub fn args(&self) -> [usize; TASK_ARGS] {
        [self.arg(0), self.arg(1), self.arg(2), self.arg(3)]
    }

    /// Hand the task to a driver: take its wait lock, then mark it pending.
    ///
    /// # Panics
    ///
    /// Panics if the task is already pending.
    pub fn issue(&self) {
        if self.state.load(Ordering::Acquire) == PENDING {
            panic!("Tried to issue a task that is still pending.");
        }
        // A waiter that sees `PENDING` must find the lock already taken.
        self.wait_on.take();
        self.state.store(PENDING, Ordering::Release);
    }

    /// Signal the end of the operation: mark the task done, run the
    /// callback and release the waiter.
    ///
    /// # Panics
    ///
    /// Panics if the task is not pending.
    pub fn complete(&self) {
        if self
            .state
            .compare_exchange(PENDING, DONE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            panic!("Tried to complete a task that is not pending.");
        }
        if let Some(callback) = self.callback {
            callback(&self.args());
        }
        self.wait_on.release();
    }

    /// Issue and complete in one go, for operations that finish before the
    /// issuing call returns.
    pub fn complete_immediately(&self) {
        self.issue();
        self.complete();
    }

    /// Block until the task is done.
    ///
    /// At most one context may wait on a given task.
    ///
    /// # Panics
    ///
    /// Panics if the task was never issued.
    pub fn wait(&self) {
        if self.state() == TaskState::Idle {
            panic!("Tried to wait on a task that was never issued.");
        }
        self.wait_on.take();
        self.wait_on.release();
        debug_assert!(self.is_done());
    }

    /// Return a finished task to the idle state so it can be reused.
    ///
    /// # Panics
    ///
    /// Panics if the task is pending.
    pub fn reset(&mut self) {
        assert!(
            *self.state.get_mut() != PENDING,
            "Tried to reset a task that is still pending."
        );
        *self.state.get_mut() = IDLE;
    }
}
