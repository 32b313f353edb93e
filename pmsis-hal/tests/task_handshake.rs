// SPDX-FileCopyrightText: 2026 Google LLC
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use test_strategy::proptest;

use pmsis_hal::sync::{SpinWaitLock, WaitLock};
use pmsis_hal::task::{Task, TaskState, TASK_ARGS};

#[test]
fn waiter_is_released_by_completion_on_another_thread() {
    let task = Task::new();
    task.issue();

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            task.set_arg(0, 42);
            task.complete();
        });

        task.wait();
        assert!(task.is_done());
        assert_eq!(task.arg(0), 42);
    });
}

#[test]
fn waiter_on_another_thread_observes_done() {
    let task = Task::new();
    task.issue();

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            task.wait();
            task.is_done()
        });
        thread::sleep(Duration::from_millis(20));
        assert!(!task.is_done());
        task.complete();
        assert!(waiter.join().unwrap());
    });
}

#[test]
fn polling_loop_sees_completion() {
    let task = Task::new();
    task.issue();

    thread::scope(|s| {
        s.spawn(|| task.complete());
        while !task.is_done() {
            std::hint::spin_loop();
        }
    });
    assert_eq!(task.state(), TaskState::Done);
}

static CALLBACKS: AtomicUsize = AtomicUsize::new(0);

fn on_complete(args: &[usize; TASK_ARGS]) {
    CALLBACKS.fetch_add(args[1], Ordering::SeqCst);
}

#[test]
fn callback_fires_once_from_completing_thread() {
    let task = Task::with_callback(on_complete, [0, 1, 0, 0]);
    task.issue();
    thread::scope(|s| {
        s.spawn(|| task.complete());
    });
    task.wait();
    assert_eq!(CALLBACKS.load(Ordering::SeqCst), 1);
}

/// Runtime lock counting take/release calls, standing in for an RTOS mutex.
struct CountingLock {
    inner: SpinWaitLock,
    takes: AtomicUsize,
    releases: AtomicUsize,
}

impl WaitLock for CountingLock {
    fn take(&self) {
        self.takes.fetch_add(1, Ordering::SeqCst);
        self.inner.take();
    }

    fn try_take(&self) -> bool {
        self.inner.try_take()
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release();
    }
}

#[test]
fn injected_lock_sees_issue_and_wait_handshake() {
    let task = Task::with_lock(CountingLock {
        inner: SpinWaitLock::new(),
        takes: AtomicUsize::new(0),
        releases: AtomicUsize::new(0),
    });
    task.issue();
    task.complete();
    task.wait();

    // issue takes, complete releases, wait takes and releases.
    let lock = task.wait_lock();
    assert_eq!(lock.takes.load(Ordering::SeqCst), 2);
    assert_eq!(lock.releases.load(Ordering::SeqCst), 2);
}

/// Runtime lock whose first `take` is slow, like an RTOS mutex that yields.
struct SlowFirstTake {
    inner: SpinWaitLock,
    first: AtomicBool,
}

impl WaitLock for SlowFirstTake {
    fn take(&self) {
        if self.first.swap(false, Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
        }
        self.inner.take();
    }

    fn try_take(&self) -> bool {
        self.inner.try_take()
    }

    fn release(&self) {
        self.inner.release();
    }
}

#[test]
fn waiter_never_passes_a_slow_issue() {
    let task = Task::with_lock(SlowFirstTake {
        inner: SpinWaitLock::new(),
        first: AtomicBool::new(true),
    });

    thread::scope(|s| {
        s.spawn(|| {
            task.issue();
            thread::sleep(Duration::from_millis(20));
            task.set_arg(2, 7);
            task.complete();
        });

        // Wait as soon as the task shows up as pending.
        while task.state() == TaskState::Idle {
            std::hint::spin_loop();
        }
        task.wait();
        assert!(task.is_done());
        assert_eq!(task.arg(2), 7);
    });
}

#[proptest]
fn done_after_wait_for_any_reissue_count(#[strategy(1usize..32)] rounds: usize) {
    let task = Task::new();
    for round in 0..rounds {
        task.issue();
        prop_assert!(!task.is_done());
        task.set_arg(round % TASK_ARGS, round);
        task.complete();
        task.wait();
        prop_assert!(task.is_done());
        prop_assert_eq!(task.arg(round % TASK_ARGS), round);
    }
}
