//! The threads-disabled engine.
//!
//! [`SequentialPool`] presents the same submit/wait/shutdown contract as
//! the threaded pool without creating any threads. Submitted bodies are
//! parked in deferred cells; a task runs on whichever thread first
//! observes its handle, or on the caller of [`wait`](SequentialPool::wait),
//! which drains the queue in FIFO order. Dropping the pool drains it the
//! same way.
//!
//! This engine is semantically weaker than the threaded one: there is no
//! concurrency, and handles become ready only once something forces them.
//! Everything else — FIFO order, exactly-once execution, panic capture,
//! drain-on-shutdown — is preserved.

use crate::strategy::PoolStrategy;
use crate::task::{DeferredCell, TaskHandle};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Drop-in single-threaded replacement for the worker pool.
pub struct SequentialPool {
    queue: Mutex<VecDeque<Arc<DeferredCell>>>,
}

impl SequentialPool {
    /// Builds the fallback engine.
    ///
    /// The strategy is consulted for its thread count only to diagnose the
    /// mismatch: when it requests anything but one thread, a warning goes
    /// to standard error and construction continues without threads.
    #[must_use]
    pub fn new<S>(strategy: S) -> Self
    where
        S: PoolStrategy,
    {
        let requested = strategy.compute_thread_count();
        if requested != 1 {
            eprintln!(
                "warning: requested a pool with {requested} threads, \
                 but threading is disabled; tasks will run on the waiting thread"
            );
        }
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues a task and returns its completion handle.
    ///
    /// The body does not run here; it runs the first time the handle is
    /// observed or when the queue is drained.
    pub fn submit<F>(&self, body: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (cell, handle) = DeferredCell::park(body);
        self.queue.lock().unwrap().push_back(cell);
        handle
    }

    /// Drains the queue, running every pending task on this thread in
    /// submission order.
    pub fn wait(&self) {
        // Pop outside the force so a task that submits more work does not
        // deadlock on the queue lock.
        loop {
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some(cell) => cell.force(),
                None => break,
            }
        }
    }

    /// The number of execution contexts: always one, the waiter.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        1
    }

    /// Tasks submitted but not yet forced or drained.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

impl Drop for SequentialPool {
    fn drop(&mut self) {
        self.wait();
    }
}

impl fmt::Debug for SequentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialPool")
            .field("queued", &self.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::FixedConcurrency;
    use crate::TaskOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn wait_drains_in_submission_order() {
        let pool = SequentialPool::new(FixedConcurrency(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            pool.submit(move || {
                order.lock().unwrap().push(i);
            });
        }

        assert_eq!(pool.queued(), 5);
        pool.wait();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn tasks_run_on_the_waiting_thread() {
        let pool = SequentialPool::new(FixedConcurrency(1));
        let waiter = thread::current().id();

        let handle = pool.submit(move || {
            assert_eq!(thread::current().id(), waiter);
        });
        pool.wait();
        assert!(handle.wait().is_completed());
    }

    #[test]
    fn handle_observation_forces_the_task() {
        let pool = SequentialPool::new(FixedConcurrency(1));
        let ran = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&ran);
        let handle = pool.submit(move || {
            r.fetch_add(1, Ordering::Relaxed);
        });

        assert!(!handle.is_ready());
        assert_eq!(handle.wait(), TaskOutcome::Completed);
        assert_eq!(ran.load(Ordering::Relaxed), 1);

        // Draining later does not run it again.
        pool.wait();
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn drop_drains_pending_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = SequentialPool::new(FixedConcurrency(1));
            for _ in 0..3 {
                let c = Arc::clone(&counter);
                pool.submit(move || {
                    c.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn panic_is_captured_and_draining_continues() {
        let pool = SequentialPool::new(FixedConcurrency(1));
        let survivor = Arc::new(AtomicUsize::new(0));

        let bad = pool.submit(|| panic!("sequential boom"));
        let s = Arc::clone(&survivor);
        let good = pool.submit(move || {
            s.fetch_add(1, Ordering::Relaxed);
        });

        pool.wait();
        assert!(bad.wait().is_panicked());
        assert!(good.wait().is_completed());
        assert_eq!(survivor.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn mismatched_thread_count_still_constructs() {
        // Emits the stderr diagnostic; behaviour is otherwise unchanged.
        let pool = SequentialPool::new(FixedConcurrency(8));
        assert_eq!(pool.worker_count(), 1);
        let handle = pool.submit(|| {});
        pool.wait();
        assert!(handle.is_ready());
    }
}
