//! The threaded engine: a fixed set of workers over one FIFO queue.
//!
//! # Design
//!
//! All shared state — the queue, the count of tasks in flight, and the
//! enable flag — lives behind a single mutex with two condition variables:
//! `work_available` wakes idle workers, `quiescent` wakes callers blocked
//! in [`WorkerPool::wait`]. Submitters signal one worker; only workers
//! signal waiters, and only when quiescence actually became true.
//!
//! # The in-flight count
//!
//! A worker marks itself active in the same critical section in which it
//! pops the queue, and unmarks only after the task body has returned.
//! Without that fused update, a waiter could observe an empty queue while
//! a task is still running and wrongly conclude the pool is quiescent.
//!
//! # Shutdown
//!
//! Shutdown flips the enable flag, wakes every worker, and joins them.
//! Workers keep draining the queue and exit only once it is empty, so
//! every task accepted before shutdown runs (drain-on-shutdown).
//!
//! # Hazard
//!
//! A task that blocks on its own pool's `wait()` can never see quiescence:
//! it is itself in flight. Worker threads carry a pool identity marker and
//! `wait()` panics on them instead of deadlocking.

use crate::error::PoolError;
use crate::stack::{self, DEFAULT_WORKER_STACK};
use crate::strategy::PoolStrategy;
use crate::task::{Task, TaskHandle};
use crate::tracing_compat::{debug, trace};
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

thread_local! {
    /// Identity of the pool this thread works for, zero otherwise.
    static WORKER_OF: Cell<usize> = const { Cell::new(0) };
}

/// Everything guarded by the queue mutex.
struct State {
    /// Pending tasks, dequeued in submission order.
    queue: VecDeque<Task>,
    /// Tasks dispatched to a worker but not yet finished.
    active: usize,
    /// True until shutdown begins; submission requires it.
    enabled: bool,
}

impl State {
    fn is_quiescent(&self) -> bool {
        self.queue.is_empty() && self.active == 0
    }
}

/// State co-owned by the facade, its handles, and the workers.
struct Shared {
    state: Mutex<State>,
    /// Wakes idle workers: one per submission, all at shutdown.
    work_available: Condvar,
    /// Wakes `wait()` callers when the pool drains to quiescence.
    quiescent: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                active: 0,
                enabled: true,
            }),
            work_available: Condvar::new(),
            quiescent: Condvar::new(),
        }
    }

    /// Address-based identity for the worker-thread marker.
    fn id(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    fn submit<F>(&self, body: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (task, handle) = Task::new(body);
        {
            let mut state = self.state.lock().unwrap();
            assert!(
                state.enabled,
                "task submitted to a worker pool that is shutting down"
            );
            state.queue.push_back(task);
        }
        // Signal outside the critical section so the woken worker does not
        // immediately block on the mutex.
        self.work_available.notify_one();
        trace!("task queued");
        handle
    }

    fn wait(self: &Arc<Self>) {
        assert!(
            WORKER_OF.with(Cell::get) != self.id(),
            "wait() called from a worker of the same pool; \
             a task cannot wait for its own pool to drain"
        );
        let mut state = self.state.lock().unwrap();
        while !state.is_quiescent() {
            state = self.quiescent.wait(state).unwrap();
        }
    }

    fn disable(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.enabled = false;
        }
        self.work_available.notify_all();
    }

    fn queued(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    fn active(&self) -> usize {
        self.state.lock().unwrap().active
    }

    fn is_quiescent(&self) -> bool {
        self.state.lock().unwrap().is_quiescent()
    }
}

/// Long-lived loop run by each worker thread.
fn worker_loop(shared: &Arc<Shared>, index: usize, strategy: &dyn PoolStrategy) {
    WORKER_OF.with(|marker| marker.set(shared.id()));
    strategy.apply_thread_strategy(index);
    debug!(worker = index, "worker started");

    loop {
        let task = {
            let mut state = shared.state.lock().unwrap();
            while state.enabled && state.queue.is_empty() {
                state = shared.work_available.wait(state).unwrap();
            }
            // Mark in flight before the lock drops, in the same critical
            // section as the pop: a concurrent wait() must never see an
            // empty queue with this task unaccounted for.
            state.active += 1;
            match state.queue.pop_front() {
                Some(task) => task,
                None => {
                    // Disabled and drained.
                    state.active -= 1;
                    break;
                }
            }
        };

        // Panics are captured into the task's handle.
        task.run();

        let notify = {
            let mut state = shared.state.lock().unwrap();
            state.active -= 1;
            state.is_quiescent()
        };
        // Broadcast after releasing the lock so waiters wake into an
        // uncontended mutex.
        if notify {
            shared.quiescent.notify_all();
        }
    }

    debug!(worker = index, "worker exiting");
}

/// Configuration for [`WorkerPool::with_options`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Stack size requested for each worker, in bytes. Zero keeps the
    /// platform default.
    pub stack_size: usize,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_WORKER_STACK,
            thread_name_prefix: "drainpool-worker".to_string(),
        }
    }
}

/// A fixed-size worker pool over one FIFO queue.
///
/// Submitted tasks each run exactly once on exactly one worker.
/// [`wait`](Self::wait) blocks until the pool is quiescent; dropping the
/// pool drains the queue and joins every worker.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Builds a pool with default options, sized by `strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if the OS rejects a worker thread;
    /// workers spawned before the failure are shut down and joined first.
    pub fn new<S>(strategy: S) -> Result<Self, PoolError>
    where
        S: PoolStrategy + 'static,
    {
        Self::with_options(strategy, PoolOptions::default())
    }

    /// Builds a pool with explicit options.
    ///
    /// A strategy thread count of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] on worker spawn failure, after tearing
    /// down any workers spawned earlier.
    pub fn with_options<S>(strategy: S, options: PoolOptions) -> Result<Self, PoolError>
    where
        S: PoolStrategy + 'static,
    {
        let strategy = Arc::new(strategy);
        let worker_count = strategy.compute_thread_count().max(1);
        let shared = Arc::new(Shared::new());
        let mut workers = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let shared_for_worker = Arc::clone(&shared);
            let strategy_for_worker = Arc::clone(&strategy);
            stack::request_stack_size(options.stack_size);
            let name = format!("{}-{index}", options.thread_name_prefix);
            let spawned = stack::spawn_worker(name, move || {
                worker_loop(&shared_for_worker, index, strategy_for_worker.as_ref());
            });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    shared.disable();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }

        debug!(workers = worker_count, "pool started");
        Ok(Self {
            shared,
            workers,
            worker_count,
        })
    }

    /// Queues a task and returns its completion handle.
    ///
    /// O(1) amortised; never blocks on task execution.
    ///
    /// # Panics
    ///
    /// Panics if the pool is shutting down. Submitting into a dying pool
    /// is a programmer error, not a recoverable condition.
    pub fn submit<F>(&self, body: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(body)
    }

    /// Blocks until the queue is empty and no task is in flight.
    ///
    /// Quiescence is not shutdown: further submissions are allowed, and a
    /// submission racing this call may land on either side of it.
    ///
    /// # Panics
    ///
    /// Panics when called from a worker of this pool, where it could
    /// never return.
    pub fn wait(&self) {
        self.shared.wait();
    }

    /// Drains the queue and joins every worker. Idempotent; also run by
    /// `Drop`.
    ///
    /// Tasks already queued still execute before the workers exit.
    /// Submission panics once shutdown has begun.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        debug!("pool shutting down");
        self.shared.disable();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }

    /// Returns a cloneable submitter sharing this pool's queue.
    ///
    /// Handles are usable from other threads and from inside tasks
    /// (task-submits-task); they do not keep the workers alive.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The fixed number of workers.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    /// Tasks dispatched to a worker but not yet finished.
    #[must_use]
    pub fn active(&self) -> usize {
        self.shared.active()
    }

    /// Snapshot of the quiescent predicate. Stale as soon as it returns.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.shared.is_quiescent()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("queued", &self.queued())
            .field("active", &self.active())
            .finish()
    }
}

/// Cloneable submitter for a [`WorkerPool`].
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Queues a task on the pool this handle came from.
    ///
    /// # Panics
    ///
    /// Panics if the pool is shutting down, as
    /// [`WorkerPool::submit`] does.
    pub fn submit<F>(&self, body: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(body)
    }

    /// Blocks until the pool is quiescent.
    ///
    /// # Panics
    ///
    /// Panics when called from a worker of the same pool.
    pub fn wait(&self) {
        self.shared.wait();
    }

    /// Tasks waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    /// Tasks dispatched but not yet finished.
    #[must_use]
    pub fn active(&self) -> usize {
        self.shared.active()
    }

    /// Snapshot of the quiescent predicate.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.shared.is_quiescent()
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("queued", &self.queued())
            .field("active", &self.active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::FixedConcurrency;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn basic_submit_and_wait() {
        let pool = WorkerPool::new(FixedConcurrency(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let handle = pool.submit(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });

        pool.wait();
        assert!(handle.is_ready());
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert!(pool.is_quiescent());
    }

    #[test]
    fn zero_thread_count_is_treated_as_one() {
        let pool = WorkerPool::new(FixedConcurrency(0)).unwrap();
        assert_eq!(pool.worker_count(), 1);

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.submit(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        pool.wait();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn workers_are_named_from_the_prefix() {
        let options = PoolOptions {
            thread_name_prefix: "named-pool".to_string(),
            ..Default::default()
        };
        let pool = WorkerPool::with_options(FixedConcurrency(1), options).unwrap();

        let handle = pool.submit(|| {
            let name = thread::current().name().unwrap_or("").to_string();
            assert!(name.starts_with("named-pool-"), "unexpected name {name}");
        });
        assert!(handle.wait().is_completed());
    }

    #[test]
    fn strategy_hook_runs_once_per_worker() {
        struct CountingStrategy {
            applied: Arc<AtomicUsize>,
        }
        impl PoolStrategy for CountingStrategy {
            fn compute_thread_count(&self) -> usize {
                3
            }
            fn apply_thread_strategy(&self, worker_index: usize) {
                assert!(worker_index < 3);
                self.applied.fetch_add(1, Ordering::Relaxed);
            }
        }

        let applied = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(CountingStrategy {
            applied: Arc::clone(&applied),
        })
        .unwrap();
        pool.shutdown();
        assert_eq!(applied.load(Ordering::Relaxed), 3);
    }

    #[test]
    #[should_panic(expected = "shutting down")]
    fn submit_after_shutdown_panics() {
        let mut pool = WorkerPool::new(FixedConcurrency(1)).unwrap();
        pool.shutdown();
        pool.submit(|| {});
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut pool = WorkerPool::new(FixedConcurrency(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.shutdown();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn observers_track_a_blocked_task() {
        let pool = WorkerPool::new(FixedConcurrency(1)).unwrap();
        let gate = Arc::new(std::sync::Barrier::new(2));

        let g = Arc::clone(&gate);
        pool.submit(move || {
            g.wait();
        });

        // Give the worker time to dispatch.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.queued(), 0);
        assert_eq!(pool.active(), 1);
        assert!(!pool.is_quiescent());

        gate.wait();
        pool.wait();
        assert_eq!(pool.active(), 0);
        assert!(pool.is_quiescent());
    }

    #[test]
    fn handle_submits_like_the_facade() {
        let pool = WorkerPool::new(FixedConcurrency(2)).unwrap();
        let handle = pool.handle();
        let clone = handle.clone();
        let counter = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&counter);
        handle.submit(move || {
            c1.fetch_add(1, Ordering::Relaxed);
        });
        let c2 = Arc::clone(&counter);
        clone.submit(move || {
            c2.fetch_add(1, Ordering::Relaxed);
        });

        pool.wait();
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn wait_from_a_worker_is_refused() {
        let pool = WorkerPool::new(FixedConcurrency(1)).unwrap();
        let inner = pool.handle();
        let handle = pool.submit(move || {
            inner.wait();
        });

        match handle.wait() {
            crate::TaskOutcome::Panicked(payload) => {
                assert!(payload.message().contains("worker of the same pool"));
            }
            other => panic!("expected the guard to fire, got {other:?}"),
        }
        // The worker survived the refused wait.
        pool.wait();
        assert!(pool.is_quiescent());
    }
}
