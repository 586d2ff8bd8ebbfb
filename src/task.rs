//! Task wrappers and completion handles.
//!
//! Each submission pairs a boxed body with a one-shot [`Completion`] cell.
//! The body runs under `catch_unwind`, so a panicking task still resolves
//! its handle and the worker's bookkeeping proceeds as for a normal return.
//!
//! The sequential engine reuses the same machinery through
//! [`DeferredCell`]: the body is parked in a cell and forced the first time
//! its result is observed.

use crate::outcome::{PanicPayload, TaskOutcome};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// One unit of work, owned by the queue until a worker picks it up.
pub(crate) struct Task {
    body: Box<dyn FnOnce() + Send + 'static>,
    completion: Arc<Completion>,
}

impl Task {
    /// Pairs a body with a fresh completion cell and its handle.
    pub(crate) fn new<F>(body: F) -> (Self, TaskHandle)
    where
        F: FnOnce() + Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let task = Self {
            body: Box::new(body),
            completion: Arc::clone(&completion),
        };
        let handle = TaskHandle {
            completion,
            deferred: None,
        };
        (task, handle)
    }

    /// Runs the body to completion, normal or unwinding, and resolves the
    /// handle. Never propagates a panic to the caller.
    pub(crate) fn run(self) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(self.body)) {
            Ok(()) => TaskOutcome::Completed,
            Err(payload) => TaskOutcome::Panicked(PanicPayload::from_unwind(&*payload)),
        };
        self.completion.resolve(outcome);
    }
}

/// One-shot pending-to-ready cell shared by a task and its handles.
///
/// `ready` gives waiters a lock-free fast path; the outcome itself lives
/// behind the mutex the condvar is tied to.
struct Completion {
    ready: AtomicBool,
    outcome: Mutex<Option<TaskOutcome>>,
    cond: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            outcome: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn resolve(&self, outcome: TaskOutcome) {
        let mut slot = self.outcome.lock().unwrap();
        debug_assert!(slot.is_none(), "completion resolved twice");
        *slot = Some(outcome);
        self.ready.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn try_outcome(&self) -> Option<TaskOutcome> {
        if !self.is_ready() {
            return None;
        }
        self.outcome.lock().unwrap().clone()
    }

    fn wait(&self) -> TaskOutcome {
        if let Some(outcome) = self.try_outcome() {
            return outcome;
        }
        let mut slot = self.outcome.lock().unwrap();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.cond.wait(slot).unwrap();
        }
    }
}

/// A body parked until its result is first observed.
///
/// Used by the sequential engine: forcing runs the task on the calling
/// thread, exactly once, no matter how many handles race to observe it.
pub(crate) struct DeferredCell {
    task: Mutex<Option<Task>>,
}

impl DeferredCell {
    /// Parks a body; returns the cell and a handle that forces it on
    /// observation.
    pub(crate) fn park<F>(body: F) -> (Arc<Self>, TaskHandle)
    where
        F: FnOnce() + Send + 'static,
    {
        let (task, mut handle) = Task::new(body);
        let cell = Arc::new(Self {
            task: Mutex::new(Some(task)),
        });
        handle.deferred = Some(Arc::clone(&cell));
        (cell, handle)
    }

    /// Runs the parked body if nobody has yet.
    pub(crate) fn force(&self) {
        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            task.run();
        }
    }
}

/// Shared, read-only completion token for one submitted task.
///
/// Transitions once from *pending* to *ready* when the bound task returns,
/// normally or by panic, and never transitions back. Clones observe the
/// same completion; any owner may query or block independently.
#[derive(Clone)]
pub struct TaskHandle {
    completion: Arc<Completion>,
    /// Set only by the sequential engine; observation forces the body.
    deferred: Option<Arc<DeferredCell>>,
}

impl TaskHandle {
    /// Returns true once the bound task has finished.
    ///
    /// Non-blocking, and for deferred handles non-forcing: a sequential
    /// task not yet run reports not-ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.completion.is_ready()
    }

    /// Returns the outcome if the task has finished, without blocking or
    /// forcing deferred work.
    #[must_use]
    pub fn try_outcome(&self) -> Option<TaskOutcome> {
        self.completion.try_outcome()
    }

    /// Blocks until the bound task has finished and returns its outcome.
    ///
    /// On a handle from the sequential engine this runs the task on the
    /// calling thread if it has not run yet.
    pub fn wait(&self) -> TaskOutcome {
        if let Some(cell) = &self.deferred {
            cell.force();
        }
        self.completion.wait()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("ready", &self.is_ready())
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}
