//! Strands: ordered, non-concurrent execution on top of a [`Runner`].
//!
//! A strand keeps its own queue and submits a single "pump" task to the
//! runner. Each time the pump runs it executes exactly one queued task and
//! resubmits itself if more are waiting, so at most one strand task is ever
//! in flight and tasks run in the order their pushes took the strand lock.
//! No thread is dedicated to a strand.
//!
//! The pump counts as armed from the push that submits it until the task it
//! popped has finished, and both the check and the update happen under the
//! strand lock.

use super::queue::TaskQueue;
use super::runner::{Runner, RunnerCore};
use super::task::{self, Job, Task};
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct State {
    queue: TaskQueue,
    // a pump is queued in the runner or executing
    armed: bool,
}

struct StrandInner {
    runner: Arc<RunnerCore>,
    state: Mutex<State>,
}

impl StrandInner {
    fn push(self: &Arc<Self>, job: Job) {
        let arm = {
            let mut state = self.state.lock();
            state.queue.push(job);
            !std::mem::replace(&mut state.armed, true)
        };

        if arm {
            tracing::trace!(runner = %self.runner.name(), "arming strand pump");
            self.submit_pump();
        }
    }

    fn submit_pump(self: &Arc<Self>) {
        self.runner.submit(Job::internal(Pump {
            strand: self.clone(),
        }));
    }

    fn pump(self: &Arc<Self>) {
        let job = self.state.lock().queue.pop();

        match job {
            Some(job) => self.runner.execute(job),
            None => {
                debug_assert!(false, "strand pump ran with an empty queue");
                tracing::error!(runner = %self.runner.name(), "strand pump ran with an empty queue");
            }
        }

        // Stay armed until the task has finished so a push that lands while
        // it runs cannot start a second pump.
        let more = {
            let mut state = self.state.lock();
            let more = !state.queue.is_empty();
            state.armed = more;
            more
        };

        if more {
            self.submit_pump();
        }
    }
}

/// The strand's self-resubmitting pump task.
struct Pump {
    strand: Arc<StrandInner>,
}

impl Task for Pump {
    fn execute(&mut self) {
        self.strand.pump();
    }
}

/// Serializes tasks submitted through it onto a [`Runner`].
///
/// Tasks pushed to the same strand never run concurrently and always run in
/// push order, whichever worker threads the runner uses for them.
///
/// Dropping a strand does not wait for or discard tasks already pushed;
/// they keep draining through the runner.
pub struct Strand {
    inner: Arc<StrandInner>,
}

impl Strand {
    pub fn new(runner: &Runner) -> Result<Self> {
        let core = runner.core().clone();
        let queue = TaskQueue::with_capacity(core.config().queue_capacity)?;

        tracing::debug!(runner = %core.name(), "strand created");

        Ok(Self {
            inner: Arc::new(StrandInner {
                runner: core,
                state: Mutex::new(State {
                    queue,
                    armed: false,
                }),
            }),
        })
    }

    /// Submit a task. It runs after every task previously pushed here.
    pub fn push<T: Task>(&self, task: T) {
        self.inner.push(Job::new(task));
    }

    pub fn push_boxed(&self, task: Box<dyn Task>) {
        self.inner.push(Job::from_boxed(task));
    }

    pub fn push_fn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(task::from_fn(f));
    }

    /// Tasks waiting in the strand. The task a pump is currently executing
    /// is no longer counted.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().queue.is_empty()
    }

    /// Whether a pump is currently queued in the runner or executing.
    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().armed
    }
}

impl std::fmt::Debug for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strand")
            .field("runner", &self.inner.runner.name())
            .field("queued", &self.len())
            .field("armed", &self.is_armed())
            .finish()
    }
}
