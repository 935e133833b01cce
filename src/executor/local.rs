//! Per-thread task buffers for the run loop's lock-free push path.
//!
//! A thread that enters a runner's run loop gets a private [`TaskQueue`]
//! keyed by the runner's id. Pushes made on that thread while it is inside
//! the loop land in the buffer without touching the shared lock; the loop
//! moves the whole buffer into the shared queue after every task.

use super::queue::TaskQueue;
use super::runner::{RunnerCore, RunnerId};
use super::task::Job;
use crate::error::{Error, Result};
use std::cell::RefCell;

thread_local! {
    static BUFFERS: RefCell<Vec<Buffer>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
struct Buffer {
    runner: RunnerId,
    // nested run() calls on the same thread share one buffer
    depth: usize,
    queue: TaskQueue,
}

/// Registration of the current thread's buffer for one runner. Dropping the
/// outermost guard flushes any leftover jobs and releases the buffer.
pub(crate) struct LocalGuard<'a> {
    core: &'a RunnerCore,
}

impl<'a> LocalGuard<'a> {
    pub fn enter(core: &'a RunnerCore) -> Result<Self> {
        let id = core.id();
        BUFFERS
            .try_with(|buffers| {
                let mut buffers = buffers.borrow_mut();
                match buffers.iter_mut().find(|b| b.runner == id) {
                    Some(buffer) => buffer.depth += 1,
                    None => {
                        tracing::trace!(runner = %core.name(), "registering thread-local buffer");
                        buffers.push(Buffer {
                            runner: id,
                            depth: 1,
                            queue: TaskQueue::new(),
                        });
                    }
                }
            })
            .map_err(|e| Error::os(format!("thread-local storage unavailable: {}", e)))?;

        Ok(Self { core })
    }
}

impl Drop for LocalGuard<'_> {
    fn drop(&mut self) {
        let id = self.core.id();
        let leftover = BUFFERS
            .try_with(|buffers| {
                let mut buffers = buffers.borrow_mut();
                let pos = buffers.iter().position(|b| b.runner == id)?;
                buffers[pos].depth -= 1;
                if buffers[pos].depth == 0 {
                    Some(buffers.swap_remove(pos).queue)
                } else {
                    None
                }
            })
            .ok()
            .flatten();

        if let Some(mut queue) = leftover {
            if !queue.is_empty() {
                self.core.flush(&mut queue);
            }
        }
    }
}

/// Append `job` to the current thread's buffer for `runner`. Hands the job
/// back if the thread is not inside that runner's run loop.
pub(crate) fn try_push(runner: RunnerId, job: Job) -> std::result::Result<(), Job> {
    let mut job = Some(job);
    let _ = BUFFERS.try_with(|buffers| {
        if let Some(buffer) = buffers.borrow_mut().iter_mut().find(|b| b.runner == runner) {
            if let Some(job) = job.take() {
                buffer.queue.push(job);
            }
        }
    });

    job.map_or(Ok(()), Err)
}

/// Take everything buffered on this thread for `runner`.
pub(crate) fn take(runner: RunnerId) -> TaskQueue {
    BUFFERS
        .try_with(|buffers| {
            buffers
                .borrow_mut()
                .iter_mut()
                .find(|b| b.runner == runner)
                .map(|b| b.queue.take())
                .unwrap_or_default()
        })
        .unwrap_or_default()
}

/// Whether the current thread holds a buffer for `runner`.
pub(crate) fn is_registered(runner: RunnerId) -> bool {
    BUFFERS
        .try_with(|buffers| buffers.borrow().iter().any(|b| b.runner == runner))
        .unwrap_or(false)
}
