//! Unsynchronized FIFO of owned tasks.
//!
//! Every queue in the crate (the runner's shared queue, the per-thread
//! buffers and each strand's private queue) is one of these behind whatever
//! lock its owner uses.

use super::task::Job;
use crate::error::Result;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    jobs: VecDeque<Job>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            jobs: VecDeque::new(),
        }
    }

    /// Create a queue with room for `capacity` jobs, reporting allocation
    /// failure instead of aborting.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut jobs = VecDeque::new();
        jobs.try_reserve(capacity)?;
        Ok(Self { jobs })
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Move every job of `other` to the tail of `self`, keeping order.
    /// Returns the number of jobs moved.
    pub fn append(&mut self, other: &mut TaskQueue) -> usize {
        let moved = other.jobs.len();
        self.jobs.append(&mut other.jobs);
        moved
    }

    /// Take all jobs out, leaving the queue empty.
    pub fn take(&mut self) -> TaskQueue {
        std::mem::take(self)
    }
}
