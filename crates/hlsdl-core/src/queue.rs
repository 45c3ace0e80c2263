//! Job distribution between the coordinator and the fetch workers.
//!
//! [`SegmentQueue`] hands every pushed job to exactly one `pop` caller.
//! [`Outstanding`] counts jobs that have not been reported back yet; the
//! coordinator waits on it to know the download phase is over.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::job::DownloadJob;

/// Returned by [`SegmentQueue::pop`] once every expected job has been handed out
/// (or the queue was closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("segment queue drained")]
pub struct EmptyQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("pushing {pushed} more jobs would exceed the expected total of {expected}")]
    TooManyJobs { expected: usize, pushed: usize },
}

struct QueueState {
    pending: VecDeque<DownloadJob>,
    pushed: usize,
    closed: bool,
}

pub struct SegmentQueue {
    expected: usize,
    state: Mutex<QueueState>,
    available: Condvar,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SegmentQueue {
    /// Empty queue that will receive `expected` jobs in total.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            state: Mutex::new(QueueState {
                pending: VecDeque::with_capacity(expected),
                pushed: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a batch in order. Rejects the whole batch if it would exceed the expected total.
    pub fn push(&self, jobs: Vec<DownloadJob>) -> Result<(), QueueError> {
        let mut st = lock(&self.state);
        if st.pushed + jobs.len() > self.expected {
            return Err(QueueError::TooManyJobs {
                expected: self.expected,
                pushed: jobs.len(),
            });
        }
        st.pushed += jobs.len();
        st.pending.extend(jobs);
        drop(st);
        self.available.notify_all();
        Ok(())
    }

    /// Next job in FIFO order. Blocks while the queue is empty but more jobs are expected.
    pub fn pop(&self) -> Result<DownloadJob, EmptyQueue> {
        let mut st = lock(&self.state);
        loop {
            if st.closed {
                return Err(EmptyQueue);
            }
            if let Some(job) = st.pending.pop_front() {
                return Ok(job);
            }
            if st.pushed >= self.expected {
                return Err(EmptyQueue);
            }
            st = self
                .available
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Jobs not handed out yet, including ones not pushed yet.
    pub fn remaining(&self) -> usize {
        let st = lock(&self.state);
        if st.closed {
            return 0;
        }
        st.pending.len() + (self.expected - st.pushed)
    }

    /// Drop pending jobs; every current and future `pop` returns [`EmptyQueue`].
    pub fn close(&self) {
        let mut st = lock(&self.state);
        st.closed = true;
        st.pending.clear();
        drop(st);
        self.available.notify_all();
    }
}

/// Synchronized count of jobs not yet reported as done (staged or failed).
pub struct Outstanding {
    count: Mutex<usize>,
    zero: Condvar,
}

impl Outstanding {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    pub fn get(&self) -> usize {
        *lock(&self.count)
    }

    /// Report one job as done.
    pub fn complete_one(&self) {
        let mut c = lock(&self.count);
        *c = c.saturating_sub(1);
        if *c == 0 {
            self.zero.notify_all();
        }
    }

    /// Block until every job has been reported.
    pub fn wait_zero(&self) {
        let c = lock(&self.count);
        let _c = self
            .zero
            .wait_while(c, |c| *c > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}
