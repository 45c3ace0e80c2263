//! Fetch worker pool.
//!
//! A fixed set of OS threads pulls [`DownloadJob`]s from the shared
//! [`SegmentQueue`], fetches and decrypts each segment, stages the plaintext,
//! and reports the outcome on an mpsc channel. Workers never coordinate with
//! each other beyond the queue; completion order is arbitrary.

mod segment;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::queue::{Outstanding, SegmentQueue};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

pub use segment::SegmentError;

/// Completion signal sent by a worker for every job it finishes.
#[derive(Debug)]
pub enum StageEvent {
    /// Plaintext is fully written at the job's staging path.
    Staged { index: usize, bytes: usize },
    /// The segment could not be produced; nothing is staged for it.
    Failed { index: usize, error: SegmentError },
}

impl StageEvent {
    pub fn index(&self) -> usize {
        match self {
            StageEvent::Staged { index, .. } | StageEvent::Failed { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Upper bound on worker threads.
    pub workers: usize,
    /// Pause after each finished job.
    pub delay: Duration,
    pub retry: RetryPolicy,
}

/// Shared state handed to every worker thread.
pub struct PoolContext {
    pub queue: Arc<SegmentQueue>,
    pub transport: Arc<dyn Transport>,
    pub outstanding: Arc<Outstanding>,
    pub abort: Arc<AtomicBool>,
}

/// Worker thread panicked; its in-flight job was never reported.
#[derive(Debug, thiserror::Error)]
#[error("{count} fetch worker(s) panicked")]
pub struct WorkerPanicked {
    pub count: usize,
}

pub struct FetchWorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl FetchWorkerPool {
    /// Start `min(settings.workers, jobs remaining)` workers (at least one when any job is queued).
    /// `events` is moved in; the channel disconnects once every worker has exited.
    pub fn spawn(
        settings: &WorkerSettings,
        ctx: PoolContext,
        events: Sender<StageEvent>,
    ) -> io::Result<Self> {
        let ctx = Arc::new(ctx);
        let count = settings.workers.max(1).min(ctx.queue.remaining());
        tracing::debug!(workers = count, "starting fetch workers");

        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let worker_ctx = Arc::clone(&ctx);
            let tx = events.clone();
            let delay = settings.delay;
            let retry = settings.retry;
            let spawned = thread::Builder::new()
                .name(format!("hlsdl-fetch-{}", id))
                .spawn(move || worker_loop(&worker_ctx, &tx, delay, &retry));
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => {
                    ctx.abort.store(true, Ordering::Relaxed);
                    ctx.queue.close();
                    drop(events);
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    pub fn join(self) -> Result<(), WorkerPanicked> {
        let count = self
            .handles
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count();
        if count > 0 {
            return Err(WorkerPanicked { count });
        }
        Ok(())
    }
}

fn worker_loop(
    ctx: &PoolContext,
    events: &Sender<StageEvent>,
    delay: Duration,
    retry: &RetryPolicy,
) {
    loop {
        if ctx.abort.load(Ordering::Relaxed) {
            break;
        }
        let job = match ctx.queue.pop() {
            Ok(job) => job,
            Err(_) => break,
        };
        let index = job.index();
        let event = match segment::process_job(&job, ctx.transport.as_ref(), retry) {
            Ok(bytes) => {
                tracing::debug!(index, bytes, "segment staged");
                StageEvent::Staged { index, bytes }
            }
            Err(error) => {
                tracing::warn!(index, uri = %job.segment.source_uri, "segment failed: {}", error);
                StageEvent::Failed { index, error }
            }
        };
        // The assembler may already have stopped.
        let _ = events.send(event);
        ctx.outstanding.complete_one();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}
