//! Ordered reassembly of staged segments into the output file.
//!
//! The assembler owns a cursor starting at index 0. Whenever the segment at
//! the cursor has been signalled as staged it reads the staged file, applies
//! [`PayloadTrim`], appends the payload to the output, and advances. It stops
//! when the cursor reaches the total segment count, when the segment at the
//! cursor is reported failed, or when every worker has exited without
//! delivering it.

mod ready;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::downloader::{SegmentError, StageEvent};
use crate::staging::StagingArea;

pub use ready::ReadySet;

/// Bytes removed from both ends of each staged segment before it is appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadTrim {
    pub leading: usize,
    pub trailing: usize,
}

impl PayloadTrim {
    pub fn new(leading: usize, trailing: usize) -> Self {
        Self { leading, trailing }
    }

    /// Payload left after trimming. Segments shorter than the trim become empty.
    pub fn apply<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let end = data.len().saturating_sub(self.trailing);
        if self.leading >= end {
            return &[];
        }
        &data[self.leading..end]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// The segment at the cursor failed permanently.
    #[error("segment {index} unavailable: {reason}")]
    SegmentUnavailable {
        index: usize,
        #[source]
        reason: SegmentError,
    },
    /// Every worker exited and the segment at the cursor was never signalled.
    #[error("segment {index} was never delivered")]
    Stalled { index: usize },
    #[error("create output {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read staged segment {index}: {source}")]
    ReadStaged {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("append segment {index}: {source}")]
    Append {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("finish output: {0}")]
    Finish(#[source] io::Error),
}

/// Result of a completed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub segments: usize,
    pub bytes_written: u64,
}

pub struct Assembler {
    total: usize,
    staging: StagingArea,
    output: PathBuf,
    trim: PayloadTrim,
    poll: Duration,
    events: Receiver<StageEvent>,
}

impl Assembler {
    pub fn new(
        total: usize,
        staging: StagingArea,
        output: PathBuf,
        trim: PayloadTrim,
        poll: Duration,
        events: Receiver<StageEvent>,
    ) -> Self {
        Self {
            total,
            staging,
            output,
            trim,
            poll,
            events,
        }
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> io::Result<JoinHandle<Result<MergeSummary, AssemblyError>>> {
        thread::Builder::new()
            .name("hlsdl-assemble".to_string())
            .spawn(move || self.run())
    }

    /// Merge all segments in index order. Blocks until done or failed.
    pub fn run(self) -> Result<MergeSummary, AssemblyError> {
        let file = File::create(&self.output).map_err(|source| AssemblyError::CreateOutput {
            path: self.output.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        let mut ready = ReadySet::new(self.total);
        let mut failed: Vec<Option<SegmentError>> = Vec::new();
        failed.resize_with(self.total, || None);
        let mut cursor = 0usize;
        let mut written = 0u64;

        while cursor < self.total {
            if ready.contains(cursor) {
                written += self.append(&mut out, cursor)?;
                cursor += 1;
                tracing::debug!(merged = cursor, total = self.total, "segment merged");
                continue;
            }
            if let Some(reason) = failed[cursor].take() {
                return Err(AssemblyError::SegmentUnavailable {
                    index: cursor,
                    reason,
                });
            }
            match self.events.recv_timeout(self.poll) {
                Ok(StageEvent::Staged { index, bytes }) => {
                    tracing::trace!(index, bytes, cursor, "staged segment signalled");
                    if !ready.insert(index) {
                        tracing::warn!(index, "ignoring completion for unknown segment");
                    }
                }
                Ok(StageEvent::Failed { index, error }) => {
                    if let Some(slot) = failed.get_mut(index) {
                        *slot = Some(error);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::trace!(cursor, "waiting for segment");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!(
                        cursor,
                        ready_ahead = ready.count().saturating_sub(cursor),
                        "all workers gone before segment was delivered"
                    );
                    return Err(AssemblyError::Stalled { index: cursor });
                }
            }
        }

        out.flush().map_err(AssemblyError::Finish)?;
        let file = out
            .into_inner()
            .map_err(|e| AssemblyError::Finish(e.into_error()))?;
        file.sync_all().map_err(AssemblyError::Finish)?;
        tracing::info!(
            segments = self.total,
            bytes = written,
            "merged into {}",
            self.output.display()
        );
        Ok(MergeSummary {
            segments: self.total,
            bytes_written: written,
        })
    }

    fn append(&self, out: &mut impl Write, index: usize) -> Result<u64, AssemblyError> {
        let data = fs::read(self.staging.segment_path(index))
            .map_err(|source| AssemblyError::ReadStaged { index, source })?;
        let payload = self.trim.apply(&data);
        out.write_all(payload)
            .map_err(|source| AssemblyError::Append { index, source })?;
        Ok(payload.len() as u64)
    }
}
