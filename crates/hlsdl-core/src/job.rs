//! Per-segment work items.

use std::path::PathBuf;
use std::sync::Arc;

use crate::crypto::EncryptionKey;

/// One segment of the selected variant, placed in the merge order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Dense 0-based merge position.
    pub index: usize,
    /// Media sequence number (default AES IV).
    pub sequence: u64,
    pub source_uri: String,
    /// Index into the stream's key list.
    pub key: Option<usize>,
    pub staging_path: PathBuf,
}

/// A descriptor with its key already fetched. Consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub segment: SegmentDescriptor,
    pub key: Option<Arc<EncryptionKey>>,
}

impl DownloadJob {
    pub fn index(&self) -> usize {
        self.segment.index
    }
}
