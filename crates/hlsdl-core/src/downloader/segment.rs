//! One job: fetch, decrypt, stage.

use std::io;
use std::path::PathBuf;

use crate::crypto::DecryptError;
use crate::job::DownloadJob;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::staging::stage_file;
use crate::transport::Transport;

/// Why a segment could not be staged.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),
    #[error("decrypt: {0}")]
    Decrypt(#[from] DecryptError),
    #[error("stage {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Runs one job to completion and returns the number of plaintext bytes staged.
pub(super) fn process_job(
    job: &DownloadJob,
    transport: &dyn Transport,
    retry: &RetryPolicy,
) -> Result<usize, SegmentError> {
    let seg = &job.segment;
    let body = run_with_retry(retry, &seg.source_uri, || transport.fetch(&seg.source_uri))?;
    let plain = match &job.key {
        Some(key) => key.decrypt(seg.sequence, &body)?,
        None => body,
    };
    stage_file(&seg.staging_path, &plain).map_err(|source| SegmentError::Stage {
        path: seg.staging_path.clone(),
        source,
    })?;
    Ok(plain.len())
}
