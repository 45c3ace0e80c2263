//! Top-level download orchestration.
//!
//! [`DownloadCoordinator::run`] resolves the locator, fetches keys, creates
//! the staging area, fills the [`SegmentQueue`], and runs the fetch worker
//! pool and the assembler concurrently. The staging area is removed only
//! after a complete merge; on failure it is left for inspection.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Result;

use crate::assembler::{Assembler, AssemblyError, PayloadTrim};
use crate::config::HlsdlConfig;
use crate::downloader::{FetchWorkerPool, PoolContext, WorkerPanicked, WorkerSettings};
use crate::job::{DownloadJob, SegmentDescriptor};
use crate::keys::{fetch_keys, KeyFetchError};
use crate::naming;
use crate::queue::{Outstanding, QueueError, SegmentQueue};
use crate::resolver::{HlsResolver, ResolveError, ResolvedStream, Resolver};
use crate::retry::RetryPolicy;
use crate::staging::{Cleanup, StagingArea};
use crate::transport::{CurlOptions, CurlTransport, Transport};

/// What to download and what to call the result.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub locator: String,
    /// Output file name; sanitized. Defaults to a local timestamp.
    pub file_name: Option<String>,
}

impl DownloadRequest {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub workers: usize,
    pub worker_delay: Duration,
    pub merge_poll: Duration,
    pub trim: PayloadTrim,
    pub retry: RetryPolicy,
    pub output_dir: PathBuf,
    pub staging_root: PathBuf,
}

impl DownloadSettings {
    /// Built-in defaults with explicit directories.
    pub fn new(output_dir: PathBuf, staging_root: PathBuf) -> Self {
        let cfg = HlsdlConfig::default();
        Self {
            workers: cfg.workers,
            worker_delay: cfg.worker_delay(),
            merge_poll: cfg.merge_poll(),
            trim: PayloadTrim::new(cfg.strip_leading_bytes, cfg.strip_trailing_bytes),
            retry: RetryPolicy::from(&cfg.retry_config()),
            output_dir,
            staging_root,
        }
    }

    pub fn from_config(cfg: &HlsdlConfig) -> Result<Self> {
        Ok(Self {
            workers: cfg.workers,
            worker_delay: cfg.worker_delay(),
            merge_poll: cfg.merge_poll(),
            trim: PayloadTrim::new(cfg.strip_leading_bytes, cfg.strip_trailing_bytes),
            retry: RetryPolicy::from(&cfg.retry_config()),
            output_dir: cfg.resolved_output_dir()?,
            staging_root: cfg.resolved_staging_dir()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub output_path: PathBuf,
    pub segments: usize,
    pub bytes_written: u64,
    /// `None` when removing the staging directory failed (the output is still complete).
    pub staging_cleanup: Option<Cleanup>,
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("resolve: {0}")]
    Resolution(#[from] ResolveError),
    #[error(transparent)]
    KeyUnavailable(#[from] KeyFetchError),
    #[error("prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("start {what} thread: {source}")]
    Spawn {
        what: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("assemble: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("assembler thread panicked")]
    AssemblerPanicked,
    #[error(transparent)]
    Workers(#[from] WorkerPanicked),
}

pub struct DownloadCoordinator {
    resolver: Box<dyn Resolver>,
    transport: Arc<dyn Transport>,
    settings: DownloadSettings,
}

impl DownloadCoordinator {
    pub fn new(
        resolver: Box<dyn Resolver>,
        transport: Arc<dyn Transport>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            resolver,
            transport,
            settings,
        }
    }

    /// HLS over libcurl with everything taken from `cfg`.
    pub fn from_config(cfg: &HlsdlConfig) -> Result<Self> {
        let settings = DownloadSettings::from_config(cfg)?;
        let transport: Arc<dyn Transport> = Arc::new(CurlTransport::new(CurlOptions::from(cfg)));
        let resolver = HlsResolver::new(Arc::clone(&transport), settings.retry);
        Ok(Self::new(Box::new(resolver), transport, settings))
    }

    /// Resolve only; nothing is written.
    pub fn probe(&self, locator: &str) -> Result<ResolvedStream, ResolveError> {
        self.resolver.resolve(locator)
    }

    /// Download `request` into `<output_dir>/<file name>`.
    pub fn run(&self, request: &DownloadRequest) -> Result<DownloadReport, DownloadError> {
        let stream = self.resolver.resolve(&request.locator)?;
        let total = stream.segments.len();
        let file_name = naming::resolve_file_name(
            request.file_name.as_deref(),
            chrono::Local::now().naive_local(),
        );
        tracing::info!(
            segments = total,
            keys = stream.keys.len(),
            playlist = %stream.playlist_uri,
            "downloading into {}",
            file_name
        );

        let keys = fetch_keys(self.transport.as_ref(), &self.settings.retry, &stream.keys)?;

        let staging = StagingArea::for_output(&self.settings.staging_root, &file_name);
        staging.create().map_err(|source| DownloadError::Prepare {
            path: staging.dir().to_path_buf(),
            source,
        })?;
        fs::create_dir_all(&self.settings.output_dir).map_err(|source| DownloadError::Prepare {
            path: self.settings.output_dir.clone(),
            source,
        })?;
        let output_path = self.settings.output_dir.join(&file_name);

        let jobs: Vec<DownloadJob> = stream
            .segments
            .iter()
            .enumerate()
            .map(|(index, seg)| DownloadJob {
                segment: SegmentDescriptor {
                    index,
                    sequence: seg.sequence,
                    source_uri: seg.uri.clone(),
                    key: seg.key,
                    staging_path: staging.segment_path(index),
                },
                key: seg.key.and_then(|k| keys.get(k).cloned()),
            })
            .collect();
        let queue = Arc::new(SegmentQueue::new(total));
        queue.push(jobs)?;

        let outstanding = Arc::new(Outstanding::new(total));
        let abort = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let assembler = Assembler::new(
            total,
            staging.clone(),
            output_path.clone(),
            self.settings.trim,
            self.settings.merge_poll,
            rx,
        )
        .spawn()
        .map_err(|source| DownloadError::Spawn {
            what: "assembler",
            source,
        })?;

        let worker_settings = WorkerSettings {
            workers: self.settings.workers,
            delay: self.settings.worker_delay,
            retry: self.settings.retry,
        };
        let ctx = PoolContext {
            queue: Arc::clone(&queue),
            transport: Arc::clone(&self.transport),
            outstanding: Arc::clone(&outstanding),
            abort: Arc::clone(&abort),
        };
        let pool = FetchWorkerPool::spawn(&worker_settings, ctx, tx).map_err(|source| {
            DownloadError::Spawn {
                what: "fetch worker",
                source,
            }
        })?;

        let merged = assembler
            .join()
            .map_err(|_| DownloadError::AssemblerPanicked)
            .and_then(|r| r.map_err(DownloadError::from));

        match merged {
            Ok(summary) => {
                outstanding.wait_zero();
                pool.join()?;
                tracing::info!("download and merge complete: {}", output_path.display());
                Ok(DownloadReport {
                    output_path,
                    segments: summary.segments,
                    bytes_written: summary.bytes_written,
                    staging_cleanup: remove_staging(&staging),
                })
            }
            Err(e) => {
                abort.store(true, Ordering::Relaxed);
                queue.close();
                if let Err(p) = pool.join() {
                    tracing::warn!("{}", p);
                }
                tracing::warn!(
                    "download failed ({}); staging kept at {}",
                    e,
                    staging.dir().display()
                );
                Err(e)
            }
        }
    }
}

/// Cleanup after a complete merge. A failure is logged and reported as `None`.
fn remove_staging(staging: &StagingArea) -> Option<Cleanup> {
    match staging.cleanup() {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!(
                "failed to remove staging {}: {}",
                staging.dir().display(),
                e
            );
            None
        }
    }
}
