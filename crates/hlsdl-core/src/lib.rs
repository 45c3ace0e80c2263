pub mod config;
pub mod logging;

pub mod assembler;
pub mod checksum;
pub mod coordinator;
pub mod crypto;
pub mod downloader;
pub mod job;
pub mod keys;
pub mod naming;
pub mod queue;
pub mod resolver;
pub mod retry;
pub mod staging;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use coordinator::{
    DownloadCoordinator, DownloadError, DownloadReport, DownloadRequest, DownloadSettings,
};
