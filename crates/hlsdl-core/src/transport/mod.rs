//! Raw byte-fetch transport.
//!
//! Everything the engine downloads (playlists, keys, segments) goes through
//! [`Transport`], so tests can swap the network for an in-memory fake.

mod http;

pub use http::{CurlOptions, CurlTransport};

use crate::retry::FetchError;

/// Fetches the full body behind a URI. Must be shareable across worker threads.
pub trait Transport: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(uri)
    }
}
