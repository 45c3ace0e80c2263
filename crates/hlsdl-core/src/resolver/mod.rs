//! Resolver interface: turns a manifest locator into an ordered segment list.
//!
//! The download engine only depends on the [`Resolver`] trait and the
//! [`ResolvedStream`] it returns; manifest syntax and variant selection stay
//! behind it. [`HlsResolver`] is the HLS implementation.

mod parse;

use std::fmt;

use url::Url;

use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::transport::Transport;

use self::parse::{Manifest, ParsedKey, ParsedSegment};

/// Segment encryption methods as declared by `#EXT-X-KEY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionMethod {
    /// AES-128-CBC over the whole segment, PKCS#7 padded.
    Aes128,
    /// Sample-level AES (not supported for download).
    SampleAes,
    Other(String),
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionMethod::Aes128 => write!(f, "AES-128"),
            EncryptionMethod::SampleAes => write!(f, "SAMPLE-AES"),
            EncryptionMethod::Other(m) => write!(f, "{}", m),
        }
    }
}

/// A key as declared by the playlist, before its bytes are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub method: EncryptionMethod,
    /// Absolute key URI.
    pub uri: String,
    /// Explicit IV; when absent the segment's media sequence number is used.
    pub iv: Option<[u8; 16]>,
}

/// One media segment of the selected variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSegment {
    /// Media sequence number.
    pub sequence: u64,
    /// Absolute segment URI.
    pub uri: String,
    /// Index into [`ResolvedStream::keys`].
    pub key: Option<usize>,
}

/// The playable variant: segments in merge order plus the distinct keys they use.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    /// URI of the media playlist the segments came from.
    pub playlist_uri: String,
    pub segments: Vec<PlaylistSegment>,
    pub keys: Vec<KeySpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Master playlist without variants, or media playlist without segments.
    #[error("no playable variant")]
    NoPlayableVariant,
    #[error("fetch playlist {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: FetchError,
    },
    #[error("invalid playlist: {0}")]
    InvalidPlaylist(String),
    #[error("invalid URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported encryption method {0}")]
    UnsupportedEncryption(String),
}

/// Implemented by anything that can produce a [`ResolvedStream`] for a locator.
pub trait Resolver: Send + Sync {
    fn resolve(&self, locator: &str) -> Result<ResolvedStream, ResolveError>;
}

/// HLS resolver: fetches the manifest, follows the first variant of a master
/// playlist, and resolves every URI against the playlist it appeared in.
pub struct HlsResolver<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: Transport> HlsResolver<T> {
    pub fn new(transport: T, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    fn fetch_manifest(&self, url: &Url) -> Result<Manifest, ResolveError> {
        let body = run_with_retry(&self.retry, url.as_str(), || self.transport.fetch(url.as_str()))
            .map_err(|source| ResolveError::Fetch {
                uri: url.to_string(),
                source,
            })?;
        parse::parse_manifest(&body)
    }
}

impl<T: Transport> Resolver for HlsResolver<T> {
    fn resolve(&self, locator: &str) -> Result<ResolvedStream, ResolveError> {
        let base = parse_url(locator)?;
        match self.fetch_manifest(&base)? {
            Manifest::Media(segments) => build_stream(&base, segments),
            Manifest::Master(variants) => {
                let first = variants.first().ok_or(ResolveError::NoPlayableVariant)?;
                let media_url = join(&base, first)?;
                tracing::info!(
                    variants = variants.len(),
                    "master playlist, selecting first variant {}",
                    media_url
                );
                match self.fetch_manifest(&media_url)? {
                    Manifest::Media(segments) => build_stream(&media_url, segments),
                    Manifest::Master(_) => Err(ResolveError::InvalidPlaylist(format!(
                        "variant {} is itself a master playlist",
                        media_url
                    ))),
                }
            }
        }
    }
}

fn parse_url(uri: &str) -> Result<Url, ResolveError> {
    Url::parse(uri).map_err(|source| ResolveError::InvalidUri {
        uri: uri.to_string(),
        source,
    })
}

fn join(base: &Url, reference: &str) -> Result<Url, ResolveError> {
    base.join(reference).map_err(|source| ResolveError::InvalidUri {
        uri: reference.to_string(),
        source,
    })
}

fn build_stream(
    playlist: &Url,
    parsed: Vec<ParsedSegment>,
) -> Result<ResolvedStream, ResolveError> {
    if parsed.is_empty() {
        return Err(ResolveError::NoPlayableVariant);
    }

    let mut keys: Vec<KeySpec> = Vec::new();
    let mut segments = Vec::with_capacity(parsed.len());
    for seg in parsed {
        let key = match seg.key {
            Some(k) => Some(intern_key(&mut keys, playlist, k)?),
            None => None,
        };
        segments.push(PlaylistSegment {
            sequence: seg.sequence,
            uri: join(playlist, &seg.uri)?.to_string(),
            key,
        });
    }

    Ok(ResolvedStream {
        playlist_uri: playlist.to_string(),
        segments,
        keys,
    })
}

/// Returns the index of `k` in `keys`, appending it first if it is new.
fn intern_key(
    keys: &mut Vec<KeySpec>,
    playlist: &Url,
    k: ParsedKey,
) -> Result<usize, ResolveError> {
    if k.method != EncryptionMethod::Aes128 {
        return Err(ResolveError::UnsupportedEncryption(k.method.to_string()));
    }
    let spec = KeySpec {
        method: k.method,
        uri: join(playlist, &k.uri)?.to_string(),
        iv: k.iv,
    };
    if let Some(pos) = keys.iter().position(|existing| *existing == spec) {
        return Ok(pos);
    }
    keys.push(spec);
    Ok(keys.len() - 1)
}
