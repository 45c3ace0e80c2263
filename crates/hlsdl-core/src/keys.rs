//! Key prefetch: fetch each distinct key URI once before any segment work starts.

use std::collections::HashMap;
use std::sync::Arc;

use crate::crypto::EncryptionKey;
use crate::resolver::KeySpec;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::transport::Transport;

/// A key URI could not be fetched.
#[derive(Debug, thiserror::Error)]
#[error("fetch key {uri}: {source}")]
pub struct KeyFetchError {
    pub uri: String,
    #[source]
    pub source: FetchError,
}

/// Fetch key bytes for every declared key; the result is index-aligned with `specs`.
/// Specs that share a URI (different IVs) share one request.
pub fn fetch_keys(
    transport: &dyn Transport,
    retry: &RetryPolicy,
    specs: &[KeySpec],
) -> Result<Vec<Arc<EncryptionKey>>, KeyFetchError> {
    let mut bytes_by_uri: HashMap<&str, Vec<u8>> = HashMap::new();
    let mut keys = Vec::with_capacity(specs.len());
    for spec in specs {
        if !bytes_by_uri.contains_key(spec.uri.as_str()) {
            let body = run_with_retry(retry, &spec.uri, || transport.fetch(&spec.uri)).map_err(
                |source| KeyFetchError {
                    uri: spec.uri.clone(),
                    source,
                },
            )?;
            tracing::debug!(uri = %spec.uri, len = body.len(), "fetched key");
            bytes_by_uri.insert(spec.uri.as_str(), body);
        }
        let key_bytes = bytes_by_uri
            .get(spec.uri.as_str())
            .cloned()
            .unwrap_or_default();
        keys.push(Arc::new(EncryptionKey {
            method: spec.method.clone(),
            key_bytes,
            key_uri: spec.uri.clone(),
            iv: spec.iv,
        }));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::EncryptionMethod;
    use crate::test_support::MapTransport;

    fn spec(uri: &str, iv: Option<[u8; 16]>) -> KeySpec {
        KeySpec {
            method: EncryptionMethod::Aes128,
            uri: uri.to_string(),
            iv,
        }
    }

    #[test]
    fn shared_uri_fetched_once() {
        let t = MapTransport::new()
            .with("https://k.example/a", [1u8; 16])
            .with("https://k.example/b", [2u8; 16]);
        let specs = vec![
            spec("https://k.example/a", None),
            spec("https://k.example/a", Some([9; 16])),
            spec("https://k.example/b", None),
        ];
        let keys = fetch_keys(&t, &RetryPolicy::no_retry(), &specs).unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].key_bytes, vec![1u8; 16]);
        assert_eq!(keys[1].key_bytes, vec![1u8; 16]);
        assert_eq!(keys[1].iv, Some([9; 16]));
        assert_eq!(keys[2].key_bytes, vec![2u8; 16]);
        assert_eq!(t.fetch_count("https://k.example/a"), 1);
        assert_eq!(t.fetch_count("https://k.example/b"), 1);
    }

    #[test]
    fn missing_key_names_uri() {
        let t = MapTransport::new();
        let err = fetch_keys(&t, &RetryPolicy::no_retry(), &[spec("https://k.example/x", None)])
            .unwrap_err();
        assert_eq!(err.uri, "https://k.example/x");
        assert!(matches!(err.source, FetchError::Http { status: 404, .. }));
    }
}
