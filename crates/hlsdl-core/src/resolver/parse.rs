//! Adapter around the `hls_m3u8` crate: turns playlist text into the few
//! facts the resolver needs.

use hls_m3u8::tags::VariantStream as HlsVariantStreamTag;
use hls_m3u8::types::DecryptionKey as HlsDecryptionKey;
use hls_m3u8::types::InitializationVector;
use hls_m3u8::Decryptable;
use hls_m3u8::{MasterPlaylist as HlsMasterPlaylist, MediaPlaylist as HlsMediaPlaylist};

use super::{EncryptionMethod, ResolveError};

/// A playlist is either a list of variants or a list of segments.
#[derive(Debug)]
pub(super) enum Manifest {
    /// Media playlist URIs of the `EXT-X-STREAM-INF` variants, in playlist order.
    Master(Vec<String>),
    Media(Vec<ParsedSegment>),
}

#[derive(Debug, Clone)]
pub(super) struct ParsedSegment {
    pub sequence: u64,
    pub uri: String,
    pub key: Option<ParsedKey>,
}

#[derive(Debug, Clone)]
pub(super) struct ParsedKey {
    pub method: EncryptionMethod,
    pub uri: String,
    pub iv: Option<[u8; 16]>,
}

pub(super) fn parse_manifest(data: &[u8]) -> Result<Manifest, ResolveError> {
    let input = std::str::from_utf8(data)
        .map_err(|e| ResolveError::InvalidPlaylist(format!("invalid UTF-8: {}", e)))?;
    if input.contains("#EXT-X-STREAM-INF") || input.contains("#EXT-X-I-FRAME-STREAM-INF") {
        parse_master(input).map(Manifest::Master)
    } else {
        parse_media(input).map(Manifest::Media)
    }
}

fn parse_master(input: &str) -> Result<Vec<String>, ResolveError> {
    let master = HlsMasterPlaylist::try_from(input)
        .map_err(|e| ResolveError::InvalidPlaylist(format!("master playlist: {}", e)))?;

    // I-frame-only renditions cannot be concatenated into a playable file.
    Ok(master
        .variant_streams
        .iter()
        .filter_map(|vs| match vs {
            HlsVariantStreamTag::ExtXStreamInf { uri, .. } => Some(uri.to_string()),
            HlsVariantStreamTag::ExtXIFrame { .. } => None,
        })
        .collect())
}

fn parse_media(input: &str) -> Result<Vec<ParsedSegment>, ResolveError> {
    let media = HlsMediaPlaylist::try_from(input)
        .map_err(|e| ResolveError::InvalidPlaylist(format!("media playlist: {}", e)))?;
    let media_sequence = media.media_sequence as u64;

    Ok(media
        .segments
        .iter()
        .enumerate()
        .map(|(position, (_idx, seg))| ParsedSegment {
            sequence: media_sequence + position as u64,
            uri: seg.uri().to_string(),
            key: seg.keys().first().copied().and_then(parsed_key),
        })
        .collect())
}

fn parsed_key(k: &HlsDecryptionKey<'_>) -> Option<ParsedKey> {
    let uri = k.uri().trim();
    if uri.is_empty() {
        return None;
    }
    let method = match &k.method {
        hls_m3u8::types::EncryptionMethod::Aes128 => EncryptionMethod::Aes128,
        hls_m3u8::types::EncryptionMethod::SampleAes => EncryptionMethod::SampleAes,
        other => EncryptionMethod::Other(other.to_string()),
    };
    Some(ParsedKey {
        method,
        uri: uri.to_string(),
        iv: explicit_iv(&k.iv),
    })
}

/// Only an `IV=` attribute counts. `hls_m3u8` fills in the media sequence
/// number when the tag has none; that IV is derived per segment at decrypt time.
fn explicit_iv(iv: &InitializationVector) -> Option<[u8; 16]> {
    match iv {
        InitializationVector::Aes128(bytes) => Some(*bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720
hi/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=640000,RESOLUTION=640x360
lo/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:5
#EXTINF:9.0,
seg0.ts
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x00000000000000000000000000000007
#EXTINF:9.0,
seg1.ts
#EXTINF:4.5,
seg2.ts
#EXT-X-ENDLIST
";

    #[test]
    fn master_lists_variants_in_order() {
        match parse_manifest(MASTER.as_bytes()).unwrap() {
            Manifest::Master(v) => assert_eq!(v, vec!["hi/index.m3u8", "lo/index.m3u8"]),
            Manifest::Media(_) => panic!("expected master"),
        }
    }

    #[test]
    fn media_segments_carry_sequence_and_key() {
        let segs = match parse_manifest(MEDIA.as_bytes()).unwrap() {
            Manifest::Media(s) => s,
            Manifest::Master(_) => panic!("expected media"),
        };
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].sequence, 5);
        assert_eq!(segs[2].sequence, 7);
        assert_eq!(segs[0].uri, "seg0.ts");
        assert!(segs[0].key.is_none());

        let key = segs[1].key.as_ref().expect("seg1 is encrypted");
        assert_eq!(key.method, EncryptionMethod::Aes128);
        assert_eq!(key.uri, "key.bin");
        let mut iv = [0u8; 16];
        iv[15] = 7;
        assert_eq!(key.iv, Some(iv));
        // The key stays in effect for following segments.
        assert_eq!(segs[2].key.as_ref().map(|k| k.uri.as_str()), Some("key.bin"));
    }

    #[test]
    fn key_without_iv_attribute_has_no_explicit_iv() {
        let media = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:5
#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"
#EXTINF:9.0,
seg0.ts
#EXTINF:9.0,
seg1.ts
#EXT-X-ENDLIST
";
        let segs = match parse_manifest(media.as_bytes()).unwrap() {
            Manifest::Media(s) => s,
            Manifest::Master(_) => panic!("expected media"),
        };
        assert_eq!(segs.len(), 2);
        for seg in &segs {
            let key = seg.key.as_ref().expect("segment is encrypted");
            assert_eq!(key.iv, None);
        }
        assert_eq!(segs[0].sequence, 5);
        assert_eq!(segs[1].sequence, 6);
    }

    #[test]
    fn garbage_is_invalid_playlist() {
        let err = parse_manifest(b"not a playlist").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPlaylist(_)));
    }

    #[test]
    fn non_utf8_is_invalid_playlist() {
        let err = parse_manifest(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPlaylist(_)));
    }
}
