//! `hlsdl probe`: show what `get` would download.

use anyhow::Result;
use hlsdl_core::config::HlsdlConfig;
use hlsdl_core::resolver::ResolvedStream;
use hlsdl_core::DownloadCoordinator;

pub async fn run_probe(cfg: &HlsdlConfig, url: &str) -> Result<()> {
    let cfg = cfg.clone();
    let url = url.to_string();
    let stream = tokio::task::spawn_blocking(move || -> Result<_> {
        let coordinator = DownloadCoordinator::from_config(&cfg)?;
        Ok(coordinator.probe(&url)?)
    })
    .await??;
    print!("{}", render(&stream));
    Ok(())
}

fn render(stream: &ResolvedStream) -> String {
    let mut out = format!(
        "playlist: {}\nsegments: {}\nkeys: {}\n",
        stream.playlist_uri,
        stream.segments.len(),
        stream.keys.len()
    );
    for (i, key) in stream.keys.iter().enumerate() {
        let iv = key
            .iv
            .map(|iv| format!("0x{}", hex::encode(iv)))
            .unwrap_or_else(|| "sequence".to_string());
        out.push_str(&format!("  key {}: {} {} iv={}\n", i, key.method, key.uri, iv));
    }
    for (i, seg) in stream.segments.iter().enumerate() {
        let key = seg.key.map(|k| format!(" key={}", k)).unwrap_or_default();
        out.push_str(&format!("{:>6} seq={}{} {}\n", i, seg.sequence, key, seg.uri));
    }
    out
}
