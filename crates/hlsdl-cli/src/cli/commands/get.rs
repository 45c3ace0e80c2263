//! `hlsdl get`: download one stream.

use anyhow::{bail, Result};
use hlsdl_core::config::HlsdlConfig;
use hlsdl_core::{DownloadCoordinator, DownloadRequest};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct GetArgs {
    pub url: String,
    pub output: Option<String>,
    pub workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
}

/// Config with command-line overrides applied.
fn effective_config(cfg: &HlsdlConfig, args: &GetArgs) -> Result<HlsdlConfig> {
    let mut cfg = cfg.clone();
    if let Some(workers) = args.workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        cfg.workers = workers;
    }
    if let Some(dir) = &args.output_dir {
        cfg.output_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.staging_dir {
        cfg.staging_dir = Some(dir.clone());
    }
    Ok(cfg)
}

fn request(args: &GetArgs) -> DownloadRequest {
    let request = DownloadRequest::new(args.url.clone());
    match &args.output {
        Some(name) => request.with_file_name(name.clone()),
        None => request,
    }
}

/// Runs the blocking download on the blocking pool and prints where the file landed.
pub async fn run_get(cfg: &HlsdlConfig, args: GetArgs) -> Result<()> {
    let cfg = effective_config(cfg, &args)?;
    let request = request(&args);
    let started = Instant::now();

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let coordinator = DownloadCoordinator::from_config(&cfg)?;
        Ok(coordinator.run(&request)?)
    })
    .await??;

    let secs = started.elapsed().as_secs_f64();
    let mib = report.bytes_written as f64 / 1_048_576.0;
    println!(
        "{} ({} segments, {:.1} MiB in {:.1}s)",
        report.output_path.display(),
        report.segments,
        mib,
        secs
    );
    if report.staging_cleanup.is_none() {
        eprintln!("warning: staging directory could not be removed (see log)");
    }
    Ok(())
}
