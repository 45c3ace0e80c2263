//! Per-download staging area.
//!
//! Workers write each segment's plaintext to `<root>/<sha256(file name)>/<index>.ts`.
//! Writes go to a `.part` sibling first and are renamed into place, so a
//! staged path either does not exist or holds the complete segment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::sha256_hex;

/// Extension of staged segment files.
pub const SEGMENT_EXT: &str = "ts";

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Outcome of [`StagingArea::cleanup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    Removed,
    AlreadyAbsent,
}

#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Staging directory for the download that produces `file_name`.
    pub fn for_output(root: &Path, file_name: &str) -> Self {
        Self {
            dir: root.join(sha256_hex(file_name.as_bytes())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory (and parents). Existing contents are kept.
    pub fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.{}", index, SEGMENT_EXT))
    }

    /// Remove the whole staging directory. A missing directory counts as success.
    pub fn cleanup(&self) -> io::Result<Cleanup> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(Cleanup::Removed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Cleanup::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }
}

/// Path for the temp file: appends `.part` to the final path (`3.ts` → `3.ts.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write a staged segment atomically.
pub fn stage_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}
