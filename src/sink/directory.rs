//! Numbered JPEG files in a local directory.
//!
//! Frames are written as `<dir>/<prefix><index>.jpg` with a counter that
//! advances on every store attempt, so a failed write leaves a gap in the
//! numbering rather than shifting later frames. An existing file with the same
//! name is replaced.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::FrameSink;
use crate::frame::Frame;

pub const DEFAULT_OUTPUT_DIR: &str = "test_images";
pub const DEFAULT_FILE_PREFIX: &str = "recv_image_";
const FILE_EXTENSION: &str = "jpg";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
    pub start_index: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            start_index: 0,
        }
    }
}

pub struct DirectorySink {
    root: PathBuf,
    file_prefix: String,
    next_index: u64,
}

impl DirectorySink {
    pub fn new(cfg: DirectoryConfig) -> Result<Self> {
        validate_prefix(&cfg.file_prefix)?;
        fs::create_dir_all(&cfg.dir)
            .with_context(|| format!("create output directory {}", cfg.dir.display()))?;
        Ok(Self {
            root: cfg.dir,
            file_prefix: cfg.file_prefix,
            next_index: cfg.start_index,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index the next stored frame will get.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.root
            .join(format!("{}{}.{}", self.file_prefix, index, FILE_EXTENSION))
    }
}

impl FrameSink for DirectorySink {
    fn store(&mut self, frame: Frame) -> Result<()> {
        let path = self.frame_path(self.next_index);
        self.next_index += 1;
        write_atomic(&path, frame.as_bytes())
            .with_context(|| format!("write frame to {}", path.display()))?;
        log::debug!("wrote {} ({} bytes)", path.display(), frame.len());
        Ok(())
    }
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.contains(['/', '\\']) || prefix.contains("..") {
        return Err(anyhow!(
            "file prefix '{}' must not contain path separators",
            prefix
        ));
    }
    Ok(())
}

// A reader never sees a half-written image under its final name.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    write_atomic_with(path, |file| file.write_all(data))
}

fn write_atomic_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let tmp_path = path.with_extension("tmp");
    let mut file = File::create(&tmp_path)?;
    if let Err(err) = fill(&mut file).and_then(|()| file.sync_all()) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            log::warn!("failed to remove {}: {}", tmp_path.display(), cleanup);
        }
        return Err(err.into());
    }
    drop(file);
    fs::rename(&tmp_path, path)?;
    Ok(())
}
