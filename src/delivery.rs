//! Delivery of finished downloads.
//!
//! A [`DeliverySink`] receives a suggested file name plus the bytes to save.
//! The CLI uses [`DirectorySink`], which writes into an output directory;
//! tests use an in-memory sink.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where finished downloads go.
pub trait DeliverySink {
    /// Save `bytes` under `file_name`, returning where they ended up.
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Writes downloads into a directory, creating it on first use.
///
/// Like a browser's download folder, a name that is already taken gets a
/// numeric suffix (`photo (1).webp`). [`DirectorySink::overwriting`] replaces
/// existing files instead.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    overwrite: bool,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overwrite: false,
        }
    }

    pub fn overwriting(dir: impl Into<PathBuf>) -> Self {
        Self {
            overwrite: true,
            ..Self::new(dir)
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First free `name`, `name (1)`, `name (2)`, ... in the directory.
    fn free_path(&self, file_name: &str) -> PathBuf {
        let path = self.dir.join(file_name);
        if self.overwrite || !path.exists() {
            return path;
        }
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (file_name, String::new()),
        };
        (1..)
            .map(|n| self.dir.join(format!("{stem} ({n}){ext}")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(path)
    }
}

impl DeliverySink for DirectorySink {
    fn deliver(&mut self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let safe = sanitize_file_name(file_name);
        fs::create_dir_all(&self.dir)?;
        let path = self.free_path(&safe);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Keep only the final path segment; a download name never creates directories.
fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    match last {
        "" | "." | ".." => "download".to_string(),
        s => s.to_string(),
    }
}
