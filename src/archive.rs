//! Archive assembly for multi-file downloads.
//!
//! A thin wrapper over the `zip` crate: entries are collected in memory as
//! `(relative path, bytes)` pairs and written out in one pass by
//! [`ArchiveAssembler::finish`]. Adding an entry whose path is already
//! taken stores it as `name (1).ext`, `name (2).ext`, ... so every added
//! entry survives and no two share a name.

use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid archive path: {0:?}")]
    InvalidPath(String),
}

/// One file inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Collects entries and produces a zip archive.
#[derive(Debug, Default)]
pub struct ArchiveAssembler {
    entries: Vec<ArchiveEntry>,
}

impl ArchiveAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, normalizing its path to `/`-separated relative form.
    ///
    /// Returns the path the entry was stored under, which differs from the
    /// requested one only when that path was already taken.
    pub fn add(&mut self, path: &str, bytes: Vec<u8>) -> Result<String, ArchiveError> {
        let path = self.unique_path(normalize_entry_path(path)?);
        self.entries.push(ArchiveEntry {
            path: path.clone(),
            bytes,
        });
        Ok(path)
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    /// `dir/name.ext` → `dir/name (n).ext` with the smallest free `n`.
    fn unique_path(&self, path: String) -> String {
        if !self.contains(&path) {
            return path;
        }
        let (dir, file) = match path.rfind('/') {
            Some(idx) => path.split_at(idx + 1),
            None => ("", path.as_str()),
        };
        let (stem, ext) = match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (file, String::new()),
        };
        (1..)
            .map(|n| format!("{dir}{stem} ({n}){ext}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Write every entry (deflated) and return the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            writer.start_file(entry.path.as_str(), options)?;
            writer.write_all(&entry.bytes)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Normalize an entry path: backslashes become `/`, leading slashes and `.`
/// segments are dropped. Empty paths and `..` segments are rejected.
fn normalize_entry_path(path: &str) -> Result<String, ArchiveError> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in replaced.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ArchiveError::InvalidPath(path.to_string())),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(ArchiveError::InvalidPath(path.to_string()));
    }
    Ok(segments.join("/"))
}
