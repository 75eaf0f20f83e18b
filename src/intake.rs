//! Upload intake: turning user-selected paths into [`SourceFile`]s.
//!
//! Files may be passed individually or as whole directories. Directory
//! selection keeps each file's path relative to the selected directory,
//! prefixed with the directory's own name, so an archive built later
//! reproduces the folder layout:
//!
//! ```text
//! pixbox convert-folder ~/Pictures/trip
//!
//! trip/day1/beach.jpg
//! trip/day1/dunes.jpg
//! trip/notes.pdf
//! ```
//!
//! ## Size ceiling
//!
//! Folder uploads are capped by an aggregate byte limit (50 MB by default).
//! [`collect_sources_within`] sums file sizes from metadata and rejects the
//! selection before any file is read. [`check_total_size`] applies the same
//! rule to sources already in memory. Either way an add is rejected in full;
//! there is no partial acceptance.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Default aggregate ceiling for folder uploads.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Not found: {0}")]
    NotFound(PathBuf),
    #[error("Directories are not accepted here: {0}")]
    DirectoryNotAllowed(PathBuf),
    #[error("Upload limit exceeded: total size {attempted} bytes exceeds the {limit} byte limit")]
    LimitExceeded { attempted: u64, limit: u64 },
}

/// A user-provided file. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Final path segment, e.g. `beach.jpg`.
    pub name: String,
    /// `/`-separated path relative to the selection root; equals `name` for
    /// individually selected files.
    pub relative_path: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Build from in-memory contents; MIME type comes from the extension.
    pub fn from_bytes(relative_path: &str, bytes: Vec<u8>) -> Self {
        let relative_path = relative_path.trim_start_matches('/').to_string();
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&relative_path)
            .to_string();
        Self {
            mime_type: mime_type_for(&name).to_string(),
            name,
            relative_path,
            bytes,
        }
    }

    /// Read a file from disk under the given relative path.
    pub fn read(path: &Path, relative_path: &str) -> Result<Self, IntakeError> {
        let bytes = fs::read(path).map_err(|source| IntakeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(relative_path, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Extension of `name` (after the last dot), if any.
    pub fn extension(&self) -> Option<&str> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// `name` without its last extension. Empty when the name has no dot or
    /// nothing before it (`photo`, `.hidden`).
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or("")
    }

    /// Directory part of `relative_path` including the trailing `/`, or empty.
    pub fn relative_dir(&self) -> &str {
        match self.relative_path.rfind('/') {
            Some(idx) => &self.relative_path[..=idx],
            None => "",
        }
    }
}

/// MIME type guessed from a file name's extension.
pub fn mime_type_for(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return "application/octet-stream";
    };
    if let Some(format) = image::ImageFormat::from_extension(ext) {
        return format.to_mime_type();
    }
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        "iso" => "application/x-iso9660-image",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// A file selected for intake, sized from metadata but not yet read.
struct PendingFile {
    path: PathBuf,
    relative_path: String,
    size: u64,
}

/// Collect source files from user-selected paths.
///
/// Files keep their bare name as relative path. Directories are walked
/// recursively (sorted, files only) when `allow_directories` is set.
pub fn collect_sources(
    paths: &[PathBuf],
    allow_directories: bool,
) -> Result<Vec<SourceFile>, IntakeError> {
    read_pending(plan_sources(paths, allow_directories)?)
}

/// Like [`collect_sources`], but sizes every file from its metadata first
/// and rejects the whole selection before reading anything when
/// `current_total` plus the selection exceeds `limit`.
pub fn collect_sources_within(
    paths: &[PathBuf],
    allow_directories: bool,
    current_total: u64,
    limit: u64,
) -> Result<Vec<SourceFile>, IntakeError> {
    let pending = plan_sources(paths, allow_directories)?;
    let attempted = current_total + pending.iter().map(|p| p.size).sum::<u64>();
    if attempted > limit {
        return Err(IntakeError::LimitExceeded { attempted, limit });
    }
    read_pending(pending)
}

fn plan_sources(
    paths: &[PathBuf],
    allow_directories: bool,
) -> Result<Vec<PendingFile>, IntakeError> {
    let mut pending = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(IntakeError::NotFound(path.clone()));
        }
        if path.is_dir() {
            if !allow_directories {
                return Err(IntakeError::DirectoryNotAllowed(path.clone()));
            }
            plan_directory(path, &mut pending)?;
        } else {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let size = fs::metadata(path)
                .map_err(|source| IntakeError::Io {
                    path: path.clone(),
                    source,
                })?
                .len();
            pending.push(PendingFile {
                path: path.clone(),
                relative_path: name,
                size,
            });
        }
    }
    Ok(pending)
}

fn plan_directory(dir: &Path, pending: &mut Vec<PendingFile>) -> Result<(), IntakeError> {
    let root_name = dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let sub_path = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let relative_path = if root_name.is_empty() {
            sub_path
        } else {
            format!("{root_name}/{sub_path}")
        };
        pending.push(PendingFile {
            size: entry.metadata()?.len(),
            path: entry.into_path(),
            relative_path,
        });
    }
    Ok(())
}

fn read_pending(pending: Vec<PendingFile>) -> Result<Vec<SourceFile>, IntakeError> {
    pending
        .iter()
        .map(|p| SourceFile::read(&p.path, &p.relative_path))
        .collect()
}

/// Reject an add whose cumulative size would exceed `limit`.
pub fn check_total_size(
    current_total: u64,
    incoming: &[SourceFile],
    limit: u64,
) -> Result<(), IntakeError> {
    let attempted = current_total + incoming.iter().map(SourceFile::size).sum::<u64>();
    if attempted > limit {
        return Err(IntakeError::LimitExceeded { attempted, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{png_bytes, sized_source, write_png};
    use tempfile::TempDir;

    #[test]
    fn from_bytes_splits_name_and_path() {
        let f = SourceFile::from_bytes("trip/day1/beach.JPG", vec![1, 2, 3]);
        assert_eq!(f.name, "beach.JPG");
        assert_eq!(f.relative_path, "trip/day1/beach.JPG");
        assert_eq!(f.relative_dir(), "trip/day1/");
        assert_eq!(f.mime_type, "image/jpeg");
        assert_eq!(f.size(), 3);
        assert!(f.is_image());
    }

    #[test]
    fn stem_and_extension() {
        let f = SourceFile::from_bytes("archive.tar.gz", vec![]);
        assert_eq!(f.stem(), "archive.tar");
        assert_eq!(f.extension(), Some("gz"));

        let f = SourceFile::from_bytes("README", vec![]);
        assert_eq!(f.stem(), "");
        assert_eq!(f.extension(), None);

        let f = SourceFile::from_bytes(".hidden", vec![]);
        assert_eq!(f.stem(), "");
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_type_for("a.png"), "image/png");
        assert_eq!(mime_type_for("a.webp"), "image/webp");
        assert_eq!(mime_type_for("a.pdf"), "application/pdf");
        assert_eq!(mime_type_for("a.unknown"), "application/octet-stream");
        assert_eq!(mime_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn collect_single_file_uses_bare_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.png");
        write_png(&path, 8, 8);

        let sources = collect_sources(&[path], false).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].relative_path, "photo.png");
        assert_eq!(sources[0].bytes, png_bytes(8, 8));
    }

    #[test]
    fn collect_directory_preserves_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("trip");
        write_png(&root.join("b.png"), 4, 4);
        write_png(&root.join("day1/a.png"), 4, 4);
        std::fs::write(root.join("notes.pdf"), b"%PDF").unwrap();

        let sources = collect_sources(&[root], true).unwrap();
        let paths: Vec<&str> = sources.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["trip/b.png", "trip/day1/a.png", "trip/notes.pdf"]);
        assert!(!sources[2].is_image());
    }

    #[test]
    fn collect_rejects_directory_when_not_allowed() {
        let tmp = TempDir::new().unwrap();
        let result = collect_sources(&[tmp.path().to_path_buf()], false);
        assert!(matches!(result, Err(IntakeError::DirectoryNotAllowed(_))));
    }

    #[test]
    fn collect_missing_path_errors() {
        let result = collect_sources(&[PathBuf::from("/nonexistent/pixbox/x.png")], true);
        assert!(matches!(result, Err(IntakeError::NotFound(_))));
    }

    #[test]
    fn collect_within_limit_reads_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("small");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.bin"), vec![0u8; 60]).unwrap();
        std::fs::write(root.join("b.bin"), vec![0u8; 40]).unwrap();

        let sources = collect_sources_within(&[root], true, 0, 100).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].size(), 60);
    }

    #[test]
    fn collect_within_counts_current_total() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.bin");
        std::fs::write(&path, vec![0u8; 60]).unwrap();

        let err = collect_sources_within(&[path], false, 50, 100).unwrap_err();
        assert!(matches!(
            err,
            IntakeError::LimitExceeded {
                attempted: 110,
                limit: 100
            }
        ));
    }

    #[test]
    fn collect_within_rejects_oversized_folder_before_reading() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("huge");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("small.txt"), b"hi").unwrap();
        // Sparse: 8 GiB by metadata, nothing on disk. Reading it would not finish.
        let big = std::fs::File::create(root.join("movie.bin")).unwrap();
        big.set_len(8 << 30).unwrap();

        let err = collect_sources_within(&[root], true, 0, DEFAULT_MAX_TOTAL_BYTES).unwrap_err();
        assert!(matches!(
            err,
            IntakeError::LimitExceeded {
                attempted,
                limit: DEFAULT_MAX_TOTAL_BYTES
            } if attempted == (8 << 30) + 2
        ));
    }

    #[test]
    fn total_size_at_limit_is_accepted() {
        let incoming = vec![sized_source("a.bin", 60), sized_source("b.bin", 40)];
        assert!(check_total_size(0, &incoming, 100).is_ok());
    }

    #[test]
    fn total_size_over_limit_is_rejected() {
        let incoming = vec![sized_source("a.bin", 60)];
        let err = check_total_size(50, &incoming, 100).unwrap_err();
        assert!(matches!(
            err,
            IntakeError::LimitExceeded {
                attempted: 110,
                limit: 100
            }
        ));
    }
}
