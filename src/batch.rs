//! Batch orchestration: the queue of files behind one download action.
//!
//! A [`Batch`] is an explicit value owned by the caller. The CLI builds one
//! per command, tests build as many as they like. It holds the selected
//! files, the per-file output names, and the [`ProcessingSettings`], and
//! drives the re-encoder when a download is requested.
//!
//! ## States
//!
//! ```text
//! Idle ─open─▶ AwaitingSelection ─first add─▶ Configuring ─download─▶ Processing ─┬▶ Complete
//!                     ▲                           ▲                               └▶ Failed
//!                     └────────── clear ──────────┴──── add / settings change ◀────────┘
//! ```
//!
//! A download requested while another is `Processing` is ignored.
//!
//! ## Download policy
//!
//! - Items are encoded one at a time, so at most one decoded raster is alive.
//! - One item: its result is delivered directly as `<name>.<ext>`. A failure
//!   fails the download.
//! - Several items: every success becomes an archive entry keyed by its
//!   relative path; failing items are logged and left out. The archive is
//!   delivered as `<archive name>.zip`. Partial success is success.
//! - Non-image files, and every file when no target format is set, are
//!   carried through with their original bytes and extension.

use crate::archive::{ArchiveAssembler, ArchiveError};
use crate::delivery::DeliverySink;
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, OutputFormat, Quality, ResizeTarget,
    estimate_compressed_size, reencode,
};
use crate::intake::{self, DEFAULT_MAX_TOTAL_BYTES, IntakeError, SourceFile};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Could not process {name}: {source}")]
    Item {
        name: String,
        #[source]
        source: BackendError,
    },
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Could not save download: {0}")]
    Delivery(#[from] std::io::Error),
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error("No file with id {0:?} in this batch")]
    UnknownFile(FileId),
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    AwaitingSelection,
    Configuring,
    Processing,
    Complete,
    Failed,
}

/// Stable handle for a queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u64);

/// Per-batch settings, editable before each download.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSettings {
    pub quality: Quality,
    /// Target image format. `None` packages files unchanged.
    pub format: Option<OutputFormat>,
    /// Name (without extension) for single-file downloads; overrides the file's own stem.
    pub output_name: Option<String>,
    pub resize: Option<ResizeTarget>,
    /// Archive file name without the `.zip` extension.
    pub archive_name: String,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            format: Some(OutputFormat::Jpeg),
            output_name: None,
            resize: None,
            archive_name: "archive".to_string(),
        }
    }
}

/// Tool-specific behaviour that does not change between downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Stem used when a file name yields an empty one.
    pub default_stem: String,
    /// Aggregate size ceiling enforced on add.
    pub max_total_bytes: Option<u64>,
    /// Keep the queue sorted by relative path.
    pub sort_by_path: bool,
}

impl BatchOptions {
    pub fn compress() -> Self {
        Self {
            default_stem: "compressed-image".to_string(),
            max_total_bytes: None,
            sort_by_path: false,
        }
    }

    pub fn convert() -> Self {
        Self {
            default_stem: "converted-file".to_string(),
            max_total_bytes: None,
            sort_by_path: false,
        }
    }

    pub fn folder(max_total_bytes: u64) -> Self {
        Self {
            default_stem: "converted-file".to_string(),
            max_total_bytes: Some(max_total_bytes),
            sort_by_path: true,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::folder(DEFAULT_MAX_TOTAL_BYTES)
    }
}

/// A file waiting in the batch, with its editable output stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFile {
    pub id: FileId,
    pub source: SourceFile,
    pub output_stem: String,
}

/// Display view of a queued file under the current settings.
///
/// `estimated_size` is a projection (see [`estimate_compressed_size`]), not
/// the size the encoder will produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedResult {
    pub id: FileId,
    pub source_name: String,
    pub relative_path: String,
    pub original_size: u64,
    pub estimated_size: f64,
    pub quality: Quality,
    pub format: Option<OutputFormat>,
    pub output_name: String,
}

/// What happened to one item during a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Encoded { size: u64, dimensions: Dimensions },
    Passthrough { size: u64 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub id: FileId,
    pub source: String,
    pub output: String,
    pub outcome: ItemOutcome,
}

/// How the download was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Single {
        file_name: String,
        path: PathBuf,
        size: u64,
    },
    Archive {
        file_name: String,
        path: PathBuf,
        entries: usize,
        size: u64,
    },
}

impl Delivery {
    pub fn file_name(&self) -> &str {
        match self {
            Delivery::Single { file_name, .. } | Delivery::Archive { file_name, .. } => file_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub delivery: Delivery,
    pub items: Vec<ItemReport>,
}

impl DownloadReport {
    pub fn skipped(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, ItemOutcome::Skipped { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Delivered(DownloadReport),
    /// Another download was in flight.
    Ignored,
    /// Nothing queued.
    Empty,
}

struct ProcessedItem {
    bytes: Vec<u8>,
    outcome: ItemOutcome,
}

/// Files queued for one download action plus their settings.
#[derive(Debug, Clone)]
pub struct Batch {
    state: BatchState,
    options: BatchOptions,
    settings: ProcessingSettings,
    files: Vec<QueuedFile>,
    next_id: u64,
}

impl Batch {
    pub fn new(options: BatchOptions, settings: ProcessingSettings) -> Self {
        Self {
            state: BatchState::Idle,
            options,
            settings,
            files: Vec::new(),
            next_id: 0,
        }
    }

    /// Start waiting for files.
    pub fn open(&mut self) {
        if self.state == BatchState::Idle {
            self.state = BatchState::AwaitingSelection;
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    /// Edit settings; a finished batch returns to `Configuring`.
    pub fn settings_mut(&mut self) -> &mut ProcessingSettings {
        if matches!(self.state, BatchState::Complete | BatchState::Failed) {
            self.state = BatchState::Configuring;
        }
        &mut self.settings
    }

    pub fn files(&self) -> &[QueuedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.source.size()).sum()
    }

    /// Queue new files.
    ///
    /// Under a size ceiling the add is all-or-nothing: when the new total
    /// would exceed it, nothing is queued and the batch is unchanged.
    pub fn add_files(&mut self, sources: Vec<SourceFile>) -> Result<Vec<FileId>, BatchError> {
        if let Some(limit) = self.options.max_total_bytes {
            intake::check_total_size(self.total_size(), &sources, limit)?;
        }
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(sources.len());
        for source in sources {
            let id = FileId(self.next_id);
            self.next_id += 1;
            let output_stem = default_stem(&source, &self.options.default_stem);
            debug!(file = %source.relative_path, size = source.size(), "queued");
            self.files.push(QueuedFile {
                id,
                source,
                output_stem,
            });
            ids.push(id);
        }
        if self.options.sort_by_path {
            self.files
                .sort_by(|a, b| a.source.relative_path.cmp(&b.source.relative_path));
        }

        if self.state != BatchState::Processing {
            self.state = BatchState::Configuring;
        }
        Ok(ids)
    }

    /// Remove a file; an emptied batch goes back to waiting for files.
    pub fn remove(&mut self, id: FileId) -> Result<SourceFile, BatchError> {
        let idx = self
            .files
            .iter()
            .position(|f| f.id == id)
            .ok_or(BatchError::UnknownFile(id))?;
        let removed = self.files.remove(idx);
        if self.files.is_empty() && self.state != BatchState::Processing {
            self.state = BatchState::AwaitingSelection;
        }
        Ok(removed.source)
    }

    /// Change a file's output stem. The extension is never part of the edit.
    pub fn rename(&mut self, id: FileId, stem: &str) -> Result<(), BatchError> {
        let file = self
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(BatchError::UnknownFile(id))?;
        file.output_stem = stem.trim().to_string();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.state = BatchState::AwaitingSelection;
    }

    /// Display view of every queued file under the current settings.
    pub fn results(&self) -> Vec<ProcessedResult> {
        self.files
            .iter()
            .map(|f| ProcessedResult {
                id: f.id,
                source_name: f.source.name.clone(),
                relative_path: f.source.relative_path.clone(),
                original_size: f.source.size(),
                estimated_size: estimate_compressed_size(f.source.size(), self.settings.quality),
                quality: self.settings.quality,
                format: self.target_format(f),
                output_name: self.output_file_name(f),
            })
            .collect()
    }

    /// Target format for a file, or `None` when it is carried through unchanged.
    fn target_format(&self, file: &QueuedFile) -> Option<OutputFormat> {
        self.settings.format.filter(|_| file.source.is_image())
    }

    fn file_name_with_stem(&self, file: &QueuedFile, stem: &str) -> String {
        let stem = if stem.is_empty() {
            self.options.default_stem.as_str()
        } else {
            stem
        };
        let ext = match self.target_format(file) {
            Some(format) => Some(format.extension()),
            None => file.source.extension(),
        };
        match ext {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        }
    }

    /// `<stem>.<ext>` for a queued file.
    pub fn output_file_name(&self, file: &QueuedFile) -> String {
        self.file_name_with_stem(file, &file.output_stem)
    }

    /// Path of a file inside the archive: its relative directory plus output name.
    pub fn archive_path(&self, file: &QueuedFile) -> String {
        format!("{}{}", file.source.relative_dir(), self.output_file_name(file))
    }

    fn single_file_name(&self, file: &QueuedFile) -> String {
        match self.settings.output_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => self.file_name_with_stem(file, name),
            _ => self.output_file_name(file),
        }
    }

    fn archive_file_name(&self) -> String {
        let name = self.settings.archive_name.trim();
        let name = name.strip_suffix(".zip").unwrap_or(name);
        if name.is_empty() {
            "archive.zip".to_string()
        } else {
            format!("{name}.zip")
        }
    }

    /// Process every queued file and hand the result to `sink`.
    pub fn download(
        &mut self,
        backend: &impl ImageBackend,
        sink: &mut impl DeliverySink,
    ) -> Result<DownloadOutcome, BatchError> {
        if self.state == BatchState::Processing {
            info!("download already in progress; ignoring trigger");
            return Ok(DownloadOutcome::Ignored);
        }
        if self.files.is_empty() {
            return Ok(DownloadOutcome::Empty);
        }

        self.state = BatchState::Processing;
        info!(files = self.files.len(), "processing batch");
        let result = if self.files.len() == 1 {
            self.download_single(backend, sink)
        } else {
            self.download_archive(backend, sink)
        };

        match &result {
            Ok(report) => {
                self.state = BatchState::Complete;
                info!(
                    file = report.delivery.file_name(),
                    skipped = report.skipped().count(),
                    "download complete"
                );
            }
            Err(e) => {
                self.state = BatchState::Failed;
                warn!(error = %e, "download failed");
            }
        }
        result.map(DownloadOutcome::Delivered)
    }

    fn process_item(
        &self,
        backend: &impl ImageBackend,
        file: &QueuedFile,
    ) -> Result<ProcessedItem, BackendError> {
        let Some(format) = self.target_format(file) else {
            if self.settings.format.is_some() {
                debug!(file = %file.source.relative_path, mime = %file.source.mime_type, "not an image; packaging unchanged");
            }
            return Ok(ProcessedItem {
                bytes: file.source.bytes.clone(),
                outcome: ItemOutcome::Passthrough {
                    size: file.source.size(),
                },
            });
        };

        let encoded = reencode(
            backend,
            &file.source.bytes,
            format,
            self.settings.quality,
            self.settings.resize,
        )?;
        debug!(
            file = %file.source.relative_path,
            format = %format,
            before = file.source.size(),
            after = encoded.bytes.len(),
            "encoded"
        );
        let size = encoded.bytes.len() as u64;
        Ok(ProcessedItem {
            bytes: encoded.bytes,
            outcome: ItemOutcome::Encoded {
                size,
                dimensions: encoded.dimensions,
            },
        })
    }

    fn download_single(
        &self,
        backend: &impl ImageBackend,
        sink: &mut impl DeliverySink,
    ) -> Result<DownloadReport, BatchError> {
        let file = &self.files[0];
        let processed = self
            .process_item(backend, file)
            .map_err(|source| BatchError::Item {
                name: file.source.relative_path.clone(),
                source,
            })?;

        let file_name = self.single_file_name(file);
        let path = sink.deliver(&file_name, &processed.bytes)?;
        Ok(DownloadReport {
            delivery: Delivery::Single {
                size: processed.bytes.len() as u64,
                file_name: file_name.clone(),
                path,
            },
            items: vec![ItemReport {
                id: file.id,
                source: file.source.relative_path.clone(),
                output: file_name,
                outcome: processed.outcome,
            }],
        })
    }

    fn download_archive(
        &self,
        backend: &impl ImageBackend,
        sink: &mut impl DeliverySink,
    ) -> Result<DownloadReport, BatchError> {
        let mut assembler = ArchiveAssembler::new();
        let mut items = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let mut entry_path = self.archive_path(file);
            let outcome = match self.process_item(backend, file) {
                Ok(processed) => {
                    entry_path = assembler.add(&entry_path, processed.bytes)?;
                    processed.outcome
                }
                Err(e) => {
                    warn!(file = %file.source.relative_path, error = %e, "skipping file");
                    ItemOutcome::Skipped {
                        reason: e.to_string(),
                    }
                }
            };
            items.push(ItemReport {
                id: file.id,
                source: file.source.relative_path.clone(),
                output: entry_path,
                outcome,
            });
        }

        let entries = assembler.len();
        let archive = assembler.finish()?;
        let file_name = self.archive_file_name();
        let path = sink.deliver(&file_name, &archive)?;
        Ok(DownloadReport {
            delivery: Delivery::Archive {
                file_name,
                path,
                entries,
                size: archive.len() as u64,
            },
            items,
        })
    }
}

/// Default output stem: the name without its last extension, or `fallback`
/// when that is empty.
fn default_stem(source: &SourceFile, fallback: &str) -> String {
    match source.stem() {
        "" => fallback.to_string(),
        stem => stem.to_string(),
    }
}
