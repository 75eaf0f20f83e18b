//! # pixbox
//!
//! A small toolbox for everyday image chores: compress photos, convert
//! formats, package a folder into one archive, and run AI-assisted
//! background removal and passport-photo centering.
//!
//! # Architecture: Queue, Encode, Deliver
//!
//! Every batch tool runs the same three steps:
//!
//! ```text
//! 1. Intake    paths        →  SourceFile[]     (read files, keep relative paths)
//! 2. Encode    SourceFile   →  bytes            (decode, resize, re-encode, one at a time)
//! 3. Deliver   bytes        →  out/<name>       (one file directly, several as a .zip)
//! ```
//!
//! The batch is an explicit value owned by the caller. The codec sits behind
//! the [`imaging::ImageBackend`] trait and the output location behind
//! [`delivery::DeliverySink`], so the orchestration in [`batch`] is tested
//! without touching pixels or disk.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`intake`] | Files and directories → [`intake::SourceFile`], upload size ceiling |
//! | [`imaging`] | Pure-Rust re-encoding, resize math, size estimates |
//! | [`batch`] | Queue state machine, per-file naming, download policy |
//! | [`archive`] | Zip assembly keyed by relative path |
//! | [`delivery`] | Where finished downloads are written |
//! | [`ai`] | Gemini client, face centering, background removal |
//! | [`config`] | `pixbox.toml` loading, validation, merging over stock defaults |
//! | [`output`] | CLI output formatting for estimates and download reports |
//!
//! # Design Decisions
//!
//! ## Partial Success Is Success
//!
//! A multi-file download skips any file that fails to decode or encode and
//! still delivers the archive; the report lists what was left out. A
//! single-file download has nothing to fall back on, so its failure is the
//! command's failure.
//!
//! ## Sequential Encoding
//!
//! Files are encoded one after another. At most one decoded raster is alive,
//! which keeps memory flat on large folders.
//!
//! ## Estimates Are Not Sizes
//!
//! The size shown before processing is `size × quality / 100`, a projection
//! for display. The download report shows what the encoder actually wrote.

pub mod ai;
pub mod archive;
pub mod batch;
pub mod config;
pub mod delivery;
pub mod imaging;
pub mod intake;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
