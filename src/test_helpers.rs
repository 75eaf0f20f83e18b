//! Shared test utilities for the pixbox test suite.
//!
//! Provides synthetic image encoders and `SourceFile` builders so tests can
//! exercise the pipeline without fixture files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let photo = image_source("holiday/beach.png", png_bytes(64, 48));
//! let broken = image_source("holiday/broken.jpg", b"not really a jpeg".to_vec());
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;

use crate::intake::SourceFile;

// =========================================================================
// Synthetic images
// =========================================================================

/// RGBA gradient encoded as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    out
}

/// RGB noise-ish pattern encoded as JPEG (enough detail for quality to matter).
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            ((x * 7 + y * 13) % 256) as u8,
            ((x ^ y) % 256) as u8,
            ((x * y) % 256) as u8,
        ])
    });
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Write a PNG to disk, creating parent directories.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, png_bytes(width, height)).unwrap();
}

// =========================================================================
// SourceFile builders
// =========================================================================

/// Source file whose MIME type is derived from the extension of `relative_path`.
pub fn image_source(relative_path: &str, bytes: Vec<u8>) -> SourceFile {
    SourceFile::from_bytes(relative_path, bytes)
}

/// Source file of `size` zero bytes; for size-accounting tests that never decode.
pub fn sized_source(relative_path: &str, size: usize) -> SourceFile {
    SourceFile::from_bytes(relative_path, vec![0; size])
}
