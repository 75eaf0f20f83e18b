//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations every backend must
//! support: identify and encode. Both work on in-memory buffers; reading
//! files is the caller's job.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and
//! statically linked into the binary.

use super::params::{EncodeParams, OutputFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("The source image could not be decoded: {0}")]
    Decode(String),
    #[error("Could not encode as {format}: {reason}")]
    Encode {
        format: OutputFormat,
        reason: String,
    },
    #[error("No encoder available for {0}")]
    UnsupportedFormat(OutputFormat),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both axes are known (non-zero).
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Natural dimensions of an encoded image.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, optionally resize, and re-encode.
    fn encode(&self, params: &EncodeParams<'_>) -> Result<Vec<u8>, BackendError>;
}
