//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take settings, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{ResizeTarget, effective_dimensions};
use super::params::{EncodeParams, OutputFormat, Quality};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, source: &[u8]) -> Result<Dimensions> {
    backend.identify(source)
}

/// A freshly encoded image. `bytes.len()` is the true output size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub dimensions: Dimensions,
}

/// Plan an encode without executing it.
///
/// Resolves the resize target against the original dimensions; a target
/// equal to the original is dropped so the backend skips resampling.
pub fn plan_encode<'a>(
    source: &'a [u8],
    original: Dimensions,
    format: OutputFormat,
    quality: Quality,
    resize: Option<ResizeTarget>,
) -> EncodeParams<'a> {
    let target = effective_dimensions(resize, original);
    EncodeParams {
        source,
        format,
        quality,
        size: (target != original).then_some(target),
    }
}

/// Decode `source`, resize if requested, and re-encode it.
pub fn reencode(
    backend: &impl ImageBackend,
    source: &[u8],
    format: OutputFormat,
    quality: Quality,
    resize: Option<ResizeTarget>,
) -> Result<EncodedImage> {
    let original = get_dimensions(backend, source)?;
    let params = plan_encode(source, original, format, quality, resize);
    let dimensions = params.size.unwrap_or(original);
    let bytes = backend.encode(&params)?;
    Ok(EncodedImage {
        bytes,
        format,
        dimensions,
    })
}
