//! Pure calculation functions for image dimensions and size estimates.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::Quality;

/// Which axis the user edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// A requested output size as the user typed it.
///
/// Signed on purpose: zero and negative edits are stored and only resolved
/// against the original size by [`effective_dimensions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeTarget {
    pub width: i64,
    pub height: i64,
}

impl ResizeTarget {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// Target initialised to the natural size of an image.
    pub fn from_dimensions(dims: Dimensions) -> Self {
        Self {
            width: dims.width as i64,
            height: dims.height as i64,
        }
    }
}

/// Apply a single-axis edit, coupling the other axis to the original aspect ratio.
///
/// # Arguments
/// * `original` - Natural image dimensions; zero means unknown
/// * `current` - Target before the edit
/// * `axis` - Which axis was edited
/// * `value` - The new value for that axis
///
/// # Examples
/// ```
/// # use pixbox::imaging::{apply_dimension_edit, Axis, Dimensions, ResizeTarget};
/// let original = Dimensions::new(1920, 1080);
/// let edited = apply_dimension_edit(original, ResizeTarget::default(), Axis::Width, 960);
/// assert_eq!(edited, ResizeTarget::new(960, 540));
/// ```
pub fn apply_dimension_edit(
    original: Dimensions,
    current: ResizeTarget,
    axis: Axis,
    value: i64,
) -> ResizeTarget {
    if !original.is_known() {
        // No aspect ratio to preserve: store the edit as-is
        return match axis {
            Axis::Width => ResizeTarget {
                width: value,
                ..current
            },
            Axis::Height => ResizeTarget {
                height: value,
                ..current
            },
        };
    }

    let (w, h) = (original.width as f64, original.height as f64);
    match axis {
        Axis::Width => ResizeTarget {
            width: value,
            height: (value as f64 * h / w).round() as i64,
        },
        Axis::Height => ResizeTarget {
            width: (value as f64 * w / h).round() as i64,
            height: value,
        },
    }
}

/// Resolve a target against the original size.
///
/// Each axis that is `<= 0` falls back to the original, so a degenerate edit
/// never produces an empty raster.
pub fn effective_dimensions(target: Option<ResizeTarget>, original: Dimensions) -> Dimensions {
    let Some(target) = target else {
        return original;
    };
    let pick = |t: i64, orig: u32| {
        if t > 0 {
            u32::try_from(t).unwrap_or(u32::MAX)
        } else {
            orig
        }
    };
    Dimensions {
        width: pick(target.width, original.width),
        height: pick(target.height, original.height),
    }
}

/// Projected size after compression: `size × quality / 100`.
///
/// This is a display estimate, not a property of any real codec. The true
/// size is only known after encoding.
pub fn estimate_compressed_size(original_size: u64, quality: Quality) -> f64 {
    original_size as f64 * quality.fraction()
}

/// Percentage saved between two totals; zero when nothing was selected.
pub fn total_saved_percent(original_total: f64, compressed_total: f64) -> f64 {
    if original_total > 0.0 {
        (original_total - compressed_total) / original_total * 100.0
    } else {
        0.0
    }
}
