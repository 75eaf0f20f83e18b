//! Image processing in pure Rust, with no system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Re-encode** | decode → optional `resize_exact` → per-format encoder |
//! | **Resize math** | pure functions in `calculations` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math and size estimates (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    Axis, ResizeTarget, apply_dimension_edit, effective_dimensions, estimate_compressed_size,
    total_saved_percent,
};
pub use operations::{EncodedImage, get_dimensions, reencode};
pub use params::{EncodeParams, OutputFormat, Quality, UnknownFormat};
pub use rust_backend::RustBackend;
