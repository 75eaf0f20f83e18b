//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Identify AVIF | `avif_parse::read_avif` → primary item metadata |
//! | Decode (JPEG, PNG, WebP, BMP, GIF, ICO, TIFF) | `ImageReader::with_guessed_format` + `decode` |
//! | Decode AVIF | `avif_parse` (container) + `rav1d` (AV1 decode) → YUV to RGB |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` (stretch, like a canvas draw) |
//! | Encode → JPEG | `JpegEncoder::new_with_quality`, alpha flattened away |
//! | Encode → WebP | `webp::Encoder::from_rgba` + `encode(quality)` (lossy libwebp) |
//! | Encode → AVIF | `AvifEncoder::new_with_speed_quality` (rav1e, speed 6) |
//! | Encode → lossless formats | `DynamicImage::write_to` |
//!
//! Formats are sniffed from the leading bytes, never from a file name.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{EncodeParams, OutputFormat, Quality};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;

/// Largest edge the ICO container can hold.
const ICO_MAX_EDGE: u32 = 256;

/// Largest edge of a resize target.
pub const MAX_EDGE: u32 = 32_768;

/// Largest pixel count of a resize target (16384 x 16384).
pub const MAX_PIXELS: u64 = 268_435_456;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// ISO-BMFF `ftyp` box with an AVIF major brand.
fn is_avif(source: &[u8]) -> bool {
    source.len() >= 12 && &source[4..8] == b"ftyp" && matches!(&source[8..12], b"avif" | b"avis")
}

/// Decode an image held in memory, sniffing the format from its magic bytes.
fn load_image(source: &[u8]) -> Result<DynamicImage, BackendError> {
    if is_avif(source) {
        return decode_avif(source);
    }
    ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| BackendError::Decode(e.to_string()))
}

fn parse_avif(source: &[u8]) -> Result<avif_parse::AvifData, BackendError> {
    avif_parse::read_avif(&mut Cursor::new(source))
        .map_err(|e| BackendError::Decode(format!("Failed to parse AVIF: {e:?}")))
}

/// Dimensions from the AVIF container metadata (no full decode needed).
fn identify_avif(source: &[u8]) -> Result<Dimensions, BackendError> {
    let avif = parse_avif(source)?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| BackendError::Decode(format!("Failed to read AVIF metadata: {e:?}")))?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

/// Decode AVIF with avif-parse (container) + rav1d (AV1 decode).
///
/// The `image` crate's `"avif"` feature only provides the encoder; its
/// decoder needs the C library dav1d. `rav1d` is the pure Rust port.
fn decode_avif(source: &[u8]) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let avif = parse_avif(source)?;
    let av1_bytes: &[u8] = &avif.primary_item;
    let failed = |what: &str| BackendError::Decode(format!("rav1d {what} failed"));

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr()).ok_or_else(|| failed("settings"))?;
    unsafe { rav1d::src::lib::dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(BackendError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    let mut data = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(failed("data_create"));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(BackendError::Decode(format!("rav1d send_data failed ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(BackendError::Decode(format!("rav1d get_picture failed ({})", rc.0)));
    }

    let w = pic.p.w as u32;
    let h = pic.p.h as u32;
    let layout = pic.p.layout;
    let plane = |i: usize| pic.data[i].map(|p| p.as_ptr() as *const u8);

    let subsampling = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => Some((false, false)),
        DAV1D_PIXEL_LAYOUT_I420 => Some((true, true)),
        DAV1D_PIXEL_LAYOUT_I422 => Some((true, false)),
        DAV1D_PIXEL_LAYOUT_I444 => Some((false, false)),
        _ => None,
    };
    let monochrome = layout == DAV1D_PIXEL_LAYOUT_I400;
    let planes = match (subsampling, plane(0), plane(1), plane(2)) {
        (Some(_), Some(y_ptr), _, _) if monochrome => Some(YuvPlanes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width: w,
            height: h,
            bpc: pic.p.bpc as u32,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }),
        (Some((ss_x, ss_y)), Some(y_ptr), Some(u_ptr), Some(v_ptr)) => Some(YuvPlanes {
            y_ptr,
            u_ptr,
            v_ptr,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            width: w,
            height: h,
            bpc: pic.p.bpc as u32,
            ss_x,
            ss_y,
            monochrome: false,
        }),
        _ => None,
    };

    let Some(planes) = planes else {
        unsafe {
            rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        };
        return Err(BackendError::Decode(format!(
            "Unsupported AVIF pixel layout: {layout}"
        )));
    };
    let rgb = planes.to_rgb();
    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }

    image::RgbImage::from_raw(w, h, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::Decode("decoded AVIF planes do not fill the frame".into()))
}

/// Decoded YUV plane data from rav1d, ready for RGB conversion.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvPlanes {
    /// Interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = vec![0u8; self.width as usize * self.height as usize * 3];
        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_pixel(self.y_ptr, self.y_stride, col, row, self.bpc);
                let (r, g, b) = if self.monochrome {
                    let v = (y_val * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb = read_pixel(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    let cr = read_pixel(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc) - center;
                    (
                        ((y_val + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                };
                let idx = (row as usize * self.width as usize + col as usize) * 3;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }
        rgb
    }
}

/// One sample from a YUV plane; above 8 bits samples are stored as u16.
#[inline]
fn read_pixel(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}

/// Refuse targets no encoder could allocate a raster for.
fn check_target(size: Dimensions, format: OutputFormat) -> Result<(), BackendError> {
    let pixels = size.width as u64 * size.height as u64;
    if size.width > MAX_EDGE || size.height > MAX_EDGE || pixels > MAX_PIXELS {
        return Err(BackendError::Encode {
            format,
            reason: format!(
                "{}x{} exceeds the {MAX_EDGE}px edge or {MAX_PIXELS} pixel limit",
                size.width, size.height
            ),
        });
    }
    Ok(())
}

fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let encode_err = |e: image::ImageError| match e {
        image::ImageError::Unsupported(_) => BackendError::UnsupportedFormat(format),
        other => BackendError::Encode {
            format,
            reason: other.to_string(),
        },
    };

    let mut out = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.encoder_value());
            rgb.write_with_encoder(encoder).map_err(encode_err)?;
        }
        OutputFormat::Webp => {
            let rgba = img.to_rgba8();
            let encoded = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
                .encode(quality.encoder_value() as f32);
            out.extend_from_slice(&encoded);
        }
        OutputFormat::Avif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut out,
                6,
                quality.encoder_value(),
            );
            rgba.write_with_encoder(encoder).map_err(encode_err)?;
        }
        OutputFormat::Ico if img.width() > ICO_MAX_EDGE || img.height() > ICO_MAX_EDGE => {
            return Err(BackendError::Encode {
                format,
                reason: format!(
                    "{}x{} exceeds the {ICO_MAX_EDGE}px icon limit",
                    img.width(),
                    img.height()
                ),
            });
        }
        other => {
            // Every remaining encoder accepts RGBA8; not all accept L8/LA8/16-bit
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut Cursor::new(&mut out), other.image_format())
                .map_err(encode_err)?;
        }
    }
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
        if is_avif(source) {
            return identify_avif(source);
        }
        let (width, height) = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn encode(&self, params: &EncodeParams<'_>) -> Result<Vec<u8>, BackendError> {
        if let Some(size) = params.size {
            check_target(size, params.format)?;
        }
        let img = load_image(params.source)?;

        let img = match params.size {
            Some(size) if size.is_known() && (size.width, size.height) != img.dimensions() => {
                img.resize_exact(size.width, size.height, FilterType::Lanczos3)
            }
            _ => img,
        };

        encode_image(&img, params.format, params.quality)
    }
}
