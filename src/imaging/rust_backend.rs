//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Format sniffing | `image::ImageReader::with_guessed_format` (magic bytes, not key extension) |
//! | Identify | `ImageReader::into_dimensions` (header only, works on a prefix) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Orientation | `DynamicImage::rotate90` / `rotate180` / `rotate270` / `fliph` / `flipv` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | EXIF | custom `exif_parser` (JPEG APP1 + TIFF IFD) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_thumbnail_dimensions;
use super::exif_parser::{self, ExifData};
use super::params::ThumbnailParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageReader};
use std::io::Cursor;

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

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(BackendError::Io)
}

/// Decode a complete image from memory.
fn load_image(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let reader = reader(bytes)?;
    if reader.format().is_none() {
        return Err(BackendError::Decode("unrecognised image format".into()));
    }
    reader
        .decode()
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Rotate/flip stored pixels into display orientation (EXIF 1–8).
fn apply_orientation(img: DynamicImage, orientation: Option<u16>) -> DynamicImage {
    match orientation {
        Some(2) => img.fliph(),
        Some(3) => img.rotate180(),
        Some(4) => img.flipv(),
        Some(5) => img.rotate90().fliph(),
        Some(6) => img.rotate90(),
        Some(7) => img.rotate270().fliph(),
        Some(8) => img.rotate270(),
        _ => img,
    }
}

/// Encode as baseline JPEG. Alpha is dropped.
fn encode_jpeg(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100) as u8)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let reader = reader(bytes)?;
        if reader.format().is_none() {
            return Err(BackendError::Decode("unrecognised image format".into()));
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn read_exif(&self, bytes: &[u8]) -> ExifData {
        exif_parser::read_exif(bytes)
    }

    fn thumbnail(&self, bytes: &[u8], params: &ThumbnailParams) -> Result<Vec<u8>, BackendError> {
        let orientation = exif_parser::read_exif(bytes).orientation;
        let img = apply_orientation(load_image(bytes)?, orientation);

        let (w, h) = calculate_thumbnail_dimensions((img.width(), img.height()), params.max_width);
        let resized = if (w, h) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(w, h, FilterType::Lanczos3)
        };

        let final_img = match params.sharpening {
            Some(sharpening) => DynamicImage::from(image::imageops::unsharpen(
                &resized,
                sharpening.sigma,
                sharpening.threshold,
            )),
            None => resized,
        };

        encode_jpeg(&final_img, params.quality.value())
    }
}
