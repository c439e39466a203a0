//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. The thumbnail
//! cache decides what to make; the [`backend`](super::backend) does the pixel
//! work. A mock backend can therefore stand in without touching cache logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold) for thumbnail crispness.
//! - [`ThumbnailParams`]: Bounding width, quality, optional sharpening.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening suitable for thumbnails.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// Parameters for a thumbnail: fit within `max_width`, never upscale,
/// display orientation applied, JPEG output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailParams {
    pub max_width: u32,
    pub quality: Quality,
    pub sharpening: Option<Sharpening>,
}
