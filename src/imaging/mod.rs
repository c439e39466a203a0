//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` on an in-memory prefix |
//! | **EXIF capture time + orientation** | custom parser (JPEG APP1 + TIFF IFD) |
//! | **Thumbnail** | orientation fix + Lanczos3 `resize_exact` + `unsharpen` → JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **EXIF parser**: tag extraction that tolerates truncated input

pub mod backend;
mod calculations;
pub mod exif_parser;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_thumbnail_dimensions, display_dimensions, swaps_axes};
pub use exif_parser::ExifData;
pub use params::{Quality, Sharpening, ThumbnailParams};
pub use rust_backend::RustBackend;
