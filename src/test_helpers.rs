//! Shared test utilities for the photofolio test suite.
//!
//! Provides timestamp shorthands, real image fixtures encoded in memory,
//! hand-built EXIF blocks, and manifest lookups.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = with_exif(&jpeg_bytes(40, 30), Some("2019:08:04 17:45:10"), Some(6));
//! let store = MemoryStore::new("photos").with_object("a.jpg", &jpeg, utc(2024, 1, 1, 0, 0, 0));
//! ```

use chrono::{DateTime, TimeZone, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage};

use crate::types::{EnrichedRecord, Manifest};

// =========================================================================
// Time
// =========================================================================

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

// =========================================================================
// Image fixtures
// =========================================================================

/// A real, decodable baseline JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// A real PNG of the given size (PNG carries no EXIF in our reader).
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =========================================================================
// EXIF fixtures
// =========================================================================

/// A TIFF structure holding an optional Orientation in IFD0 and an optional
/// DateTimeOriginal in an Exif sub-IFD.
pub fn exif_tiff(date: Option<&str>, orientation: Option<u16>, big_endian: bool) -> Vec<u8> {
    let u16b = |v: u16| {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    };
    let u32b = |v: u32| {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    };

    let ifd0_entries = orientation.is_some() as u16 + date.is_some() as u16;
    let exif_ifd_offset = 8 + 2 + 12 * ifd0_entries as u32 + 4;
    let date_offset = exif_ifd_offset + 2 + 12 + 4;

    let mut out = Vec::new();
    out.extend_from_slice(if big_endian { b"MM" } else { b"II" });
    out.extend_from_slice(&u16b(42));
    out.extend_from_slice(&u32b(8));

    // IFD0, tags in ascending order
    out.extend_from_slice(&u16b(ifd0_entries));
    if let Some(o) = orientation {
        out.extend_from_slice(&u16b(0x0112));
        out.extend_from_slice(&u16b(3));
        out.extend_from_slice(&u32b(1));
        out.extend_from_slice(&u16b(o));
        out.extend_from_slice(&[0, 0]);
    }
    if date.is_some() {
        out.extend_from_slice(&u16b(0x8769));
        out.extend_from_slice(&u16b(4));
        out.extend_from_slice(&u32b(1));
        out.extend_from_slice(&u32b(exif_ifd_offset));
    }
    out.extend_from_slice(&u32b(0));

    if let Some(date) = date {
        let mut ascii = date.as_bytes().to_vec();
        ascii.push(0);
        out.extend_from_slice(&u16b(1));
        out.extend_from_slice(&u16b(0x9003));
        out.extend_from_slice(&u16b(2));
        out.extend_from_slice(&u32b(ascii.len() as u32));
        out.extend_from_slice(&u32b(date_offset));
        out.extend_from_slice(&u32b(0));
        out.extend_from_slice(&ascii);
    }
    out
}

/// Insert an `APP1` Exif segment right after the JPEG's SOI marker.
pub fn with_exif(jpeg: &[u8], date: Option<&str>, orientation: Option<u16>) -> Vec<u8> {
    assert!(jpeg.starts_with(&[0xFF, 0xD8]), "not a JPEG");
    let tiff = exif_tiff(date, orientation, false);
    let seg_len = (2 + 6 + tiff.len()) as u16;

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&seg_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// SOI + Exif APP1 + EOI: enough for the EXIF reader, not decodable.
pub fn exif_jpeg(date: Option<&str>, orientation: Option<u16>) -> Vec<u8> {
    with_exif(&[0xFF, 0xD8, 0xFF, 0xD9], date, orientation)
}

// =========================================================================
// Manifest helpers
// =========================================================================

pub fn record(key: &str, sort_date: DateTime<Utc>) -> EnrichedRecord {
    EnrichedRecord {
        key: key.to_string(),
        last_modified: sort_date,
        sort_date,
        width: None,
        height: None,
    }
}

/// Keys in manifest order.
pub fn keys(manifest: &Manifest) -> Vec<&str> {
    manifest.iter().map(|r| r.key.as_str()).collect()
}

/// Find a record by key. Panics if not found.
pub fn find_record<'a>(manifest: &'a Manifest, key: &str) -> &'a EnrichedRecord {
    manifest.find(key).unwrap_or_else(|| {
        panic!("record '{key}' not found. Available: {:?}", keys(manifest))
    })
}
