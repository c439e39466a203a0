//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Whether an EXIF orientation value rotates the image by 90° or 270°.
///
/// Orientations 5–8 are transposes/rotations: stored width is displayed
/// height. 1–4 (identity, flips, 180°) keep the axes.
pub fn swaps_axes(orientation: u16) -> bool {
    (5..=8).contains(&orientation)
}

/// Stored dimensions mapped to display dimensions for an orientation.
pub fn display_dimensions(stored: (u32, u32), orientation: Option<u16>) -> (u32, u32) {
    match orientation {
        Some(o) if swaps_axes(o) => (stored.1, stored.0),
        _ => stored,
    }
}

/// Calculate thumbnail dimensions that fit within `max_width`.
///
/// Keeps the aspect ratio and never upscales: an image already narrower than
/// `max_width` keeps its size. Height never rounds down to zero.
///
/// # Examples
/// ```
/// # use photofolio::imaging::calculate_thumbnail_dimensions;
/// // 4000x3000 landscape into 600 wide → 600x450
/// assert_eq!(calculate_thumbnail_dimensions((4000, 3000), 600), (600, 450));
///
/// // Small image stays as is
/// assert_eq!(calculate_thumbnail_dimensions((320, 240), 600), (320, 240));
/// ```
pub fn calculate_thumbnail_dimensions(source: (u32, u32), max_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w <= max_width || src_w == 0 {
        return source;
    }
    let h = (max_width as f64 * src_h as f64 / src_w as f64).round() as u32;
    (max_width, h.max(1))
}
