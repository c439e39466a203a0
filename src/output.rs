//! CLI output formatting.
//!
//! Each command has a `format_*` function returning `Vec<String>` for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. Diagnostics never go
//! through here; they are `tracing` events on stderr.
//!
//! # Output Format
//!
//! ## warm
//!
//! ```text
//! Photos (3)
//! 001 IMG_20230615_143022.jpg
//!     Date: 2023-06-15 14:30:22 UTC
//!     Size: 1200×800
//! 002 trips/kyoto.jpg
//!     Date: 2022-01-01 00:00:00 UTC
//!
//! Manifest: .photofolio-cache/gallery-manifest.json (built 2024-06-01 12:00:00 UTC)
//! ETag: "9f2c…"
//! Cache: 0 memory hits, 0 disk hits, 1 rebuilds
//! ```
//!
//! ## check
//!
//! ```text
//! Server
//!     Address: 0.0.0.0:8080
//! Store
//!     Endpoint: http://minio:9000
//!     Bucket: portfolio
//!     ...
//! ```
//!
//! ## thumbnails
//!
//! ```text
//! Thumbnails: 42 files, 3.1 MiB in .photofolio-cache/thumbnails
//! ```

use crate::config::AppConfig;
use crate::etag::etag_header;
use crate::thumbnails::ThumbnailStats;
use crate::types::Manifest;
use chrono::{DateTime, Utc};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Human-readable byte count in binary units.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn section(lines: &mut Vec<String>, title: &str, rows: &[(&str, String)]) {
    lines.push(title.to_string());
    for (label, value) in rows {
        lines.push(format!("{}{}: {}", indent(1), label, value));
    }
}

// ============================================================================
// warm
// ============================================================================

/// Format a manifest in display order.
pub fn format_manifest(manifest: &Manifest) -> Vec<String> {
    let mut lines = vec![format!("Photos ({})", manifest.len())];
    for (i, record) in manifest.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), record.key));
        lines.push(format!("{}Date: {}", indent(1), format_time(record.sort_date)));
        if let (Some(w), Some(h)) = (record.width, record.height) {
            lines.push(format!("{}Size: {}×{}", indent(1), w, h));
        }
    }
    lines
}

/// Format the result of `warm`: manifest, where it was written, the
/// current `/photos` token and how the cache answered.
pub fn format_warm_output(
    manifest: &Manifest,
    manifest_path: &Path,
    built_at: Option<DateTime<Utc>>,
    token: Option<&str>,
    cache_stats: &str,
) -> Vec<String> {
    let mut lines = format_manifest(manifest);
    lines.push(String::new());
    match built_at {
        Some(t) => lines.push(format!(
            "Manifest: {} (built {})",
            manifest_path.display(),
            format_time(t)
        )),
        None => lines.push(format!("Manifest: {}", manifest_path.display())),
    }
    match token {
        Some(token) => lines.push(format!("ETag: {}", etag_header(token))),
        None => lines.push("ETag: none (empty gallery)".to_string()),
    }
    lines.push(format!("Cache: {cache_stats}"));
    lines
}

pub fn print_warm_output(
    manifest: &Manifest,
    manifest_path: &Path,
    built_at: Option<DateTime<Utc>>,
    token: Option<&str>,
    cache_stats: &str,
) {
    for line in format_warm_output(manifest, manifest_path, built_at, token, cache_stats) {
        println!("{}", line);
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the effective configuration. Secrets are never shown.
pub fn format_config(config: &AppConfig) -> Vec<String> {
    let mut lines = Vec::new();
    section(&mut lines, "Server", &[("Address", config.server.addr.clone())]);

    let store = &config.store;
    let credentials = match (&store.access_key, &store.secret_key) {
        (Some(key), Some(_)) => format!("static ({key})"),
        (Some(key), None) => format!("static ({key}, no secret)"),
        _ => "default AWS chain".to_string(),
    };
    section(
        &mut lines,
        "Store",
        &[
            (
                "Endpoint",
                store.endpoint.clone().unwrap_or_else(|| "AWS S3".to_string()),
            ),
            ("Region", store.region.clone()),
            ("Bucket", store.bucket.clone()),
            ("Credentials", credentials),
            ("Path-style", store.force_path_style.to_string()),
            ("Timeout", format!("{}s", store.timeout_secs)),
        ],
    );

    let g = &config.gallery;
    section(
        &mut lines,
        "Gallery",
        &[
            ("Manifest TTL", format!("{}s", g.manifest_ttl_secs)),
            ("Signed URL TTL", format!("{}s", g.signed_url_ttl_secs)),
            ("Token rotation", format!("every {}s", g.time_bucket_secs)),
            ("Workers", g.workers.to_string()),
            ("Probe", format_bytes(g.probe_bytes)),
            (
                "Full-size URLs",
                if g.use_proxy { "proxied" } else { "signed" }.to_string(),
            ),
        ],
    );
    section(
        &mut lines,
        "Thumbnails",
        &[
            ("Max width", format!("{}px", config.thumbnails.max_width)),
            ("Quality", config.thumbnails.quality.to_string()),
        ],
    );
    section(
        &mut lines,
        "Cache",
        &[("Directory", config.cache.dir.display().to_string())],
    );
    section(
        &mut lines,
        "Portfolio",
        &[
            ("Title", config.portfolio.title.clone()),
            ("Contact", config.portfolio.contact_email.clone()),
        ],
    );
    lines
}

pub fn print_config(config: &AppConfig) {
    for line in format_config(config) {
        println!("{}", line);
    }
}

// ============================================================================
// thumbnails
// ============================================================================

pub fn format_thumbnail_stats(stats: &ThumbnailStats, dir: &Path) -> String {
    format!(
        "Thumbnails: {} files, {} in {}",
        stats.files,
        format_bytes(stats.bytes),
        dir.display()
    )
}

pub fn format_thumbnails_cleared(removed: usize, dir: &Path) -> String {
    format!("Removed {} thumbnails from {}", removed, dir.display())
}
