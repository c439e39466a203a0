//! Validation tokens for the gallery listing.
//!
//! A client may keep the `/photos` response and revalidate it with
//! `If-None-Match`. The token must change whenever the response would
//! change, and that happens in two ways:
//!
//! - the manifest changed (a key, its order, or its sort date);
//! - the signed URLs inside the cached response are about to expire.
//!
//! The second is handled by mixing a *time bucket* into the hash:
//! `floor(now / time_bucket_secs)`. Every `time_bucket_secs` the token
//! rotates and clients refetch fresh URLs. Config validation requires
//! `time_bucket_secs < signed_url_ttl_secs`, so a client never holds URLs
//! older than one bucket when the next rotation forces a refetch.
//!
//! ## Hash input
//!
//! ```text
//! for each record, in manifest order:
//!     key  \0  sort_date (RFC 3339, nanoseconds)  \0
//! "bucket" \0  floor(now_unix / width) as i64 little-endian
//! ```
//!
//! The token is the lowercase hex SHA-256 digest. Only keys and sort dates
//! are hashed: dimensions and storage timestamps follow from the object
//! content that a changed key or date already captures.
//!
//! An empty manifest has no token ([`None`]), for every bucket width.

use crate::types::Manifest;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Validation token for `manifest` at time `now`.
pub fn derive(manifest: &Manifest, time_bucket_secs: u64, now: DateTime<Utc>) -> Option<String> {
    if manifest.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    for record in manifest {
        hasher.update(record.key.as_bytes());
        hasher.update(b"\0");
        hasher.update(
            record
                .sort_date
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        );
        hasher.update(b"\0");
    }
    hasher.update(b"bucket\0");
    hasher.update(time_bucket(time_bucket_secs, now).to_le_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

/// [`derive`] at the current system time.
pub fn derive_now(manifest: &Manifest, time_bucket_secs: u64) -> Option<String> {
    derive(manifest, time_bucket_secs, Utc::now())
}

/// Index of the bucket containing `now`. A zero width counts as one second.
pub fn time_bucket(time_bucket_secs: u64, now: DateTime<Utc>) -> i64 {
    let width = time_bucket_secs.max(1).min(i64::MAX as u64) as i64;
    now.timestamp().div_euclid(width)
}

/// Quoted header form of a token.
pub fn etag_header(token: &str) -> String {
    format!("\"{token}\"")
}

/// Whether an `If-None-Match` header value matches `token`.
///
/// Accepts a comma-separated list of entity tags, strong or weak (`W/`),
/// quoted or bare, and the `*` wildcard.
pub fn if_none_match_matches(header: &str, token: &str) -> bool {
    header.split(',').map(str::trim).any(|tag| {
        if tag == "*" {
            return true;
        }
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        let tag = tag
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(tag);
        tag == token
    })
}
