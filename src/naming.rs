//! Object key and file name conventions.
//!
//! Object keys are slash-separated paths (`2023/kyoto/IMG_20230615_143022.jpg`).
//! This module pulls the parts the gallery cares about out of them:
//!
//! - [`file_name`]: the component after the last `/`.
//! - [`parse_filename_date`]: a capture date encoded in the file name by
//!   cameras and phones.
//! - [`thumbnail_file_name`]: a collision-free local file name for a
//!   generated thumbnail.
//!
//! ## Filename dates
//!
//! Two patterns are tried, in order, against the file name only:
//!
//! | Pattern | Example | Result |
//! |---|---|---|
//! | compact `YYYYMMDD[_-]HHMMSS` | `IMG_20230615_143022.jpg` | 2023-06-15 14:30:22 UTC |
//! | loose `YYYY[-_.]MM[-_.]DD` | `2021-12-25 tree.png` | 2021-12-25 00:00:00 UTC |
//!
//! Only the first match of each pattern is considered. A match whose values
//! are not a real calendar date or time (month 13, 25 o'clock) counts as no
//! match, so a bad compact stamp still lets the loose pattern run.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static COMPACT_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{8})[_-]?(\d{6})").unwrap());

static LOOSE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-_.]?(\d{2})[-_.]?(\d{2})").unwrap());

const MAX_SLUG_LEN: usize = 80;

/// Hex chars of the key hash appended to thumbnail names.
const KEY_HASH_LEN: usize = 12;

/// The file name component of an object key.
///
/// - `"2023/kyoto/temple.jpg"` → `"temple.jpg"`
/// - `"temple.jpg"` → `"temple.jpg"`
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Capture date encoded in the key's file name, if any.
pub fn parse_filename_date(key: &str) -> Option<DateTime<Utc>> {
    let name = file_name(key);
    parse_compact(name).or_else(|| parse_loose(name))
}

fn parse_compact(name: &str) -> Option<DateTime<Utc>> {
    let caps = COMPACT_TIMESTAMP.captures(name)?;
    let (ymd, hms) = (&caps[1], &caps[2]);
    let date = ymd_date(&ymd[..4], &ymd[4..6], &ymd[6..])?;
    let time = NaiveTime::from_hms_opt(
        hms[..2].parse().ok()?,
        hms[2..4].parse().ok()?,
        hms[4..].parse().ok()?,
    )?;
    Some(NaiveDateTime::new(date, time).and_utc())
}

fn parse_loose(name: &str) -> Option<DateTime<Utc>> {
    let caps = LOOSE_DATE.captures(name)?;
    let date = ymd_date(&caps[1], &caps[2], &caps[3])?;
    Some(date.and_time(NaiveTime::MIN).and_utc())
}

fn ymd_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Sanitize a string for use in local file names.
///
/// - Replaces non-alphanumeric characters (except dashes) with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn sanitize_slug(title: &str) -> String {
    let mut collapsed = String::with_capacity(title.len());
    let mut prev_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            collapsed.push(c);
            prev_dash = false;
        } else if !prev_dash {
            collapsed.push('-');
            prev_dash = true;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Local file name for the thumbnail of `key` at `max_width`.
///
/// The readable part is the sanitized key; the hash suffix keeps keys that
/// sanitize identically (`a b.jpg`, `a-b.jpg`) apart. The width is part of
/// the name so a config change never serves stale sizes.
pub fn thumbnail_file_name(key: &str, max_width: u32) -> String {
    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    let slug = sanitize_slug(key);
    let hash = &digest[..KEY_HASH_LEN];
    if slug.is_empty() {
        format!("{hash}-w{max_width}.jpg")
    } else {
        format!("{slug}-{hash}-w{max_width}.jpg")
    }
}
