//! Shared gallery types.
//!
//! A [`Manifest`] is what the gallery builder produces, what the manifest
//! cache persists, and what the ETag deriver and the HTTP layer read. It is
//! serialized to JSON inside the on-disk cache envelope, so field names are
//! part of the cache format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a record's `sort_date` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    /// EXIF `DateTimeOriginal` inside the image.
    Embedded,
    /// A date pattern in the file name.
    Filename,
    /// The store's last-modified timestamp.
    Storage,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DateSource::Embedded => "embedded",
            DateSource::Filename => "filename",
            DateSource::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// One gallery entry: an object from the listing plus the metadata the
/// gallery is ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub sort_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Ordered gallery view: newest `sort_date` first, ties in listing order,
/// no duplicate keys.
///
/// Never mutated once built; the cache replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub records: Vec<EnrichedRecord>,
}

impl Manifest {
    pub fn new(records: Vec<EnrichedRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedRecord> {
        self.records.iter()
    }

    pub fn find(&self, key: &str) -> Option<&EnrichedRecord> {
        self.records.iter().find(|r| r.key == key)
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a EnrichedRecord;
    type IntoIter = std::slice::Iter<'a, EnrichedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(key: &str, dims: Option<(u32, u32)>) -> EnrichedRecord {
        let t = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        EnrichedRecord {
            key: key.to_string(),
            last_modified: t,
            sort_date: t,
            width: dims.map(|d| d.0),
            height: dims.map(|d| d.1),
        }
    }

    #[test]
    fn dimensions_omitted_when_absent() {
        let json = serde_json::to_value(record("a.jpg", None)).unwrap();
        assert!(json.get("width").is_none());
        assert!(json.get("height").is_none());

        let json = serde_json::to_value(record("a.jpg", Some((4000, 3000)))).unwrap();
        assert_eq!(json["width"], 4000);
        assert_eq!(json["height"], 3000);
    }

    #[test]
    fn manifest_serializes_as_array() {
        let m = Manifest::new(vec![record("a.jpg", None), record("b.jpg", None)]);
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.is_array());
        assert_eq!(json[1]["key"], "b.jpg");
    }

    #[test]
    fn find_by_key() {
        let m = Manifest::new(vec![record("a.jpg", None), record("b.jpg", Some((1, 2)))]);
        assert_eq!(m.find("b.jpg").and_then(|r| r.width), Some(1));
        assert!(m.find("c.jpg").is_none());
        assert_eq!(m.len(), 2);
        assert!(!m.is_empty());
        assert!(Manifest::default().is_empty());
    }

    #[test]
    fn date_source_display() {
        assert_eq!(DateSource::Embedded.to_string(), "embedded");
        assert_eq!(DateSource::Storage.to_string(), "storage");
    }
}
