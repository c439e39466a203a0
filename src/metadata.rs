//! Per-object metadata extraction.
//!
//! Every photo in the gallery is ordered by a `sort_date`, resolved from
//! three sources in priority order. The first source that yields a value
//! wins; values are never merged across sources.
//!
//! | Priority | Source | Where it comes from |
//! |---|---|---|
//! | 1 | [`Embedded`](DateSource::Embedded) | EXIF `DateTimeOriginal` in the first `probe_bytes` of the object |
//! | 2 | [`Filename`](DateSource::Filename) | a date pattern in the key's file name ([`naming::parse_filename_date`]) |
//! | 3 | [`Storage`](DateSource::Storage) | the store's `last_modified`, always present |
//!
//! ## The embedded probe
//!
//! One ranged GET fetches a bounded prefix of the object. EXIF and the
//! image header both sit at the front of JPEG and TIFF files, so the full
//! object is never downloaded. From that prefix:
//!
//! - the capture time is EXIF `DateTimeOriginal`, read as UTC;
//! - dimensions come from the image header, swapped for EXIF orientations
//!   5–8 so they describe the image as displayed.
//!
//! Dimensions are reported whenever the header decodes, whichever source
//! ends up supplying the date. An object whose prefix cannot be fetched or
//! decoded simply has no dimensions (absent, not zero).
//!
//! Nothing in the probe is an error. A network failure, an unknown format
//! or a missing tag is logged at debug level and the chain moves on.

use crate::imaging::{ImageBackend, display_dimensions};
use crate::naming::parse_filename_date;
use crate::store::{ByteRange, ObjectRecord, ObjectStore};
use crate::types::{DateSource, EnrichedRecord};
use chrono::{DateTime, Utc};
use tracing::debug;

/// What the extractor learned about one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub sort_date: DateTime<Utc>,
    pub source: DateSource,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ExtractedMetadata {
    /// Fallback for an object whose extraction could not run at all.
    pub fn storage_only(record: &ObjectRecord) -> Self {
        Self {
            sort_date: record.last_modified,
            source: DateSource::Storage,
            width: None,
            height: None,
        }
    }

    pub fn into_record(self, record: &ObjectRecord) -> EnrichedRecord {
        EnrichedRecord {
            key: record.key.clone(),
            last_modified: record.last_modified,
            sort_date: self.sort_date,
            width: self.width,
            height: self.height,
        }
    }
}

/// Result of the embedded-metadata probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddedProbe {
    pub capture_time: Option<DateTime<Utc>>,
    /// Display dimensions (orientation applied).
    pub dimensions: Option<(u32, u32)>,
}

/// Fetch the first `probe_bytes` of `key` and read EXIF and header data.
pub fn probe_embedded(
    store: &dyn ObjectStore,
    backend: &dyn ImageBackend,
    key: &str,
    probe_bytes: u64,
) -> EmbeddedProbe {
    let bytes = match store.get_range(key, ByteRange::prefix(probe_bytes)) {
        Ok(b) => b,
        Err(e) => {
            debug!(key, error = %e, "embedded probe fetch failed");
            return EmbeddedProbe::default();
        }
    };

    let exif = backend.read_exif(&bytes);
    let dimensions = match backend.identify(&bytes) {
        Ok(d) => Some(display_dimensions((d.width, d.height), exif.orientation)),
        Err(e) => {
            debug!(key, error = %e, "image header not decodable");
            None
        }
    };
    if exif.capture_time.is_none() {
        debug!(key, "no embedded capture time");
    }

    EmbeddedProbe {
        capture_time: exif.capture_time.map(|t| t.and_utc()),
        dimensions,
    }
}

/// A lazily evaluated date source.
pub type DateProbe<'a> = (DateSource, &'a dyn Fn() -> Option<DateTime<Utc>>);

/// Run probes in order and return the first value present, with its
/// source. Later probes are not evaluated once one succeeds.
///
/// ```text
/// sort_date: first_present(&[embedded, filename, storage])
/// ```
pub fn first_present(probes: &[DateProbe<'_>]) -> Option<(DateTime<Utc>, DateSource)> {
    probes
        .iter()
        .find_map(|(source, probe)| probe().map(|date| (date, *source)))
}

/// Resolve `sort_date` from an embedded capture time, the key and the
/// storage timestamp.
pub fn resolve_sort_date(
    embedded: Option<DateTime<Utc>>,
    key: &str,
    last_modified: DateTime<Utc>,
) -> (DateTime<Utc>, DateSource) {
    let from_embedded = || embedded;
    let from_filename = || parse_filename_date(key);
    let from_storage = || Some(last_modified);
    let probes: [DateProbe<'_>; 3] = [
        (DateSource::Embedded, &from_embedded),
        (DateSource::Filename, &from_filename),
        (DateSource::Storage, &from_storage),
    ];
    first_present(&probes).unwrap_or((last_modified, DateSource::Storage))
}

/// Extract sort date and dimensions for one listed object.
pub fn extract(
    store: &dyn ObjectStore,
    backend: &dyn ImageBackend,
    record: &ObjectRecord,
    probe_bytes: u64,
) -> ExtractedMetadata {
    let probe = probe_embedded(store, backend, &record.key, probe_bytes);
    let (sort_date, source) =
        resolve_sort_date(probe.capture_time, &record.key, record.last_modified);
    ExtractedMetadata {
        sort_date,
        source,
        width: probe.dimensions.map(|d| d.0),
        height: probe.dimensions.map(|d| d.1),
    }
}
