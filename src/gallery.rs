//! Gallery builder: bucket listing → ordered [`Manifest`].
//!
//! ```text
//! list_all ──► de-duplicate ──► extract (rayon pool) ──► stable sort ──► Manifest
//! ```
//!
//! 1. **List** every object once. A listing failure fails the whole build;
//!    there is no partial gallery.
//! 2. **De-duplicate** keys, keeping the first listed occurrence.
//! 3. **Extract** metadata for every record on a small dedicated thread
//!    pool (see [`metadata`](crate::metadata)). The pool exists to overlap
//!    per-object network round trips, not for CPU work, so it stays small.
//!    Results come back in listing order. A failure or panic inside one
//!    extraction falls back to the storage timestamp for that record only.
//! 4. **Sort** by `sort_date`, newest first. The sort is stable, so records
//!    with equal dates keep their listing order and repeated builds over an
//!    unchanged bucket produce identical manifests.
//!
//! The builder does no caching of its own; that is the job of
//! [`ManifestCache`](crate::cache::ManifestCache).

use crate::imaging::ImageBackend;
use crate::metadata::{self, ExtractedMetadata};
use crate::store::{ObjectRecord, ObjectStore, StoreError};
use crate::types::{DateSource, Manifest};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct GalleryBuilder {
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn ImageBackend>,
    pool: rayon::ThreadPool,
    probe_bytes: u64,
}

/// Counts from one build, logged after every rebuild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub records: usize,
    pub duplicates: usize,
    pub embedded: usize,
    pub filename: usize,
    pub storage: usize,
    pub isolated_failures: usize,
    pub elapsed_ms: u128,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} photos ({} embedded, {} filename, {} storage dates)",
            self.records, self.embedded, self.filename, self.storage
        )?;
        if self.duplicates > 0 {
            write!(f, ", {} duplicate keys dropped", self.duplicates)?;
        }
        if self.isolated_failures > 0 {
            write!(f, ", {} extraction failures", self.isolated_failures)?;
        }
        write!(f, " in {}ms", self.elapsed_ms)
    }
}

impl GalleryBuilder {
    /// Create a builder with its own pool of `workers` threads.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn ImageBackend>,
        workers: usize,
        probe_bytes: u64,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("gallery-extract-{i}"))
            .build()?;
        Ok(Self {
            store,
            backend,
            pool,
            probe_bytes,
        })
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Build the manifest from a fresh listing.
    pub fn build(&self) -> Result<Manifest, StoreError> {
        self.build_with_summary().map(|(manifest, _)| manifest)
    }

    pub fn build_with_summary(&self) -> Result<(Manifest, BuildSummary), StoreError> {
        let started = Instant::now();
        let listed = self.store.list_all()?;
        let listed_count = listed.len();
        let records = dedupe(listed);

        let extracted: Vec<Option<ExtractedMetadata>> = self.pool.install(|| {
            records
                .par_iter()
                .map(|record| self.extract_isolated(record))
                .collect()
        });

        let mut summary = BuildSummary {
            records: records.len(),
            duplicates: listed_count - records.len(),
            ..BuildSummary::default()
        };
        let mut enriched = Vec::with_capacity(records.len());
        for (record, meta) in records.iter().zip(extracted) {
            let meta = meta.unwrap_or_else(|| {
                summary.isolated_failures += 1;
                ExtractedMetadata::storage_only(record)
            });
            match meta.source {
                DateSource::Embedded => summary.embedded += 1,
                DateSource::Filename => summary.filename += 1,
                DateSource::Storage => summary.storage += 1,
            }
            enriched.push(meta.into_record(record));
        }

        // Vec::sort_by is stable: equal dates keep listing order.
        enriched.sort_by(|a, b| b.sort_date.cmp(&a.sort_date));

        summary.elapsed_ms = started.elapsed().as_millis();
        info!(
            bucket = self.store.bucket(),
            records = summary.records,
            embedded = summary.embedded,
            filename = summary.filename,
            storage = summary.storage,
            duplicates = summary.duplicates,
            isolated_failures = summary.isolated_failures,
            elapsed_ms = summary.elapsed_ms as u64,
            "gallery built: {summary}"
        );
        Ok((Manifest::new(enriched), summary))
    }

    /// Run extraction for one record, containing any panic inside it.
    fn extract_isolated(&self, record: &ObjectRecord) -> Option<ExtractedMetadata> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            metadata::extract(
                self.store.as_ref(),
                self.backend.as_ref(),
                record,
                self.probe_bytes,
            )
        }));
        match result {
            Ok(meta) => Some(meta),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(key = %record.key, reason = %reason, "metadata extraction panicked, using storage timestamp");
                None
            }
        }
    }
}

/// Drop later occurrences of an already-seen key.
fn dedupe(records: Vec<ObjectRecord>) -> Vec<ObjectRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| {
            let first = seen.insert(r.key.clone());
            if !first {
                warn!(key = %r.key, "duplicate key in listing, keeping first occurrence");
            }
            first
        })
        .collect()
}
