//! Layered manifest cache.
//!
//! Building a manifest costs one bucket listing plus one ranged GET per
//! object, so a gallery of a few thousand photos takes seconds. The cache
//! keeps the result and hands it out until it is older than the configured
//! TTL.
//!
//! # Layers
//!
//! | Layer | Storage | Survives restart |
//! |---|---|---|
//! | 1. memory | `RwLock<Option<Arc<CacheEnvelope>>>` | no |
//! | 2. disk | `<cache_dir>/gallery-manifest.json` | yes |
//! | 3. rebuild | [`GalleryBuilder::build`] | n/a |
//!
//! A lookup walks the layers in order and stops at the first *fresh*
//! envelope (`now - created_at < ttl`). A disk hit is promoted into memory.
//! A rebuild writes both layers.
//!
//! ## Envelope format
//!
//! ```json
//! { "version": 1, "created_at": "2024-05-01T12:00:00Z", "manifest": [ ... ] }
//! ```
//!
//! A missing file, corrupt JSON and a different `version` are all treated
//! the same way: no envelope. Bump [`ENVELOPE_VERSION`] whenever the record
//! shape changes. The validation token is never stored here; it is derived
//! per request (see [`etag`](crate::etag)).
//!
//! ## Writes
//!
//! The envelope is written to a uniquely named temporary file in the cache
//! directory, fsynced, then renamed over the target. Readers see either the
//! old file or the new one, never a partial write. A failed write is logged
//! and the freshly built manifest is still served from memory.
//!
//! ## Concurrency
//!
//! No lock is held while rebuilding. Two requests that miss at the same time
//! both rebuild; both results are valid and the last one installed wins.
//!
//! ## Failures
//!
//! When a rebuild fails, whatever envelope existed stays in place. If the
//! failure is transient or a not-found and a stale envelope is available,
//! the stale manifest is served instead. Credential failures always
//! propagate.

use crate::clock::Clock;
use crate::gallery::GalleryBuilder;
use crate::store::StoreError;
use crate::types::Manifest;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Name of the envelope file within the cache directory.
pub const MANIFEST_FILENAME: &str = "gallery-manifest.json";

/// Version of the envelope format. Bump this to invalidate all existing
/// envelopes when the format changes.
pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("gallery build failed: {0}")]
    Build(#[from] StoreError),
    #[error("cache IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A manifest plus the moment it was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub manifest: Arc<Manifest>,
}

impl CacheEnvelope {
    pub fn new(manifest: Manifest, created_at: DateTime<Utc>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            created_at,
            manifest: Arc::new(manifest),
        }
    }

    /// Fresh while younger than `ttl`. An envelope dated in the future
    /// (clock moved backwards) is not trusted.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now - self.created_at;
        age >= TimeDelta::zero() && TimeDelta::from_std(ttl).map_or(true, |ttl| age < ttl)
    }

    /// Load from `path`. Returns `None` if the file doesn't exist or can't
    /// be parsed (version mismatch, corruption).
    pub fn load(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return None,
        };
        let envelope: Self = match serde_json::from_str(&content) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable manifest cache");
                return None;
            }
        };
        if envelope.version != ENVELOPE_VERSION {
            debug!(
                found = envelope.version,
                expected = ENVELOPE_VERSION,
                "ignoring manifest cache with other format version"
            );
            return None;
        }
        Some(envelope)
    }

    /// Atomically replace the file at `path`.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec(self)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".gallery-manifest-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Lookup outcome counters. Updated with relaxed atomics from any thread.
#[derive(Debug, Default)]
pub struct CacheStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    rebuilds: AtomicU64,
    stale_serves: AtomicU64,
}

impl CacheStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn memory_hits(&self) -> u64 {
        self.memory_hits.load(Ordering::Relaxed)
    }

    pub fn disk_hits(&self) -> u64 {
        self.disk_hits.load(Ordering::Relaxed)
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    pub fn stale_serves(&self) -> u64 {
        self.stale_serves.load(Ordering::Relaxed)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} memory hits, {} disk hits, {} rebuilds",
            self.memory_hits(),
            self.disk_hits(),
            self.rebuilds()
        )?;
        if self.stale_serves() > 0 {
            write!(f, ", {} served stale", self.stale_serves())?;
        }
        Ok(())
    }
}

pub struct ManifestCache {
    builder: Arc<GalleryBuilder>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    path: PathBuf,
    memory: RwLock<Option<Arc<CacheEnvelope>>>,
    stats: CacheStats,
}

impl ManifestCache {
    pub fn new(
        builder: Arc<GalleryBuilder>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        cache_dir: &Path,
    ) -> Self {
        Self {
            builder,
            clock,
            ttl,
            path: manifest_path(cache_dir),
            memory: RwLock::new(None),
            stats: CacheStats::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// The envelope currently held in memory, fresh or not.
    pub fn current(&self) -> Option<Arc<CacheEnvelope>> {
        self.memory
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn install(&self, envelope: Arc<CacheEnvelope>) {
        *self.memory.write().unwrap_or_else(|p| p.into_inner()) = Some(envelope);
    }

    /// Return a fresh manifest, rebuilding if no layer has one.
    pub fn get_or_build(&self) -> Result<Arc<Manifest>, CacheError> {
        let now = self.clock.now();

        let in_memory = self.current();
        if let Some(envelope) = &in_memory
            && envelope.is_fresh(now, self.ttl)
        {
            CacheStats::bump(&self.stats.memory_hits);
            return Ok(Arc::clone(&envelope.manifest));
        }

        let on_disk = CacheEnvelope::load(&self.path).map(Arc::new);
        if let Some(envelope) = &on_disk
            && envelope.is_fresh(now, self.ttl)
        {
            debug!(path = %self.path.display(), records = envelope.manifest.len(), "manifest loaded from disk");
            CacheStats::bump(&self.stats.disk_hits);
            self.install(Arc::clone(envelope));
            return Ok(Arc::clone(&envelope.manifest));
        }

        match self.builder.build() {
            Ok(manifest) => {
                let envelope = Arc::new(CacheEnvelope::new(manifest, self.clock.now()));
                if let Err(e) = envelope.save(&self.path) {
                    error!(path = %self.path.display(), error = %e, "failed to persist manifest cache");
                }
                CacheStats::bump(&self.stats.rebuilds);
                self.install(Arc::clone(&envelope));
                Ok(Arc::clone(&envelope.manifest))
            }
            Err(e) if e.is_transient() || e.is_not_found() => {
                let Some(stale) = in_memory.or(on_disk) else {
                    return Err(CacheError::Build(e));
                };
                warn!(
                    error = %e,
                    created_at = %stale.created_at,
                    records = stale.manifest.len(),
                    "gallery rebuild failed, serving stale manifest"
                );
                CacheStats::bump(&self.stats.stale_serves);
                Ok(Arc::clone(&stale.manifest))
            }
            Err(e) => Err(CacheError::Build(e)),
        }
    }

    /// Drop the memory layer and delete the disk layer.
    pub fn invalidate(&self) -> io::Result<()> {
        *self.memory.write().unwrap_or_else(|p| p.into_inner()) = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "manifest cache invalidated");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Resolve the envelope path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}
