//! On-disk thumbnail cache.
//!
//! A thumbnail is generated the first time it is requested and served from
//! `<cache_dir>/thumbnails/` from then on. Nothing is ever evicted: file
//! names embed a hash of the key and the configured width (see
//! [`thumbnail_file_name`]), so a changed width simply produces new files
//! and `photofolio thumbnails --clear` removes the old ones.
//!
//! ```text
//! get_or_create(key)
//!   ├── file exists ──► read it
//!   └── miss ──► store.get ──► backend.thumbnail ──► temp file + rename ──► bytes
//! ```
//!
//! Concurrent misses for the same key both generate. Each write is atomic,
//! so the file always holds one complete thumbnail.

use crate::config::ThumbnailsConfig;
use crate::imaging::{BackendError, ImageBackend, Quality, Sharpening, ThumbnailParams};
use crate::naming::thumbnail_file_name;
use crate::store::{ObjectStore, StoreError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

const TEMP_PREFIX: &str = ".thumb-";

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("fetching original failed: {0}")]
    Store(#[from] StoreError),
    #[error("thumbnail generation failed: {0}")]
    Decode(#[from] BackendError),
    #[error("thumbnail cache IO error: {0}")]
    Io(#[from] io::Error),
}

/// JPEG bytes plus whether this call produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub generated: bool,
}

/// Files and total size currently in the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThumbnailStats {
    pub files: usize,
    pub bytes: u64,
}

pub struct ThumbnailCache {
    dir: PathBuf,
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn ImageBackend>,
    params: ThumbnailParams,
}

impl ThumbnailCache {
    pub fn new(
        dir: PathBuf,
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn ImageBackend>,
        params: ThumbnailParams,
    ) -> Self {
        Self {
            dir,
            store,
            backend,
            params,
        }
    }

    /// Thumbnail parameters for a `[thumbnails]` config section.
    pub fn params_for(config: &ThumbnailsConfig) -> ThumbnailParams {
        ThumbnailParams {
            max_width: config.max_width,
            quality: Quality::new(config.quality),
            sharpening: Some(Sharpening::light()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(thumbnail_file_name(key, self.params.max_width))
    }

    /// Return the cached thumbnail for `key`, generating it on a miss.
    pub fn get_or_create(&self, key: &str) -> Result<Thumbnail, ThumbnailError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, "thumbnail cache hit");
                return Ok(Thumbnail {
                    bytes,
                    generated: false,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let started = Instant::now();
        let original = self.store.get(key)?;
        let bytes = self.backend.thumbnail(&original.bytes, &self.params)?;
        self.write_atomic(&path, &bytes)?;
        info!(
            key,
            source_bytes = original.bytes.len(),
            thumbnail_bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "thumbnail generated"
        );
        Ok(Thumbnail {
            bytes,
            generated: true,
        })
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Count generated thumbnails in `dir`. A missing directory is an empty
/// cache.
pub fn dir_stats(dir: &Path) -> io::Result<ThumbnailStats> {
    let mut stats = ThumbnailStats::default();
    for entry in entries(dir) {
        let entry = entry?;
        stats.files += 1;
        stats.bytes += entry.metadata().map_err(io::Error::other)?.len();
    }
    Ok(stats)
}

/// Delete every generated thumbnail in `dir`. Returns how many were removed.
pub fn clear_dir(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in entries(dir) {
        fs::remove_file(entry?.path())?;
        removed += 1;
    }
    info!(dir = %dir.display(), removed, "thumbnail cache cleared");
    Ok(removed)
}

/// Thumbnail files directly inside `dir`, temp files excluded.
fn entries(dir: &Path) -> impl Iterator<Item = io::Result<walkdir::DirEntry>> {
    let exists = dir.is_dir();
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter(move |_| exists)
        .filter_map(|entry| match entry {
            Ok(e) => {
                let name = e.file_name().to_string_lossy();
                let keep = e.file_type().is_file()
                    && !name.starts_with(TEMP_PREFIX)
                    && name.ends_with(".jpg");
                keep.then_some(Ok(e))
            }
            Err(e) => Some(Err(io::Error::other(e))),
        })
}
