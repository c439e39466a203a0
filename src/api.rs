//! Gallery API service.
//!
//! The transport-independent half of the HTTP surface. [`Gallery`] owns the
//! manifest cache and turns a manifest into the JSON the page consumes:
//!
//! ```text
//! get_or_build ──► derive token ──► If-None-Match? ──► HEAD? ──► sign every record
//!      │                │                 │               │
//!   CacheError       None → Empty    NotModified        Probe
//! ```
//!
//! Signed URLs are created per request and never cached, so a response is
//! only as old as its token's time bucket. Everything here blocks; the
//! server calls it from `spawn_blocking`.

use crate::cache::{CacheError, ManifestCache};
use crate::clock::Clock;
use crate::config::GalleryConfig;
use crate::etag;
use crate::gallery::GalleryBuilder;
use crate::imaging::ImageBackend;
use crate::store::{ObjectStore, ResponseOverrides, StoreError};
use crate::types::{EnrichedRecord, Manifest};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Characters escaped inside one key segment: everything but RFC 3986
/// unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("could not sign URL for {key}: {source}")]
    Sign { key: String, source: StoreError },
    #[error("photo not found: {0}")]
    NotFound(String),
}

/// One photo as sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoEntry {
    pub key: String,
    pub full_url: String,
    pub thumbnail_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRequest {
    pub if_none_match: Option<String>,
    /// `HEAD` request: report the token, sign nothing.
    pub head: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// No photos. There is no token to validate against.
    Empty,
    NotModified { token: String },
    Probe { token: String },
    Photos { token: String, photos: Vec<PhotoEntry> },
}

/// Listing behaviour taken from `[gallery]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GallerySettings {
    pub signed_url_ttl: Duration,
    pub time_bucket_secs: u64,
    pub use_proxy: bool,
}

impl From<&GalleryConfig> for GallerySettings {
    fn from(config: &GalleryConfig) -> Self {
        Self {
            signed_url_ttl: config.signed_url_ttl(),
            time_bucket_secs: config.time_bucket_secs,
            use_proxy: config.use_proxy,
        }
    }
}

pub struct Gallery {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    cache: ManifestCache,
    settings: GallerySettings,
}

impl Gallery {
    /// Wire a builder and manifest cache over `store`.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn ImageBackend>,
        clock: Arc<dyn Clock>,
        config: &GalleryConfig,
        cache_dir: &Path,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let builder = Arc::new(GalleryBuilder::new(
            Arc::clone(&store),
            backend,
            config.workers,
            config.probe_bytes,
        )?);
        let cache = ManifestCache::new(builder, Arc::clone(&clock), config.manifest_ttl(), cache_dir);
        Ok(Self {
            store,
            clock,
            cache,
            settings: GallerySettings::from(config),
        })
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    pub fn settings(&self) -> GallerySettings {
        self.settings
    }

    pub fn manifest(&self) -> Result<Arc<Manifest>, GalleryError> {
        Ok(self.cache.get_or_build()?)
    }

    /// Answer a `/photos` request.
    pub fn listing(&self, request: &ListingRequest) -> Result<ListingOutcome, GalleryError> {
        let manifest = self.manifest()?;
        let Some(token) = etag::derive(&manifest, self.settings.time_bucket_secs, self.clock.now())
        else {
            return Ok(ListingOutcome::Empty);
        };

        if let Some(header) = request.if_none_match.as_deref()
            && etag::if_none_match_matches(header, &token)
        {
            return Ok(ListingOutcome::NotModified { token });
        }
        if request.head {
            return Ok(ListingOutcome::Probe { token });
        }

        let photos = manifest
            .iter()
            .map(|record| self.entry(record))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListingOutcome::Photos { token, photos })
    }

    /// Answer a `/photo/{key}` request. Only keys in the manifest resolve.
    pub fn photo(&self, key: &str) -> Result<PhotoEntry, GalleryError> {
        let manifest = self.manifest()?;
        let record = manifest
            .find(key)
            .ok_or_else(|| GalleryError::NotFound(key.to_string()))?;
        self.entry(record)
    }

    fn entry(&self, record: &EnrichedRecord) -> Result<PhotoEntry, GalleryError> {
        let key = &record.key;
        let full_url = if self.settings.use_proxy {
            proxy_url(key)
        } else {
            let overrides = ResponseOverrides::inline_image(key, self.settings.signed_url_ttl);
            self.store
                .sign(key, self.settings.signed_url_ttl, &overrides)
                .map_err(|source| GalleryError::Sign {
                    key: key.clone(),
                    source,
                })?
        };
        Ok(PhotoEntry {
            key: key.clone(),
            full_url,
            thumbnail_url: thumbnail_url(key),
            width: record.width,
            height: record.height,
        })
    }
}

/// Percent-encode each `/`-separated segment of a key.
pub fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn thumbnail_url(key: &str) -> String {
    format!("/thumbnail/{}", encode_key_path(key))
}

pub fn proxy_url(key: &str) -> String {
    format!("/proxy/{}", encode_key_path(key))
}
