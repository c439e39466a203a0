//! Object storage access.
//!
//! Everything the gallery knows about its photos comes from a single bucket
//! in an S3-compatible store. The [`ObjectStore`] trait is the narrow
//! capability the rest of the crate depends on:
//!
//! | Operation | Used by |
//! |---|---|
//! | [`list_all`](ObjectStore::list_all) | gallery builder (one listing per manifest rebuild) |
//! | [`get_range`](ObjectStore::get_range) | metadata extractor (EXIF/header probe) |
//! | [`get`](ObjectStore::get) | thumbnail generation |
//! | [`get_stream`](ObjectStore::get_stream) | `/proxy` |
//! | [`sign`](ObjectStore::sign) | `/photos` and `/photo` responses |
//!
//! Two implementations exist:
//!
//! - [`S3Store`](s3::S3Store): `aws-sdk-s3`, works against AWS, MinIO, R2.
//! - [`MemoryStore`](memory::MemoryStore): in-process and call-counting,
//!   used by the test suite.
//!
//! The trait is synchronous. Listing and probing happen on the gallery
//! builder's rayon pool and HTTP handlers reach the store through
//! `spawn_blocking`, so a blocking interface keeps every caller simple.
//! The one exception is the body of [`get_stream`](ObjectStore::get_stream):
//! the call blocks until the object's headers arrive, and the returned
//! [`ByteChunks`] is then polled on the async runtime.

pub mod memory;
pub mod s3;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an [`ObjectStore`].
///
/// The variant decides how far the failure travels: a `NotFound` for one
/// object becomes a 404, a `Transient` listing failure falls back to stale
/// data, and an `Auth` failure always aborts the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Transient(String),
    #[error("store refused credentials: {0}")]
    Auth(String),
    #[error("invalid store request: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// One object as reported by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: String,
    /// Storage-assigned content hash (the S3 ETag, quotes stripped).
    pub content_hash: String,
    pub last_modified: DateTime<Utc>,
}

/// A byte window `[start, start + len)` for partial fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

impl ByteRange {
    /// The first `len` bytes of an object.
    pub fn prefix(len: u64) -> Self {
        Self { start: 0, len }
    }

    /// Inclusive end offset. A zero-length range still names one byte, since
    /// HTTP ranges cannot be empty.
    pub fn end_inclusive(&self) -> u64 {
        self.start + self.len.max(1) - 1
    }

    /// Value for an HTTP `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end_inclusive())
    }
}

/// Full object contents as returned by [`ObjectStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Object body delivered chunk by chunk.
pub type ByteChunks = BoxStream<'static, io::Result<Bytes>>;

/// An object whose body has not been read yet.
pub struct ObjectStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ByteChunks,
}

impl std::fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Response headers a signed URL forces on the eventual fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseOverrides {
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
}

impl ResponseOverrides {
    /// Overrides for displaying a photo inline in the browser.
    ///
    /// Buckets filled by hand often carry `binary/octet-stream` content
    /// types, which makes browsers download instead of display. The content
    /// type is forced from the key extension and the browser may keep the
    /// image for as long as the URL itself is valid.
    pub fn inline_image(key: &str, ttl: Duration) -> Self {
        let filename = crate::naming::file_name(key).replace('"', "");
        Self {
            content_type: Some(content_type_for_key(key)),
            content_disposition: Some(format!("inline; filename=\"{filename}\"")),
            cache_control: Some(format!("private, max-age={}", ttl.as_secs())),
        }
    }
}

/// MIME type guessed from the key's extension.
pub fn content_type_for_key(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Capability interface over a single bucket.
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store is bound to.
    fn bucket(&self) -> &str;

    /// Every object in the bucket, paginating as needed. Directory marker
    /// keys (ending in `/`) are not objects and are skipped.
    fn list_all(&self) -> Result<Vec<ObjectRecord>, StoreError>;

    /// Full object contents.
    fn get(&self, key: &str) -> Result<StoredObject, StoreError>;

    /// Object headers now, body as a stream. Memory use per call is bounded
    /// by the chunk size rather than the object size.
    fn get_stream(&self, key: &str) -> Result<ObjectStream, StoreError>;

    /// A byte window of an object. Ranges past the end are truncated by the
    /// store, so callers can probe a fixed prefix of objects of any size.
    fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>, StoreError>;

    /// A time-limited URL granting read access to `key`, expiring `ttl`
    /// from now.
    fn sign(
        &self,
        key: &str,
        ttl: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<String, StoreError>;
}
