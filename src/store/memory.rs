//! In-process object store.
//!
//! Holds objects in listing order and counts every call, so tests can
//! assert how often the gallery actually went to the store. Failures can be
//! injected per key or for the whole listing. Signed URLs use a
//! `memory://` scheme and are only meaningful to tests.

use super::{
    ByteRange, ObjectRecord, ObjectStore, ObjectStream, ResponseOverrides, StoreError,
    StoredObject,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Chunk size of [`ObjectStore::get_stream`] bodies.
pub const STREAM_CHUNK: usize = 4096;

#[derive(Debug, Clone)]
struct MemoryObject {
    key: String,
    bytes: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// Call counters, one per [`ObjectStore`] operation.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub list: AtomicUsize,
    pub get: AtomicUsize,
    pub get_stream: AtomicUsize,
    pub get_range: AtomicUsize,
    pub sign: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<Vec<MemoryObject>>,
    list_failure: Mutex<Option<StoreError>>,
    key_failures: Mutex<HashMap<String, StoreError>>,
    pub calls: CallCounts,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            ..Self::default()
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_object(self, key: &str, bytes: &[u8], last_modified: DateTime<Utc>) -> Self {
        self.insert(key, bytes, last_modified);
        self
    }

    /// Add or replace an object. Replacing keeps the original listing
    /// position.
    pub fn insert(&self, key: &str, bytes: &[u8], last_modified: DateTime<Utc>) {
        let mut objects = lock(&self.objects);
        let object = MemoryObject {
            key: key.to_string(),
            bytes: bytes.to_vec(),
            last_modified,
        };
        match objects.iter_mut().find(|o| o.key == key) {
            Some(existing) => *existing = object,
            None => objects.push(object),
        }
    }

    pub fn remove(&self, key: &str) {
        lock(&self.objects).retain(|o| o.key != key);
    }

    /// Make every subsequent listing fail with `error` (or succeed again
    /// with `None`).
    pub fn fail_listing(&self, error: Option<StoreError>) {
        *lock(&self.list_failure) = error;
    }

    /// Make every fetch of `key` fail with `error`.
    pub fn fail_key(&self, key: &str, error: StoreError) {
        lock(&self.key_failures).insert(key.to_string(), error);
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst)
    }

    pub fn get_stream_calls(&self) -> usize {
        self.calls.get_stream.load(Ordering::SeqCst)
    }

    pub fn get_range_calls(&self) -> usize {
        self.calls.get_range.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> usize {
        self.calls.sign.load(Ordering::SeqCst)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if let Some(err) = lock(&self.key_failures).get(key) {
            return Err(err.clone());
        }
        lock(&self.objects)
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", self.bucket, key)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_all(&self) -> Result<Vec<ObjectRecord>, StoreError> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.list_failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.objects)
            .iter()
            .filter(|o| !o.key.ends_with('/'))
            .map(|o| ObjectRecord {
                key: o.key.clone(),
                content_hash: format!("{:x}", Sha256::digest(&o.bytes)),
                last_modified: o.last_modified,
            })
            .collect())
    }

    fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        let bytes = self.fetch(key)?;
        Ok(StoredObject {
            bytes,
            content_type: Some(super::content_type_for_key(key)),
        })
    }

    fn get_stream(&self, key: &str) -> Result<ObjectStream, StoreError> {
        self.calls.get_stream.fetch_add(1, Ordering::SeqCst);
        let bytes = Bytes::from(self.fetch(key)?);
        let chunks: Vec<std::io::Result<Bytes>> = (0..bytes.len())
            .step_by(STREAM_CHUNK)
            .map(|start| Ok(bytes.slice(start..(start + STREAM_CHUNK).min(bytes.len()))))
            .collect();
        Ok(ObjectStream {
            content_type: Some(super::content_type_for_key(key)),
            content_length: Some(bytes.len() as u64),
            body: futures::stream::iter(chunks).boxed(),
        })
    }

    fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>, StoreError> {
        self.calls.get_range.fetch_add(1, Ordering::SeqCst);
        let bytes = self.fetch(key)?;
        let start = (range.start as usize).min(bytes.len());
        let end = start.saturating_add(range.len as usize).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn sign(
        &self,
        key: &str,
        ttl: Duration,
        _overrides: &ResponseOverrides,
    ) -> Result<String, StoreError> {
        self.calls.sign.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "memory://{}/{}?expires={}",
            self.bucket,
            key,
            ttl.as_secs()
        ))
    }
}
