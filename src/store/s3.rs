//! S3-compatible object store backed by `aws-sdk-s3`.
//!
//! Works against AWS S3, MinIO and other S3-compatible services. MinIO
//! deployments need `force_path_style = true` and an explicit endpoint.
//!
//! ## Blocking over async
//!
//! The SDK is async; [`ObjectStore`] is not. `S3Store` keeps a handle to
//! the tokio runtime it was created on and drives each request with
//! [`Handle::block_on`]. Callers must therefore be on a thread that is not
//! itself running async tasks: the gallery builder's rayon workers or a
//! `spawn_blocking` closure.
//!
//! [`get_stream`](ObjectStore::get_stream) blocks only until the response
//! headers are in. Its body wraps the SDK's `ByteStream` and is read on
//! whichever runtime task polls it.
//!
//! ## Error classification
//!
//! SDK failures are mapped onto [`StoreError`] by service error code first
//! and HTTP status second; anything unrecognised (timeouts, connection
//! resets, 5xx) is treated as transient.

use super::{
    ByteRange, ObjectRecord, ObjectStore, ObjectStream, ResponseOverrides, StoreError,
    StoredObject,
};
use crate::config::StoreConfig;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::DateTime as SdkDateTime;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

pub struct S3Store {
    client: Client,
    bucket: String,
    handle: Handle,
}

impl S3Store {
    /// Build a client from the `[store]` config section.
    ///
    /// Must be called from inside a tokio runtime; the runtime's handle is
    /// kept for blocking calls later.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let handle = Handle::try_current()
            .map_err(|e| StoreError::Config(format!("no tokio runtime for S3 client: {e}")))?;

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "photofolio-config",
            ));
        }
        let shared = loader.load().await;

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .timeout_config(timeouts)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        info!(
            bucket = %config.bucket,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            region = %config.region,
            "object store client ready"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            handle,
        })
    }

    /// Create the bucket when the store reports it missing.
    ///
    /// Returns `true` if the bucket was created.
    pub async fn ensure_bucket(&self) -> Result<bool, StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(false),
            Err(err) => match classify(err) {
                StoreError::NotFound(_) => {
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(classify)?;
                    info!(bucket = %self.bucket, "created missing bucket");
                    Ok(true)
                }
                other => Err(other),
            },
        }
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.handle.block_on(fut)
    }

    async fn fetch(&self, key: &str, range: Option<ByteRange>) -> Result<StoredObject, StoreError> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(range) = range {
            request = request.range(range.header_value());
        }
        let response = request.send().await.map_err(classify)?;
        let content_type = response.content_type().map(str::to_string);
        let body = response.body.collect().await.map_err(|e| {
            StoreError::Transient(format!("reading body of {key}: {e}"))
        })?;
        Ok(StoredObject {
            bytes: body.into_bytes().to_vec(),
            content_type,
        })
    }
}

impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_all(&self) -> Result<Vec<ObjectRecord>, StoreError> {
        self.block_on(async {
            let mut records = Vec::new();
            let mut continuation: Option<String> = None;
            let mut pages = 0u32;
            loop {
                let mut request = self.client.list_objects_v2().bucket(&self.bucket);
                if let Some(token) = continuation.take() {
                    request = request.continuation_token(token);
                }
                let page = request.send().await.map_err(classify)?;
                pages += 1;

                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    if key.ends_with('/') {
                        continue;
                    }
                    let last_modified = listed_time(key, object.last_modified());
                    records.push(ObjectRecord {
                        key: key.to_string(),
                        content_hash: object.e_tag().unwrap_or_default().trim_matches('"').to_string(),
                        last_modified,
                    });
                }

                if !page.is_truncated().unwrap_or(false) {
                    break;
                }
                match page.next_continuation_token() {
                    Some(token) => continuation = Some(token.to_string()),
                    None => break,
                }
            }
            debug!(bucket = %self.bucket, pages, objects = records.len(), "listed bucket");
            Ok(records)
        })
    }

    fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.block_on(self.fetch(key, None))
    }

    fn get_stream(&self, key: &str) -> Result<ObjectStream, StoreError> {
        let response = self
            .block_on(self.client.get_object().bucket(&self.bucket).key(key).send())
            .map_err(classify)?;
        let content_type = response.content_type().map(str::to_string);
        let content_length = response
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let body = ReaderStream::new(response.body.into_async_read()).boxed();
        Ok(ObjectStream {
            content_type,
            content_length,
            body,
        })
    }

    fn get_range(&self, key: &str, range: ByteRange) -> Result<Vec<u8>, StoreError> {
        self.block_on(self.fetch(key, Some(range)))
            .map(|object| object.bytes)
    }

    fn sign(
        &self,
        key: &str,
        ttl: Duration,
        overrides: &ResponseOverrides,
    ) -> Result<String, StoreError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StoreError::Config(e.to_string()))?;
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(content_type) = &overrides.content_type {
            request = request.response_content_type(content_type.clone());
        }
        if let Some(disposition) = &overrides.content_disposition {
            request = request.response_content_disposition(disposition.clone());
        }
        if let Some(cache_control) = &overrides.cache_control {
            request = request.response_cache_control(cache_control.clone());
        }
        let presigned = self
            .block_on(request.presigned(presigning))
            .map_err(classify)?;
        Ok(presigned.uri().to_string())
    }
}

/// Listing timestamp as UTC. Objects without one sort at the epoch, which
/// puts them last in the gallery.
fn listed_time(key: &str, time: Option<&SdkDateTime>) -> DateTime<Utc> {
    match time.and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())) {
        Some(t) => t,
        None => {
            warn!(key, "listing has no last-modified time, sorting at epoch");
            DateTime::UNIX_EPOCH
        }
    }
}

/// Coarse failure class derived from an S3 error code and HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorClass {
    NotFound,
    Auth,
    Transient,
}

fn classify_parts(code: Option<&str>, status: Option<u16>) -> ErrorClass {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => return ErrorClass::NotFound,
        Some(
            "AccessDenied"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "InvalidToken"
            | "AllAccessDisabled",
        ) => return ErrorClass::Auth,
        _ => {}
    }
    match status {
        Some(404) => ErrorClass::NotFound,
        Some(401 | 403) => ErrorClass::Auth,
        _ => ErrorClass::Transient,
    }
}

fn classify<E>(err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let class = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => ErrorClass::Transient,
        _ => classify_parts(
            err.code(),
            err.raw_response().map(|r| r.status().as_u16()),
        ),
    };
    let message = DisplayErrorContext(&err).to_string();
    match class {
        ErrorClass::NotFound => StoreError::NotFound(message),
        ErrorClass::Auth => StoreError::Auth(message),
        ErrorClass::Transient => StoreError::Transient(message),
    }
}
