//! HTTP surface.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /` | portfolio page ([`page`]) |
//! | `GET /static/{file}` | embedded CSS / JS |
//! | `GET`, `HEAD /photos` | ordered photo list with conditional-request support |
//! | `GET /photo/{*key}` | one photo; 404 when the key is not in the gallery |
//! | `GET /thumbnail/{*key}` | JPEG thumbnail, generated once then served from disk |
//! | `GET /proxy/{*key}` | original bytes streamed through this server |
//! | `GET /healthz` | liveness |
//!
//! Handlers are thin. Everything that touches the store, the disk or the
//! image codec runs in `spawn_blocking` on the [`Gallery`] or the
//! [`ThumbnailCache`]. A blocking task keeps running when the client goes
//! away, so a manifest rebuild always completes and gets persisted.

use crate::api::{Gallery, GalleryError, ListingOutcome, ListingRequest, PhotoEntry};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::etag::etag_header;
use crate::imaging::ImageBackend;
use crate::page;
use crate::store::{ObjectStore, StoreError, content_type_for_key};
use crate::thumbnails::{ThumbnailCache, ThumbnailError};
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use futures::TryStreamExt;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, error, info, warn};

/// `/photos` responses must be revalidated on every use.
pub const LISTING_CACHE_CONTROL: &str = "private, no-cache";
pub const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
const STATIC_CACHE_CONTROL: &str = "public, max-age=3600";

#[derive(Clone)]
pub struct AppState {
    pub gallery: Arc<Gallery>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn ImageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let gallery = Gallery::new(
            Arc::clone(&store),
            Arc::clone(&backend),
            clock,
            &config.gallery,
            &config.cache.dir,
        )?;
        let thumbnails = ThumbnailCache::new(
            config.cache.thumbnails_dir(),
            store,
            backend,
            ThumbnailCache::params_for(&config.thumbnails),
        );
        Ok(Self {
            gallery: Arc::new(gallery),
            thumbnails: Arc::new(thumbnails),
            config: Arc::new(config),
        })
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
    #[error("proxy fetch failed: {0}")]
    Proxy(StoreError),
    #[error("no such route or asset")]
    NotFound,
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Status for a failed fetch of one object on behalf of a client.
fn fetch_status(e: &StoreError) -> (StatusCode, &'static str) {
    match e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "Photo not found"),
        StoreError::Auth(_) => (StatusCode::BAD_GATEWAY, "Storage refused the request"),
        StoreError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable"),
        StoreError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Could not fetch photo"),
    }
}

impl ApiError {
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Gallery(GalleryError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Photo not found")
            }
            ApiError::Gallery(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not retrieve photos",
            ),
            ApiError::Thumbnail(ThumbnailError::Store(e)) | ApiError::Proxy(e) => fetch_status(e),
            ApiError::Thumbnail(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Thumbnail generation failed",
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            ApiError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Run blocking work off the async runtime.
async fn blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    ApiError: From<E>,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

pub fn router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .route("/", get(index))
        .route("/static/{file}", get(static_file))
        .route("/photos", get(photos))
        .route("/photo/{*key}", get(photo))
        .route("/thumbnail/{*key}", get(thumbnail))
        .route("/proxy/{*key}", get(proxy))
        .route("/healthz", get(healthz))
        .fallback(|| async { ApiError::NotFound })
        .layer(trace)
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(page::render_index(&state.config.portfolio).into_string())
}

async fn static_file(Path(file): Path<String>) -> Result<Response, ApiError> {
    let (content_type, body) = page::static_asset(&file).ok_or(ApiError::NotFound)?;
    Ok((
        [(CONTENT_TYPE, content_type), (CACHE_CONTROL, STATIC_CACHE_CONTROL)],
        body,
    )
        .into_response())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn photos(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request = ListingRequest {
        if_none_match: headers
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        head: method == Method::HEAD,
    };
    let gallery = Arc::clone(&state.gallery);
    let outcome = blocking(move || gallery.listing(&request)).await?;

    let response = match outcome {
        ListingOutcome::Empty => (
            [(CACHE_CONTROL, LISTING_CACHE_CONTROL)],
            Json(Vec::<PhotoEntry>::new()),
        )
            .into_response(),
        ListingOutcome::NotModified { token } => (
            StatusCode::NOT_MODIFIED,
            [
                (ETAG, etag_header(&token)),
                (CACHE_CONTROL, LISTING_CACHE_CONTROL.to_string()),
            ],
        )
            .into_response(),
        ListingOutcome::Probe { token } => [
            (ETAG, etag_header(&token)),
            (CACHE_CONTROL, LISTING_CACHE_CONTROL.to_string()),
        ]
        .into_response(),
        ListingOutcome::Photos { token, photos } => (
            [
                (ETAG, etag_header(&token)),
                (CACHE_CONTROL, LISTING_CACHE_CONTROL.to_string()),
            ],
            Json(photos),
        )
            .into_response(),
    };
    Ok(response)
}

async fn photo(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PhotoEntry>, ApiError> {
    let gallery = Arc::clone(&state.gallery);
    Ok(Json(blocking(move || gallery.photo(&key)).await?))
}

async fn thumbnail(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let thumbnails = Arc::clone(&state.thumbnails);
    let thumb = blocking(move || thumbnails.get_or_create(&key)).await?;
    Ok((
        [
            (CONTENT_TYPE, "image/jpeg"),
            (CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL),
        ],
        thumb.bytes,
    )
        .into_response())
}

async fn proxy(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let store = Arc::clone(state.gallery.store());
    let max_age = state.config.gallery.signed_url_ttl_secs;
    let fetch_key = key.clone();
    let object = blocking(move || store.get_stream(&fetch_key).map_err(ApiError::Proxy)).await?;
    let content_type = object
        .content_type
        .filter(|ct| !ct.is_empty() && ct != "binary/octet-stream")
        .unwrap_or_else(|| content_type_for_key(&key));

    // Headers are already sent when a chunk fails; all that is left is to
    // cut the connection and say why.
    let length = object.content_length;
    let body = object.body.inspect_err(move |e| {
        warn!(key = %key, error = %e, "proxy stream aborted");
    });
    let mut response = (
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, format!("private, max-age={max_age}")),
        ],
        Body::from_stream(body),
    )
        .into_response();
    if let Some(len) = length {
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    Ok(response)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, bucket = state.gallery.store().bucket(), "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => warn!(error = %e, "could not listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::imaging::ExifData;
    use crate::imaging::backend::tests::MockBackend;
    use crate::store::memory::MemoryStore;
    use crate::test_helpers::utc;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Harness {
        _tmp: TempDir,
        store: Arc<MemoryStore>,
        app: Router,
    }

    fn harness_with(store: MemoryStore, tweak: impl FnOnce(&mut AppConfig)) -> Harness {
        let tmp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.cache.dir = tmp.path().to_path_buf();
        tweak(&mut config);
        let store = Arc::new(store);
        let backend = MockBackend::new().with_image(b"kyoto", 1200, 800, ExifData::default());
        let state = AppState::new(
            config,
            store.clone(),
            Arc::new(backend),
            Arc::new(ManualClock::new(utc(2024, 6, 1, 12, 0, 0))),
        )
        .unwrap();
        Harness {
            _tmp: tmp,
            store,
            app: router(state),
        }
    }

    fn harness() -> Harness {
        harness_with(
            MemoryStore::new("photos")
                .with_object("trips/kyoto.jpg", b"kyoto", utc(2022, 1, 1, 0, 0, 0))
                .with_object("IMG_20230615_143022.jpg", b"june", utc(2024, 1, 1, 0, 0, 0))
                .with_object("summer day.png", b"summer", utc(2021, 1, 1, 0, 0, 0)),
            |_| {},
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn get_path(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    // =========================================================================
    // /photos
    // =========================================================================

    #[tokio::test]
    async fn photos_lists_newest_first_with_etag() {
        let h = harness();
        let (status, headers, body) = get_path(&h.app, "/photos").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CACHE_CONTROL], LISTING_CACHE_CONTROL);
        let etag = headers[ETAG].to_str().unwrap();
        assert!(etag.starts_with('"') && etag.ends_with('"'));

        let list = json(&body);
        let keys: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["key"].as_str().unwrap())
            .collect();
        assert_eq!(
            keys,
            vec!["IMG_20230615_143022.jpg", "trips/kyoto.jpg", "summer day.png"]
        );
        assert_eq!(list[2]["thumbnail_url"], "/thumbnail/summer%20day.png");
        assert_eq!(list[1]["full_url"], "memory://photos/trips/kyoto.jpg?expires=3600");
    }

    #[tokio::test]
    async fn photos_if_none_match_is_304() {
        let h = harness();
        let (_, headers, _) = get_path(&h.app, "/photos").await;
        let etag = headers[ETAG].to_str().unwrap().to_string();
        let signed = h.store.sign_calls();

        let request = Request::builder()
            .uri("/photos")
            .header(IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::NOT_MODIFIED);
        assert_eq!(headers[ETAG].to_str().unwrap(), etag);
        assert_eq!(headers[CACHE_CONTROL], LISTING_CACHE_CONTROL);
        assert!(body.is_empty());
        assert_eq!(h.store.sign_calls(), signed);
    }

    #[tokio::test]
    async fn photos_head_has_etag_and_no_body() {
        let h = harness();
        let request = Request::builder()
            .method(Method::HEAD)
            .uri("/photos")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key(ETAG));
        assert!(body.is_empty());
        assert_eq!(h.store.sign_calls(), 0);
    }

    #[tokio::test]
    async fn empty_bucket_is_empty_array_without_etag() {
        let h = harness_with(MemoryStore::new("photos"), |_| {});
        let (status, headers, body) = get_path(&h.app, "/photos").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key(ETAG));
        assert_eq!(json(&body), json!([]));
    }

    #[tokio::test]
    async fn listing_failure_is_500_without_partial_body() {
        let store = MemoryStore::new("photos");
        store.fail_listing(Some(StoreError::Auth("bad key".into())));
        let h = harness_with(store, |_| {});
        let (status, headers, body) = get_path(&h.app, "/photos").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!headers.contains_key(ETAG));
        assert_eq!(json(&body), json!({ "error": "Could not retrieve photos" }));
    }

    #[tokio::test]
    async fn proxy_mode_points_full_url_at_proxy() {
        let h = harness_with(
            MemoryStore::new("photos").with_object("a b.jpg", b"x", utc(2024, 1, 1, 0, 0, 0)),
            |c| c.gallery.use_proxy = true,
        );
        let (_, _, body) = get_path(&h.app, "/photos").await;
        assert_eq!(json(&body)[0]["full_url"], "/proxy/a%20b.jpg");
        assert_eq!(h.store.sign_calls(), 0);
    }

    // =========================================================================
    // /photo
    // =========================================================================

    #[tokio::test]
    async fn photo_by_nested_key() {
        let h = harness();
        let (status, _, body) = get_path(&h.app, "/photo/trips/kyoto.jpg").await;
        assert_eq!(status, StatusCode::OK);
        let entry = json(&body);
        assert_eq!(entry["key"], "trips/kyoto.jpg");
        assert_eq!(entry["thumbnail_url"], "/thumbnail/trips/kyoto.jpg");
    }

    #[tokio::test]
    async fn photo_unknown_key_is_404_json() {
        let h = harness();
        let (status, _, body) = get_path(&h.app, "/photo/nope.jpg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body), json!({ "error": "Photo not found" }));
    }

    // =========================================================================
    // /thumbnail
    // =========================================================================

    #[tokio::test]
    async fn thumbnail_generated_then_cached() {
        let h = harness();
        let (status, headers, body) = get_path(&h.app, "/thumbnail/trips/kyoto.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "image/jpeg");
        assert_eq!(headers[CACHE_CONTROL], THUMBNAIL_CACHE_CONTROL);
        assert_eq!(body, b"thumb:kyoto");

        let (status, _, body) = get_path(&h.app, "/thumbnail/trips/kyoto.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"thumb:kyoto");
        assert_eq!(h.store.get_calls(), 1);
    }

    #[tokio::test]
    async fn thumbnail_errors_map_to_statuses() {
        let h = harness();
        let (status, _, _) = get_path(&h.app, "/thumbnail/missing.jpg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, body) = get_path(&h.app, "/thumbnail/summer%20day.png").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body), json!({ "error": "Thumbnail generation failed" }));

        h.store
            .fail_key("trips/kyoto.jpg", StoreError::Auth("expired".into()));
        let (status, _, _) = get_path(&h.app, "/thumbnail/trips/kyoto.jpg").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        h.store
            .fail_key("trips/kyoto.jpg", StoreError::Transient("timeout".into()));
        let (status, _, _) = get_path(&h.app, "/thumbnail/trips/kyoto.jpg").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    // =========================================================================
    // /proxy
    // =========================================================================

    #[tokio::test]
    async fn proxy_streams_original_bytes() {
        let h = harness();
        let (status, headers, body) = get_path(&h.app, "/proxy/summer%20day.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(headers[CONTENT_LENGTH], "6");
        assert_eq!(headers[CACHE_CONTROL], "private, max-age=3600");
        assert_eq!(body, b"summer");
    }

    #[tokio::test]
    async fn proxy_never_buffers_whole_object() {
        use crate::store::memory::STREAM_CHUNK;

        let large: Vec<u8> = (0..STREAM_CHUNK * 3 + 1).map(|i| (i % 253) as u8).collect();
        let h = harness_with(
            MemoryStore::new("photos").with_object("large.jpg", &large, utc(2024, 1, 1, 0, 0, 0)),
            |_| {},
        );
        let (status, headers, body) = get_path(&h.app, "/proxy/large.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_LENGTH], large.len().to_string().as_str());
        assert_eq!(body, large);
        assert_eq!(h.store.get_stream_calls(), 1);
        assert_eq!(h.store.get_calls(), 0);
    }

    #[tokio::test]
    async fn proxy_auth_failure_is_502() {
        let h = harness();
        h.store
            .fail_key("trips/kyoto.jpg", StoreError::Auth("denied".into()));
        let (status, _, body) = get_path(&h.app, "/proxy/trips/kyoto.jpg").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json(&body)["error"], "Storage refused the request");
    }

    #[tokio::test]
    async fn proxy_missing_is_404() {
        let h = harness();
        let (status, _, _) = get_path(&h.app, "/proxy/none.jpg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // =========================================================================
    // Page, static, health
    // =========================================================================

    #[tokio::test]
    async fn index_renders_portfolio_page() {
        let h = harness();
        let (status, headers, body) = get_path(&h.app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert!(String::from_utf8(body).unwrap().contains("My Photography Portfolio"));
    }

    #[tokio::test]
    async fn static_assets_served() {
        let h = harness();
        let (status, headers, _) = get_path(&h.app, "/static/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "text/css; charset=utf-8");

        let (status, _, _) = get_path(&h.app, "/static/secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn healthz_ok() {
        let h = harness();
        let (status, _, body) = get_path(&h.app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unknown_route_is_404_json() {
        let h = harness();
        let (status, _, body) = get_path(&h.app, "/admin").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body), json!({ "error": "Not found" }));
    }

    #[test]
    fn error_statuses() {
        use crate::cache::CacheError;
        let listing = ApiError::Gallery(GalleryError::Cache(CacheError::Build(StoreError::Auth(
            "x".into(),
        ))));
        assert_eq!(listing.status_and_message().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::Proxy(StoreError::Auth("x".into())).status_and_message().0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Proxy(StoreError::Transient("x".into())).status_and_message().0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
