//! Service configuration module.
//!
//! Handles loading, validating, and layering `photofolio.toml`. Three layers
//! are merged, later ones winning:
//!
//! ```text
//! stock defaults            ← AppConfig::default()
//!   └── photofolio.toml     ← sparse user overrides (optional file)
//!         └── environment   ← MINIO_* / PORTFOLIO_* variables
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! addr = "0.0.0.0:8080"
//!
//! [store]
//! # endpoint = "http://minio:9000"   # omit for AWS S3
//! region = "us-east-1"
//! bucket = "portfolio"
//! # access_key = "..."               # omit to use the default AWS credential chain
//! # secret_key = "..."
//! force_path_style = true
//! timeout_secs = 10
//! create_bucket = false
//!
//! [gallery]
//! manifest_ttl_secs = 3600
//! signed_url_ttl_secs = 3600
//! time_bucket_secs = 1800
//! workers = 4
//! probe_bytes = 4194304
//! use_proxy = false
//!
//! [thumbnails]
//! max_width = 600
//! quality = 80
//!
//! [cache]
//! dir = ".photofolio-cache"
//!
//! [portfolio]
//! title = "My Photography Portfolio"
//! # ... page text, see `gen-config`
//! ```
//!
//! ## Environment overrides
//!
//! | Variable | Key |
//! |---|---|
//! | `MINIO_ENDPOINT` | `store.endpoint` (`http://` added unless `MINIO_SECURE` is true) |
//! | `MINIO_SECURE` | scheme of `MINIO_ENDPOINT` (`true`, `1`, `t` → `https://`) |
//! | `MINIO_ROOT_USER` | `store.access_key` |
//! | `MINIO_ROOT_PASSWORD` | `store.secret_key` |
//! | `MINIO_BUCKET_NAME` | `store.bucket` |
//! | `PORTFOLIO_TITLE`, `PORTFOLIO_META_DESCRIPTION`, `PORTFOLIO_ABOUT_HEADING`, `PORTFOLIO_ABOUT_CONTENT`, `PORTFOLIO_CONTACT_HEADING`, `PORTFOLIO_CONTACT_EMAIL`, `PORTFOLIO_FOOTER_TEXT` | `portfolio.*` |
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// AWS SigV4 presigned URLs cannot outlive seven days.
pub const MAX_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub gallery: GalleryConfig,
    pub thumbnails: ThumbnailsConfig,
    pub cache: CacheConfig,
    pub portfolio: PortfolioConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.into()));

        if self.server.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.addr '{}' is not a socket address",
                self.server.addr
            )));
        }
        if self.store.bucket.trim().is_empty() {
            return fail("store.bucket must not be empty");
        }
        if self.store.timeout_secs == 0 {
            return fail("store.timeout_secs must be at least 1");
        }
        let g = &self.gallery;
        if g.workers == 0 {
            return fail("gallery.workers must be at least 1");
        }
        if g.manifest_ttl_secs == 0 {
            return fail("gallery.manifest_ttl_secs must be at least 1");
        }
        if g.signed_url_ttl_secs == 0 || g.signed_url_ttl_secs > MAX_SIGNED_URL_TTL_SECS {
            return fail("gallery.signed_url_ttl_secs must be 1-604800");
        }
        if g.time_bucket_secs == 0 || g.time_bucket_secs >= g.signed_url_ttl_secs {
            return fail(
                "gallery.time_bucket_secs must be at least 1 and less than gallery.signed_url_ttl_secs",
            );
        }
        if g.probe_bytes == 0 {
            return fail("gallery.probe_bytes must be at least 1");
        }
        if self.thumbnails.max_width == 0 {
            return fail("thumbnails.max_width must be at least 1");
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return fail("thumbnails.quality must be 1-100");
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Object store connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Custom endpoint URL (MinIO, R2, ...). `None` means AWS S3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static credentials. When absent the SDK's default chain is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Path-style addressing (`endpoint/bucket/key`), required by MinIO.
    pub force_path_style: bool,
    /// Per-operation timeout for every store call.
    pub timeout_secs: u64,
    /// Create the bucket at startup when it does not exist.
    pub create_bucket: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: "portfolio".to_string(),
            access_key: None,
            secret_key: None,
            force_path_style: true,
            timeout_secs: 10,
            create_bucket: false,
        }
    }
}

/// Gallery manifest and listing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// How long a built manifest is served before rebuilding.
    pub manifest_ttl_secs: u64,
    /// Lifetime of each signed photo URL.
    pub signed_url_ttl_secs: u64,
    /// Validation token rotation period. Must be below `signed_url_ttl_secs`.
    pub time_bucket_secs: u64,
    /// Parallel metadata extraction workers.
    pub workers: usize,
    /// Bytes fetched from the start of each object to read EXIF and headers.
    pub probe_bytes: u64,
    /// Serve full-size photos through `/proxy` instead of signed URLs.
    pub use_proxy: bool,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            manifest_ttl_secs: 3600,
            signed_url_ttl_secs: 3600,
            time_bucket_secs: 1800,
            workers: 4,
            probe_bytes: 4 * 1024 * 1024,
            use_proxy: false,
        }
    }
}

impl GalleryConfig {
    pub fn manifest_ttl(&self) -> Duration {
        Duration::from_secs(self.manifest_ttl_secs)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Maximum thumbnail width in pixels. Smaller images are not upscaled.
    pub max_width: u32,
    /// JPEG quality (1-100).
    pub quality: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            max_width: 600,
            quality: 80,
        }
    }
}

/// Local state directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".photofolio-cache"),
        }
    }
}

impl CacheConfig {
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.dir.join("thumbnails")
    }
}

/// Text shown on the portfolio page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortfolioConfig {
    pub title: String,
    pub meta_description: String,
    pub about_heading: String,
    /// Markdown.
    pub about_content: String,
    pub contact_heading: String,
    pub contact_email: String,
    pub footer_text: String,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            title: "My Photography Portfolio".to_string(),
            meta_description: "A collection of my best work.".to_string(),
            about_heading: "About Me".to_string(),
            about_content: "Welcome to my portfolio.".to_string(),
            contact_heading: "Contact".to_string(),
            contact_email: "email@example.com".to_string(),
            footer_text: "© 2025 Me. All rights reserved.".to_string(),
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Environment variable → config key table.
const ENV_KEYS: &[(&str, &str, &str)] = &[
    ("MINIO_ROOT_USER", "store", "access_key"),
    ("MINIO_ROOT_PASSWORD", "store", "secret_key"),
    ("MINIO_BUCKET_NAME", "store", "bucket"),
    ("PORTFOLIO_TITLE", "portfolio", "title"),
    ("PORTFOLIO_META_DESCRIPTION", "portfolio", "meta_description"),
    ("PORTFOLIO_ABOUT_HEADING", "portfolio", "about_heading"),
    ("PORTFOLIO_ABOUT_CONTENT", "portfolio", "about_content"),
    ("PORTFOLIO_CONTACT_HEADING", "portfolio", "contact_heading"),
    ("PORTFOLIO_CONTACT_EMAIL", "portfolio", "contact_email"),
    ("PORTFOLIO_FOOTER_TEXT", "portfolio", "footer_text"),
];

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "t")
}

/// Build an overlay table from environment variables.
///
/// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
/// Returns `None` when no recognised variable is set.
pub fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> Option<toml::Value> {
    let mut root = toml::map::Map::new();
    let mut set = |section: &str, key: &str, value: String| {
        let table = root
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        if let toml::Value::Table(t) = table {
            t.insert(key.to_string(), toml::Value::String(value));
        }
    };

    if let Some(endpoint) = lookup("MINIO_ENDPOINT").filter(|e| !e.trim().is_empty()) {
        let endpoint = endpoint.trim();
        let url = if endpoint.contains("://") {
            endpoint.to_string()
        } else if lookup("MINIO_SECURE").is_some_and(|s| is_truthy(&s)) {
            format!("https://{endpoint}")
        } else {
            format!("http://{endpoint}")
        };
        set("store", "endpoint", url);
    }
    for (var, section, key) in ENV_KEYS {
        if let Some(value) = lookup(var) {
            set(section, key, value);
        }
    }

    (!root.is_empty()).then_some(toml::Value::Table(root))
}

/// Merge optional overlays onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = Option<toml::Value>>,
) -> Result<AppConfig, ConfigError> {
    let merged = overlays
        .into_iter()
        .flatten()
        .fold(base, merge_toml);
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path` plus the process environment.
///
/// Merges file values on top of stock defaults, then environment values on
/// top of that, rejects unknown keys, and validates the result. A missing
/// file is not an error.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

pub fn load_config_with_env(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let file = load_raw_config(path)?;
    resolve_config(stock_defaults_value(), [file, env_overrides(lookup)])
}

/// Returns a fully-commented stock `photofolio.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photofolio configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Environment variables override this file:
#   MINIO_ENDPOINT, MINIO_SECURE, MINIO_ROOT_USER, MINIO_ROOT_PASSWORD,
#   MINIO_BUCKET_NAME, PORTFOLIO_TITLE, PORTFOLIO_META_DESCRIPTION,
#   PORTFOLIO_ABOUT_HEADING, PORTFOLIO_ABOUT_CONTENT,
#   PORTFOLIO_CONTACT_HEADING, PORTFOLIO_CONTACT_EMAIL, PORTFOLIO_FOOTER_TEXT
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
addr = "0.0.0.0:8080"

# ---------------------------------------------------------------------------
# Object store (S3, MinIO, R2, ...)
# ---------------------------------------------------------------------------
[store]
# Endpoint URL for S3-compatible services. Omit for AWS S3.
# endpoint = "http://minio:9000"
region = "us-east-1"
bucket = "portfolio"

# Static credentials. Omit both to use the standard AWS credential chain
# (environment, profile, instance role).
# access_key = "minioadmin"
# secret_key = "minioadmin"

# Path-style addressing (endpoint/bucket/key). MinIO needs this.
force_path_style = true

# Timeout for each store operation, in seconds.
timeout_secs = 10

# Create the bucket on `serve` startup if it does not exist.
create_bucket = false

# ---------------------------------------------------------------------------
# Gallery
# ---------------------------------------------------------------------------
[gallery]
# How long a built gallery manifest is reused before listing the bucket again.
manifest_ttl_secs = 3600

# Lifetime of signed photo URLs (max 604800 = 7 days).
signed_url_ttl_secs = 3600

# Clients are told to refetch the photo list this often so they never hold
# expired URLs. Must be less than signed_url_ttl_secs.
time_bucket_secs = 1800

# Parallel metadata reads while building the manifest.
workers = 4

# Bytes read from the start of each photo to find EXIF data and dimensions.
probe_bytes = 4194304

# Serve full-size photos through this server instead of signed store URLs.
# Useful when browsers cannot reach the store endpoint.
use_proxy = false

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Maximum width in pixels. Smaller photos are never upscaled.
max_width = 600

# JPEG quality (1 = worst, 100 = best).
quality = 80

# ---------------------------------------------------------------------------
# Local cache (manifest + generated thumbnails)
# ---------------------------------------------------------------------------
[cache]
dir = ".photofolio-cache"

# ---------------------------------------------------------------------------
# Portfolio page text
# ---------------------------------------------------------------------------
[portfolio]
title = "My Photography Portfolio"
meta_description = "A collection of my best work."
about_heading = "About Me"
# Markdown is supported.
about_content = "Welcome to my portfolio."
contact_heading = "Contact"
contact_email = "email@example.com"
footer_text = "© 2025 Me. All rights reserved."
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_| None
    }

    fn parse(toml_str: &str) -> Result<AppConfig, ConfigError> {
        let overlay: toml::Value = toml::from_str(toml_str)?;
        resolve_config(stock_defaults_value(), [Some(overlay)])
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_config_values() {
        let c = AppConfig::default();
        assert_eq!(c.server.addr, "0.0.0.0:8080");
        assert_eq!(c.store.bucket, "portfolio");
        assert!(c.store.force_path_style);
        assert_eq!(c.gallery.workers, 4);
        assert_eq!(c.gallery.probe_bytes, 4_194_304);
        assert_eq!(c.thumbnails.max_width, 600);
        assert_eq!(c.portfolio.title, "My Photography Portfolio");
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn gallery_durations() {
        let g = GalleryConfig::default();
        assert_eq!(g.manifest_ttl(), Duration::from_secs(3600));
        assert_eq!(g.signed_url_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn thumbnails_dir_under_cache_dir() {
        assert_eq!(
            CacheConfig::default().thumbnails_dir(),
            PathBuf::from(".photofolio-cache/thumbnails")
        );
    }

    // =========================================================================
    // Partial overrides
    // =========================================================================

    #[test]
    fn partial_override_keeps_other_defaults() {
        let c = parse("[gallery]\nworkers = 8\n").unwrap();
        assert_eq!(c.gallery.workers, 8);
        assert_eq!(c.gallery.manifest_ttl_secs, 3600);
        assert_eq!(c.store.bucket, "portfolio");
    }

    #[test]
    fn store_credentials_from_file() {
        let c = parse(
            r#"
            [store]
            endpoint = "http://localhost:9000"
            access_key = "ak"
            secret_key = "sk"
            "#,
        )
        .unwrap();
        assert_eq!(c.store.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(c.store.access_key.as_deref(), Some("ak"));
        assert_eq!(c.store.region, "us-east-1");
    }

    // =========================================================================
    // merge_toml()
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_deep_nested() {
        let base: toml::Value = toml::from_str("[x.y]\na = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[x.y]\nb = 5").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["x"]["y"]["a"].as_integer(), Some(1));
        assert_eq!(merged["x"]["y"]["b"].as_integer(), Some(5));
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        assert!(matches!(
            parse("[gallery]\nworkerz = 2\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(parse("[database]\nurl = \"x\"\n").is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validation_error(toml_str: &str) -> String {
        match parse(toml_str) {
            Err(ConfigError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_time_bucket_below_url_ttl() {
        let msg = validation_error("[gallery]\ntime_bucket_secs = 3600\nsigned_url_ttl_secs = 3600\n");
        assert!(msg.contains("time_bucket_secs"));
        assert!(parse("[gallery]\ntime_bucket_secs = 3599\n").is_ok());
    }

    #[test]
    fn validate_zero_time_bucket() {
        assert!(validation_error("[gallery]\ntime_bucket_secs = 0\n").contains("time_bucket_secs"));
    }

    #[test]
    fn validate_url_ttl_limit() {
        let msg = validation_error(
            "[gallery]\nsigned_url_ttl_secs = 604801\n",
        );
        assert!(msg.contains("signed_url_ttl_secs"));
        assert!(parse("[gallery]\nsigned_url_ttl_secs = 604800\n").is_ok());
    }

    #[test]
    fn validate_workers_and_ttl() {
        assert!(validation_error("[gallery]\nworkers = 0\n").contains("workers"));
        assert!(validation_error("[gallery]\nmanifest_ttl_secs = 0\n").contains("manifest_ttl_secs"));
    }

    #[test]
    fn validate_thumbnails() {
        assert!(validation_error("[thumbnails]\nquality = 0\n").contains("quality"));
        assert!(validation_error("[thumbnails]\nquality = 101\n").contains("quality"));
        assert!(validation_error("[thumbnails]\nmax_width = 0\n").contains("max_width"));
    }

    #[test]
    fn validate_bucket_and_addr() {
        assert!(validation_error("[store]\nbucket = \"  \"\n").contains("bucket"));
        assert!(validation_error("[server]\naddr = \"localhost\"\n").contains("server.addr"));
    }

    // =========================================================================
    // Environment overrides
    // =========================================================================

    #[test]
    fn env_overrides_none_when_unset() {
        assert!(env_overrides(no_env()).is_none());
    }

    #[test]
    fn minio_endpoint_gets_scheme() {
        let ov = env_overrides(env(&[("MINIO_ENDPOINT", "minio:9000")])).unwrap();
        assert_eq!(ov["store"]["endpoint"].as_str(), Some("http://minio:9000"));

        let ov = env_overrides(env(&[
            ("MINIO_ENDPOINT", "minio:9000"),
            ("MINIO_SECURE", "True"),
        ]))
        .unwrap();
        assert_eq!(ov["store"]["endpoint"].as_str(), Some("https://minio:9000"));

        let ov = env_overrides(env(&[
            ("MINIO_ENDPOINT", "https://s3.example.com"),
            ("MINIO_SECURE", "false"),
        ]))
        .unwrap();
        assert_eq!(
            ov["store"]["endpoint"].as_str(),
            Some("https://s3.example.com")
        );
    }

    #[test]
    fn env_wins_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photofolio.toml");
        fs::write(&path, "[store]\nbucket = \"from-file\"\n[portfolio]\ntitle = \"File\"\n").unwrap();

        let c = load_config_with_env(
            &path,
            env(&[
                ("MINIO_BUCKET_NAME", "from-env"),
                ("MINIO_ROOT_USER", "user"),
                ("MINIO_ROOT_PASSWORD", "pass"),
                ("PORTFOLIO_CONTACT_EMAIL", "me@example.org"),
            ]),
        )
        .unwrap();
        assert_eq!(c.store.bucket, "from-env");
        assert_eq!(c.store.access_key.as_deref(), Some("user"));
        assert_eq!(c.store.secret_key.as_deref(), Some("pass"));
        assert_eq!(c.portfolio.title, "File");
        assert_eq!(c.portfolio.contact_email, "me@example.org");
    }

    // =========================================================================
    // File loading
    // =========================================================================

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(&tmp.path().join("missing.toml")).unwrap().is_none());
    }

    #[test]
    fn missing_file_means_defaults() {
        let tmp = TempDir::new().unwrap();
        let c = load_config_with_env(&tmp.path().join("missing.toml"), no_env()).unwrap();
        assert_eq!(c, AppConfig::default());
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photofolio.toml");
        fs::write(&path, "[gallery\n").unwrap();
        assert!(matches!(
            load_config_with_env(&path, no_env()),
            Err(ConfigError::Toml(_))
        ));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let c = parse(stock_config_toml()).unwrap();
        assert_eq!(c, AppConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let v = stock_defaults_value();
        for section in ["server", "store", "gallery", "thumbnails", "cache", "portfolio"] {
            assert!(v.get(section).is_some(), "missing section {section}");
        }
        assert!(v["store"].get("access_key").is_none());
    }
}
