//! # photofolio
//!
//! A personal photo portfolio served straight from an S3-compatible bucket.
//! The bucket is the data source: upload a photo and it shows up in the
//! gallery, ordered by when it was taken.
//!
//! # Architecture
//!
//! ```text
//! ObjectStore ──► GalleryBuilder ──► ManifestCache ──► Gallery (etag + signing) ──► axum
//!   (S3)          (rayon pool)       (memory → disk       (api)                      (server)
//!                                     → rebuild)
//! ```
//!
//! 1. The [`store`] lists the bucket and fetches bytes.
//! 2. The [`gallery`] builder turns a listing into a [`Manifest`](types::Manifest):
//!    one [`metadata`] probe per object, then a stable newest-first sort.
//! 3. The [`cache`] keeps that manifest in memory and on disk until its TTL
//!    runs out.
//! 4. The [`api`] derives a validation token ([`etag`]) and signs URLs per
//!    request; the [`server`] maps that onto HTTP, including `304 Not Modified`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | `ObjectStore` trait, S3 implementation, in-memory test store |
//! | [`imaging`] | Pure-Rust image work: header probe, EXIF, thumbnails |
//! | [`naming`] | Filename date patterns and thumbnail file names |
//! | [`metadata`] | Sort date resolution: EXIF → filename → storage timestamp |
//! | [`gallery`] | Listing → de-duplicated, sorted manifest |
//! | [`cache`] | Layered manifest cache with atomic persistence |
//! | [`etag`] | Validation token from manifest + time bucket |
//! | [`api`] | `/photos` and `/photo` semantics, URL signing |
//! | [`thumbnails`] | On-disk thumbnail cache |
//! | [`server`] | axum router, handlers, error mapping |
//! | [`page`] | Maud-rendered portfolio page |
//! | [`config`] | Layered `photofolio.toml` + environment configuration |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Signed URLs Are Never Cached
//!
//! The manifest is cached for an hour; signed URLs are created on every
//! listing. A cached URL would outlive its signature. The validation token
//! instead rotates every `time_bucket_secs`, so a browser holding a
//! `/photos` response revalidates and picks up fresh URLs before the old
//! ones expire.
//!
//! ## A Synchronous Core
//!
//! Store access, metadata extraction, caching and thumbnailing are plain
//! blocking code. The gallery builder parallelises with rayon; the HTTP
//! layer reaches the core through `spawn_blocking`. Only `main.rs` and
//! [`server`] are async.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): compile-time
//! checked, auto-escaped, and no template files to ship.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod etag;
pub mod gallery;
pub mod imaging;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod page;
pub mod server;
pub mod store;
pub mod thumbnails;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
