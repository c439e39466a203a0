use clap::{Parser, Subcommand};
use photofolio::api::Gallery;
use photofolio::clock::SystemClock;
use photofolio::config::{self, AppConfig};
use photofolio::imaging::RustBackend;
use photofolio::server::{self, AppState};
use photofolio::store::s3::S3Store;
use photofolio::{etag, logging, output, thumbnails};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

fn version_string() -> &'static str {
    // Leaked once at startup
    Box::leak(
        version_label(
            env!("ON_RELEASE_TAG") == "true",
            env!("GIT_HASH"),
            env!("CARGO_PKG_VERSION"),
        )
        .into_boxed_str(),
    )
}

/// Release builds report the crate version, everything else the commit.
fn version_label(on_release_tag: bool, git_hash: &str, pkg_version: &str) -> String {
    if on_release_tag {
        pkg_version.to_string()
    } else if git_hash.is_empty() {
        "dev@unknown".to_string()
    } else {
        format!("dev@{git_hash}")
    }
}

#[derive(Parser)]
#[command(name = "photofolio")]
#[command(about = "Photo portfolio served from an S3-compatible bucket")]
#[command(long_about = "\
Photo portfolio served from an S3-compatible bucket

The bucket is the data source. Every object is a photo; the gallery shows
them newest first and hands out time-limited signed URLs for full-size
images. Thumbnails are generated on first request and kept on local disk.

Sort date (first available wins):
  1. EXIF DateTimeOriginal
  2. a date in the file name (IMG_20230615_143022.jpg, 2021-12-25 tree.png)
  3. the object's last-modified time

Local state lives in the cache directory:
  .photofolio-cache/
  ├── gallery-manifest.json   # sorted photo list, reused until manifest_ttl_secs
  └── thumbnails/             # generated JPEGs, never evicted

Run 'photofolio gen-config' to generate a documented photofolio.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file = defaults + environment)
    #[arg(long, default_value = "photofolio.toml", global = true)]
    config: PathBuf,

    /// Log as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Build the gallery manifest and save it to the cache directory
    Warm {
        /// Rebuild even if the cached manifest is still fresh
        #[arg(long)]
        force: bool,
    },
    /// Validate configuration and print the effective settings
    Check,
    /// Print a stock photofolio.toml with all options documented
    GenConfig,
    /// Report the thumbnail cache size
    Thumbnails {
        /// Delete all generated thumbnails
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    logging::init(cli.log_json)?;
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Command::Serve => serve(config).await?,
        Command::Warm { force } => warm(config, force).await?,
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            output::print_config(&config);
            println!("==> Config is valid");
        }
        Command::Thumbnails { clear } => {
            let dir = config.cache.thumbnails_dir();
            if clear {
                let removed = thumbnails::clear_dir(&dir)?;
                println!("{}", output::format_thumbnails_cleared(removed, &dir));
            } else {
                let stats = thumbnails::dir_stats(&dir)?;
                println!("{}", output::format_thumbnail_stats(&stats, &dir));
            }
        }
        Command::GenConfig => {}
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.server.addr.parse()?;
    let store = S3Store::connect(&config.store).await?;
    if config.store.create_bucket {
        store.ensure_bucket().await?;
    }

    let state = AppState::new(
        config,
        Arc::new(store),
        Arc::new(RustBackend::new()),
        Arc::new(SystemClock),
    )?;

    // Initial build in the background. On failure the first /photos
    // request retries it.
    let gallery = Arc::clone(&state.gallery);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = gallery.manifest() {
            warn!(error = %e, "initial gallery build failed");
        }
    });

    server::serve(addr, state).await?;
    Ok(())
}

async fn warm(config: AppConfig, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = S3Store::connect(&config.store).await?;
    let gallery = Arc::new(Gallery::new(
        Arc::new(store),
        Arc::new(RustBackend::new()),
        Arc::new(SystemClock),
        &config.gallery,
        &config.cache.dir,
    )?);

    if force {
        gallery.cache().invalidate()?;
    }
    let worker = Arc::clone(&gallery);
    let manifest = tokio::task::spawn_blocking(move || worker.manifest()).await??;

    let cache = gallery.cache();
    let token = etag::derive_now(&manifest, config.gallery.time_bucket_secs);
    output::print_warm_output(
        &manifest,
        cache.path(),
        cache.current().map(|e| e.created_at),
        token.as_deref(),
        &cache.stats().to_string(),
    );
    Ok(())
}
