//! TileVault CLI - command-line interface to the offline tile cache.
//!
//! Exposes the caching workflow as subcommands: plan and download a region
//! for offline use, estimate storage cost per level, inspect cache usage,
//! reconstruct coverage polygons and clear the store.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tilevault::{
    Extent, FetchError, FileStore, HttpClient, OfflineTileLayer, RelayClient, ReqwestClient,
    StoreError, TilingScheme, UrlTemplateSource, DEFAULT_TILE_CAP,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("network error: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Download(#[from] tilevault::download::DownloadError),

    #[error("{0}")]
    Usage(String),
}

/// Offline raster tile cache for map services.
#[derive(Parser)]
#[command(name = "tilevault", version, about)]
struct Cli {
    /// Directory holding the tile store.
    #[arg(long, global = true, default_value = ".tilevault")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every tile covering an extent for a range of levels.
    Download(DownloadArgs),
    /// Estimate tile counts and storage cost per level, without downloading.
    Estimate(EstimateArgs),
    /// Print the geographic footprints of all cached tiles.
    Coverage,
    /// Print the cache's storage footprint.
    Usage,
    /// Delete every cached tile.
    Clear,
}

#[derive(Args)]
struct ExtentArgs {
    /// West edge in map units (Web Mercator meters).
    #[arg(long, allow_hyphen_values = true)]
    xmin: f64,
    /// South edge in map units.
    #[arg(long, allow_hyphen_values = true)]
    ymin: f64,
    /// East edge in map units.
    #[arg(long, allow_hyphen_values = true)]
    xmax: f64,
    /// North edge in map units.
    #[arg(long, allow_hyphen_values = true)]
    ymax: f64,
}

impl ExtentArgs {
    fn extent(&self, scheme: &TilingScheme) -> Extent {
        Extent::new(self.xmin, self.ymin, self.xmax, self.ymax, scheme.wkid())
    }
}

#[derive(Args)]
struct DownloadArgs {
    /// Tile service base URL; tiles are fetched from {url}/{level}/{col}/{row}.
    #[arg(long)]
    template: String,

    /// Optional relay endpoint; fetches go to {relay}?{tile-url}.
    #[arg(long)]
    relay: Option<String>,

    #[command(flatten)]
    extent: ExtentArgs,

    /// Coarsest level to cache.
    #[arg(long)]
    min_level: u8,

    /// Finest level to cache.
    #[arg(long)]
    max_level: u8,

    /// Cap on the number of tiles in one campaign.
    #[arg(long, default_value_t = DEFAULT_TILE_CAP)]
    cap: usize,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Args)]
struct EstimateArgs {
    #[command(flatten)]
    extent: ExtentArgs,

    /// Coarsest level to estimate.
    #[arg(long)]
    min_level: u8,

    /// Finest level to estimate.
    #[arg(long)]
    max_level: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let store = Arc::new(FileStore::new(&cli.store));
    let scheme = TilingScheme::web_mercator();

    match cli.command {
        Commands::Download(args) => download(store, scheme, args).await,
        Commands::Estimate(args) => estimate(scheme, args),
        Commands::Coverage => coverage(store, scheme).await,
        Commands::Usage => usage(store, scheme).await,
        Commands::Clear => clear(store, scheme).await,
    }
}

/// Builds a layer around a placeholder source for store-only commands.
async fn store_layer(
    store: Arc<FileStore>,
    scheme: TilingScheme,
) -> Result<OfflineTileLayer<UrlTemplateSource>, CliError> {
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    let layer = OfflineTileLayer::new(
        UrlTemplateSource::new("https://invalid.example.com"),
        scheme,
        client,
        store,
    );
    layer.initialize().await?;
    Ok(layer)
}

async fn download(
    store: Arc<FileStore>,
    scheme: TilingScheme,
    args: DownloadArgs,
) -> Result<(), CliError> {
    if args.min_level > args.max_level {
        return Err(CliError::Usage(format!(
            "--min-level {} exceeds --max-level {}",
            args.min_level, args.max_level
        )));
    }

    let base: Arc<dyn HttpClient> = Arc::new(ReqwestClient::with_timeout(args.timeout)?);
    let client: Arc<dyn HttpClient> = match &args.relay {
        Some(endpoint) => Arc::new(RelayClient::new(base, endpoint.clone())),
        None => base,
    };

    let layer = OfflineTileLayer::new(
        UrlTemplateSource::new(args.template),
        scheme,
        client,
        store,
    )
    .with_tile_cap(args.cap);
    layer.initialize().await?;

    let extent = args.extent.extent(layer.scheme());
    let plan = layer.plan(args.min_level, args.max_level, &extent);
    if plan.is_empty() {
        println!("Nothing to download: the extent covers no tiles in that level range.");
        return Ok(());
    }

    println!(
        "Caching {} tiles (levels {}..={})",
        style(plan.len()).cyan(),
        args.min_level,
        args.max_level
    );

    // Ctrl-C requests cooperative cancellation at the next tile boundary.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "Could not install Ctrl-C handler");
        }
    }

    let bar = ProgressBar::new(plan.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} tiles {msg}")
            .expect("static progress template is valid"),
    );

    let outcome = layer
        .prepare_for_offline(
            args.min_level,
            args.max_level,
            &extent,
            |i, _| {
                bar.set_position(i as u64);
                cancel.load(Ordering::SeqCst)
            },
            |cancelled| {
                bar.finish_with_message(if cancelled { "stopped" } else { "done" });
            },
        )
        .await?;

    if outcome.cancelled {
        println!(
            "{} batch ended early after {} tiles (cancelled or a tile failed; cached tiles are kept)",
            style("warning:").yellow().bold(),
            outcome.persisted
        );
    } else {
        println!("Cached {} tiles.", style(outcome.persisted).green());
    }
    Ok(())
}

fn estimate(scheme: TilingScheme, args: EstimateArgs) -> Result<(), CliError> {
    if args.min_level > args.max_level {
        return Err(CliError::Usage(format!(
            "--min-level {} exceeds --max-level {}",
            args.min_level, args.max_level
        )));
    }

    let extent = args.extent.extent(&scheme);
    println!("{:>5}  {:>10}  {:>12}", "level", "tiles", "est. bytes");

    let mut total_tiles = 0usize;
    let mut total_bytes = 0u64;
    for level in args.min_level..=args.max_level {
        let tile_count = scheme.cells_covering(&extent, level).len();
        let size_bytes = tile_count as u64 * tilevault::offline::ESTIMATED_TILE_SIZE_BYTES;
        total_tiles += tile_count;
        total_bytes += size_bytes;
        println!("{:>5}  {:>10}  {:>12}", level, tile_count, size_bytes);
    }
    println!("{:>5}  {:>10}  {:>12}", "total", total_tiles, total_bytes);
    Ok(())
}

async fn coverage(store: Arc<FileStore>, scheme: TilingScheme) -> Result<(), CliError> {
    let layer = store_layer(store, scheme).await?;
    let polygons = layer
        .reconstruct_coverage(|identity, reason| {
            warn!(identity = %identity, reason = %reason, "Skipped a cached record");
        })
        .await?;

    if polygons.is_empty() {
        println!("The cache is empty.");
        return Ok(());
    }
    for polygon in polygons {
        let b = polygon.bounds();
        println!(
            "[{:.1}, {:.1}, {:.1}, {:.1}]",
            b.xmin, b.ymin, b.xmax, b.ymax
        );
    }
    Ok(())
}

async fn usage(store: Arc<FileStore>, scheme: TilingScheme) -> Result<(), CliError> {
    let layer = store_layer(store, scheme).await?;
    let bytes = layer.size_bytes().await?;
    println!("{} bytes cached", style(bytes).cyan());
    Ok(())
}

async fn clear(store: Arc<FileStore>, scheme: TilingScheme) -> Result<(), CliError> {
    let layer = store_layer(store, scheme).await?;
    layer.delete_all().await?;
    println!("Cache cleared.");
    Ok(())
}
