//! wsi-zarr - inspect a Whole Slide Image through its Zarr v2 view.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_zarr::config::{Cli, Command, GetArgs, InfoArgs, StoreArgs};
use wsi_zarr::{LookupError, SlideStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let args = cli.command.store_args();
    init_logging(args.verbose);

    match cli.command {
        Command::Info(args) => run_info(args).await,
        Command::Get(args) => run_get(args).await,
    }
}

/// Initialize the tracing subsystem. Logs go to stderr so chunk bytes on
/// stdout stay clean.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_zarr=debug"
    } else {
        "wsi_zarr=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn open_store(path: &Path, args: &StoreArgs) -> Option<SlideStore> {
    match SlideStore::open(path, args.options()).await {
        Ok(store) => Some(store),
        Err(e) => {
            error!("Failed to open {}: {}", path.display(), e);
            None
        }
    }
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(args: InfoArgs) -> ExitCode {
    let Some(store) = open_store(&args.path, &args.store).await else {
        return ExitCode::FAILURE;
    };

    let backend = store.backend();
    let levels = backend.levels();
    info!(
        "{}: {} level(s), {} channel(s), tile size {}",
        args.path.display(),
        levels.level_count(),
        backend.channels(),
        store.tile_size()
    );
    for level in 0..levels.level_count() {
        if let (Some((w, h)), Some(d)) = (levels.dimensions(level), levels.downsample(level)) {
            info!("  level {}: {}x{} (downsample {:.3})", level, w, h, d);
        }
    }
    if let Some(props) = backend.properties() {
        info!(
            "  vendor: {}, mpp: {}, magnification: {}",
            props.vendor.as_deref().unwrap_or("unknown"),
            props.mpp.map_or_else(|| "-".to_string(), |v| v.to_string()),
            props
                .magnification
                .map_or_else(|| "-".to_string(), |v| v.to_string()),
        );
    }

    for key in &store {
        let Some(doc) = store.metadata().get(key) else {
            continue;
        };
        println!("{}", key);
        println!("{}", String::from_utf8_lossy(doc));
        println!();
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Get Command
// =============================================================================

async fn run_get(args: GetArgs) -> ExitCode {
    let Some(store) = open_store(&args.path, &args.store).await else {
        return ExitCode::FAILURE;
    };

    let bytes = match store.get(&args.key).await {
        Ok(bytes) => bytes,
        Err(e @ LookupError::ResourceClosed { .. }) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
        Err(e @ LookupError::ChunkUnavailable { .. }) => {
            error!("{} (not a metadata key and no chunk could be read)", e);
            return ExitCode::FAILURE;
        }
    };

    let written = match &args.output {
        Some(path) => tokio::fs::write(path, &bytes).await,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).and_then(|()| stdout.flush())
        }
    };

    match written {
        Ok(()) => {
            info!("Wrote {} bytes for {}", bytes.len(), args.key);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to write {}: {}", args.key, e);
            ExitCode::FAILURE
        }
    }
}
