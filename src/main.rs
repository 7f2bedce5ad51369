//! Veilfit - Virtual head-garment try-on
//!
//! CLI entry point. Photo mode renders the garment onto a still image
//! and writes the flattened result; live mode tracks a camera feed
//! headlessly until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use veilfit::render::style::{style_by_id, GarmentStyle};
use veilfit::source::StillSource;
use veilfit::{Config, CycleReport, ModelRegistry, ResultCallback, TrackingSession};

/// Veilfit - Virtual head-garment try-on
#[derive(Parser, Debug)]
#[command(name = "veilfit", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input photo to try the garment on
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Output path for the composited photo
    #[arg(short, long, default_value = "tryon.png")]
    output: PathBuf,

    /// Garment style id from the catalog
    #[arg(short, long)]
    style: Option<String>,

    /// Track a live camera instead of a photo
    #[cfg(feature = "camera")]
    #[arg(long)]
    live: bool,

    /// Print one JSON status line per processed cycle
    #[arg(long)]
    json: bool,

    /// List the garment style catalog and exit
    #[arg(long)]
    list_styles: bool,

    /// List available capture devices and exit
    #[cfg(feature = "camera")]
    #[arg(long)]
    list_cameras: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", veilfit::NAME, veilfit::VERSION);

    // Load configuration
    let config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };
    config.validate()?;

    if args.list_styles {
        list_styles(&config);
        return Ok(());
    }

    #[cfg(feature = "camera")]
    if args.list_cameras {
        list_cameras();
        return Ok(());
    }

    // Resolve the requested style against the catalog before any model
    // loading happens
    let style = match args.style.as_deref() {
        Some(id) => Some(
            style_by_id(&config.styles, id)
                .cloned()
                .with_context(|| format!("Unknown style id {}", id))?,
        ),
        None => None,
    };

    let runtime = tokio::runtime::Runtime::new()?;

    #[cfg(feature = "camera")]
    if args.live {
        return runtime.block_on(run_live(config, style, args.json));
    }

    let input = args
        .image
        .context("No input photo given, pass --image <path>")?;
    runtime.block_on(run_photo(config, style, input, args.output, args.json))
}

/// One-shot photo mode: render the garment onto the photo and write the
/// flattened composite.
async fn run_photo(
    config: Config,
    style: Option<GarmentStyle>,
    input: PathBuf,
    output: PathBuf,
    json: bool,
) -> anyhow::Result<()> {
    let base = image::open(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?
        .to_rgb8();
    info!(
        "Loaded {} ({}x{})",
        input.display(),
        base.width(),
        base.height()
    );

    let source = StillSource::from_image(base.clone());

    let registry = Arc::new(ModelRegistry::new());
    let mut session = TrackingSession::new(config, registry);
    if let Some(style) = style {
        session.set_style(style);
    }

    session
        .start(Box::new(source), report_callback(json))
        .await?;
    session.wait().await?;

    let composited = session.surface_snapshot().composited_over(&base);
    composited
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Wrote {}", output.display());
    Ok(())
}

/// Live headless mode: track the camera until Ctrl+C / SIGTERM.
#[cfg(feature = "camera")]
async fn run_live(
    config: Config,
    style: Option<GarmentStyle>,
    json: bool,
) -> anyhow::Result<()> {
    use veilfit::source::CameraSource;

    let source = CameraSource::new(config.camera.clone());

    let registry = Arc::new(ModelRegistry::new());
    let mut session = TrackingSession::new(config, registry);
    if let Some(style) = style {
        session.set_style(style);
    }

    session
        .start(Box::new(source), report_callback(json))
        .await?;
    info!("Live try-on running, press Ctrl+C to stop");

    shutdown_signal().await;
    info!("Shutdown signal received");
    session.stop();
    session.wait().await?;

    Ok(())
}

/// Builds the per-cycle callback: JSON status lines on stdout, or debug
/// logs when `--json` is off.
fn report_callback(json: bool) -> ResultCallback {
    if json {
        Box::new(|report: CycleReport| match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize cycle report: {}", e),
        })
    } else {
        Box::new(|report: CycleReport| {
            tracing::debug!(
                detected = report.has_detection,
                applied = report.garment_applied,
                "Cycle complete"
            );
        })
    }
}

fn list_styles(config: &Config) {
    println!("Available garment styles:\n");
    for style in &config.styles {
        println!(
            "  {:>3}  {} ({}, {})",
            style.id, style.name, style.color, style.fabric
        );
    }
}

#[cfg(feature = "camera")]
fn list_cameras() {
    use veilfit::source::CameraSource;

    println!("Available capture devices:\n");
    match CameraSource::list_devices() {
        Ok(devices) => {
            for device in devices {
                println!("  {}", device);
            }
        }
        Err(e) => error!("Failed to query capture devices: {}", e),
    }
}

#[cfg(feature = "camera")]
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
