use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use garment_preview::config::Configuration;
use garment_preview::events::{Notification, Side};
use garment_preview::matting::BorderKeyRemover;
use garment_preview::render::texture::{TextureBackend, WgpuTextureBackend};
use garment_preview::render::zones::PrintLocation;
use garment_preview::studio::{Frame, SlotStatus, Studio};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(
    name = "garment-preview",
    version,
    about = "headless garment design preview"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Design image for the front of the garment
    #[arg(long, value_name = "FILE")]
    front: PathBuf,
    /// Design image for the back of the garment
    #[arg(long, value_name = "FILE")]
    back: Option<PathBuf>,
    /// Show the front design on the back as well
    #[arg(long = "same-design")]
    same_design: bool,
    /// Print location for the front (none, left-chest, full-front)
    #[arg(long = "front-print", value_name = "LOC")]
    front_print: Option<PrintLocation>,
    /// Print location for the back (none, full-back)
    #[arg(long = "back-print", value_name = "LOC")]
    back_print: Option<PrintLocation>,
    /// Garment colour as #rrggbb
    #[arg(long, value_name = "HEX")]
    color: Option<String>,
    /// Run background removal for a side (repeatable)
    #[arg(long = "remove-background", value_name = "SIDE")]
    remove_background: Vec<Side>,
    /// Minimum number of frames to render before exiting
    #[arg(long, value_name = "N", default_value_t = 120)]
    frames: u64,
    /// Write the final frame and slot status as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    frames: u64,
    front: SlotStatus,
    back: SlotStatus,
    frame: &'a Frame,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let cfg = Configuration::from_yaml_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", args.config.display(), cfg);

    let backend = WgpuTextureBackend::headless().context("failed to initialise GPU backend")?;
    let mut studio = Studio::new(
        &cfg,
        backend,
        Arc::new(BorderKeyRemover),
        tokio::runtime::Handle::current(),
    )
    .context("failed to set up studio")?;
    let mut notifications = studio.subscribe();

    upload_file(&mut studio, Side::Front, &args.front)?;
    if let Some(back) = &args.back {
        upload_file(&mut studio, Side::Back, back)?;
    }
    if let Some(location) = args.front_print {
        studio.select_print(Side::Front, location)?;
    }
    if let Some(location) = args.back_print {
        studio.select_print(Side::Back, location)?;
    }
    if args.same_design {
        studio.set_use_same_design(true);
    }
    if let Some(hex) = &args.color {
        studio.select_color(hex)?;
    }
    for side in &args.remove_background {
        let outcome = studio.toggle_background_removal(*side);
        tracing::info!(%side, ?outcome, "background removal requested");
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = tokio::time::Instant::now();
    let mut rendered = 0u64;
    let mut frame = studio.advance_frame(Duration::ZERO);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            now = ticker.tick() => {
                frame = studio.advance_frame(now.saturating_duration_since(last));
                last = now;
                rendered += 1;
                log_notifications(&mut notifications);
                if rendered >= args.frames && !studio.is_processing() {
                    break;
                }
            }
        }
    }

    for side in Side::ALL {
        let status = studio.status(side);
        tracing::info!(
            %side,
            file = status.file_name.as_deref().unwrap_or("-"),
            state = ?status.job_state,
            processed = status.showing_processed,
            "final slot state"
        );
    }
    tracing::info!(frames = rendered, decals = frame.decals.len(), "preview finished");

    if let Some(path) = &args.report {
        let report = Report {
            frames: rendered,
            front: studio.status(Side::Front),
            back: studio.status(Side::Back),
            frame: &frame,
        };
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
    }
    Ok(())
}

fn upload_file<B: TextureBackend>(studio: &mut Studio<B>, side: Side, path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    studio
        .upload(side, &bytes, &name)
        .with_context(|| format!("failed to load design {}", path.display()))
}

fn log_notifications(rx: &mut tokio::sync::broadcast::Receiver<Notification>) {
    loop {
        match rx.try_recv() {
            Ok(Notification::Progress { side, percent }) => {
                tracing::info!(%side, percent, "background removal progress");
            }
            Ok(Notification::SlotChanged(side)) => tracing::debug!(%side, "slot changed"),
            Ok(Notification::GarmentChanged) => tracing::debug!("garment changed"),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "notification receiver lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
