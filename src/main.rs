mod actions;
mod brightness;
mod classify;
mod config;
mod device;
mod source;

use crate::actions::SystemctlRunner;
use crate::brightness::SysfsBrightness;
use crate::classify::{dispatch, KeyTracker};
use crate::config::Config;
use crate::source::EventSource;
use anyhow::{Context, Result};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "powerkeyd",
    version,
    about = "Classifies power-button presses and starts systemd units"
)]
struct Cli {
    /// Substring the input device name must contain
    match_name: Option<String>,

    /// Do not request exclusive access to the device
    #[arg(long)]
    no_grab: bool,

    /// Alternate config file path
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("powerkeyd=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().context("loading config")?,
    };
    if let Some(name) = cli.match_name {
        config.device.match_name = name;
    }
    if cli.no_grab {
        config.device.grab = false;
    }

    let thresholds = config.timing.thresholds().context("validating timing")?;

    let found = device::find_device(&config.device.match_name, config.device.grab)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        device = %found.name,
        path = %found.path.display(),
        "powerkeyd starting"
    );

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&stop)).context("installing SIGINT handler")?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&stop))
        .context("installing SIGTERM handler")?;

    let mut events = EventSource::new(found.dev).context("attaching to device")?;
    let mut tracker = KeyTracker::new(thresholds);
    let runner = SystemctlRunner::new(&config.actions);
    let oracle = SysfsBrightness::new();
    let poll_interval = config.timing.poll_interval();

    while !stop.load(Ordering::Relaxed) {
        match events.next_event()? {
            Some(event) => {
                if let Some(class) = tracker.handle(&event) {
                    dispatch(class, &oracle, &runner);
                }
            }
            None => events.wait_readable(poll_interval)?,
        }
    }

    info!("powerkeyd shutting down");
    Ok(())
}
