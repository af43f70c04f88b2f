//! ArtFlow daemon
//!
//! Usage:
//!   artflow run -c artflow.toml             - Start sending frames
//!   artflow run -c artflow.toml --on desk   - Start and switch fixtures on
//!   artflow check -c artflow.toml           - Validate a configuration file

mod logging_setup;

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use artflow_control::Rig;
use artflow_core::{AppConfig, ChannelEvent, CorrectionRegistry, TurnOn};
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "artflow", version, about = "DMX fades over Art-Net")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send frames until Ctrl-C
    Run {
        /// Configuration file
        #[arg(short, long, default_value = "artflow.toml")]
        config: PathBuf,
        /// Override the configured log level
        #[arg(long)]
        log_level: Option<String>,
        /// Switch these fixtures on at startup
        #[arg(long = "on", value_name = "FIXTURE")]
        on: Vec<String>,
    },
    /// Report every problem in a configuration file
    Check {
        /// Configuration file
        #[arg(short, long, default_value = "artflow.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            log_level,
            on,
        } => run(&config, log_level, &on).await,
        Commands::Check { config } => check(&config),
    }
}

fn load(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))
}

fn check(path: &Path) -> Result<()> {
    let config = load(path)?;
    let problems = config.check_all(&CorrectionRegistry::new());
    if problems.is_empty() {
        println!("{:?}: {} nodes, no problems", path, config.nodes.len());
        return Ok(());
    }
    for problem in &problems {
        println!("{}", problem);
    }
    bail!("{} problems in {:?}", problems.len(), path)
}

async fn run(path: &Path, log_level: Option<String>, on: &[String]) -> Result<()> {
    let mut config = load(path)?;
    if let Some(level) = log_level {
        config.logging.level = level;
    }
    let _log_guard = logging_setup::init(&config.logging)?;

    let mut rig = Rig::from_config(&config, &CorrectionRegistry::new());
    if !rig.skipped().is_empty() {
        warn!("{} configuration entries skipped", rig.skipped().len());
    }

    for name in on {
        match rig.fixture_mut(name) {
            Some(fixture) => fixture
                .turn_on(&TurnOn::default())
                .with_context(|| format!("Failed to switch on {}", name))?,
            None => warn!("No fixture named {}", name),
        }
    }

    let events = thread::Builder::new()
        .name("artflow-events".to_string())
        .spawn({
            let events = rig.events();
            move || log_events(events)
        })
        .context("Failed to spawn event thread")?;

    rig.start().context("Failed to start nodes")?;
    info!("ArtFlow running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    rig.stop().await;
    // Dropping the rig closes the event channel
    drop(rig);
    if events.join().is_err() {
        warn!("Event thread panicked");
    }

    Ok(())
}

fn log_events(events: Receiver<ChannelEvent>) {
    for event in events.iter() {
        match event {
            ChannelEvent::ValueChanged(s) => {
                debug!("{} (universe {}) -> {:?}", s.name, s.universe, s.values)
            }
            ChannelEvent::FadeFinished(s) => {
                info!("{} (universe {}) reached {:?}", s.name, s.universe, s.values)
            }
        }
    }
}
