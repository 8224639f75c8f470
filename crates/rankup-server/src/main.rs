//! Console host for Timed Rankup.
//!
//! Stands in for the game server: it ticks the playtime cycle, reads host
//! events and commands from stdin, and prints permission commands to
//! stdout for the real permission system to pick up. Stdout carries
//! nothing else; command replies and logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load settings from `rankup-config.yaml` (path from `RANKUP_CONFIG`)
//! 3. Load ranks and exclusions, restore playtime and the player directory
//! 4. Run the host loop until Ctrl-C or end of input
//! 5. Flush playtime

mod console;
mod error;
mod executor;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rankup_core::config::RankupConfig;
use rankup_core::permissions::CommandPermissions;
use rankup_core::tick::RankupState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::Host;
use crate::error::ServerError;
use crate::executor::LineExecutor;

/// Settings file used when `RANKUP_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "config/TimedRankup/rankup-config.yaml";

/// Application entry point for the console host.
///
/// # Errors
///
/// Returns an error if settings or state cannot be loaded, or stdin fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("rankup-server starting");

    let config = load_config()?;
    info!(
        data_dir = %config.storage.data_dir.display(),
        save_interval_seconds = config.promotion.save_interval_seconds,
        exclusions_enabled = config.promotion.exclusions_enabled,
        tick_interval_ms = config.host.tick_interval_ms,
        "Configuration loaded"
    );

    let state = RankupState::load(&config)?;
    info!(
        ranks = state.ladder.len(),
        players = state.store.len(),
        "Timed Rankup state loaded"
    );

    let backend = CommandPermissions::new(
        LineExecutor::new(std::io::stdout()),
        config.permissions.command_template.clone(),
    );
    let mut host = Host::new(state, backend);

    let result = run(&mut host, config.host.tick_interval_ms).await;

    host.shutdown();
    info!("rankup-server shutdown complete");
    Ok(result?)
}

/// Drive ticks and stdin until Ctrl-C or end of input.
async fn run(
    host: &mut Host<LineExecutor<std::io::Stdout>>,
    tick_interval_ms: u64,
) -> Result<(), ServerError> {
    let mut ticker = tokio::time::interval(Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(summary) = host.tick(Utc::now()) {
                    info!(
                        elapsed = summary.elapsed_seconds,
                        players = summary.players_credited,
                        promoted = summary.promoted_count(),
                        flushed = summary.flushed,
                        "Save interval processed"
                    );
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    return Ok(());
                };
                for reply in host.handle_line(&line) {
                    eprintln!("{reply}");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown requested");
                return Ok(());
            }
        }
    }
}

/// Load settings from `RANKUP_CONFIG` or the default path.
fn load_config() -> Result<RankupConfig, ServerError> {
    let path = std::env::var_os("RANKUP_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    Ok(RankupConfig::load_or_default(&path)?)
}
