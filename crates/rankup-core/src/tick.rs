//! The tick cycle that drives accrual, promotion, and persistence.
//!
//! The host calls [`run_tick`] from its own tick callback, as often as it
//! likes. Work only happens when the [`SaveSchedule`] says a save interval
//! has passed, and then runs in three phases:
//!
//! 1. **Accrue** -- credit the elapsed seconds to every online player.
//! 2. **Promote** -- run the promotion check for every online player. All
//!    players are credited before any promotion is evaluated, so promotion
//!    always sees this tick's playtime.
//! 3. **Persist** -- flush playtime (and the player directory if it
//!    changed). Failures are logged; the in-memory state carries on.
//!
//! All state lives in one [`RankupState`] owned by the caller and passed by
//! reference into the tick and command handlers. Nothing is global.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rankup_types::{OnlinePlayer, PlayerId};
use tracing::{debug, error, info, warn};

use crate::config::{self, RankupConfig};
use crate::directory::PlayerDirectory;
use crate::permissions::PermissionBackend;
use crate::playtime::PlaytimeStore;
use crate::promoter::{PromotionOutcome, RankPromoter};
use crate::ranks::{ExclusionSet, RankLadder};
use crate::schedule::{SaveSchedule, ScheduleError};

/// Errors that can occur while building the state.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// The save schedule could not be created.
    #[error("schedule error: {source}")]
    Schedule {
        /// The underlying schedule error.
        #[from]
        source: ScheduleError,
    },
}

/// Promotion decision for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPromotion {
    /// The player checked.
    pub player: PlayerId,
    /// The player's name at the time.
    pub name: String,
    /// What was decided.
    pub outcome: PromotionOutcome,
}

/// Summary of one executed tick.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// When the tick ran.
    pub at: DateTime<Utc>,
    /// Seconds credited to each online player.
    pub elapsed_seconds: u64,
    /// Number of players credited.
    pub players_credited: usize,
    /// Promotion decision for each online player.
    pub promotions: Vec<PlayerPromotion>,
    /// Whether playtime was written to disk.
    pub flushed: bool,
}

impl TickSummary {
    /// Number of promotions applied this tick.
    pub fn promoted_count(&self) -> usize {
        self.promotions
            .iter()
            .filter(|p| p.outcome.is_promoted())
            .count()
    }
}

/// Everything Timed Rankup owns.
#[derive(Debug)]
pub struct RankupState {
    /// Accumulated playtime.
    pub store: PlaytimeStore,
    /// Promotion logic and the upgrade ledger.
    pub promoter: RankPromoter,
    /// Configured ranks.
    pub ladder: RankLadder,
    /// Groups exempt from promotion.
    pub exclusions: ExclusionSet,
    /// Name lookup for players seen online.
    pub directory: PlayerDirectory,
    /// When the next accrual and flush are due.
    pub schedule: SaveSchedule,
    /// Where the ladder is saved after edits.
    pub ranks_path: PathBuf,
    /// Minimum permission level for operator commands.
    pub operator_level: u8,
}

impl RankupState {
    /// Build empty state from explicit parts (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Schedule`] if the interval is invalid.
    pub fn from_parts(
        config: &RankupConfig,
        ladder: RankLadder,
        exclusions: ExclusionSet,
    ) -> Result<Self, TickError> {
        let storage = &config.storage;
        Ok(Self {
            store: PlaytimeStore::new(storage.playtime_path()),
            promoter: RankPromoter::new(config.promotion.exclusions_enabled),
            ladder,
            exclusions,
            directory: PlayerDirectory::new(storage.directory_path()),
            schedule: SaveSchedule::new(config.promotion.save_interval_seconds)?,
            ranks_path: storage.ranks_path(),
            operator_level: config.host.operator_level,
        })
    }

    /// Load everything from disk at startup.
    ///
    /// Missing rank and exclusion documents are generated. Playtime and
    /// directory restore failures are logged and the state starts empty;
    /// the service keeps running without them.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Schedule`] if the save interval is invalid.
    pub fn load(config: &RankupConfig) -> Result<Self, TickError> {
        let ladder = config::load_rank_ladder(&config.storage.ranks_path());
        let exclusions = config::load_exclusions(&config.storage.exclusions_path());
        let mut state = Self::from_parts(config, ladder, exclusions)?;

        match state.store.restore() {
            Ok(report) if report.file_missing => {
                info!(path = %state.store.path().display(), "No playtime file, starting empty");
            }
            Ok(report) => info!(
                records = report.records_loaded,
                skipped = report.lines_skipped,
                "Playtime restored"
            ),
            Err(e) => error!(error = %e, "Failed to restore playtime, starting empty"),
        }

        match state.directory.load() {
            Ok(count) => debug!(players = count, "Player directory loaded"),
            Err(e) => warn!(error = %e, "Failed to load player directory"),
        }

        Ok(state)
    }

    /// Persist the ladder after an edit. Failures are logged only.
    pub fn save_ladder(&self) {
        match config::save_rank_ladder(&self.ranks_path, &self.ladder) {
            Ok(()) => info!(path = %self.ranks_path.display(), "Rank configuration updated"),
            Err(e) => error!(error = %e, "Failed to save rank configuration"),
        }
    }

    /// Run the promotion check for every player in `online`.
    pub fn promotion_pass(
        &mut self,
        online: &[OnlinePlayer],
        backend: &mut dyn PermissionBackend,
    ) -> Vec<PlayerPromotion> {
        online
            .iter()
            .map(|player| {
                let playtime = self.store.get(player.id);
                let outcome = self.promoter.evaluate(
                    player,
                    playtime,
                    &self.ladder,
                    &self.exclusions,
                    backend,
                );
                PlayerPromotion {
                    player: player.id,
                    name: player.name.clone(),
                    outcome,
                }
            })
            .collect()
    }

    /// Write playtime and, if changed, the directory. Returns whether the
    /// playtime flush succeeded.
    pub fn persist(&mut self) -> bool {
        let flushed = match self.store.flush() {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Error saving playtime data to file");
                false
            }
        };
        if let Err(e) = self.directory.save() {
            warn!(error = %e, "Error saving player directory");
        }
        flushed
    }
}

/// Execute one host tick at `now` with the given online players.
///
/// Returns `None` when the save interval has not passed yet, otherwise a
/// summary of the accrual, promotion, and flush that ran.
pub fn run_tick(
    state: &mut RankupState,
    now: DateTime<Utc>,
    online: &[OnlinePlayer],
    backend: &mut dyn PermissionBackend,
) -> Option<TickSummary> {
    for player in online {
        state.directory.observe(player);
    }

    let elapsed_seconds = state.schedule.poll(now)?;

    // Duplicate entries from the host are credited and evaluated once.
    let mut seen = BTreeSet::new();
    let unique: Vec<OnlinePlayer> = online
        .iter()
        .filter(|p| seen.insert(p.id))
        .cloned()
        .collect();

    // Phase 1: accrue.
    state.store.tick(unique.iter().map(|p| p.id), elapsed_seconds);

    // Phase 2: promote.
    let promotions = state.promotion_pass(&unique, backend);

    // Phase 3: persist.
    let flushed = state.persist();

    let summary = TickSummary {
        at: now,
        elapsed_seconds,
        players_credited: unique.len(),
        promotions,
        flushed,
    };
    debug!(
        elapsed = summary.elapsed_seconds,
        players = summary.players_credited,
        promoted = summary.promoted_count(),
        flushed = summary.flushed,
        "Tick complete"
    );
    Some(summary)
}

/// Final flush before the host stops.
pub fn shutdown(state: &mut RankupState) {
    if state.persist() {
        info!(players = state.store.len(), "Playtime saved on shutdown");
    }
}
