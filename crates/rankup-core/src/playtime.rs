//! Accumulated playtime per player and its flat-file persistence.
//!
//! The [`PlaytimeStore`] is the authoritative record of how many seconds
//! each player has spent online. It only ever grows: every accrual adds
//! to the existing counter, nothing decays, and records are never deleted.
//!
//! # File format
//!
//! One record per line, no header:
//!
//! ```text
//! 0191c4a2-7d4e-7b7a-9f55-2c4f1b8e0a11,3600
//! 0191c4a2-7d4e-7b7a-9f55-2c4f1b8e0a12,45
//! ```
//!
//! The whole file is rewritten on every flush (never appended) through a
//! temporary file and an atomic rename, so a crash mid-flush costs at most
//! the increments since the previous flush. Players with zero seconds are
//! not written.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use rankup_types::PlayerId;
use tracing::{debug, warn};

use crate::persist;

/// Errors that can occur while persisting or restoring playtime.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the playtime file failed.
    #[error("playtime file {path}: {source}")]
    Io {
        /// The playtime file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Outcome of a successful [`PlaytimeStore::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records written to disk.
    pub records_written: usize,
    /// Zero-second records left out of the file.
    pub records_skipped: usize,
}

/// Outcome of a successful [`PlaytimeStore::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Whether the playtime file was absent (a fresh install).
    pub file_missing: bool,
    /// Records loaded into the store.
    pub records_loaded: usize,
    /// Non-empty lines that could not be parsed.
    pub lines_skipped: usize,
}

/// In-memory playtime counters backed by a flat file.
#[derive(Debug)]
pub struct PlaytimeStore {
    /// Location of the playtime file.
    path: PathBuf,
    /// Seconds played, keyed by player.
    playtimes: BTreeMap<PlayerId, u64>,
}

impl PlaytimeStore {
    /// Create an empty store that persists to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            playtimes: BTreeMap::new(),
        }
    }

    /// The file this store flushes to and restores from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Credit `elapsed_seconds` to every player in `online`.
    ///
    /// Players without a record start from zero. Counters saturate at
    /// `u64::MAX` instead of wrapping. A player listed twice is credited
    /// twice, so callers pass each online player once.
    ///
    /// Returns every counter after the update.
    pub fn tick<I>(&mut self, online: I, elapsed_seconds: u64) -> &BTreeMap<PlayerId, u64>
    where
        I: IntoIterator<Item = PlayerId>,
    {
        for player in online {
            let seconds = self.playtimes.entry(player).or_insert(0);
            *seconds = seconds.saturating_add(elapsed_seconds);
        }
        &self.playtimes
    }

    /// Seconds played by `player`, or zero if there is no record.
    pub fn get(&self, player: PlayerId) -> u64 {
        self.playtimes.get(&player).copied().unwrap_or(0)
    }

    /// Every counter, ordered by player.
    pub const fn playtimes(&self) -> &BTreeMap<PlayerId, u64> {
        &self.playtimes
    }

    /// Number of players with a record.
    pub fn len(&self) -> usize {
        self.playtimes.len()
    }

    /// Whether no player has a record.
    pub fn is_empty(&self) -> bool {
        self.playtimes.is_empty()
    }

    /// Write every non-zero counter to the playtime file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be written. The
    /// in-memory counters are unaffected either way.
    pub fn flush(&self) -> Result<FlushReport, StoreError> {
        let mut contents = String::new();
        let mut report = FlushReport::default();

        for (player, &seconds) in &self.playtimes {
            if seconds == 0 {
                report.records_skipped = report.records_skipped.saturating_add(1);
                continue;
            }
            contents.push_str(&format_record(*player, seconds));
            contents.push('\n');
            report.records_written = report.records_written.saturating_add(1);
        }

        persist::write_atomic(&self.path, contents.as_bytes()).map_err(|source| {
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!(
            path = %self.path.display(),
            records = report.records_written,
            "Playtime flushed"
        );
        Ok(report)
    }

    /// Load counters from the playtime file.
    ///
    /// A missing file is not an error; the store simply stays as it is.
    /// Malformed lines are skipped with a warning. When a player appears
    /// more than once, or already has a larger in-memory value, the larger
    /// value is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub fn restore(&mut self) -> Result<RestoreReport, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(RestoreReport {
                    file_missing: true,
                    ..RestoreReport::default()
                });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut report = RestoreReport::default();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((player, seconds)) = parse_record(line) else {
                warn!(
                    path = %self.path.display(),
                    line = line_no.saturating_add(1),
                    content = line,
                    "Skipping malformed playtime record"
                );
                report.lines_skipped = report.lines_skipped.saturating_add(1);
                continue;
            };
            let stored = self.playtimes.entry(player).or_insert(0);
            *stored = (*stored).max(seconds);
            report.records_loaded = report.records_loaded.saturating_add(1);
        }

        Ok(report)
    }
}

/// Render one playtime record, without the line terminator.
pub fn format_record(player: PlayerId, seconds: u64) -> String {
    format!("{player},{seconds}")
}

/// Parse one `<uuid>,<seconds>` record.
pub fn parse_record(line: &str) -> Option<(PlayerId, u64)> {
    let (id, seconds) = line.split_once(',')?;
    let player = id.trim().parse().ok()?;
    let seconds = seconds.trim().parse().ok()?;
    Some((player, seconds))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> PlaytimeStore {
        PlaytimeStore::new(dir.path().join("playtime.txt"))
    }

    #[test]
    fn unknown_player_has_zero_playtime() {
        let store = PlaytimeStore::new("unused.txt");
        assert_eq!(store.get(PlayerId::new()), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn tick_accumulates_for_online_players_only() {
        let mut store = PlaytimeStore::new("unused.txt");
        let alice = PlayerId::new();
        let bob = PlayerId::new();

        store.tick([alice, bob], 15);
        let counters = store.tick([alice], 15);

        assert_eq!(counters.get(&alice), Some(&30));
        assert_eq!(counters.get(&bob), Some(&15));
    }

    #[test]
    fn n_ticks_add_n_times_interval_to_existing_value() {
        let mut store = PlaytimeStore::new("unused.txt");
        let player = PlayerId::new();
        store.tick([player], 100);

        for _ in 0..40 {
            store.tick([player], 15);
        }
        assert_eq!(store.get(player), 100 + 40 * 15);
    }

    #[test]
    fn counters_saturate() {
        let mut store = PlaytimeStore::new("unused.txt");
        let player = PlayerId::new();
        store.tick([player], u64::MAX);
        store.tick([player], 15);
        assert_eq!(store.get(player), u64::MAX);
    }

    #[test]
    fn flush_then_restore_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let players: Vec<PlayerId> = (0..5).map(|_| PlayerId::new()).collect();
        for (i, player) in players.iter().enumerate() {
            store.tick([*player], u64::try_from(i + 1).unwrap() * 60);
        }

        let report = store.flush().unwrap();
        assert_eq!(report.records_written, 5);

        let mut restored = store_in(&dir);
        let report = restored.restore().unwrap();
        assert_eq!(report.records_loaded, 5);
        assert_eq!(restored.playtimes(), store.playtimes());
    }

    #[test]
    fn zero_records_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let idle = PlayerId::new();
        let active = PlayerId::new();
        store.tick([idle], 0);
        store.tick([active], 15);

        let report = store.flush().unwrap();
        assert_eq!(report, FlushReport { records_written: 1, records_skipped: 1 });

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, format!("{active},15\n"));
    }

    #[test]
    fn flush_rewrites_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let player = PlayerId::new();
        store.tick([player], 15);
        store.flush().unwrap();
        store.tick([player], 15);
        store.flush().unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert_eq!(contents, format!("{player},30\n"));
    }

    #[test]
    fn restore_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let report = store.restore().unwrap();
        assert!(report.file_missing);
        assert!(store.is_empty());
    }

    #[test]
    fn restore_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let good = PlayerId::new();
        let path = dir.path().join("playtime.txt");
        std::fs::write(
            &path,
            format!("{good},120\nnot-a-uuid,5\n{good}\n\n{},-3\n", PlayerId::new()),
        )
        .unwrap();

        let mut store = PlaytimeStore::new(path);
        let report = store.restore().unwrap();
        assert_eq!(report.records_loaded, 1);
        assert_eq!(report.lines_skipped, 3);
        assert_eq!(store.get(good), 120);
    }

    #[test]
    fn restore_keeps_larger_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let player = PlayerId::new();
        let path = dir.path().join("playtime.txt");
        std::fs::write(&path, format!("{player},500\n{player},90\n")).unwrap();

        let mut store = PlaytimeStore::new(path);
        store.restore().unwrap();
        assert_eq!(store.get(player), 500);
    }

    #[test]
    fn parse_record_tolerates_whitespace() {
        let player = PlayerId::new();
        assert_eq!(parse_record(&format!(" {player} , 42 ")), Some((player, 42)));
        assert_eq!(parse_record("missing-comma"), None);
    }
}
