//! Name to identity lookup for players seen online.
//!
//! Playtime is keyed by [`PlayerId`], but players ask about each other by
//! name. The directory remembers the last name every player was seen
//! with, and is saved as JSON so lookups keep working across restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rankup_types::{OnlinePlayer, PlayerId};
use serde::{Deserialize, Serialize};

use crate::persist;

/// Errors that can occur while loading or saving the directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Reading or writing the directory file failed.
    #[error("player directory {path}: {source}")]
    Io {
        /// The directory file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The directory file is not valid JSON.
    #[error("invalid player directory {path}: {source}")]
    Json {
        /// The directory file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// One remembered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Last name the player was seen with.
    pub name: String,
    /// The player's identity.
    pub id: PlayerId,
}

/// Players seen online, keyed by lowercased name.
#[derive(Debug)]
pub struct PlayerDirectory {
    path: PathBuf,
    by_name: BTreeMap<String, DirectoryEntry>,
    dirty: bool,
}

impl PlayerDirectory {
    /// Create an empty directory saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            by_name: BTreeMap::new(),
            dirty: false,
        }
    }

    /// The file the directory is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remember `player` under its current name.
    ///
    /// A renamed player loses its old name; a name taken over by another
    /// player now points to the new one. Returns whether anything changed.
    pub fn observe(&mut self, player: &OnlinePlayer) -> bool {
        let key = player.name.to_ascii_lowercase();
        if self
            .by_name
            .get(&key)
            .is_some_and(|entry| entry.id == player.id && entry.name == player.name)
        {
            return false;
        }

        self.by_name
            .retain(|name, entry| entry.id != player.id || *name == key);
        self.by_name.insert(
            key,
            DirectoryEntry {
                name: player.name.clone(),
                id: player.id,
            },
        );
        self.dirty = true;
        true
    }

    /// Identity of the player last seen as `name`, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<PlayerId> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|entry| entry.id)
    }

    /// Number of remembered players.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no player has been seen.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Whether there are changes not yet saved.
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Load remembered players from disk. A missing file loads nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(&mut self) -> Result<usize, DirectoryError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(DirectoryError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let entries: Vec<DirectoryEntry> =
            serde_json::from_str(&contents).map_err(|source| DirectoryError::Json {
                path: self.path.clone(),
                source,
            })?;

        let count = entries.len();
        for entry in entries {
            self.by_name.insert(entry.name.to_ascii_lowercase(), entry);
        }
        Ok(count)
    }

    /// Save remembered players if anything changed since the last save.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the file cannot be written; the
    /// directory stays dirty so the next save retries.
    pub fn save(&mut self) -> Result<(), DirectoryError> {
        if !self.dirty {
            return Ok(());
        }
        let entries: Vec<&DirectoryEntry> = self.by_name.values().collect();
        let json = serde_json::to_string_pretty(&entries).map_err(|source| {
            DirectoryError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        persist::write_atomic(&self.path, json.as_bytes()).map_err(|source| {
            DirectoryError::Io {
                path: self.path.clone(),
                source,
            }
        })?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut directory = PlayerDirectory::new("unused.json");
        let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
        assert!(directory.observe(&steve));
        assert_eq!(directory.lookup("steve"), Some(steve.id));
        assert_eq!(directory.lookup("alex"), None);
    }

    #[test]
    fn observing_again_is_not_a_change() {
        let mut directory = PlayerDirectory::new("unused.json");
        let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
        directory.observe(&steve);
        assert!(!directory.observe(&steve));
    }

    #[test]
    fn rename_drops_old_name() {
        let mut directory = PlayerDirectory::new("unused.json");
        let id = PlayerId::new();
        directory.observe(&OnlinePlayer::new(id, "Steve"));
        directory.observe(&OnlinePlayer::new(id, "Steve2"));
        assert_eq!(directory.lookup("Steve"), None);
        assert_eq!(directory.lookup("Steve2"), Some(id));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usercache.json");
        let steve = OnlinePlayer::new(PlayerId::new(), "Steve");

        let mut directory = PlayerDirectory::new(&path);
        directory.observe(&steve);
        directory.save().unwrap();
        assert!(!directory.is_dirty());

        let mut reloaded = PlayerDirectory::new(&path);
        assert_eq!(reloaded.load().unwrap(), 1);
        assert_eq!(reloaded.lookup("STEVE"), Some(steve.id));
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut directory = PlayerDirectory::new(dir.path().join("none.json"));
        assert_eq!(directory.load().unwrap(), 0);
        assert!(directory.is_empty());
    }
}
