//! Configuration loading and typed config structures.
//!
//! Three documents live in the data directory:
//!
//! - `rankup-config.yaml` -- settings ([`RankupConfig`]), loaded with
//!   `serde_yml`. Every field has a default, so the file is optional.
//! - `timedrankup_ranks.json` -- the rank ladder. Generated with three
//!   default tiers when missing.
//! - `exclusions.json` -- groups exempt from promotion. Generated with
//!   default staff groups when missing.
//!
//! The rank and exclusion loaders never fail: a missing document is
//! generated, a broken one is logged and replaced in memory by defaults
//! (the broken file is left on disk for the operator to fix).

use std::path::{Path, PathBuf};

use rankup_types::RankDefinition;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::persist;
use crate::ranks::{ExclusionSet, RankLadder};

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write a configuration file.
    #[error("config file {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Failed to parse or produce a JSON document.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// A setting has an unusable value.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level settings.
///
/// Mirrors the structure of `rankup-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RankupConfig {
    /// Where the data files live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Accrual, save interval, and exclusion settings.
    #[serde(default)]
    pub promotion: PromotionConfig,

    /// How promotions are handed to the permission system.
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Settings for the standalone console host.
    #[serde(default)]
    pub host: HostConfig,
}

impl RankupConfig {
    /// Load settings from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `RANKUP_DATA_DIR` overrides `storage.data_dir`
    /// - `RANKUP_SAVE_INTERVAL_SECONDS` overrides `promotion.save_interval_seconds`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Load settings from `path`, or fall back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Same as [`RankupConfig::from_file`], except that a missing file is
    /// not an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        info!(path = %path.display(), "No settings file, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("RANKUP_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("RANKUP_SAVE_INTERVAL_SECONDS") {
            self.promotion.save_interval_seconds =
                val.trim().parse().map_err(|e| ConfigError::Invalid {
                    reason: format!("invalid RANKUP_SAVE_INTERVAL_SECONDS: {e}"),
                })?;
        }
        Ok(())
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.promotion.save_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                reason: "promotion.save_interval_seconds must be at least 1".to_owned(),
            });
        }
        if self.host.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "host.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        let template = &self.permissions.command_template;
        if !template.contains("{player}") || !template.contains("{rank}") {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "permissions.command_template must contain {{player}} and {{rank}}, got {template:?}"
                ),
            });
        }
        Ok(())
    }
}

/// Data file locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding every data file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Playtime records, one `<uuid>,<seconds>` line per player.
    #[serde(default = "default_playtime_file")]
    pub playtime_file: String,

    /// Rank ladder document.
    #[serde(default = "default_ranks_file")]
    pub ranks_file: String,

    /// Exclusion document.
    #[serde(default = "default_exclusions_file")]
    pub exclusions_file: String,

    /// Name to identity cache for players seen online.
    #[serde(default = "default_directory_file")]
    pub directory_file: String,
}

impl StorageConfig {
    /// Full path of the playtime file.
    pub fn playtime_path(&self) -> PathBuf {
        self.data_dir.join(&self.playtime_file)
    }

    /// Full path of the rank ladder document.
    pub fn ranks_path(&self) -> PathBuf {
        self.data_dir.join(&self.ranks_file)
    }

    /// Full path of the exclusion document.
    pub fn exclusions_path(&self) -> PathBuf {
        self.data_dir.join(&self.exclusions_file)
    }

    /// Full path of the player directory.
    pub fn directory_path(&self) -> PathBuf {
        self.data_dir.join(&self.directory_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            playtime_file: default_playtime_file(),
            ranks_file: default_ranks_file(),
            exclusions_file: default_exclusions_file(),
            directory_file: default_directory_file(),
        }
    }
}

/// Accrual and promotion settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromotionConfig {
    /// Seconds between accrual and flush passes.
    #[serde(default = "default_save_interval_seconds")]
    pub save_interval_seconds: u64,

    /// Whether members of excluded groups are skipped.
    #[serde(default = "default_true")]
    pub exclusions_enabled: bool,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            save_interval_seconds: default_save_interval_seconds(),
            exclusions_enabled: true,
        }
    }
}

/// Permission system settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PermissionsConfig {
    /// Command issued to move a player into a rank. `{player}` and `{rank}`
    /// are substituted.
    #[serde(default = "default_command_template")]
    pub command_template: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            command_template: default_command_template(),
        }
    }
}

/// Console host settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Milliseconds between host ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Minimum permission level for operator commands.
    #[serde(default = "default_operator_level")]
    pub operator_level: u8,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            operator_level: default_operator_level(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("config/TimedRankup")
}

fn default_playtime_file() -> String {
    "playtime.txt".to_owned()
}

fn default_ranks_file() -> String {
    "timedrankup_ranks.json".to_owned()
}

fn default_exclusions_file() -> String {
    "exclusions.json".to_owned()
}

fn default_directory_file() -> String {
    "usercache.json".to_owned()
}

const fn default_save_interval_seconds() -> u64 {
    15
}

const fn default_true() -> bool {
    true
}

fn default_command_template() -> String {
    "lp user {player} parent set {rank}".to_owned()
}

const fn default_tick_interval_ms() -> u64 {
    50
}

const fn default_operator_level() -> u8 {
    2
}

// ---------------------------------------------------------------------------
// Rank and exclusion documents
// ---------------------------------------------------------------------------

/// On-disk shape of the rank ladder document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RanksDocument {
    #[serde(default)]
    ranks: Option<Vec<RankDefinition>>,
}

/// On-disk shape of the exclusion document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExclusionsDocument {
    #[serde(default)]
    excluded_groups: Option<Vec<String>>,
}

/// Load the rank ladder from `path`.
///
/// A missing file is generated from [`RankLadder::defaults`]. A file that
/// cannot be read or parsed is logged and the defaults are used in memory.
pub fn load_rank_ladder(path: &Path) -> RankLadder {
    if !path.exists() {
        let ladder = RankLadder::defaults();
        match save_rank_ladder(path, &ladder) {
            Ok(()) => info!(path = %path.display(), "Default rank configuration generated"),
            Err(e) => error!(error = %e, "Failed to generate default rank configuration"),
        }
        return ladder;
    }

    match read_json::<RanksDocument>(path) {
        Ok(doc) => {
            let ladder = RankLadder::from_definitions(doc.ranks.unwrap_or_default());
            info!(path = %path.display(), ranks = ladder.len(), "Rank configuration loaded");
            ladder
        }
        Err(e) => {
            error!(error = %e, "Failed to read rank configuration, using defaults");
            RankLadder::defaults()
        }
    }
}

/// Write the rank ladder to `path`, replacing the previous document.
///
/// # Errors
///
/// Returns [`ConfigError::Json`] if serialization fails or
/// [`ConfigError::Io`] if the file cannot be written.
pub fn save_rank_ladder(path: &Path, ladder: &RankLadder) -> Result<(), ConfigError> {
    let doc = RanksDocument {
        ranks: Some(ladder.as_slice().to_vec()),
    };
    write_json(path, &doc)
}

/// Load the exclusion set from `path`.
///
/// A missing file is generated from [`ExclusionSet::defaults`]. A file
/// that cannot be read or parsed is logged and no groups are excluded.
pub fn load_exclusions(path: &Path) -> ExclusionSet {
    if !path.exists() {
        let exclusions = ExclusionSet::defaults();
        match save_exclusions(path, &exclusions) {
            Ok(()) => {
                info!(path = %path.display(), "Default exclusion configuration generated");
            }
            Err(e) => error!(error = %e, "Failed to generate default exclusion configuration"),
        }
        return exclusions;
    }

    match read_json::<ExclusionsDocument>(path) {
        Ok(doc) => {
            let exclusions = ExclusionSet::from_names(doc.excluded_groups.unwrap_or_default());
            info!(
                path = %path.display(),
                groups = exclusions.names().len(),
                "Exclusion configuration loaded"
            );
            exclusions
        }
        Err(e) => {
            warn!(error = %e, "Failed to read exclusion configuration, no groups excluded");
            ExclusionSet::new()
        }
    }
}

/// Write the exclusion set to `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Json`] if serialization fails or
/// [`ConfigError::Io`] if the file cannot be written.
pub fn save_exclusions(path: &Path, exclusions: &ExclusionSet) -> Result<(), ConfigError> {
    let doc = ExclusionsDocument {
        excluded_groups: Some(exclusions.names().to_vec()),
    };
    write_json(path, &doc)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');
    persist::write_atomic(path, json.as_bytes()).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
