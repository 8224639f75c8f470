//! Permission backend trait and implementations.
//!
//! Rank promotion never touches group membership itself. The
//! [`PermissionBackend`] trait is the narrow seam to whatever permission
//! system the host runs: it answers "which groups is this player in" and
//! carries out "make this rank the player's primary group".
//!
//! Two implementations are provided:
//!
//! - [`CommandPermissions`] renders a console command from a template
//!   (by default `lp user {player} parent set {rank}`) and hands it to the
//!   host through a [`CommandExecutor`].
//! - [`MemoryPermissions`] keeps everything in memory and records every
//!   promotion, for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};

use rankup_types::{OnlinePlayer, PlayerId};

/// Errors reported by a permission backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// The permission system has no record of the player.
    #[error("user {name} not found in permission system")]
    UnknownPlayer {
        /// Name of the player.
        name: String,
    },

    /// The host rejected or failed to run the command.
    #[error("command {command:?} failed: {reason}")]
    CommandFailed {
        /// The command that was issued.
        command: String,
        /// Why it failed.
        reason: String,
    },

    /// The permission system is not reachable.
    #[error("permission system unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
}

/// Access to the external permission system.
pub trait PermissionBackend {
    /// The groups `player` belongs to, direct and inherited.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] if the lookup fails.
    fn groups(&self, player: &OnlinePlayer) -> Result<Vec<String>, PermissionError>;

    /// Make `rank` the primary group of `player`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] if the change was not applied.
    fn set_primary_group(&mut self, player: &OnlinePlayer, rank: &str)
    -> Result<(), PermissionError>;
}

/// The host's command execution interface.
pub trait CommandExecutor {
    /// Run `command` with console privileges.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::CommandFailed`] if the host rejects it.
    fn execute(&mut self, command: &str) -> Result<(), PermissionError>;
}

/// Backend that issues promotions as console commands.
///
/// The host seeds the group mirror when players join (see
/// [`set_groups`](Self::set_groups)). A successful promotion drops the
/// rank groups from the mirror and puts the new rank first; other groups
/// are kept. Which groups count as ranks is set with
/// [`set_rank_names`](Self::set_rank_names).
#[derive(Debug)]
pub struct CommandPermissions<E> {
    executor: E,
    template: String,
    groups: BTreeMap<PlayerId, Vec<String>>,
    rank_names: BTreeSet<String>,
}

impl<E: CommandExecutor> CommandPermissions<E> {
    /// Create a backend issuing commands rendered from `template`.
    pub fn new(executor: E, template: impl Into<String>) -> Self {
        Self {
            executor,
            template: template.into(),
            groups: BTreeMap::new(),
            rank_names: BTreeSet::new(),
        }
    }

    /// Render the promotion command for `player` and `rank`.
    pub fn render(&self, player: &OnlinePlayer, rank: &str) -> String {
        self.template
            .replace("{player}", &player.name)
            .replace("{rank}", rank)
    }

    /// Replace the mirrored groups of `player`.
    pub fn set_groups(&mut self, player: PlayerId, groups: Vec<String>) {
        self.groups.insert(player, groups);
    }

    /// Set the group names that are ranks, ignoring case.
    pub fn set_rank_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.rank_names = names
            .into_iter()
            .map(|name| name.as_ref().to_ascii_lowercase())
            .collect();
    }

    /// The executor commands are sent to.
    pub const fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: CommandExecutor> PermissionBackend for CommandPermissions<E> {
    fn groups(&self, player: &OnlinePlayer) -> Result<Vec<String>, PermissionError> {
        Ok(self.groups.get(&player.id).cloned().unwrap_or_default())
    }

    fn set_primary_group(
        &mut self,
        player: &OnlinePlayer,
        rank: &str,
    ) -> Result<(), PermissionError> {
        let command = self.render(player, rank);
        self.executor.execute(&command)?;

        let granted = rank.to_ascii_lowercase();
        let groups = self.groups.entry(player.id).or_default();
        groups.retain(|group| {
            let key = group.to_ascii_lowercase();
            key != granted && !self.rank_names.contains(&key)
        });
        groups.insert(0, rank.to_owned());
        Ok(())
    }
}

/// A promotion carried out by [`MemoryPermissions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedPromotion {
    /// The promoted player.
    pub player: PlayerId,
    /// The rank the player was moved into.
    pub rank: String,
}

/// In-memory permission backend.
///
/// Players without configured groups are treated as belonging to no
/// group. Lookups and promotions can be made to fail to exercise error
/// paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryPermissions {
    groups: BTreeMap<PlayerId, Vec<String>>,
    issued: Vec<IssuedPromotion>,
    fail_lookups: bool,
    fail_promotions: bool,
}

impl MemoryPermissions {
    /// Create an empty backend.
    pub const fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
            issued: Vec::new(),
            fail_lookups: false,
            fail_promotions: false,
        }
    }

    /// Set the groups of `player`.
    pub fn set_groups<I, S>(&mut self, player: PlayerId, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(player, groups.into_iter().map(Into::into).collect());
    }

    /// Make subsequent group lookups fail.
    pub const fn fail_lookups(&mut self, fail: bool) {
        self.fail_lookups = fail;
    }

    /// Make subsequent promotions fail.
    pub const fn fail_promotions(&mut self, fail: bool) {
        self.fail_promotions = fail;
    }

    /// Every promotion applied so far, in order.
    pub fn issued(&self) -> &[IssuedPromotion] {
        &self.issued
    }

    /// Promotions applied to `player`, in order.
    pub fn issued_to(&self, player: PlayerId) -> Vec<&str> {
        self.issued
            .iter()
            .filter(|p| p.player == player)
            .map(|p| p.rank.as_str())
            .collect()
    }
}

impl PermissionBackend for MemoryPermissions {
    fn groups(&self, player: &OnlinePlayer) -> Result<Vec<String>, PermissionError> {
        if self.fail_lookups {
            return Err(PermissionError::UnknownPlayer {
                name: player.name.clone(),
            });
        }
        Ok(self.groups.get(&player.id).cloned().unwrap_or_default())
    }

    fn set_primary_group(
        &mut self,
        player: &OnlinePlayer,
        rank: &str,
    ) -> Result<(), PermissionError> {
        if self.fail_promotions {
            return Err(PermissionError::CommandFailed {
                command: format!("set {} {rank}", player.name),
                reason: "rejected by test backend".to_owned(),
            });
        }
        self.groups.insert(player.id, vec![rank.to_owned()]);
        self.issued.push(IssuedPromotion {
            player: player.id,
            rank: rank.to_owned(),
        });
        Ok(())
    }
}
