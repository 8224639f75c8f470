//! Operator and player commands.
//!
//! Operators (permission level at least [`RankupState::operator_level`],
//! or the console) manage the ladder and can force a promotion pass:
//!
//! ```text
//! /timedrankup addrank <name> <seconds>
//! /timedrankup updaterank <oldName> <newName> <seconds>
//! /timedrankup removerank <name>
//! /timedrankup listranks
//! /timedrankup forceupgrade
//! ```
//!
//! Everyone can check playtime:
//!
//! ```text
//! /playtime
//! /playtime <player>
//! ```
//!
//! Every failure is a [`CommandError`] whose `Display` text is the message
//! shown to the sender. Nothing here is fatal.

use rankup_types::{OnlinePlayer, RankDefinition};
use tracing::info;

use crate::permissions::PermissionBackend;
use crate::ranks::LadderError;
use crate::tick::RankupState;

const ADDRANK_USAGE: &str = "/timedrankup addrank <name> <playtime>";
const UPDATERANK_USAGE: &str = "/timedrankup updaterank <oldName> <newName> <playtime>";
const REMOVERANK_USAGE: &str = "/timedrankup removerank <name>";
const TIMEDRANKUP_USAGE: &str =
    "/timedrankup <addrank|updaterank|removerank|listranks|forceupgrade>";
const PLAYTIME_USAGE: &str = "/playtime [player]";

/// Errors a command can fail with. The message is user-facing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The input is not a known command.
    #[error("Unknown command: {input}")]
    UnknownCommand {
        /// What was typed.
        input: String,
    },

    /// Wrong arguments for a known command.
    #[error("Usage: {usage}")]
    Usage {
        /// The correct usage.
        usage: &'static str,
    },

    /// A playtime argument is not a non-negative whole number of seconds.
    #[error("Invalid playtime: {input} (expected whole seconds)")]
    InvalidNumber {
        /// The rejected argument.
        input: String,
    },

    /// The sender may not run operator commands.
    #[error("You do not have permission to use this command.")]
    InsufficientPermission,

    /// The command needs a player sender.
    #[error("This command can only be executed by players.")]
    PlayersOnly,

    /// No rank by that name.
    #[error("Rank not found: {name}")]
    RankNotFound {
        /// The name looked up.
        name: String,
    },

    /// A rank by that name already exists.
    #[error("Rank already exists: {name}")]
    DuplicateRank {
        /// The conflicting name.
        name: String,
    },

    /// The rank name is unusable.
    #[error("Invalid rank name: {name:?}")]
    InvalidRankName {
        /// The rejected name.
        name: String,
    },

    /// No known player by that name.
    #[error("Player not found: {name}")]
    PlayerNotFound {
        /// The name looked up.
        name: String,
    },
}

impl From<LadderError> for CommandError {
    fn from(e: LadderError) -> Self {
        match e {
            LadderError::DuplicateRank { name } => Self::DuplicateRank { name },
            LadderError::RankNotFound { name } => Self::RankNotFound { name },
            LadderError::InvalidName { name } => Self::InvalidRankName { name },
        }
    }
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a rank to the ladder.
    AddRank {
        /// New rank name.
        name: String,
        /// Required playtime in seconds.
        threshold: u64,
    },
    /// Rename and re-threshold a rank.
    UpdateRank {
        /// Current rank name.
        old_name: String,
        /// Replacement name.
        new_name: String,
        /// Replacement threshold in seconds.
        threshold: u64,
    },
    /// Remove a rank.
    RemoveRank {
        /// Rank name.
        name: String,
    },
    /// List the ladder.
    ListRanks,
    /// Run a promotion pass for everyone online now.
    ForceUpgrade,
    /// The sender's own playtime.
    OwnPlaytime,
    /// Another player's playtime.
    PlayerPlaytime {
        /// Player name.
        player: String,
    },
}

impl Command {
    /// Parse a command line. A leading `/` is optional.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownCommand`], [`CommandError::Usage`],
    /// or [`CommandError::InvalidNumber`] for malformed input.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let mut words = line.split_whitespace();
        let root = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        match root.as_str() {
            "timedrankup" => parse_timedrankup(&args),
            "playtime" => match args.as_slice() {
                [] => Ok(Self::OwnPlaytime),
                [player] => Ok(Self::PlayerPlaytime {
                    player: (*player).to_owned(),
                }),
                _ => Err(CommandError::Usage {
                    usage: PLAYTIME_USAGE,
                }),
            },
            _ => Err(CommandError::UnknownCommand {
                input: line.to_owned(),
            }),
        }
    }

    /// Whether only operators may run this command.
    pub const fn requires_operator(&self) -> bool {
        !matches!(self, Self::OwnPlaytime | Self::PlayerPlaytime { .. })
    }
}

fn parse_timedrankup(args: &[&str]) -> Result<Command, CommandError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(CommandError::Usage {
            usage: TIMEDRANKUP_USAGE,
        });
    };

    match (sub.to_ascii_lowercase().as_str(), rest) {
        ("addrank", [name, threshold]) => Ok(Command::AddRank {
            name: (*name).to_owned(),
            threshold: parse_seconds(threshold)?,
        }),
        ("addrank", _) => Err(CommandError::Usage {
            usage: ADDRANK_USAGE,
        }),
        ("updaterank", [old_name, new_name, threshold]) => Ok(Command::UpdateRank {
            old_name: (*old_name).to_owned(),
            new_name: (*new_name).to_owned(),
            threshold: parse_seconds(threshold)?,
        }),
        ("updaterank", _) => Err(CommandError::Usage {
            usage: UPDATERANK_USAGE,
        }),
        ("removerank", [name]) => Ok(Command::RemoveRank {
            name: (*name).to_owned(),
        }),
        ("removerank", _) => Err(CommandError::Usage {
            usage: REMOVERANK_USAGE,
        }),
        ("listranks", []) => Ok(Command::ListRanks),
        ("forceupgrade", []) => Ok(Command::ForceUpgrade),
        _ => Err(CommandError::Usage {
            usage: TIMEDRANKUP_USAGE,
        }),
    }
}

fn parse_seconds(input: &str) -> Result<u64, CommandError> {
    input.parse().map_err(|_err| CommandError::InvalidNumber {
        input: input.to_owned(),
    })
}

/// Who issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSender {
    /// The server console; always an operator, never a player.
    Console,
    /// An online player.
    Player {
        /// The player.
        player: OnlinePlayer,
        /// The player's permission level on the host.
        permission_level: u8,
    },
}

impl CommandSender {
    const fn is_operator(&self, operator_level: u8) -> bool {
        match self {
            Self::Console => true,
            Self::Player {
                permission_level, ..
            } => *permission_level >= operator_level,
        }
    }
}

/// Feedback lines for the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReply {
    /// Messages, in display order.
    pub lines: Vec<String>,
}

impl CommandReply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
        }
    }
}

/// Run `command` for `sender`.
///
/// `online` and `backend` are only used by `forceupgrade`.
///
/// # Errors
///
/// Returns [`CommandError`] when the command cannot be carried out; its
/// message is meant for the sender.
pub fn execute(
    state: &mut RankupState,
    sender: &CommandSender,
    command: Command,
    online: &[OnlinePlayer],
    backend: &mut dyn PermissionBackend,
) -> Result<CommandReply, CommandError> {
    if command.requires_operator() && !sender.is_operator(state.operator_level) {
        return Err(CommandError::InsufficientPermission);
    }

    match command {
        Command::AddRank { name, threshold } => {
            state.ladder.add(RankDefinition::new(name.clone(), threshold))?;
            state.save_ladder();
            info!(rank = %name, threshold, "Rank added");
            Ok(CommandReply::line(format!(
                "Rank added: {name} with playtime threshold: {threshold} seconds"
            )))
        }
        Command::UpdateRank {
            old_name,
            new_name,
            threshold,
        } => {
            let previous = state.ladder.update(&old_name, &new_name, threshold)?;
            state.save_ladder();
            info!(from = %previous.name, to = %new_name, threshold, "Rank updated");
            Ok(CommandReply::line(format!(
                "Rank updated: {} renamed to {new_name} with new playtime threshold: {threshold} seconds",
                previous.name
            )))
        }
        Command::RemoveRank { name } => {
            let removed = state.ladder.remove(&name)?;
            state.save_ladder();
            info!(rank = %removed.name, "Rank removed");
            Ok(CommandReply::line(format!("Rank removed: {}", removed.name)))
        }
        Command::ListRanks => Ok(list_ranks(state)),
        Command::ForceUpgrade => {
            let promotions = state.promotion_pass(online, backend);
            let promoted = promotions.iter().filter(|p| p.outcome.is_promoted()).count();
            info!(players = promotions.len(), promoted, "Forced rank upgrade pass");
            Ok(CommandReply::line(
                "Forced rank upgrade process executed for all online players.",
            ))
        }
        Command::OwnPlaytime => match sender {
            CommandSender::Player { player, .. } => Ok(CommandReply::line(format!(
                "Your total playtime: {}",
                format_playtime(state.store.get(player.id))
            ))),
            CommandSender::Console => Err(CommandError::PlayersOnly),
        },
        Command::PlayerPlaytime { player } => {
            let id = state
                .directory
                .lookup(&player)
                .ok_or_else(|| CommandError::PlayerNotFound {
                    name: player.clone(),
                })?;
            Ok(CommandReply::line(format!(
                "{player}'s total playtime: {}",
                format_playtime(state.store.get(id))
            )))
        }
    }
}

fn list_ranks(state: &RankupState) -> CommandReply {
    if state.ladder.is_empty() {
        return CommandReply::line("No ranks configured.");
    }
    let mut lines = vec!["Ranks:".to_owned()];
    lines.extend(state.ladder.iter().map(|rank| {
        format!(
            "- {} - Playtime Threshold: {} seconds",
            rank.name, rank.playtime_threshold
        )
    }));
    CommandReply { lines }
}

/// Render seconds as `D days, H hours, M minutes, S seconds`.
pub fn format_playtime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{days} days, {hours} hours, {minutes} minutes, {seconds} seconds")
}
