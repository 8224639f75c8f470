//! Console host events and the online roster.
//!
//! Each stdin line is one host event:
//!
//! ```text
//! join <uuid> <name> [group,...] [level]
//! leave <name>
//! as <name> <command...>
//! online
//! <command...>
//! ```
//!
//! Anything that is not one of the host keywords is run as a command from
//! the console sender.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rankup_core::commands::{self, Command, CommandSender};
use rankup_core::permissions::{CommandExecutor, CommandPermissions};
use rankup_core::tick::{self, RankupState, TickSummary};
use rankup_types::{OnlinePlayer, ParseIdError, PlayerId};
use tracing::info;

const JOIN_USAGE: &str = "join <uuid> <name> [group,...] [level]";
const LEAVE_USAGE: &str = "leave <name>";
const AS_USAGE: &str = "as <name> <command...>";

/// Errors in a host event line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    /// Wrong arguments for a host keyword.
    #[error("Usage: {usage}")]
    Usage {
        /// The correct usage.
        usage: &'static str,
    },

    /// The player id is not a UUID.
    #[error("{source}")]
    InvalidPlayerId {
        /// The parse failure.
        #[from]
        source: ParseIdError,
    },

    /// No online player by that name.
    #[error("Player is not online: {name}")]
    NotOnline {
        /// The name looked up.
        name: String,
    },
}

/// One line of host input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A player came online.
    Join {
        /// The player.
        player: OnlinePlayer,
        /// The player's permission groups.
        groups: Vec<String>,
        /// The player's permission level.
        permission_level: u8,
    },
    /// A player went offline.
    Leave {
        /// Player name.
        name: String,
    },
    /// A player ran a command.
    As {
        /// Player name.
        name: String,
        /// The command line.
        command: String,
    },
    /// List online players.
    Online,
    /// The console ran a command.
    Console {
        /// The command line.
        command: String,
    },
}

impl HostEvent {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        if keyword.is_empty() {
            return Ok(None);
        }
        let rest = rest.trim();

        let event = match keyword.to_ascii_lowercase().as_str() {
            "join" => parse_join(rest)?,
            "leave" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                [name] => Self::Leave {
                    name: (*name).to_owned(),
                },
                _ => return Err(ConsoleError::Usage { usage: LEAVE_USAGE }),
            },
            "as" => match rest.split_once(char::is_whitespace) {
                Some((name, command)) if !command.trim().is_empty() => Self::As {
                    name: name.to_owned(),
                    command: command.trim().to_owned(),
                },
                _ => return Err(ConsoleError::Usage { usage: AS_USAGE }),
            },
            "online" if rest.is_empty() => Self::Online,
            _ => Self::Console {
                command: line.to_owned(),
            },
        };
        Ok(Some(event))
    }
}

fn parse_join(rest: &str) -> Result<HostEvent, ConsoleError> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    let (id, name, groups, level) = match args.as_slice() {
        [id, name] => (*id, *name, None, None),
        [id, name, last] => match last.parse::<u8>() {
            Ok(level) => (*id, *name, None, Some(level)),
            Err(_) => (*id, *name, Some(*last), None),
        },
        [id, name, groups, level] => {
            let level = level
                .parse::<u8>()
                .map_err(|_err| ConsoleError::Usage { usage: JOIN_USAGE })?;
            (*id, *name, Some(*groups), Some(level))
        }
        _ => return Err(ConsoleError::Usage { usage: JOIN_USAGE }),
    };

    let id: PlayerId = id.parse()?;
    let groups = groups
        .map(|groups| {
            groups
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Ok(HostEvent::Join {
        player: OnlinePlayer::new(id, name),
        groups,
        permission_level: level.unwrap_or(0),
    })
}

/// Players currently online, in join order.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<OnlinePlayer>,
    levels: BTreeMap<PlayerId, u8>,
}

impl Roster {
    /// Create an empty roster.
    pub const fn new() -> Self {
        Self {
            players: Vec::new(),
            levels: BTreeMap::new(),
        }
    }

    /// Mark `player` online. A player already online is replaced.
    pub fn join(&mut self, player: OnlinePlayer, permission_level: u8) {
        self.players.retain(|p| p.id != player.id);
        self.levels.insert(player.id, permission_level);
        self.players.push(player);
    }

    /// Mark the player named `name` offline.
    pub fn leave(&mut self, name: &str) -> Option<OnlinePlayer> {
        let index = self
            .players
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))?;
        let player = self.players.remove(index);
        self.levels.remove(&player.id);
        Some(player)
    }

    /// The online player named `name` and their permission level.
    pub fn find(&self, name: &str) -> Option<(&OnlinePlayer, u8)> {
        let player = self
            .players
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))?;
        let level = self.levels.get(&player.id).copied().unwrap_or(0);
        Some((player, level))
    }

    /// Everyone online.
    pub fn players(&self) -> &[OnlinePlayer] {
        &self.players
    }
}

/// Everything the console host drives.
#[derive(Debug)]
pub struct Host<E> {
    /// Timed Rankup state.
    pub state: RankupState,
    /// Permission backend issuing promotion commands.
    pub backend: CommandPermissions<E>,
    /// Players online.
    pub roster: Roster,
}

impl<E: CommandExecutor> Host<E> {
    /// Create a host with nobody online.
    pub fn new(state: RankupState, backend: CommandPermissions<E>) -> Self {
        let mut host = Self {
            state,
            backend,
            roster: Roster::new(),
        };
        host.sync_rank_names();
        host
    }

    /// Tell the backend which groups are ranks after the ladder changes.
    fn sync_rank_names(&mut self) {
        self.backend
            .set_rank_names(self.state.ladder.iter().map(|rank| rank.name.as_str()));
    }

    /// Run one host tick at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TickSummary> {
        tick::run_tick(
            &mut self.state,
            now,
            self.roster.players(),
            &mut self.backend,
        )
    }

    /// Flush everything before exit.
    pub fn shutdown(&mut self) {
        tick::shutdown(&mut self.state);
    }

    /// Handle one input line, returning the feedback for the sender.
    pub fn handle_line(&mut self, line: &str) -> Vec<String> {
        match HostEvent::parse(line) {
            Ok(Some(event)) => self.handle_event(event),
            Ok(None) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }

    fn handle_event(&mut self, event: HostEvent) -> Vec<String> {
        match event {
            HostEvent::Join {
                player,
                groups,
                permission_level,
            } => {
                info!(player = %player.id, name = %player.name, ?groups, "Player joined");
                let line = format!("{} joined", player.name);
                self.backend.set_groups(player.id, groups);
                self.state.directory.observe(&player);
                self.roster.join(player, permission_level);
                vec![line]
            }
            HostEvent::Leave { name } => match self.roster.leave(&name) {
                Some(player) => {
                    info!(player = %player.id, name = %player.name, "Player left");
                    vec![format!("{} left", player.name)]
                }
                None => vec![ConsoleError::NotOnline { name }.to_string()],
            },
            HostEvent::As { name, command } => match self.roster.find(&name) {
                Some((player, permission_level)) => {
                    let sender = CommandSender::Player {
                        player: player.clone(),
                        permission_level,
                    };
                    self.run_command(&sender, &command)
                }
                None => vec![ConsoleError::NotOnline { name }.to_string()],
            },
            HostEvent::Online => {
                let names: Vec<&str> = self
                    .roster
                    .players()
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect();
                vec![format!("Online ({}): {}", names.len(), names.join(", "))]
            }
            HostEvent::Console { command } => self.run_command(&CommandSender::Console, &command),
        }
    }

    fn run_command(&mut self, sender: &CommandSender, line: &str) -> Vec<String> {
        let result = Command::parse(line).and_then(|command| {
            commands::execute(
                &mut self.state,
                sender,
                command,
                self.roster.players(),
                &mut self.backend,
            )
        });
        self.sync_rank_names();
        match result {
            Ok(reply) => reply.lines,
            Err(e) => vec![e.to_string()],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use rankup_core::config::RankupConfig;
    use rankup_core::permissions::PermissionBackend;

    use super::*;
    use crate::executor::LineExecutor;

    const STEVE: &str = "0190a5c4-7d3e-7000-8000-000000000001";

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .unwrap()
            .checked_add_signed(TimeDelta::seconds(seconds))
            .unwrap()
    }

    fn host_in(dir: &tempfile::TempDir) -> Host<LineExecutor<Vec<u8>>> {
        let mut config = RankupConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let state = RankupState::load(&config).unwrap();
        let backend = CommandPermissions::new(
            LineExecutor::new(Vec::new()),
            config.permissions.command_template,
        );
        Host::new(state, backend)
    }

    #[test]
    fn parse_join_variants() {
        let event = HostEvent::parse(&format!("join {STEVE} Steve Newbie,Members 4")).unwrap();
        assert_eq!(
            event,
            Some(HostEvent::Join {
                player: OnlinePlayer::new(STEVE.parse().unwrap(), "Steve"),
                groups: vec!["Newbie".to_owned(), "Members".to_owned()],
                permission_level: 4,
            })
        );

        let event = HostEvent::parse(&format!("join {STEVE} Steve 2")).unwrap().unwrap();
        assert!(matches!(
            event,
            HostEvent::Join {
                permission_level: 2,
                ..
            }
        ));
    }

    #[test]
    fn parse_rejects_bad_join() {
        assert!(matches!(
            HostEvent::parse("join not-a-uuid Steve"),
            Err(ConsoleError::InvalidPlayerId { .. })
        ));
        assert_eq!(
            HostEvent::parse("join"),
            Err(ConsoleError::Usage { usage: JOIN_USAGE })
        );
    }

    #[test]
    fn other_lines_are_console_commands() {
        assert_eq!(HostEvent::parse("   ").unwrap(), None);
        assert_eq!(
            HostEvent::parse("/timedrankup listranks").unwrap(),
            Some(HostEvent::Console {
                command: "/timedrankup listranks".to_owned()
            })
        );
        assert_eq!(HostEvent::parse("online").unwrap(), Some(HostEvent::Online));
    }

    #[test]
    fn roster_join_leave() {
        let mut roster = Roster::new();
        let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
        roster.join(steve.clone(), 0);
        roster.join(steve.clone(), 3);
        assert_eq!(roster.players().len(), 1);
        assert_eq!(roster.find("steve").map(|(_, level)| level), Some(3));
        assert_eq!(roster.leave("STEVE"), Some(steve));
        assert!(roster.players().is_empty());
    }

    #[test]
    fn joined_player_is_promoted_through_executor() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host_in(&dir);
        host.handle_line(&format!("join {STEVE} Steve Newbie"));
        let id: PlayerId = STEVE.parse().unwrap();
        host.state.store.tick([id], 10_790);

        host.tick(at(0));
        let summary = host.tick(at(15)).unwrap();

        assert_eq!(summary.promoted_count(), 1);
        assert_eq!(
            String::from_utf8(host.backend.executor().get_ref().clone()).unwrap(),
            "lp user Steve parent set Regular\n"
        );
    }

    #[test]
    fn executor_stream_holds_only_permission_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host_in(&dir);
        host.handle_line(&format!("join {STEVE} Steve Newbie"));
        let id: PlayerId = STEVE.parse().unwrap();
        host.state.store.tick([id], 10_800);

        let replies = host.handle_line("/timedrankup forceupgrade");

        assert_eq!(
            replies,
            ["Forced rank upgrade process executed for all online players."]
        );
        assert_eq!(
            String::from_utf8(host.backend.executor().get_ref().clone()).unwrap(),
            "lp user Steve parent set Regular\n"
        );
    }

    #[test]
    fn promotion_keeps_non_rank_groups() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host_in(&dir);
        host.handle_line(&format!("join {STEVE} Steve vip,Regular"));
        let id: PlayerId = STEVE.parse().unwrap();
        host.state.store.tick([id], 21_590);

        host.tick(at(0));
        host.tick(at(15)).unwrap();

        let steve = OnlinePlayer::new(id, "Steve");
        assert_eq!(host.backend.groups(&steve).unwrap(), ["Veteran", "vip"]);
    }

    #[test]
    fn player_commands_use_player_permission_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host_in(&dir);
        host.handle_line(&format!("join {STEVE} Steve"));

        assert_eq!(
            host.handle_line("as Steve /timedrankup listranks"),
            ["You do not have permission to use this command."]
        );
        assert_eq!(
            host.handle_line("as Steve /playtime"),
            ["Your total playtime: 0 days, 0 hours, 0 minutes, 0 seconds"]
        );
        assert_eq!(
            host.handle_line("as Alex /playtime"),
            ["Player is not online: Alex"]
        );
    }

    #[test]
    fn online_lists_players() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host_in(&dir);
        host.handle_line(&format!("join {STEVE} Steve"));
        assert_eq!(host.handle_line("online"), ["Online (1): Steve"]);
        assert_eq!(host.handle_line("leave steve"), ["Steve left"]);
        assert_eq!(host.handle_line("online"), ["Online (0): "]);
    }
}
