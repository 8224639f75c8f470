//! Plain data types shared across the workspace.

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

/// A named tier in the promotion ladder.
///
/// The threshold is the accumulated playtime, in seconds, a player needs
/// before this rank can be granted. Names are compared case-insensitively
/// everywhere they are looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDefinition {
    /// Rank name, also the permission group the player is moved into.
    pub name: String,

    /// Required accumulated playtime in seconds.
    #[serde(rename = "playtimeThreshold")]
    pub playtime_threshold: u64,
}

impl RankDefinition {
    /// Create a rank definition.
    pub fn new(name: impl Into<String>, playtime_threshold: u64) -> Self {
        Self {
            name: name.into(),
            playtime_threshold,
        }
    }

    /// Whether this rank's name matches `name`, ignoring ASCII case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A player currently connected to the host server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnlinePlayer {
    /// Stable identity.
    pub id: PlayerId,
    /// Current display name, used when talking to the permission system.
    pub name: String,
}

impl OnlinePlayer {
    /// Create an online player record.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rank_serializes_with_camel_case_threshold() {
        let rank = RankDefinition::new("Newbie", 3600);
        let json = serde_json::to_string(&rank).unwrap();
        assert_eq!(json, r#"{"name":"Newbie","playtimeThreshold":3600}"#);
    }

    #[test]
    fn rank_name_match_ignores_case() {
        let rank = RankDefinition::new("Veteran", 21600);
        assert!(rank.is_named("veteran"));
        assert!(rank.is_named("VETERAN"));
        assert!(!rank.is_named("Veterans"));
    }
}
