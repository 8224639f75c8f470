//! Record of promotions already issued during this process lifetime.
//!
//! The ledger is what makes promotion idempotent: once a rank has been
//! granted to a player it is never requested again until restart. It is
//! deliberately not persisted. After a restart a promotion may be issued
//! again for a rank the player already holds, which the permission system
//! treats as a no-op.

use std::collections::{BTreeMap, BTreeSet};

use rankup_types::PlayerId;

/// Per-player set of rank names already granted.
///
/// Entries are created lazily, only ever grow, and are never pruned.
/// Rank names are stored lowercased so lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpgradeLedger {
    granted: BTreeMap<PlayerId, BTreeSet<String>>,
}

impl UpgradeLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            granted: BTreeMap::new(),
        }
    }

    /// Whether `rank` has already been granted to `player`.
    pub fn has_granted(&self, player: PlayerId, rank: &str) -> bool {
        self.granted
            .get(&player)
            .is_some_and(|ranks| ranks.contains(&rank.to_ascii_lowercase()))
    }

    /// Record that `rank` was granted to `player`.
    ///
    /// Returns `false` if it was already recorded.
    pub fn record(&mut self, player: PlayerId, rank: &str) -> bool {
        self.granted
            .entry(player)
            .or_default()
            .insert(rank.to_ascii_lowercase())
    }

    /// Ranks granted to `player`, lowercased, in name order.
    pub fn granted_to(&self, player: PlayerId) -> impl Iterator<Item = &str> {
        self.granted
            .get(&player)
            .into_iter()
            .flat_map(|ranks| ranks.iter().map(String::as_str))
    }

    /// Number of players with at least one recorded promotion.
    pub fn player_count(&self) -> usize {
        self.granted.len()
    }

    /// Total number of recorded promotions.
    pub fn total_grants(&self) -> usize {
        self.granted.values().map(BTreeSet::len).sum()
    }
}
