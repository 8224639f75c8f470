//! Threshold crossing detection and promotion.
//!
//! For each online player the [`RankPromoter`] decides whether a new rank
//! is due and, if so, asks the [`PermissionBackend`] to apply it. The
//! decision runs in five steps:
//!
//! 1. Players in an excluded group are skipped entirely.
//! 2. The current rank is the first of the player's groups that names a
//!    configured rank. Without one, it is the first rank in ladder order
//!    that the stored playtime already satisfies.
//! 3. A player at the highest-threshold rank is done.
//! 4. Without a current rank there is no starting point, so nothing happens.
//! 5. Scanning forward from the current rank, the first rank whose
//!    threshold is met and which the [`UpgradeLedger`] has not recorded is
//!    granted. At most one rank is granted per pass, even when the player
//!    crossed several thresholds at once.
//!
//! A failed promotion is logged and not recorded, so the next pass tries
//! again.
//!
//! Step 2's playtime fallback can disagree with the permission system for
//! players whose groups were changed by hand. It is kept as is.

use rankup_types::{OnlinePlayer, RankDefinition};
use tracing::{debug, info, warn};

use crate::ledger::UpgradeLedger;
use crate::permissions::{PermissionBackend, PermissionError};
use crate::ranks::{ExclusionSet, RankLadder};

/// What a promotion check decided for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionOutcome {
    /// The player is in an excluded group.
    Excluded,
    /// Neither a group nor playtime places the player on the ladder.
    NoCurrentRank,
    /// The player already holds the highest-threshold rank.
    AtMaxRank {
        /// The rank held.
        rank: String,
    },
    /// No later rank is both reached and not yet granted.
    NoEligibleRank {
        /// The player's current rank.
        current: String,
    },
    /// A promotion was applied and recorded.
    Promoted {
        /// The rank the player held before.
        from: String,
        /// The rank granted.
        to: String,
    },
    /// The permission system rejected the promotion; it will be retried.
    PromotionFailed {
        /// The rank that was attempted.
        rank: String,
        /// The backend error.
        error: PermissionError,
    },
    /// The player's groups could not be read; nothing was decided.
    LookupFailed {
        /// The backend error.
        error: PermissionError,
    },
}

impl PromotionOutcome {
    /// Whether a promotion was applied.
    pub const fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted { .. })
    }
}

/// Decides and applies promotions; owns the [`UpgradeLedger`].
#[derive(Debug, Clone, Default)]
pub struct RankPromoter {
    ledger: UpgradeLedger,
    exclusions_enabled: bool,
}

impl RankPromoter {
    /// Create a promoter. When `exclusions_enabled` is false the exclusion
    /// set is ignored.
    pub const fn new(exclusions_enabled: bool) -> Self {
        Self {
            ledger: UpgradeLedger::new(),
            exclusions_enabled,
        }
    }

    /// Whether exclusion groups are honored.
    pub const fn exclusions_enabled(&self) -> bool {
        self.exclusions_enabled
    }

    /// Promotions issued so far.
    pub const fn ledger(&self) -> &UpgradeLedger {
        &self.ledger
    }

    /// Run the promotion check for one player with `playtime` seconds.
    pub fn evaluate(
        &mut self,
        player: &OnlinePlayer,
        playtime: u64,
        ladder: &RankLadder,
        exclusions: &ExclusionSet,
        backend: &mut dyn PermissionBackend,
    ) -> PromotionOutcome {
        let groups = match backend.groups(player) {
            Ok(groups) => groups,
            Err(error) => {
                warn!(player = %player.id, name = %player.name, error = %error, "Group lookup failed");
                return PromotionOutcome::LookupFailed { error };
            }
        };

        if self.exclusions_enabled && exclusions.contains_any(&groups) {
            debug!(player = %player.id, name = %player.name, "Player excluded from promotion");
            return PromotionOutcome::Excluded;
        }

        let Some(current) = resolve_current_rank(ladder, &groups, playtime) else {
            return PromotionOutcome::NoCurrentRank;
        };

        if ladder
            .max_rank()
            .is_some_and(|max| max.is_named(&current.name))
        {
            return PromotionOutcome::AtMaxRank {
                rank: current.name.clone(),
            };
        }

        let Some(start) = ladder.position(&current.name) else {
            return PromotionOutcome::NoCurrentRank;
        };

        let next = ladder
            .iter()
            .skip(start.saturating_add(1))
            .find(|rank| {
                playtime >= rank.playtime_threshold
                    && !self.ledger.has_granted(player.id, &rank.name)
            });

        let Some(next) = next else {
            return PromotionOutcome::NoEligibleRank {
                current: current.name.clone(),
            };
        };

        match backend.set_primary_group(player, &next.name) {
            Ok(()) => {
                self.ledger.record(player.id, &next.name);
                info!(
                    player = %player.id,
                    name = %player.name,
                    from = %current.name,
                    rank = %next.name,
                    playtime,
                    "Player has been granted a new rank"
                );
                PromotionOutcome::Promoted {
                    from: current.name.clone(),
                    to: next.name.clone(),
                }
            }
            Err(error) => {
                warn!(
                    player = %player.id,
                    name = %player.name,
                    rank = %next.name,
                    error = %error,
                    "Failed to grant rank"
                );
                PromotionOutcome::PromotionFailed {
                    rank: next.name.clone(),
                    error,
                }
            }
        }
    }
}

/// Resolve the rank a player currently holds.
///
/// A group naming a configured rank wins over anything derived from
/// playtime; the first such group in `groups` order is used. Otherwise the
/// first rank in ladder order satisfied by `playtime` is returned, which
/// for a ladder listed lowest to highest is the entry tier.
pub fn resolve_current_rank<'a>(
    ladder: &'a RankLadder,
    groups: &[String],
    playtime: u64,
) -> Option<&'a RankDefinition> {
    groups
        .iter()
        .find_map(|group| ladder.find(group))
        .or_else(|| ladder.first_satisfied(playtime))
}
