//! The rank ladder and the exclusion set.
//!
//! A [`RankLadder`] is the ordered list of ranks players climb. The order
//! in which ranks are configured is the promotion order; the ladder never
//! re-sorts itself by threshold. Rank names are unique and every lookup
//! ignores ASCII case.
//!
//! An [`ExclusionSet`] lists permission groups whose members are never
//! promoted automatically (staff groups, usually).

use std::collections::BTreeSet;

use rankup_types::RankDefinition;
use tracing::warn;

/// Errors that can occur when editing the ladder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LadderError {
    /// A rank with this name already exists.
    #[error("rank already exists: {name}")]
    DuplicateRank {
        /// The conflicting name.
        name: String,
    },

    /// No rank with this name exists.
    #[error("rank not found: {name}")]
    RankNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// The name is empty or contains whitespace.
    #[error("invalid rank name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

/// Ordered sequence of ranks, lowest tier first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankLadder {
    ranks: Vec<RankDefinition>,
}

impl RankLadder {
    /// Create an empty ladder.
    pub const fn new() -> Self {
        Self { ranks: Vec::new() }
    }

    /// The ladder generated when no rank file exists yet.
    pub fn defaults() -> Self {
        Self {
            ranks: vec![
                RankDefinition::new("Newbie", 3600),
                RankDefinition::new("Regular", 10800),
                RankDefinition::new("Veteran", 21600),
            ],
        }
    }

    /// Build a ladder from loaded definitions, keeping configured order.
    ///
    /// Later entries whose name repeats an earlier one (ignoring case) are
    /// dropped with a warning, as are entries with unusable names.
    pub fn from_definitions(definitions: Vec<RankDefinition>) -> Self {
        let mut ladder = Self::new();
        for rank in definitions {
            if let Err(e) = ladder.add(rank) {
                warn!(error = %e, "Ignoring rank definition");
            }
        }
        ladder
    }

    /// Number of configured ranks.
    pub const fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether no ranks are configured.
    pub const fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Iterate over the ranks in promotion order.
    pub fn iter(&self) -> core::slice::Iter<'_, RankDefinition> {
        self.ranks.iter()
    }

    /// The ranks in promotion order.
    pub fn as_slice(&self) -> &[RankDefinition] {
        &self.ranks
    }

    /// Position of the rank named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.ranks.iter().position(|rank| rank.is_named(name))
    }

    /// The rank named `name`.
    pub fn find(&self, name: &str) -> Option<&RankDefinition> {
        self.ranks.iter().find(|rank| rank.is_named(name))
    }

    /// The rank with the highest threshold; the earliest one wins a tie.
    pub fn max_rank(&self) -> Option<&RankDefinition> {
        highest_threshold(self.ranks.iter())
    }

    /// The first rank, in configured order, that `playtime` seconds
    /// already satisfy.
    pub fn first_satisfied(&self, playtime: u64) -> Option<&RankDefinition> {
        self.ranks
            .iter()
            .find(|rank| rank.playtime_threshold <= playtime)
    }

    /// Append a rank at the end of the ladder.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError::DuplicateRank`] if the name is taken, or
    /// [`LadderError::InvalidName`] if it is empty or contains whitespace.
    pub fn add(&mut self, rank: RankDefinition) -> Result<(), LadderError> {
        validate_name(&rank.name)?;
        if self.find(&rank.name).is_some() {
            return Err(LadderError::DuplicateRank { name: rank.name });
        }
        self.ranks.push(rank);
        Ok(())
    }

    /// Rename and re-threshold the rank currently named `old_name`.
    ///
    /// The rank keeps its position. Returns the definition as it was
    /// before the update.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError::RankNotFound`] if `old_name` is unknown,
    /// [`LadderError::DuplicateRank`] if `new_name` belongs to a different
    /// rank, or [`LadderError::InvalidName`] for an unusable new name.
    pub fn update(
        &mut self,
        old_name: &str,
        new_name: &str,
        playtime_threshold: u64,
    ) -> Result<RankDefinition, LadderError> {
        validate_name(new_name)?;
        let index = self
            .position(old_name)
            .ok_or_else(|| LadderError::RankNotFound {
                name: old_name.to_owned(),
            })?;
        if let Some(other) = self.position(new_name)
            && other != index
        {
            return Err(LadderError::DuplicateRank {
                name: new_name.to_owned(),
            });
        }

        let rank = self
            .ranks
            .get_mut(index)
            .ok_or_else(|| LadderError::RankNotFound {
                name: old_name.to_owned(),
            })?;
        let previous = rank.clone();
        new_name.clone_into(&mut rank.name);
        rank.playtime_threshold = playtime_threshold;
        Ok(previous)
    }

    /// Remove the rank named `name`, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`LadderError::RankNotFound`] if no such rank exists; the
    /// ladder is left unchanged.
    pub fn remove(&mut self, name: &str) -> Result<RankDefinition, LadderError> {
        let index = self
            .position(name)
            .ok_or_else(|| LadderError::RankNotFound {
                name: name.to_owned(),
            })?;
        Ok(self.ranks.remove(index))
    }
}

impl<'a> IntoIterator for &'a RankLadder {
    type Item = &'a RankDefinition;
    type IntoIter = core::slice::Iter<'a, RankDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranks.iter()
    }
}

fn highest_threshold<'a>(
    ranks: impl Iterator<Item = &'a RankDefinition>,
) -> Option<&'a RankDefinition> {
    ranks.fold(None, |best: Option<&RankDefinition>, rank| match best {
        Some(current) if current.playtime_threshold >= rank.playtime_threshold => Some(current),
        _ => Some(rank),
    })
}

fn validate_name(name: &str) -> Result<(), LadderError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(LadderError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Permission groups exempt from automatic promotion.
///
/// Membership checks ignore ASCII case. The configured spelling is kept
/// for display and for writing the document back out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: Vec<String>,
    normalized: BTreeSet<String>,
}

impl ExclusionSet {
    /// Create an empty exclusion set.
    pub const fn new() -> Self {
        Self {
            names: Vec::new(),
            normalized: BTreeSet::new(),
        }
    }

    /// The exclusion set generated when no exclusion file exists yet.
    pub fn defaults() -> Self {
        Self::from_names(["Admins", "Moderators"])
    }

    /// Build a set from group names. Duplicates are collapsed.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for name in names {
            let name = name.into();
            if set.normalized.insert(name.to_ascii_lowercase()) {
                set.names.push(name);
            }
        }
        set
    }

    /// Whether `group` is excluded.
    pub fn contains(&self, group: &str) -> bool {
        self.normalized.contains(&group.to_ascii_lowercase())
    }

    /// Whether any of `groups` is excluded.
    pub fn contains_any(&self, groups: &[String]) -> bool {
        !self.normalized.is_empty() && groups.iter().any(|group| self.contains(group))
    }

    /// Whether no groups are excluded.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The excluded group names as configured.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}
