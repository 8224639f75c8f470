//! Playtime tracking and timed rank promotion.
//!
//! This crate owns the state behind Timed Rankup: how long every player
//! has been online, which ranks exist, and which promotions have already
//! been issued. The host server drives it by calling [`tick::run_tick`]
//! from its own tick callback and by forwarding player commands to
//! [`commands::execute`].
//!
//! # Modules
//!
//! - [`config`] -- Settings (`rankup-config.yaml`) plus the rank and
//!   exclusion documents, with generated defaults.
//! - [`directory`] -- Name to identity lookup for players seen online.
//! - [`ledger`] -- [`UpgradeLedger`]: promotions already issued.
//! - [`permissions`] -- [`PermissionBackend`] trait, a command-driven
//!   backend, and an in-memory double.
//! - [`playtime`] -- [`PlaytimeStore`]: accumulated seconds per player
//!   and the flat-file persistence behind it.
//! - [`promoter`] -- [`RankPromoter`]: threshold crossing detection.
//! - [`ranks`] -- [`RankLadder`] and [`ExclusionSet`].
//! - [`schedule`] -- [`SaveSchedule`]: wall-clock gate for accrual and flush.
//! - [`tick`] -- [`RankupState`] and the tick cycle.
//! - [`commands`] -- Operator and player command surface.
//!
//! [`UpgradeLedger`]: ledger::UpgradeLedger
//! [`PermissionBackend`]: permissions::PermissionBackend
//! [`PlaytimeStore`]: playtime::PlaytimeStore
//! [`RankPromoter`]: promoter::RankPromoter
//! [`RankLadder`]: ranks::RankLadder
//! [`ExclusionSet`]: ranks::ExclusionSet
//! [`SaveSchedule`]: schedule::SaveSchedule
//! [`RankupState`]: tick::RankupState

pub mod commands;
pub mod config;
pub mod directory;
pub mod ledger;
mod persist;
pub mod permissions;
pub mod playtime;
pub mod promoter;
pub mod ranks;
pub mod schedule;
pub mod tick;
