//! Shared type definitions for Timed Rankup.
//!
//! This crate holds the identifiers and plain data types that flow between
//! the playtime store, the rank promoter, and the host binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for player identities
//! - [`structs`] -- Rank definitions and online player records

pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{ParseIdError, PlayerId};
pub use structs::{OnlinePlayer, RankDefinition};
