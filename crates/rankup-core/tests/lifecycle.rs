//! End-to-end tests of the accrue, promote, and persist cycle.
//!
//! Each test works in its own temporary data directory and drives
//! `run_tick` with explicit timestamps, so no test depends on the wall
//! clock.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rankup_core::commands::{self, Command, CommandError, CommandSender};
use rankup_core::config::RankupConfig;
use rankup_core::permissions::MemoryPermissions;
use rankup_core::promoter::PromotionOutcome;
use rankup_core::tick::{self, RankupState};
use rankup_types::{OnlinePlayer, PlayerId};

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .unwrap()
        .checked_add_signed(TimeDelta::seconds(seconds))
        .unwrap()
}

fn config_in(dir: &tempfile::TempDir) -> RankupConfig {
    let mut config = RankupConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config
}

/// Advance `seconds` of play in 15 second save intervals, starting at
/// `start`. Returns the instant reached.
fn play(
    state: &mut RankupState,
    backend: &mut MemoryPermissions,
    online: &[OnlinePlayer],
    start: i64,
    seconds: i64,
) -> i64 {
    let mut now = start;
    tick::run_tick(state, at(now), online, backend);
    while now < start + seconds {
        now += 15;
        tick::run_tick(state, at(now), online, backend);
    }
    now
}

#[test]
fn first_start_generates_default_documents() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let state = RankupState::load(&config).unwrap();

    assert_eq!(state.ladder.len(), 3);
    assert!(config.storage.ranks_path().exists());
    assert!(config.storage.exclusions_path().exists());
    assert!(state.store.is_empty());
}

#[test]
fn newbie_climbs_the_default_ladder() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = RankupState::load(&config_in(&dir)).unwrap();
    let mut backend = MemoryPermissions::new();
    let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
    backend.set_groups(steve.id, ["Newbie"]);
    let online = [steve.clone()];

    let now = play(&mut state, &mut backend, &online, 0, 10_785);
    assert_eq!(state.store.get(steve.id), 10_785);
    assert!(backend.issued_to(steve.id).is_empty());

    let summary = tick::run_tick(&mut state, at(now + 15), &online, &mut backend).unwrap();
    assert_eq!(state.store.get(steve.id), 10_800);
    assert_eq!(
        summary.promotions[0].outcome,
        PromotionOutcome::Promoted {
            from: "Newbie".to_owned(),
            to: "Regular".to_owned()
        }
    );

    let now = play(&mut state, &mut backend, &online, now + 15, 10_800);
    assert!(state.store.get(steve.id) >= 21_600);
    assert_eq!(backend.issued_to(steve.id), ["Regular", "Veteran"]);

    let summary = tick::run_tick(&mut state, at(now + 15), &online, &mut backend).unwrap();
    assert_eq!(
        summary.promotions[0].outcome,
        PromotionOutcome::AtMaxRank {
            rank: "Veteran".to_owned()
        }
    );
}

#[test]
fn player_without_group_is_promoted_once_at_regular_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = RankupState::load(&config_in(&dir)).unwrap();
    let mut backend = MemoryPermissions::new();
    let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
    let online = [steve.clone()];

    tick::run_tick(&mut state, at(0), &online, &mut backend);
    let summary = tick::run_tick(&mut state, at(15), &online, &mut backend).unwrap();
    assert_eq!(state.store.get(steve.id), 15);
    assert_eq!(summary.promotions[0].outcome, PromotionOutcome::NoCurrentRank);

    let now = play(&mut state, &mut backend, &online, 15, 3_585);
    assert_eq!(state.store.get(steve.id), 3_600);
    let summary = tick::run_tick(&mut state, at(now + 15), &online, &mut backend).unwrap();
    assert_eq!(
        summary.promotions[0].outcome,
        PromotionOutcome::NoEligibleRank {
            current: "Newbie".to_owned()
        }
    );

    let now = play(&mut state, &mut backend, &online, now + 15, 7_185);
    assert_eq!(state.store.get(steve.id), 10_800);
    assert_eq!(backend.issued_to(steve.id), ["Regular"]);

    let summary = tick::run_tick(&mut state, at(now + 15), &online, &mut backend).unwrap();
    assert_eq!(
        summary.promotions[0].outcome,
        PromotionOutcome::NoEligibleRank {
            current: "Regular".to_owned()
        }
    );
    assert_eq!(backend.issued_to(steve.id), ["Regular"]);
}

#[test]
fn excluded_players_accrue_but_are_never_promoted() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = RankupState::load(&config_in(&dir)).unwrap();
    let mut backend = MemoryPermissions::new();
    let admin = OnlinePlayer::new(PlayerId::new(), "Admin");
    backend.set_groups(admin.id, ["Newbie", "admins"]);
    state.store.tick([admin.id], 50_000);

    play(&mut state, &mut backend, &[admin.clone()], 0, 30);

    assert_eq!(state.store.get(admin.id), 50_030);
    assert!(backend.issued().is_empty());
}

#[test]
fn playtime_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
    let alex = OnlinePlayer::new(PlayerId::new(), "Alex");

    {
        let mut state = RankupState::load(&config).unwrap();
        let mut backend = MemoryPermissions::new();
        play(&mut state, &mut backend, &[steve.clone(), alex.clone()], 0, 45);
        play(&mut state, &mut backend, &[steve.clone()], 45, 15);
        tick::shutdown(&mut state);
    }

    let state = RankupState::load(&config).unwrap();
    assert_eq!(state.store.get(steve.id), 60);
    assert_eq!(state.store.get(alex.id), 45);
    assert_eq!(state.directory.lookup("alex"), Some(alex.id));
}

#[test]
fn ladder_edits_are_visible_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let mut backend = MemoryPermissions::new();

    {
        let mut state = RankupState::load(&config).unwrap();
        for line in [
            "/timedrankup addrank Elder 86400",
            "/timedrankup updaterank Newbie Rookie 1800",
            "/timedrankup removerank Veteran",
        ] {
            let command = Command::parse(line).unwrap();
            commands::execute(&mut state, &CommandSender::Console, command, &[], &mut backend)
                .unwrap();
        }
    }

    let state = RankupState::load(&config).unwrap();
    let names: Vec<&str> = state.ladder.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Rookie", "Regular", "Elder"]);
}

#[test]
fn corrupt_rank_document_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    std::fs::write(config.storage.ranks_path(), "{ not json").unwrap();

    let state = RankupState::load(&config).unwrap();

    assert_eq!(state.ladder.len(), 3);
    assert_eq!(
        std::fs::read_to_string(config.storage.ranks_path()).unwrap(),
        "{ not json"
    );
}

#[test]
fn playtime_query_for_unknown_player() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = RankupState::load(&config_in(&dir)).unwrap();
    let mut backend = MemoryPermissions::new();
    let sender = CommandSender::Player {
        player: OnlinePlayer::new(PlayerId::new(), "Steve"),
        permission_level: 0,
    };

    let command = Command::parse("/playtime Herobrine").unwrap();
    let err = commands::execute(&mut state, &sender, command, &[], &mut backend).unwrap_err();

    assert_eq!(
        err,
        CommandError::PlayerNotFound {
            name: "Herobrine".to_owned()
        }
    );
    assert_eq!(err.to_string(), "Player not found: Herobrine");
}

#[test]
fn failed_promotion_is_retried_next_interval() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = RankupState::load(&config_in(&dir)).unwrap();
    let mut backend = MemoryPermissions::new();
    let steve = OnlinePlayer::new(PlayerId::new(), "Steve");
    backend.set_groups(steve.id, ["Newbie"]);
    state.store.tick([steve.id], 10_800);
    let online = [steve.clone()];

    backend.fail_promotions(true);
    let now = play(&mut state, &mut backend, &online, 0, 15);
    assert!(backend.issued().is_empty());
    assert_eq!(state.promoter.ledger().total_grants(), 0);

    backend.fail_promotions(false);
    play(&mut state, &mut backend, &online, now, 15);
    assert_eq!(backend.issued_to(steve.id), ["Regular"]);
}
