use super::test_helpers::TestDatabase;
use crate::common::init_test_env;
use chrono::Utc;
use ranking_engine::{
    cache::InMemoryCacheStore,
    database::store::{RankingStore, UpsertOutcome},
    model::structures::{
        adjustment::{PlannedAdjustment, RatingDelta},
        group_ranking_config::EloSettings,
        match_outcome::MatchOutcome,
        ranking_mode::{RankingMode, SortField}
    },
    service::{GroupProvider, MatchProvider, RankingService, ServiceConfig, UserProvider},
    utils::test_utils::generate_elo_record
};
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;

const ELO: i16 = 0;
const POINTS: i16 = 1;

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_insert_if_absent_keeps_first_record() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db = test_db.db_client().await;
    let group_id = Uuid::new_v4();

    let first = generate_elo_record(group_id, 1200);
    let mut second = generate_elo_record(group_id, 1500);
    second.user_id = first.user_id;

    let stored_first = db.insert_if_absent(first.clone()).await.unwrap();
    let stored_second = db.insert_if_absent(second).await.unwrap();

    assert_eq!(stored_first.id, first.id);
    assert_eq!(stored_second.id, first.id);
    assert_eq!(stored_second.elo().unwrap().rating, 1200);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_upsert_is_version_checked() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db = test_db.db_client().await;

    let record = db.insert_if_absent(generate_elo_record(Uuid::new_v4(), 1200)).await.unwrap();
    let match_id = Uuid::new_v4();
    let adjustment = PlannedAdjustment {
        user_id: record.user_id,
        team_index: 0,
        outcome: MatchOutcome::Win,
        delta: RatingDelta::Elo {
            rating_before: 1200,
            expected_score: 0.5,
            delta: 16
        }
    };

    let mut updated = record.clone();
    updated.apply(&adjustment, match_id, &EloSettings::default(), Utc::now()).unwrap();

    let written = match db.upsert(&updated).await.unwrap() {
        UpsertOutcome::Written(written) => written,
        UpsertOutcome::Conflict => panic!("first write must succeed")
    };
    assert_eq!(written.version, record.version + 1);

    // Same base version again: someone else got there first
    assert_eq!(db.upsert(&updated).await.unwrap(), UpsertOutcome::Conflict);

    let stored = db.get(record.user_id, record.group_id).await.unwrap().unwrap();
    // Timestamps lose sub-microsecond precision in Postgres, so compare the state
    assert_eq!(stored.version, written.version);
    assert_eq!(stored.elo().unwrap().rating, 1216);
    assert_eq!(stored.elo().unwrap().history.len(), 1);
    assert_eq!(stored.stats.wins, 1);
    assert_eq!(stored.replay_history(1200), 1216);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_history_row_is_never_duplicated() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db = test_db.db_client().await;

    let record = db.insert_if_absent(generate_elo_record(Uuid::new_v4(), 1200)).await.unwrap();
    let adjustment = PlannedAdjustment {
        user_id: record.user_id,
        team_index: 0,
        outcome: MatchOutcome::Loss,
        delta: RatingDelta::Elo {
            rating_before: 1200,
            expected_score: 0.5,
            delta: -16
        }
    };
    let mut updated = record.clone();
    updated.apply(&adjustment, Uuid::new_v4(), &EloSettings::default(), Utc::now()).unwrap();
    let UpsertOutcome::Written(written) = db.upsert(&updated).await.unwrap() else {
        panic!("first write must succeed");
    };

    // Rewrite the same newest entry under the current version, e.g. a deactivation
    let mut deactivated = written.clone();
    deactivated.is_active = false;
    assert!(matches!(db.upsert(&deactivated).await.unwrap(), UpsertOutcome::Written(_)));

    let client = test_db.get_client().await.unwrap();
    let count: i64 = client
        .query_one("SELECT COUNT(*) FROM ranking_history WHERE ranking_id = $1", &[&record.id])
        .await
        .unwrap()
        .get(0);
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_listing_and_counting() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db = test_db.db_client().await;
    let group_id = Uuid::new_v4();

    for rating in [1500, 1400, 1400, 1300] {
        db.insert_if_absent(generate_elo_record(group_id, rating)).await.unwrap();
    }
    let mut inactive = generate_elo_record(group_id, 2000);
    inactive.is_active = false;
    db.insert_if_absent(inactive).await.unwrap();

    let (page, total) = db.list_by_group(group_id, SortField::Rating, 1, 3).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(page.iter().map(|r| r.sort_value()).collect::<Vec<_>>(), vec![1500, 1400, 1400]);

    let (page, _) = db.list_by_group(group_id, SortField::Rating, 2, 3).await.unwrap();
    assert_eq!(page.len(), 1);

    assert_eq!(db.count_with_better_value(group_id, SortField::Rating, 1400).await.unwrap(), 1);
    assert_eq!(db.count_with_better_value(group_id, SortField::Rating, 1300).await.unwrap(), 3);
    assert_eq!(db.modes_in_group(group_id).await.unwrap(), vec![RankingMode::Elo]);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_collaborator_providers() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db = test_db.db_client().await;

    let (a, b) = (test_db.seed_user("alice").await, test_db.seed_user("bob").await);
    let group_id = test_db.seed_group(POINTS).await;
    let match_id = test_db
        .seed_match(group_id, &[vec![(a, Some(4))], vec![(b, None)]], Some(0))
        .await;

    let config = db.get_group_ranking_config(group_id).await.unwrap().unwrap();
    assert_eq!(config.mode, RankingMode::Points);
    assert_eq!(config.points.kill_points, Some(3));
    assert_eq!(config.elo.initial_rating, 1200);

    let snapshot = db.get_match(match_id).await.unwrap().unwrap();
    assert_eq!(snapshot.teams.len(), 2);
    assert_eq!(snapshot.winner, Some(0));
    assert_eq!(snapshot.teams[0].players[0].user_id, a);
    assert_eq!(snapshot.teams[0].players[0].stats.unwrap().kills, Some(4));
    assert!(snapshot.teams[1].players[0].stats.is_none());
    assert!(snapshot.structural_problem().is_none());

    assert_eq!(db.completed_ranked_matches(group_id).await.unwrap(), vec![match_id]);

    let profiles = db.get_profiles(&[a, Uuid::new_v4()]).await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[&a].display_name.as_deref(), Some("ALICE"));

    assert!(db.get_match(Uuid::new_v4()).await.unwrap().is_none());
    assert!(db.get_group_ranking_config(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_apply_match_against_postgres() {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let db = Arc::new(test_db.db_client().await);

    let (a, b) = (test_db.seed_user("alice").await, test_db.seed_user("bob").await);
    let group_id = test_db.seed_group(ELO).await;
    let match_id = test_db
        .seed_match(group_id, &[vec![(a, None)], vec![(b, None)]], Some(0))
        .await;

    let service = RankingService::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
        Arc::new(InMemoryCacheStore::new()),
        ServiceConfig::default()
    );

    let applied = service.apply_match_result(match_id).await.unwrap();
    assert_eq!(applied.applied.len(), 2);

    let replay = service.apply_match_result(match_id).await.unwrap();
    assert!(replay.is_noop());

    let leaderboard = service.get_leaderboard(group_id, 1, 10).await.unwrap();
    assert_eq!(leaderboard.total, 2);
    assert_eq!(leaderboard.records[0].record.user_id, a);
    assert_eq!(leaderboard.records[0].record.sort_value(), 1216);
    assert_eq!(leaderboard.records[0].user.as_ref().unwrap().username, "alice");
    assert_eq!(leaderboard.records[1].record.sort_value(), 1184);
    assert_eq!(leaderboard.records[1].rank, 2);

    let summary = service.process_group(group_id).await.unwrap();
    assert_eq!(summary.matches_seen, 1);
    assert_eq!(summary.matches_applied, 0);
}
