use super::harness::Harness;
use crate::common::init_test_env;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ranking_engine::{
    database::store::RankingStore,
    error::RankingError,
    model::structures::group_ranking_config::{GroupRankingConfig, PointsSettings},
    utils::test_utils::{generate_elo_record, generate_player}
};
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_empty_group_has_empty_leaderboard() {
    init_test_env();
    let h = Harness::elo();

    let leaderboard = h.service.get_leaderboard(h.group_id, 1, 20).await.unwrap();

    assert!(leaderboard.records.is_empty());
    assert_eq!(leaderboard.total, 0);
    assert_eq!((leaderboard.page, leaderboard.page_size), (1, 20));
}

#[tokio::test]
async fn test_leaderboard_is_sorted_with_competition_ranks() {
    init_test_env();
    let h = Harness::elo();
    let top = h.seed_elo(1500).await;
    let tied_a = h.seed_elo(1400).await;
    let tied_b = h.seed_elo(1400).await;
    let last = h.seed_elo(1100).await;

    let leaderboard = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();

    let ranks = leaderboard
        .records
        .iter()
        .map(|r| (r.record.user_id, r.rank))
        .collect::<Vec<_>>();
    assert_eq!(leaderboard.total, 4);
    assert_eq!(ranks[0], (top, 1));
    assert_eq!(ranks[1].1, 2);
    assert_eq!(ranks[2].1, 2);
    assert!([tied_a, tied_b].contains(&ranks[1].0));
    assert_eq!(ranks[3], (last, 4));

    let user = h.service.get_user_ranking(tied_b, h.group_id).await.unwrap().unwrap();
    assert_eq!(user.rank, Some(2));
}

#[tokio::test]
async fn test_pagination_keeps_ranks_across_pages() {
    init_test_env();
    let h = Harness::elo();
    for rating in [1600, 1500, 1400, 1400, 1300] {
        h.seed_elo(rating).await;
    }

    let page_one = h.service.get_leaderboard(h.group_id, 1, 3).await.unwrap();
    let page_two = h.service.get_leaderboard(h.group_id, 2, 3).await.unwrap();
    let page_three = h.service.get_leaderboard(h.group_id, 3, 3).await.unwrap();

    assert_eq!(page_one.records.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    // First record on page two ties with the last record on page one
    assert_eq!(page_two.records.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![3, 5]);
    assert_eq!(page_two.total, 5);
    assert!(page_three.records.is_empty());
}

#[tokio::test]
async fn test_points_leaderboard_sorts_by_total() {
    init_test_env();
    let h = Harness::new(GroupRankingConfig::points(PointsSettings::default()));
    let (a, b, c) = (generate_player(), generate_player(), generate_player());

    let first = h.add_match(vec![vec![a.clone()], vec![b.clone()]], Some(0));
    let second = h.add_match(vec![vec![c.clone()], vec![b.clone()]], None);
    h.service.apply_match_result(first).await.unwrap();
    h.service.apply_match_result(second).await.unwrap();

    let leaderboard = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();
    let order = leaderboard
        .records
        .iter()
        .map(|r| (r.record.user_id, r.record.sort_value(), r.rank))
        .collect::<Vec<_>>();

    // a: 3, c: 1, b: -1 + 1 = 0
    assert_eq!(order, vec![(a.user_id, 3, 1), (c.user_id, 1, 2), (b.user_id, 0, 3)]);
}

#[tokio::test]
async fn test_rejects_invalid_pagination() {
    init_test_env();
    let h = Harness::elo();

    for (page, page_size) in [(0, 10), (1, 0), (1, 101)] {
        let result = h.service.get_leaderboard(h.group_id, page, page_size).await;
        assert!(matches!(result, Err(RankingError::InvalidPagination { .. })));
    }

    assert!(h.service.get_leaderboard(h.group_id, 1, 100).await.is_ok());
}

#[tokio::test]
async fn test_unknown_group_leaderboard() {
    init_test_env();
    let h = Harness::elo();

    let result = h.service.get_leaderboard(Uuid::new_v4(), 1, 10).await;

    assert!(matches!(result, Err(RankingError::NotFound { entity: "Group", .. })));
}

#[tokio::test]
async fn test_repeated_reads_within_ttl_are_identical() {
    init_test_env();
    let h = Harness::elo();
    h.seed_elo(1300).await;
    h.seed_elo(1250).await;

    let first = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();

    // Written behind the service's back, so only a cache miss would show it
    h.store.insert_if_absent(generate_elo_record(h.group_id, 1900)).await.unwrap();

    let second = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
    assert_eq!(second.total, 2);
}

#[tokio::test]
async fn test_repeated_reads_are_identical_with_fractional_win_rates() {
    init_test_env();
    let h = Harness::elo();
    let players = (0..12).map(|_| generate_player()).collect::<Vec<_>>();
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    // Two full round robins: 132 matches, 22 per player
    for _ in 0..2 {
        for i in 0..players.len() {
            for j in (i + 1)..players.len() {
                let winner = match rng.random_range(0..3) {
                    0 => Some(0),
                    1 => Some(1),
                    _ => None
                };
                let match_id = h.add_match(vec![vec![players[i].clone()], vec![players[j].clone()]], winner);
                h.service.apply_match_result(match_id).await.unwrap();
            }
        }
    }

    let first = h.service.get_leaderboard(h.group_id, 1, 20).await.unwrap();
    let second = h.service.get_leaderboard(h.group_id, 1, 20).await.unwrap();

    assert!(first
        .records
        .iter()
        .any(|r| r.record.stats.win_rate > 0.0 && r.record.stats.win_rate < 1.0));
    assert_eq!(first, second);
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
    for (a, b) in first.records.iter().zip(&second.records) {
        assert_eq!(a.record.stats.win_rate.to_bits(), b.record.stats.win_rate.to_bits());
    }
}

#[tokio::test]
async fn test_match_completion_invalidates_cached_pages() {
    init_test_env();
    let h = Harness::elo();
    let (a, b) = (generate_player(), generate_player());
    h.service.initialize_ranking(a.user_id, h.group_id).await.unwrap();
    h.service.initialize_ranking(b.user_id, h.group_id).await.unwrap();

    let before = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();
    assert!(before.records.iter().all(|r| r.record.sort_value() == 1200 && r.rank == 1));

    let match_id = h.add_match(vec![vec![a.clone()], vec![b.clone()]], Some(1));
    h.service.apply_match_result(match_id).await.unwrap();

    let after = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();
    assert_eq!(after.records[0].record.user_id, b.user_id);
    assert_eq!(after.records[0].record.sort_value(), 1216);
    assert_eq!(after.records[1].record.sort_value(), 1184);
    assert_eq!(after.records[1].rank, 2);
}

#[tokio::test]
async fn test_initialization_and_deactivation_invalidate_cached_pages() {
    init_test_env();
    let h = Harness::elo();
    let first_user = Uuid::new_v4();
    h.service.initialize_ranking(first_user, h.group_id).await.unwrap();
    assert_eq!(h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap().total, 1);

    h.service.initialize_ranking(Uuid::new_v4(), h.group_id).await.unwrap();
    assert_eq!(h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap().total, 2);

    h.service.deactivate_ranking(first_user, h.group_id).await.unwrap();
    let leaderboard = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();
    assert_eq!(leaderboard.total, 1);
    assert!(leaderboard.records.iter().all(|r| r.record.user_id != first_user));
}

#[tokio::test(start_paused = true)]
async fn test_cached_page_expires_after_ttl() {
    init_test_env();
    let h = Harness::elo();
    h.seed_elo(1300).await;

    let first = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();
    h.store.insert_if_absent(generate_elo_record(h.group_id, 1900)).await.unwrap();

    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap(), first);

    tokio::time::advance(Duration::from_secs(2)).await;
    let refreshed = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();
    assert_eq!(refreshed.total, 2);
    assert_eq!(refreshed.records[0].record.sort_value(), 1900);
}

#[tokio::test]
async fn test_leaderboard_enrichment() {
    init_test_env();
    let h = Harness::elo();
    let known = h.seed_elo(1300).await;
    let unknown = h.seed_elo(1200).await;
    h.users.insert(known, "ada", None);

    let leaderboard = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();

    assert_eq!(leaderboard.records[0].user.as_ref().map(|u| u.username.as_str()), Some("ada"));
    assert_eq!(leaderboard.records[1].record.user_id, unknown);
    assert!(leaderboard.records[1].user.is_none());
}

#[tokio::test]
async fn test_leaderboard_survives_user_provider_outage() {
    init_test_env();
    let h = Harness::elo();
    let user_id = h.seed_elo(1300).await;
    h.users.insert(user_id, "ada", None);
    h.users.set_unavailable(true);

    let leaderboard = h.service.get_leaderboard(h.group_id, 1, 10).await.unwrap();

    assert_eq!(leaderboard.total, 1);
    assert!(leaderboard.records[0].user.is_none());
}
