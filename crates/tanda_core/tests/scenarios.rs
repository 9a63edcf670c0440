//! End-to-end rotation scenarios through the coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use tanda_core::{
    FixedClock, FixedDraws, JsonFileStore, LotteryCoordinator, MemoryStore, RotationOptions,
    RotationPhase, Strategy, TandaConfig, TandaError,
};

fn members(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn coordinator(script: &[u32]) -> LotteryCoordinator<MemoryStore> {
    LotteryCoordinator::new(MemoryStore::new(), TandaConfig::default())
        .unwrap()
        .with_draws(Box::new(FixedDraws::new(script.to_vec())))
}

fn order_of(status: &tanda_core::RotationStatus) -> Vec<(String, u32)> {
    status.turn_order.iter().map(|t| (t.member_id.clone(), t.rank)).collect()
}

fn contribution_rotation() -> LotteryCoordinator<MemoryStore> {
    let coordinator = coordinator(&[]);
    let contributions: HashMap<String, f64> = [("a", 100.0), ("b", 50.0), ("c", 200.0)]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    coordinator
        .initialize_group_rotation(
            "g1",
            members(&["a", "b", "c"]),
            Strategy::ContributionBased,
            RotationOptions { contributions, ..Default::default() },
        )
        .unwrap();
    coordinator
}

#[test]
fn sequential_order_follows_input() {
    let coordinator = coordinator(&[]);
    let status = coordinator
        .initialize_group_rotation(
            "g1",
            members(&["a", "b", "c"]),
            Strategy::Sequential,
            RotationOptions::default(),
        )
        .unwrap();

    assert_eq!(order_of(&status), vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]);
    assert_eq!(status.phase, RotationPhase::InProgress);
    assert!(coordinator.get_lottery_history("g1").unwrap().is_empty());
}

#[test]
fn contribution_order_is_descending() {
    let coordinator = contribution_rotation();
    let status = coordinator.get_rotation_status("g1").unwrap();
    assert_eq!(order_of(&status), vec![("c".into(), 1), ("a".into(), 2), ("b".into(), 3)]);
}

#[test]
fn first_payout_advances_next_recipient() {
    let coordinator = contribution_rotation();
    let outcome = coordinator.record_payout_completion("g1", "c", 200.0).unwrap();

    assert!(outcome.turn_completed);
    assert!(!outcome.rotation_complete);
    let next = coordinator.get_next_payout_recipient("g1").unwrap().unwrap();
    assert_eq!(next.member_id, "a");
    assert_eq!(next.rank, 2);
    assert!(!coordinator.get_rotation_status("g1").unwrap().is_complete);
}

#[test]
fn rotation_completes_after_last_payout() {
    let coordinator = contribution_rotation();
    coordinator.record_payout_completion("g1", "c", 200.0).unwrap();
    coordinator.record_payout_completion("g1", "a", 200.0).unwrap();
    let outcome = coordinator.record_payout_completion("g1", "b", 200.0).unwrap();

    assert!(outcome.rotation_complete);
    assert!(outcome.next_recipient.is_none());
    assert!(coordinator.get_next_payout_recipient("g1").unwrap().is_none());

    let status = coordinator.get_rotation_status("g1").unwrap();
    assert!(status.is_complete);
    assert_eq!(status.phase, RotationPhase::Complete);
    assert_eq!(status.completed_turns, members(&["c", "a", "b"]));
}

#[test]
fn redraw_on_complete_rotation_fails() {
    let coordinator = contribution_rotation();
    for member in ["c", "a", "b"] {
        coordinator.record_payout_completion("g1", member, 200.0).unwrap();
    }

    let err = coordinator.re_conduct_lottery("g1", "dispute").unwrap_err();
    assert!(matches!(err, TandaError::NoRemainingMembers { .. }));
    assert_eq!(coordinator.get_rotation_status("g1").unwrap().version, 4);
}

#[test]
fn seeded_lottery_orders_by_draw_number() {
    let coordinator = coordinator(&[700, 300]);
    let status = coordinator
        .initialize_group_rotation(
            "g2",
            members(&["x", "y"]),
            Strategy::Lottery,
            RotationOptions::default(),
        )
        .unwrap();

    assert_eq!(status.turn_order[0].member_id, "y");
    assert_eq!(status.turn_order[0].rank, 1);
    assert_eq!(status.turn_order[0].draw_number, 300.0);
    assert_eq!(status.turn_order[1].member_id, "x");
    assert_eq!(status.turn_order[1].rank, 2);
    assert_eq!(status.turn_order[1].draw_number, 700.0);

    let history = coordinator.get_lottery_history("g2").unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].verify_digest());
}

#[test]
fn redraw_keeps_paid_turns_and_appends_history() {
    let coordinator = coordinator(&[100, 200, 300, 400, 900, 50, 10]);
    coordinator
        .initialize_group_rotation(
            "g3",
            members(&["a", "b", "c", "d"]),
            Strategy::Lottery,
            RotationOptions::default(),
        )
        .unwrap();
    coordinator.record_payout_completion("g3", "a", 40.0).unwrap();

    // pending b, c, d draw 900, 50, 10
    let status = coordinator.re_conduct_lottery("g3", "member dispute").unwrap();
    assert_eq!(
        order_of(&status),
        vec![("a".into(), 1), ("d".into(), 2), ("c".into(), 3), ("b".into(), 4)]
    );
    assert_eq!(status.turn_order[0].payout_amount, Some(40.0));

    let history = coordinator.get_lottery_history("g3").unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[1].method.is_redraw());
    assert_eq!(history[1].participants, members(&["b", "c", "d"]));
}

#[test]
fn payout_dates_follow_frequency() {
    let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    let clock = Arc::new(FixedClock::new(start));
    let coordinator = coordinator(&[]).with_clock(clock);

    let status = coordinator
        .initialize_group_rotation(
            "g4",
            members(&["a", "b"]),
            Strategy::Sequential,
            RotationOptions {
                frequency: Some("biweekly".parse().unwrap()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(status.turn_order[0].expected_payout_date, start + Duration::weeks(2));
    assert_eq!(status.turn_order[1].expected_payout_date, start + Duration::weeks(4));
}

#[test]
fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = JsonFileStore::open(dir.path()).unwrap();
        let coordinator = LotteryCoordinator::new(store, TandaConfig::default()).unwrap();
        coordinator
            .initialize_group_rotation(
                "club/weekly",
                members(&["a", "b"]),
                Strategy::Sequential,
                RotationOptions::default(),
            )
            .unwrap();
        coordinator.record_payout_completion("club/weekly", "a", 10.0).unwrap();
    }

    let store = JsonFileStore::open(dir.path()).unwrap();
    let coordinator = LotteryCoordinator::new(store, TandaConfig::default()).unwrap();
    let status = coordinator.get_rotation_status("club/weekly").unwrap();
    assert_eq!(status.completed_turns, members(&["a"]));
    assert_eq!(status.next_recipient.unwrap().member_id, "b");
    assert_eq!(coordinator.list_groups().unwrap(), vec!["club/weekly".to_string()]);
}
