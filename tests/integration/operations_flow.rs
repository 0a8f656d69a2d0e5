/// A full habit lifecycle driven through the server's configuration
use std::time::Duration;

use chrono::{TimeZone, Utc};
use habit_tracker::operations::{
    self, CompletionChanges, CompletionQuery, HabitChanges, NewCompletion, NewHabit,
};
use habit_tracker::*;

fn server(policy: StreakPolicy) -> HabitTrackerServer {
    let config = ServerConfig::new(DatabaseLocation::InMemory)
        .with_user_id(UserId::new("alice"))
        .with_streak_policy(policy);
    tokio_test::block_on(HabitTrackerServer::new(config)).expect("Failed to create server")
}

fn complete(server: &HabitTrackerServer, ctx: &RequestContext, habit_id: &HabitId, date: &str, count: u32) -> HabitStats {
    let request = NewCompletion {
        habit_id: habit_id.clone(),
        completion_date: Some(date.to_string()),
        count,
        notes: None,
    };
    operations::create_completion(server.storage(), ctx, request)
        .expect("create completion")
        .habit_stats
}

#[test]
fn test_server_basic_workflow() {
    let server = server(StreakPolicy::RecentDay);
    let monday = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    let ctx = server.request_context().with_now(monday);

    let habit = operations::create_habit(
        server.storage(),
        &ctx,
        NewHabit {
            name: "Run".to_string(),
            frequency: "weekly".to_string(),
            target_days: Some(serde_json::json!(["monday", "thursday"])),
            ..Default::default()
        },
    )
    .expect("create habit");
    assert_eq!(habit.color, operations::DEFAULT_COLOR);
    assert_eq!(habit.user_id().as_str(), "alice");

    // Yesterday and today extend; an older backfill only adds to the total
    assert_eq!(complete(&server, &ctx, habit.id(), "2024-06-02", 1).current_streak, 1);
    let stats = complete(&server, &ctx, habit.id(), "2024-06-03", 2);
    assert_eq!(stats, HabitStats::new(2, 2, 3));
    let stats = complete(&server, &ctx, habit.id(), "2024-05-01", 5);
    assert_eq!(stats, HabitStats::new(2, 2, 8));

    let page = operations::list_habit_completions(server.storage(), &ctx, habit.id(), CompletionQuery::default())
        .expect("list completions");
    assert_eq!(page.total, 3);
    let latest = page.completions[0].clone();
    assert_eq!(latest.completion_date.to_string(), "2024-06-03");

    let outcome = operations::update_completion(
        server.storage(),
        &ctx,
        &latest.id,
        CompletionChanges {
            count: Some(4),
            notes: Some("tempo run".to_string()),
        },
    )
    .expect("update completion");
    assert_eq!(outcome.habit_stats.total_completions, 10);
    assert_eq!(outcome.completion.notes.as_deref(), Some("tempo run"));

    let stats = operations::delete_completion(server.storage(), &ctx, &latest.id).expect("delete completion");
    assert_eq!(stats.total_completions, 6);
    assert_eq!(stats.current_streak, 2);

    let paused = operations::update_habit(
        server.storage(),
        &ctx,
        habit.id(),
        HabitChanges {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .expect("pause habit");
    assert!(!paused.is_active);
    assert_eq!(paused.stats(), stats);
    assert!(operations::list_habits(server.storage(), &ctx, true).unwrap().is_empty());

    operations::delete_habit(server.storage(), &ctx, habit.id()).expect("delete habit");
    let page = operations::list_completions(server.storage(), &ctx, CompletionQuery::default()).unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn test_users_cannot_touch_each_others_data() {
    let server = server(StreakPolicy::RecentDay);
    let alice = server.request_context();
    let bob = RequestContext::new(UserId::new("bob"));

    let habit = operations::create_habit(
        server.storage(),
        &alice,
        NewHabit {
            name: "Meditate".to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let today = alice.today().to_string();
    complete(&server, &alice, habit.id(), &today, 1);

    let request = NewCompletion {
        habit_id: habit.id().clone(),
        completion_date: None,
        count: 1,
        notes: None,
    };
    let err = operations::create_completion(server.storage(), &bob, request).unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let err = operations::delete_habit(server.storage(), &bob, habit.id()).unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let bob_page = operations::list_completions(server.storage(), &bob, CompletionQuery::default()).unwrap();
    assert_eq!(bob_page.total, 0);

    let habit = operations::get_habit(server.storage(), &alice, habit.id()).unwrap();
    assert_eq!(habit.total_completions(), 1);
}

#[test]
fn test_consecutive_policy_from_config() {
    let server = server(StreakPolicy::Consecutive);
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
    let ctx = server.request_context().with_now(now);
    assert_eq!(ctx.streak_policy, StreakPolicy::Consecutive);

    let habit = operations::create_habit(
        server.storage(),
        &ctx,
        NewHabit {
            name: "Journal".to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
    )
    .unwrap();

    complete(&server, &ctx, habit.id(), "2024-05-30", 1);
    assert_eq!(complete(&server, &ctx, habit.id(), "2024-06-02", 1).current_streak, 1);
    assert_eq!(complete(&server, &ctx, habit.id(), "2024-06-03", 1).current_streak, 2);

    // Nothing precedes a fresh habit's backfilled yesterday, so it starts over
    let other = operations::create_habit(
        server.storage(),
        &ctx,
        NewHabit {
            name: "Floss".to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    complete(&server, &ctx, other.id(), "2024-06-03", 1);
    let stats = complete(&server, &ctx, other.id(), "2024-06-02", 1);
    assert_eq!(stats, HabitStats::new(1, 1, 2));
}

#[test]
fn test_request_timeout_rolls_back() {
    let config = ServerConfig::new(DatabaseLocation::InMemory).with_request_timeout(Some(Duration::from_nanos(1)));
    let server = tokio_test::block_on(HabitTrackerServer::new(config)).unwrap();

    std::thread::sleep(Duration::from_millis(5));
    let ctx = server.request_context();
    std::thread::sleep(Duration::from_millis(5));

    let err = operations::create_habit(
        server.storage(),
        &ctx,
        NewHabit {
            name: "Late".to_string(),
            frequency: "daily".to_string(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "persistence_failure");

    let unbounded = RequestContext::new(server.config().user_id.clone());
    assert!(operations::list_habits(server.storage(), &unbounded, false).unwrap().is_empty());
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = ServerConfig::new(DatabaseLocation::InMemory).with_user_id(UserId::new(""));
    let result = tokio_test::block_on(HabitTrackerServer::new(config));
    assert!(matches!(result, Err(ServerError::Config(_))));
}
