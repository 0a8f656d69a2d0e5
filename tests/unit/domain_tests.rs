/// Habit, completion and streak rules exercised through the public API
use chrono::{NaiveDate, TimeZone, Utc};
use habit_tracker::*;
use serde_json::json;

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn weekly_habit(days: serde_json::Value) -> Result<Habit, DomainError> {
    let schedule = TargetDaySchedule::parse(&days)?;
    Habit::new(
        HabitId::new(),
        UserId::new("alice"),
        "Gym",
        Frequency::Weekly,
        1,
        None,
        None,
        None,
        Some(schedule),
        "#112233",
    )
}

#[test]
fn test_habit_creation() {
    let habit = Habit::new(
        HabitId::new(),
        UserId::new("alice"),
        "  Test Habit ",
        Frequency::Daily,
        2,
        Some("A test habit"),
        Some("  "),
        None,
        None,
        "#4A90D9",
    )
    .expect("valid habit");

    assert_eq!(habit.name, "Test Habit");
    assert_eq!(habit.description.as_deref(), Some("A test habit"));
    assert_eq!(habit.motivation, None);
    assert_eq!(habit.stats(), HabitStats::default());
    assert!(habit.is_active);
    assert_eq!(habit.created_at(), habit.updated_at);
}

#[test]
fn test_habit_rejects_bad_fields() {
    let build = |name: &str, target_count: u32, color: &str| {
        Habit::new(
            HabitId::new(),
            UserId::new("alice"),
            name,
            Frequency::Daily,
            target_count,
            None,
            None,
            None,
            None,
            color,
        )
    };

    assert!(matches!(build("", 1, "#000000"), Err(DomainError::InvalidHabitName(_))));
    assert!(matches!(build("Read", 0, "#000000"), Err(DomainError::InvalidValue { .. })));
    assert!(matches!(build("Read", 1, "blue"), Err(DomainError::InvalidColor(_))));
}

#[test]
fn test_weekly_habit_schedule() {
    let habit = weekly_habit(json!(["monday", "wednesday"])).expect("weekday names are valid");
    assert!(habit.is_due_on(date("2024-06-03"))); // Monday
    assert!(!habit.is_due_on(date("2024-06-04")));

    let err = weekly_habit(json!([1, 15])).unwrap_err();
    assert!(matches!(err, DomainError::InvalidSchedule(ScheduleError::Invalid(_))));
}

#[test]
fn test_completion_creation() {
    let completion = Completion::new(
        CompletionId::new(),
        HabitId::new(),
        UserId::new("alice"),
        date("2024-06-03"),
        3,
        Some(" felt good "),
    )
    .expect("valid completion");

    assert_eq!(completion.count, 3);
    assert_eq!(completion.notes.as_deref(), Some("felt good"));
    assert!(completion.is_owned_by(&UserId::new("alice")));
    assert!(!completion.is_owned_by(&UserId::new("bob")));
}

#[test]
fn test_completion_requires_positive_count() {
    let result = Completion::new(
        CompletionId::new(),
        HabitId::new(),
        UserId::new("alice"),
        date("2024-06-03"),
        0,
        None,
    );
    assert!(result.is_err());
}

#[test]
fn test_parse_date_is_strict() {
    assert_eq!(date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    assert!(parse_date("2023-02-29").is_err());
    assert!(parse_date("03/06/2024").is_err());
}

#[test]
fn test_streak_window_is_today_or_yesterday() {
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 23, 59, 0).unwrap();

    assert!(should_extend_streak(date("2024-06-03"), now));
    assert!(should_extend_streak(date("2024-06-02"), now));
    assert!(!should_extend_streak(date("2024-06-01"), now));
    assert!(!should_extend_streak(date("2024-06-04"), now));
}

#[test]
fn test_streak_policies_disagree_on_gaps() {
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
    let gap = Some(date("2024-05-20"));

    assert_eq!(
        StreakPolicy::RecentDay.evaluate(date("2024-06-03"), now, gap, 4),
        StreakUpdate::Extend
    );
    assert_eq!(
        StreakPolicy::Consecutive.evaluate(date("2024-06-03"), now, gap, 4),
        StreakUpdate::Restart
    );
    assert_eq!(
        StreakPolicy::Consecutive.evaluate(date("2024-06-03"), now, Some(date("2024-06-02")), 4),
        StreakUpdate::Extend
    );
}

#[test]
fn test_restart_counts_the_new_day() {
    let mut habit = weekly_habit(json!(["monday"])).unwrap();
    habit.increment_streak();
    habit.increment_streak();
    assert_eq!(habit.current_streak(), 2);

    StreakUpdate::Restart.apply(&mut habit);
    assert_eq!(habit.current_streak(), 1);
    assert_eq!(habit.best_streak(), 2);
}

#[test]
fn test_streak_policy_names() {
    assert_eq!("consecutive".parse::<StreakPolicy>().unwrap(), StreakPolicy::Consecutive);
    assert_eq!(StreakPolicy::default().to_string(), "recent-day");
    assert!("weekly".parse::<StreakPolicy>().is_err());
}
