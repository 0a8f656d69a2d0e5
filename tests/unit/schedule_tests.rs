/// Target-day schedule parsing and month resolution
use habit_tracker::*;
use serde_json::json;

#[test]
fn test_schedule_input_shapes() {
    let bare = TargetDaySchedule::parse(&json!([1, 15, "last"])).unwrap();
    let object = TargetDaySchedule::parse(&json!({"days": [1, 15, "last"]})).unwrap();
    let encoded = TargetDaySchedule::parse(&json!("[1, 15, \"last\"]")).unwrap();

    assert_eq!(bare, object);
    assert_eq!(bare, encoded);
    assert_eq!(bare.days().len(), 3);
}

#[test]
fn test_malformed_schedules() {
    for input in [json!(5), json!("not json"), json!({"weekdays": []}), json!([true]), json!([null])] {
        let err = TargetDaySchedule::parse(&input).unwrap_err();
        assert!(matches!(err, ScheduleError::Malformed(_)), "input {} gave {:?}", input, err);
    }
}

#[test]
fn test_monthly_validation_bounds() {
    let ok = TargetDaySchedule::parse(&json!([1, 28, "last"])).unwrap();
    assert!(ok.validate(Frequency::Monthly).is_ok());

    for day in [0, 29, 31] {
        let schedule = TargetDaySchedule::parse(&json!([day])).unwrap();
        assert!(matches!(
            schedule.validate(Frequency::Monthly),
            Err(ScheduleError::Invalid(_))
        ));
    }

    let weekdays = TargetDaySchedule::parse(&json!(["friday"])).unwrap();
    assert!(weekdays.validate(Frequency::Monthly).is_err());
    assert!(weekdays.validate(Frequency::Daily).is_ok());
}

#[test]
fn test_last_day_resolution() {
    let schedule = TargetDaySchedule::parse(&json!([28, "last"])).unwrap();

    assert_eq!(schedule.resolve_for_month(2024, 2), vec![28, 29]);
    assert_eq!(schedule.resolve_for_month(2023, 2), vec![28]);
    assert_eq!(schedule.resolve_for_month(2024, 4), vec![28, 30]);
    assert!(schedule.resolve_for_month(2024, 13).is_empty());

    assert_eq!(last_day_of_month(2024, 12), Some(31));
}

#[test]
fn test_schedule_serializes_as_day_object() {
    let schedule = TargetDaySchedule::parse(&json!(["monday", "last"])).unwrap();
    let value = serde_json::to_value(&schedule).unwrap();
    assert_eq!(value, json!({"days": ["monday", "last"]}));

    let back: TargetDaySchedule = serde_json::from_value(value).unwrap();
    assert_eq!(back, schedule);
}

#[test]
fn test_unknown_markers_only_fail_frequency_rules() {
    let schedule = TargetDaySchedule::parse(&json!(["Monday"])).expect("strings always parse");
    assert!(matches!(schedule.validate(Frequency::Weekly), Err(ScheduleError::Invalid(_))));
    assert!(matches!(schedule.validate(Frequency::Monthly), Err(ScheduleError::Invalid(_))));
    assert!(schedule.validate(Frequency::Daily).is_ok());
}
