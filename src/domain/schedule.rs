/// Target-day schedules for habits
///
/// A schedule lists the days on which a habit is expected. How an entry is
/// read depends on the habit's frequency: weekly habits name weekdays,
/// monthly habits name days of the month (1-28) or the `"last"` sentinel,
/// and daily habits ignore the schedule entirely.
///
/// On the wire a schedule is a list of mixed strings and numbers, optionally
/// wrapped as `{"days": [...]}`. It is turned into typed markers once, at
/// parse time, so validation and month resolution are plain pattern matches.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::Frequency;

/// Highest numeric day accepted for monthly schedules
///
/// Every month has at least 28 days, so any configured day number exists in
/// every month. Later days are expressed with the `"last"` sentinel.
pub const MAX_MONTH_DAY: i64 = 28;

/// Literal used on the wire for the last calendar day of a month
pub const LAST_DAY_SENTINEL: &str = "last";

/// Errors produced while reading or checking a schedule
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The input could not be read as a list of day markers at all
    #[error("malformed schedule: {0}")]
    Malformed(String),

    /// The markers were readable but break the rules for the frequency
    #[error("invalid schedule: {0}")]
    Invalid(String),
}

/// A single entry of a target-day schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayMarker {
    /// A day of the week, written as its lowercase English name
    Weekday(Weekday),
    /// A numeric day of the month
    MonthDay(i64),
    /// The final day of whichever month is being resolved
    LastDay,
    /// A string or number that names no day; only daily habits accept it
    Unrecognized(Value),
}

impl DayMarker {
    /// Read one marker from its wire representation
    ///
    /// Only entries that are neither strings nor numbers are malformed.
    fn from_value(value: &Value) -> Result<Self, ScheduleError> {
        match value {
            Value::String(s) if s == LAST_DAY_SENTINEL => Ok(DayMarker::LastDay),
            Value::String(s) => Ok(weekday_from_name(s)
                .map(DayMarker::Weekday)
                .unwrap_or_else(|| DayMarker::Unrecognized(value.clone()))),
            Value::Number(n) => {
                if let Some(day) = n.as_i64() {
                    return Ok(DayMarker::MonthDay(day));
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
                        Ok(DayMarker::MonthDay(f as i64))
                    }
                    _ => Ok(DayMarker::Unrecognized(value.clone())),
                }
            }
            other => Err(ScheduleError::Malformed(format!(
                "day markers must be strings or numbers, got {}",
                other
            ))),
        }
    }

    fn to_value(self) -> Value {
        match self {
            DayMarker::Weekday(day) => Value::String(weekday_name(day).to_string()),
            DayMarker::MonthDay(day) => Value::from(day),
            DayMarker::LastDay => Value::String(LAST_DAY_SENTINEL.to_string()),
            DayMarker::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for DayMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayMarker::Weekday(day) => f.write_str(weekday_name(*day)),
            DayMarker::MonthDay(day) => write!(f, "{}", day),
            DayMarker::LastDay => f.write_str(LAST_DAY_SENTINEL),
            DayMarker::Unrecognized(Value::String(s)) => f.write_str(s),
            DayMarker::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

/// The set of days on which a habit is expected to be completed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct TargetDaySchedule {
    days: Vec<DayMarker>,
}

impl TargetDaySchedule {
    pub fn new(days: Vec<DayMarker>) -> Self {
        Self { days }
    }

    /// Parse a schedule from an untyped JSON value
    ///
    /// Accepts a bare list, a `{"days": [...]}` object, or either of those
    /// encoded as a JSON string. Anything else is reported as malformed.
    pub fn parse(value: &Value) -> Result<Self, ScheduleError> {
        match value {
            Value::String(raw) => {
                let inner: Value = serde_json::from_str(raw).map_err(|e| {
                    ScheduleError::Malformed(format!("schedule is not valid JSON: {}", e))
                })?;
                if inner.is_string() {
                    return Err(ScheduleError::Malformed(
                        "schedule must be a list of day markers".to_string(),
                    ));
                }
                Self::parse(&inner)
            }
            Value::Object(map) => match map.get("days") {
                Some(days) if days.is_array() => Self::parse(days),
                _ => Err(ScheduleError::Malformed(
                    "schedule object must contain a 'days' list".to_string(),
                )),
            },
            Value::Array(entries) => entries
                .iter()
                .map(DayMarker::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::new),
            other => Err(ScheduleError::Malformed(format!(
                "schedule must be a list of day markers, got {}",
                other
            ))),
        }
    }

    pub fn days(&self) -> &[DayMarker] {
        &self.days
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Check every marker against the rules for the given frequency
    pub fn validate(&self, frequency: Frequency) -> Result<(), ScheduleError> {
        match frequency {
            Frequency::Daily => Ok(()),
            Frequency::Weekly => {
                for marker in &self.days {
                    if !matches!(marker, DayMarker::Weekday(_)) {
                        return Err(ScheduleError::Invalid(format!(
                            "weekly schedules only accept weekday names, found '{}'",
                            marker
                        )));
                    }
                }
                Ok(())
            }
            Frequency::Monthly => {
                for marker in &self.days {
                    match marker {
                        DayMarker::MonthDay(day) if (1..=MAX_MONTH_DAY).contains(day) => {}
                        DayMarker::LastDay => {}
                        other => {
                            return Err(ScheduleError::Invalid(format!(
                                "monthly schedules accept days 1-{} or '{}', found '{}'",
                                MAX_MONTH_DAY, LAST_DAY_SENTINEL, other
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Concrete day numbers this schedule lands on in the given month
    ///
    /// The sentinel resolves to the month's real last day. Weekday markers
    /// and day numbers the month does not have are skipped. The result is
    /// ascending and free of duplicates; an invalid month yields nothing.
    pub fn resolve_for_month(&self, year: i32, month: u32) -> Vec<u32> {
        let Some(last_day) = last_day_of_month(year, month) else {
            return Vec::new();
        };

        let mut resolved: Vec<u32> = self
            .days
            .iter()
            .filter_map(|marker| match marker {
                DayMarker::MonthDay(day) if *day >= 1 && *day <= i64::from(last_day) => {
                    Some(*day as u32)
                }
                DayMarker::LastDay => Some(last_day),
                _ => None,
            })
            .collect();

        resolved.sort_unstable();
        resolved.dedup();
        resolved
    }

    /// A schedule is usable for a month only if it resolves to at least one day
    pub fn is_valid_for_month(&self, year: i32, month: u32) -> bool {
        !self.resolve_for_month(year, month).is_empty()
    }

    /// Whether a habit with this schedule is expected on `date`
    ///
    /// An empty schedule places no restriction on the day.
    pub fn includes(&self, frequency: Frequency, date: NaiveDate) -> bool {
        if self.days.is_empty() {
            return true;
        }
        match frequency {
            Frequency::Daily => true,
            Frequency::Weekly => self
                .days
                .iter()
                .any(|marker| *marker == DayMarker::Weekday(date.weekday())),
            Frequency::Monthly => self
                .resolve_for_month(date.year(), date.month())
                .contains(&date.day()),
        }
    }
}

impl TryFrom<Value> for TargetDaySchedule {
    type Error = ScheduleError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TargetDaySchedule> for Value {
    fn from(schedule: TargetDaySchedule) -> Self {
        let days = schedule.days.into_iter().map(DayMarker::to_value).collect();
        let mut map = serde_json::Map::new();
        map.insert("days".to_string(), Value::Array(days));
        Value::Object(map)
    }
}

/// Last calendar day of a month: day zero of the following month
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|date| date.day())
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
