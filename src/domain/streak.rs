/// Streak rules applied when a completion is recorded
///
/// The default rule only asks whether the completion is dated today or
/// yesterday. Completions backfilled further into the past still count
/// towards the habit's totals but never extend its streak. Nothing checks
/// that the previous completion was really the day before, and future
/// dates are not rejected here.
///
/// `StreakPolicy::Consecutive` is an opt-in stricter rule that also looks at
/// the habit's previous completion date.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Habit};

/// Whether a completion dated `completion_date` extends the streak at `now`
///
/// True exactly when the date is today or yesterday, with "today" taken as
/// the UTC calendar day of `now`.
pub fn should_extend_streak(completion_date: NaiveDate, now: DateTime<Utc>) -> bool {
    let today = now.date_naive();
    completion_date == today || Some(completion_date) == today.pred_opt()
}

/// How recording a completion changes a habit's current streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    Unchanged,
    Extend,
    /// Start over: reset, then count this completion as day one
    Restart,
}

impl StreakUpdate {
    pub fn apply(self, habit: &mut Habit) {
        match self {
            StreakUpdate::Unchanged => {}
            StreakUpdate::Extend => habit.increment_streak(),
            StreakUpdate::Restart => {
                habit.reset_streak();
                habit.increment_streak();
            }
        }
    }
}

/// Named rule for streak bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreakPolicy {
    /// Extend whenever the completion is dated today or yesterday
    #[default]
    RecentDay,
    /// Like `RecentDay`, but only extend when the previous completion was
    /// the day before; otherwise the streak restarts at one
    Consecutive,
}

impl StreakPolicy {
    /// Whether `evaluate` needs the habit's previous completion date
    pub fn needs_previous_completion(&self) -> bool {
        matches!(self, StreakPolicy::Consecutive)
    }

    /// Decide the streak change for a new completion
    ///
    /// `previous_completion` is the latest completion date strictly before
    /// `completion_date`; it is only consulted by `Consecutive`.
    pub fn evaluate(
        &self,
        completion_date: NaiveDate,
        now: DateTime<Utc>,
        previous_completion: Option<NaiveDate>,
        current_streak: u32,
    ) -> StreakUpdate {
        if !should_extend_streak(completion_date, now) {
            return StreakUpdate::Unchanged;
        }

        match self {
            StreakPolicy::RecentDay => StreakUpdate::Extend,
            StreakPolicy::Consecutive => {
                let follows_previous = previous_completion.is_some()
                    && previous_completion == completion_date.pred_opt();
                if current_streak == 0 || follows_previous {
                    StreakUpdate::Extend
                } else {
                    StreakUpdate::Restart
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreakPolicy::RecentDay => "recent-day",
            StreakPolicy::Consecutive => "consecutive",
        }
    }
}

impl fmt::Display for StreakPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreakPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "recent-day" => Ok(StreakPolicy::RecentDay),
            "consecutive" => Ok(StreakPolicy::Consecutive),
            other => Err(DomainError::Validation {
                message: format!(
                    "unknown streak policy '{}' (expected recent-day or consecutive)",
                    other
                ),
            }),
        }
    }
}
