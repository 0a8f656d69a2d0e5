/// Habit and completion operations
///
/// Every operation takes an already-identified user in a [`RequestContext`],
/// checks ownership and validates input before writing, and runs its writes
/// as one atomic transaction on the storage backend.

pub mod completions;
pub mod habits;

pub use completions::*;
pub use habits::*;

use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{CompletionId, DomainError, Habit, HabitId, ScheduleError, StreakPolicy, UserId};
use crate::storage::{HabitRepository, StorageError};

/// Who is asking, and when
///
/// `now` fixes the clock for one operation, so "today" and "yesterday"
/// mean the same thing for every step of it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: UserId,
    pub now: DateTime<Utc>,
    /// Writes not committed by this instant are rolled back
    pub deadline: Option<Instant>,
    pub streak_policy: StreakPolicy,
}

impl RequestContext {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            now: Utc::now(),
            deadline: None,
            streak_policy: StreakPolicy::default(),
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_streak_policy(mut self, policy: StreakPolicy) -> Self {
        self.streak_policy = policy;
        self
    }

    /// The UTC calendar day of `now`
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

/// What a caller can get back from an operation
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[source] StorageError),
}

impl OperationError {
    /// Stable machine-readable code for this kind of failure
    pub fn code(&self) -> &'static str {
        match self {
            OperationError::NotFound { .. } => "not_found",
            OperationError::Forbidden(_) => "forbidden",
            OperationError::InvalidInput(_) => "invalid_input",
            OperationError::AlreadyExists(_) => "already_exists",
            OperationError::Persistence(_) => "persistence_failure",
        }
    }

    pub(crate) fn habit_not_found(habit_id: &HabitId) -> Self {
        OperationError::NotFound {
            entity: "habit",
            id: habit_id.to_string(),
        }
    }

    pub(crate) fn completion_not_found(completion_id: &CompletionId) -> Self {
        OperationError::NotFound {
            entity: "completion",
            id: completion_id.to_string(),
        }
    }
}

impl From<StorageError> for OperationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ZeroRowsAffected { entity, id } => {
                OperationError::NotFound { entity, id }
            }
            StorageError::DuplicateCompletion { habit_id, date } => OperationError::AlreadyExists(
                format!("habit {} already has a completion on {}", habit_id, date),
            ),
            other => OperationError::Persistence(other),
        }
    }
}

impl From<DomainError> for OperationError {
    fn from(err: DomainError) -> Self {
        OperationError::InvalidInput(err.to_string())
    }
}

impl From<ScheduleError> for OperationError {
    fn from(err: ScheduleError) -> Self {
        OperationError::InvalidInput(err.to_string())
    }
}

/// Parse a habit id supplied by a caller
///
/// A string that is not an id cannot name an existing habit, so it is
/// reported as not found.
pub fn parse_habit_id(raw: &str) -> Result<HabitId, OperationError> {
    HabitId::from_string(raw).map_err(|_| OperationError::NotFound {
        entity: "habit",
        id: raw.to_string(),
    })
}

pub fn parse_completion_id(raw: &str) -> Result<CompletionId, OperationError> {
    CompletionId::from_string(raw).map_err(|_| OperationError::NotFound {
        entity: "completion",
        id: raw.to_string(),
    })
}

/// Load a habit and make sure the requester owns it
pub(crate) fn load_owned_habit(
    repo: &dyn HabitRepository,
    ctx: &RequestContext,
    habit_id: &HabitId,
) -> Result<Habit, OperationError> {
    let habit = repo
        .find_habit(habit_id)?
        .ok_or_else(|| OperationError::habit_not_found(habit_id))?;

    if !habit.is_owned_by(&ctx.user_id) {
        tracing::warn!("User {} denied access to habit {}", ctx.user_id, habit_id);
        return Err(OperationError::Forbidden(format!(
            "habit {} belongs to another user",
            habit_id
        )));
    }

    Ok(habit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_storage_errors_map_to_kinds() {
        let zero = StorageError::ZeroRowsAffected {
            entity: "habit",
            id: "h1".to_string(),
        };
        assert_eq!(OperationError::from(zero).code(), "not_found");

        let duplicate = StorageError::DuplicateCompletion {
            habit_id: "h1".to_string(),
            date: "2024-06-03".to_string(),
        };
        assert_eq!(OperationError::from(duplicate).code(), "already_exists");

        let deadline = OperationError::from(StorageError::DeadlineExceeded);
        assert_eq!(deadline.code(), "persistence_failure");
    }

    #[test]
    fn test_domain_errors_are_invalid_input() {
        let err = OperationError::from(DomainError::InvalidColor("red".to_string()));
        assert_eq!(err.code(), "invalid_input");
        assert!(err.to_string().contains("red"));
    }

    #[test]
    fn test_bad_ids_are_not_found() {
        assert!(matches!(
            parse_habit_id("not-a-uuid"),
            Err(OperationError::NotFound { entity: "habit", .. })
        ));
        assert!(parse_completion_id(&CompletionId::new().to_string()).is_ok());
    }

    #[test]
    fn test_context_today_is_utc_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 23, 30, 0).unwrap();
        let ctx = RequestContext::new(UserId::new("u")).with_now(now);
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    }
}
