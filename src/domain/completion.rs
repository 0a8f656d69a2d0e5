/// Completion entity for tracking habit completions
///
/// A completion records that a habit was performed on a given calendar day,
/// how many times, and optional notes. It points at its habit by id only;
/// the habit never holds its completions in memory.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{check_length, normalize_text, CompletionId, DomainError, HabitId, UserId};

pub const MAX_NOTES_LENGTH: usize = 1000;

/// Date format accepted for completion dates (`YYYY-MM-DD`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A record of completing a habit on a specific day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Unique identifier for this completion
    pub id: CompletionId,
    /// Which habit this completion is for
    pub habit_id: HabitId,
    /// Who recorded it; always the owner of the habit
    pub user_id: UserId,
    /// When the record was made
    pub completed_at: DateTime<Utc>,
    /// Which day the completion counts for (can differ from completed_at)
    pub completion_date: NaiveDate,
    /// How many times the habit was done that day
    pub count: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Completion {
    /// Create a new completion with validation
    ///
    /// `completed_at` and `created_at` are both set to the current time.
    pub fn new(
        id: CompletionId,
        habit_id: HabitId,
        user_id: UserId,
        completion_date: NaiveDate,
        count: u32,
        notes: Option<&str>,
    ) -> Result<Self, DomainError> {
        let now = Utc::now();
        let completion = Self {
            id,
            habit_id,
            user_id,
            completed_at: now,
            completion_date,
            count,
            notes: notes.and_then(normalize_text),
            created_at: now,
        };

        completion.validate()?;
        Ok(completion)
    }

    /// Create a completion from existing data (used when loading from database)
    #[allow(clippy::too_many_arguments)]
    pub fn from_existing(
        id: CompletionId,
        habit_id: HabitId,
        user_id: UserId,
        completed_at: DateTime<Utc>,
        completion_date: NaiveDate,
        count: u32,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            habit_id,
            user_id,
            completed_at,
            completion_date,
            count,
            notes,
            created_at,
        }
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.notes = normalize_text(notes);
    }

    pub fn has_notes(&self) -> bool {
        self.notes.is_some()
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Check every rule a completion must satisfy
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_nil() {
            return Err(DomainError::MissingField("id"));
        }
        if self.habit_id.is_nil() {
            return Err(DomainError::MissingField("habit ID"));
        }
        if self.user_id.is_empty() {
            return Err(DomainError::MissingField("user ID"));
        }
        if self.count == 0 {
            return Err(DomainError::InvalidValue {
                message: "Count must be positive".to_string(),
            });
        }
        check_length("Notes", self.notes.as_deref(), MAX_NOTES_LENGTH)?;
        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` calendar date
pub fn parse_date(input: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| {
        DomainError::InvalidDate(format!("'{}' is not a YYYY-MM-DD date", input))
    })
}
