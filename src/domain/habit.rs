/// Habit entity and related functionality
///
/// This module defines the core Habit struct that represents a user's habit
/// they want to track, its validation rules, and the statistics that
/// completions move (streaks and total completions).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    check_length, normalize_text, DomainError, Frequency, HabitId, TargetDaySchedule, UserId,
};

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_MOTIVATION_LENGTH: usize = 1000;
pub const MAX_CATEGORY_LENGTH: usize = 100;

/// Statistics derived from a habit's completions
///
/// Invariant: `best_streak >= current_streak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HabitStats {
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_completions: u32,
}

impl HabitStats {
    /// Build stats from stored values, lifting the best streak if needed
    pub fn new(current_streak: u32, best_streak: u32, total_completions: u32) -> Self {
        Self {
            current_streak,
            best_streak: best_streak.max(current_streak),
            total_completions,
        }
    }
}

/// A habit represents something the user wants to do regularly
///
/// Configuration fields are public and are re-checked with [`Habit::validate`]
/// after every edit. Identity, ownership and statistics can only change
/// through the methods below, which keep the streak invariant intact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Habit {
    /// Unique identifier for this habit
    id: HabitId,
    /// The user who owns this habit
    user_id: UserId,
    /// Display name (e.g., "Morning Run", "Read for 30min")
    pub name: String,
    pub description: Option<String>,
    /// Why the user wants to keep this habit
    pub motivation: Option<String>,
    pub category: Option<String>,
    /// Display color as `#RRGGBB`
    pub color: String,
    /// How often this habit should be performed
    pub frequency: Frequency,
    /// How many times per scheduled day the habit should be done
    pub target_count: u32,
    /// Which days the habit is expected on (interpreted per frequency)
    target_days: Option<TargetDaySchedule>,
    #[serde(flatten)]
    stats: HabitStats,
    /// Whether this habit is currently active (can be paused)
    pub is_active: bool,
    created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// Create a new habit with validation
    ///
    /// Statistics start at zero, the habit starts active and both timestamps
    /// are set to now. Optional text is trimmed and blank text is dropped.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: HabitId,
        user_id: UserId,
        name: &str,
        frequency: Frequency,
        target_count: u32,
        description: Option<&str>,
        motivation: Option<&str>,
        category: Option<&str>,
        target_days: Option<TargetDaySchedule>,
        color: &str,
    ) -> Result<Self, DomainError> {
        let now = Utc::now();
        let habit = Self {
            id,
            user_id,
            name: name.trim().to_string(),
            description: description.and_then(normalize_text),
            motivation: motivation.and_then(normalize_text),
            category: category.and_then(normalize_text),
            color: color.trim().to_string(),
            frequency,
            target_count,
            target_days,
            stats: HabitStats::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        habit.validate()?;
        Ok(habit)
    }

    /// Create a habit from existing data (used when loading from database)
    ///
    /// This constructor assumes data is already validated and is mainly used
    /// by the storage layer when loading habits from the database.
    #[allow(clippy::too_many_arguments)]
    pub fn from_existing(
        id: HabitId,
        user_id: UserId,
        name: String,
        description: Option<String>,
        motivation: Option<String>,
        category: Option<String>,
        color: String,
        frequency: Frequency,
        target_count: u32,
        target_days: Option<TargetDaySchedule>,
        stats: HabitStats,
        is_active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            description,
            motivation,
            category,
            color,
            frequency,
            target_count,
            target_days,
            stats: HabitStats::new(stats.current_streak, stats.best_streak, stats.total_completions),
            is_active,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &HabitId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn target_days(&self) -> Option<&TargetDaySchedule> {
        self.target_days.as_ref()
    }

    pub fn stats(&self) -> HabitStats {
        self.stats
    }

    pub fn current_streak(&self) -> u32 {
        self.stats.current_streak
    }

    pub fn best_streak(&self) -> u32 {
        self.stats.best_streak
    }

    pub fn total_completions(&self) -> u32 {
        self.stats.total_completions
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = normalize_text(description);
    }

    pub fn set_motivation(&mut self, motivation: &str) {
        self.motivation = normalize_text(motivation);
    }

    pub fn set_category(&mut self, category: &str) {
        self.category = normalize_text(category);
    }

    /// Replace the target-day schedule
    ///
    /// A new schedule must fit the habit's current frequency; on rejection
    /// the stored schedule is left as it was.
    pub fn set_target_days(&mut self, target_days: Option<TargetDaySchedule>) -> Result<(), DomainError> {
        if let Some(days) = &target_days {
            days.validate(self.frequency)?;
        }
        self.target_days = target_days;
        Ok(())
    }

    pub fn increment_streak(&mut self) {
        self.stats.current_streak = self.stats.current_streak.saturating_add(1);
        if self.stats.current_streak > self.stats.best_streak {
            self.stats.best_streak = self.stats.current_streak;
        }
    }

    /// Drop the current streak to zero; the best streak is kept
    pub fn reset_streak(&mut self) {
        self.stats.current_streak = 0;
    }

    pub fn increment_completions(&mut self, count: u32) {
        self.stats.total_completions = self.stats.total_completions.saturating_add(count);
    }

    /// Remove `count` from the total, never going below zero
    pub fn decrement_completions(&mut self, count: u32) {
        self.stats.total_completions = self.stats.total_completions.saturating_sub(count);
    }

    /// Shift the total by the change in one completion's count
    pub fn adjust_completions(&mut self, previous_count: u32, new_count: u32) {
        if new_count >= previous_count {
            self.increment_completions(new_count - previous_count);
        } else {
            self.decrement_completions(previous_count - new_count);
        }
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Bump the modification timestamp
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Whether the habit is expected on the given date
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        match &self.target_days {
            Some(days) => days.includes(self.frequency, date),
            None => true,
        }
    }

    /// Check every rule a habit must satisfy
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_nil() {
            return Err(DomainError::MissingField("id"));
        }
        if self.user_id.is_empty() {
            return Err(DomainError::MissingField("user ID"));
        }
        Self::validate_name(&self.name)?;
        check_length("Description", self.description.as_deref(), MAX_DESCRIPTION_LENGTH)?;
        check_length("Motivation", self.motivation.as_deref(), MAX_MOTIVATION_LENGTH)?;
        check_length("Category", self.category.as_deref(), MAX_CATEGORY_LENGTH)?;
        if self.target_count == 0 {
            return Err(DomainError::InvalidValue {
                message: "Target count must be positive".to_string(),
            });
        }
        if !is_valid_color(&self.color) {
            return Err(DomainError::InvalidColor(self.color.clone()));
        }
        if let Some(days) = &self.target_days {
            days.validate(self.frequency)?;
        }
        Ok(())
    }

    fn validate_name(name: &str) -> Result<(), DomainError> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidHabitName(
                "Habit name cannot be empty".to_string(),
            ));
        }

        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(DomainError::InvalidHabitName(format!(
                "Habit name cannot be longer than {} characters",
                MAX_NAME_LENGTH
            )));
        }

        Ok(())
    }
}

/// `#RRGGBB` with hexadecimal digits
pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}
