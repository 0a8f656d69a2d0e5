/// Domain module containing core business logic and data types
///
/// This module defines the core entities (Habit, Completion) along with the
/// target-day schedule and streak policy that govern how completions move a
/// habit's statistics.

pub mod completion;
pub mod habit;
pub mod schedule;
pub mod streak;
pub mod types;

// Re-export public types for easy access
pub use completion::*;
pub use habit::*;
pub use schedule::*;
pub use streak::*;
pub use types::*;

use thiserror::Error;

/// Errors that can occur during domain operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid habit name: {0}")]
    InvalidHabitName(String),

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),
}

/// Normalize optional free text: trimmed, or absent when blank
pub(crate) fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reject text longer than `max` characters
pub(crate) fn check_length(field: &str, text: Option<&str>, max: usize) -> Result<(), DomainError> {
    match text {
        Some(value) if value.chars().count() > max => Err(DomainError::Validation {
            message: format!("{} cannot be longer than {} characters", field, max),
        }),
        _ => Ok(()),
    }
}
