/// Storage layer for persisting habit data
///
/// This module handles all database operations using SQLite. Operations run
/// against a [`HabitRepository`], which is only handed out inside a read
/// scope or an atomic transaction opened through [`HabitStorage`].

pub mod migrations;
pub mod sqlite;

// Re-export the main storage types
pub use sqlite::*;

use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Completion, CompletionId, Habit, HabitId, UserId};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No {entity} row matched id {id}")]
    ZeroRowsAffected { entity: &'static str, id: String },

    #[error("Duplicate completion: habit {habit_id} already completed on {date}")]
    DuplicateCompletion { habit_id: String, date: String },

    #[error("Transaction deadline exceeded")]
    DeadlineExceeded,

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Which completions a listing should return
///
/// Completions are always scoped to one user. Date bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionFilter {
    pub user_id: UserId,
    pub habit_id: Option<HabitId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl CompletionFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            habit_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

/// Row-level access to habits and completions
///
/// Every method runs on the connection or transaction the repository was
/// created for. Lookups report a missing row as `Ok(None)`; writes that
/// match no row report `ZeroRowsAffected`.
pub trait HabitRepository {
    fn find_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, StorageError>;

    /// Habits owned by `user_id`, newest first
    fn find_habits_by_user(&self, user_id: &UserId, active_only: bool) -> Result<Vec<Habit>, StorageError>;

    fn insert_habit(&self, habit: &Habit) -> Result<(), StorageError>;

    /// Write a habit's configuration fields; statistics are left alone
    fn update_habit(&self, habit: &Habit) -> Result<(), StorageError>;

    /// Delete a habit together with all of its completions
    fn delete_habit(&self, habit_id: &HabitId) -> Result<(), StorageError>;

    /// Write a habit's streaks, total completions and `updated_at`
    fn update_habit_stats(&self, habit: &Habit) -> Result<(), StorageError>;

    fn find_completion(&self, completion_id: &CompletionId) -> Result<Option<Completion>, StorageError>;

    fn find_completion_by_date(
        &self,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> Result<Option<Completion>, StorageError>;

    /// The latest completion date for a habit strictly before `date`
    fn latest_completion_date_before(
        &self,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> Result<Option<NaiveDate>, StorageError>;

    /// Insert a completion; a second one for the same habit and date is
    /// reported as `DuplicateCompletion`
    fn insert_completion(&self, completion: &Completion) -> Result<(), StorageError>;

    /// Write a completion's count and notes
    fn update_completion(&self, completion: &Completion) -> Result<(), StorageError>;

    fn delete_completion(&self, completion_id: &CompletionId) -> Result<(), StorageError>;

    /// Completions matching `filter`, newest completion date first
    fn list_completions(
        &self,
        filter: &CompletionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Completion>, StorageError>;

    fn count_completions(&self, filter: &CompletionFilter) -> Result<u64, StorageError>;
}

/// Trait defining how callers get at a [`HabitRepository`]
///
/// This trait allows us to potentially swap out SQLite for other databases
/// in the future while keeping the same interface.
pub trait HabitStorage {
    /// Run `f` inside one atomic transaction
    ///
    /// Everything `f` writes is committed together when it returns `Ok`, or
    /// rolled back when it returns `Err`. When `deadline` passes before the
    /// commit the transaction is rolled back and `DeadlineExceeded` is
    /// returned.
    fn transaction<T, E, F>(&self, deadline: Option<Instant>, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&dyn HabitRepository) -> Result<T, E>;

    /// Run read-only work against a consistent view of the data
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&dyn HabitRepository) -> Result<T, E>;
}

/// Fail fast when a deadline has already passed
pub(crate) fn check_deadline(deadline: Option<Instant>) -> Result<(), StorageError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(StorageError::DeadlineExceeded),
        _ => Ok(()),
    }
}
