/// SQLite implementation of the habit storage interface
///
/// This module provides the concrete SQLite implementation for storing
/// and retrieving habit data. It handles all SQL queries and data conversion.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::domain::{
    Completion, CompletionId, Frequency, Habit, HabitId, HabitStats, TargetDaySchedule, UserId,
    DATE_FORMAT,
};
use crate::storage::{
    check_deadline, migrations, CompletionFilter, HabitRepository, HabitStorage, StorageError,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const HABIT_COLUMNS: &str = "id, user_id, name, description, motivation, category, color, \
     frequency, target_count, target_days, current_streak, best_streak, total_completions, \
     is_active, created_at, updated_at";

const COMPLETION_COLUMNS: &str =
    "id, habit_id, user_id, completed_at, completion_date, count, notes, created_at";

/// SQLite-based storage implementation
///
/// A single connection guarded by a mutex; every read scope and
/// transaction holds the lock for its whole duration.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    ///
    /// This opens the database file and runs any necessary migrations
    /// to ensure the schema is up to date.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;

        let storage = Self::from_connection(conn)?;
        tracing::info!("SQLite storage initialized at: {:?}", db_path);
        Ok(storage)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(|e| StorageError::Connection(format!("Failed to enable foreign keys: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::initialize_database(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Connection("database connection lock poisoned".to_string()))
    }
}

impl HabitStorage for SqliteStorage {
    fn transaction<T, E, F>(&self, deadline: Option<Instant>, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&dyn HabitRepository) -> Result<T, E>,
    {
        check_deadline(deadline)?;

        let mut conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so concurrent writers
        // touching the same habit queue up instead of interleaving
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        // Dropping `tx` without committing rolls everything back
        let value = f(&SqliteRepository::new(&tx))?;

        if let Err(err) = check_deadline(deadline) {
            tracing::warn!("Rolling back transaction: deadline exceeded");
            return Err(err.into());
        }

        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }

    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&dyn HabitRepository) -> Result<T, E>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StorageError::from)?;
        let value = f(&SqliteRepository::new(&tx))?;
        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }
}

/// [`HabitRepository`] over one SQLite connection or open transaction
pub struct SqliteRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query_habits(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Habit>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, HabitRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(HabitRow::into_habit).collect()
    }

    fn query_completions(&self, sql: &str, values: &[Value]) -> Result<Vec<Completion>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), CompletionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(CompletionRow::into_completion).collect()
    }
}

impl HabitRepository for SqliteRepository<'_> {
    fn find_habit(&self, habit_id: &HabitId) -> Result<Option<Habit>, StorageError> {
        let sql = format!("SELECT {} FROM habits WHERE id = ?1", HABIT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![habit_id.to_string()], HabitRow::from_row)
            .optional()?;

        row.map(HabitRow::into_habit).transpose()
    }

    fn find_habits_by_user(&self, user_id: &UserId, active_only: bool) -> Result<Vec<Habit>, StorageError> {
        let mut sql = format!("SELECT {} FROM habits WHERE user_id = ?1", HABIT_COLUMNS);

        if active_only {
            sql.push_str(" AND is_active = 1");
        }

        sql.push_str(" ORDER BY created_at DESC, id");

        self.query_habits(&sql, &[&user_id.as_str()])
    }

    fn insert_habit(&self, habit: &Habit) -> Result<(), StorageError> {
        let target_days = encode_target_days(habit.target_days())?;
        let stats = habit.stats();

        self.conn.execute(
            &format!(
                "INSERT INTO habits ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                HABIT_COLUMNS
            ),
            params![
                habit.id().to_string(),
                habit.user_id().as_str(),
                habit.name,
                habit.description,
                habit.motivation,
                habit.category,
                habit.color,
                habit.frequency.as_str(),
                habit.target_count,
                target_days,
                stats.current_streak,
                stats.best_streak,
                stats.total_completions,
                habit.is_active,
                format_timestamp(habit.created_at()),
                format_timestamp(habit.updated_at),
            ],
        )?;

        tracing::debug!("Created habit: {} ({})", habit.name, habit.id());
        Ok(())
    }

    fn update_habit(&self, habit: &Habit) -> Result<(), StorageError> {
        let target_days = encode_target_days(habit.target_days())?;

        let rows_affected = self.conn.execute(
            "UPDATE habits SET
                name = ?2,
                description = ?3,
                motivation = ?4,
                category = ?5,
                color = ?6,
                frequency = ?7,
                target_count = ?8,
                target_days = ?9,
                is_active = ?10,
                updated_at = ?11
             WHERE id = ?1",
            params![
                habit.id().to_string(),
                habit.name,
                habit.description,
                habit.motivation,
                habit.category,
                habit.color,
                habit.frequency.as_str(),
                habit.target_count,
                target_days,
                habit.is_active,
                format_timestamp(habit.updated_at),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StorageError::ZeroRowsAffected {
                entity: "habit",
                id: habit.id().to_string(),
            });
        }

        tracing::debug!("Updated habit: {} ({})", habit.name, habit.id());
        Ok(())
    }

    fn delete_habit(&self, habit_id: &HabitId) -> Result<(), StorageError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM habits WHERE id = ?1", params![habit_id.to_string()])?;

        if rows_affected == 0 {
            return Err(StorageError::ZeroRowsAffected {
                entity: "habit",
                id: habit_id.to_string(),
            });
        }

        tracing::debug!("Deleted habit: {}", habit_id);
        Ok(())
    }

    fn update_habit_stats(&self, habit: &Habit) -> Result<(), StorageError> {
        let stats = habit.stats();
        let rows_affected = self.conn.execute(
            "UPDATE habits SET
                current_streak = ?2,
                best_streak = ?3,
                total_completions = ?4,
                updated_at = ?5
             WHERE id = ?1",
            params![
                habit.id().to_string(),
                stats.current_streak,
                stats.best_streak,
                stats.total_completions,
                format_timestamp(habit.updated_at),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StorageError::ZeroRowsAffected {
                entity: "habit",
                id: habit.id().to_string(),
            });
        }

        tracing::debug!(
            "Updated stats for habit {}: streak {}/{}, total {}",
            habit.id(),
            stats.current_streak,
            stats.best_streak,
            stats.total_completions
        );
        Ok(())
    }

    fn find_completion(&self, completion_id: &CompletionId) -> Result<Option<Completion>, StorageError> {
        let sql = format!("SELECT {} FROM habit_completions WHERE id = ?1", COMPLETION_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![completion_id.to_string()], CompletionRow::from_row)
            .optional()?;

        row.map(CompletionRow::into_completion).transpose()
    }

    fn find_completion_by_date(
        &self,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> Result<Option<Completion>, StorageError> {
        let sql = format!(
            "SELECT {} FROM habit_completions WHERE habit_id = ?1 AND completion_date = ?2",
            COMPLETION_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![habit_id.to_string(), format_date(date)], CompletionRow::from_row)
            .optional()?;

        row.map(CompletionRow::into_completion).transpose()
    }

    fn latest_completion_date_before(
        &self,
        habit_id: &HabitId,
        date: NaiveDate,
    ) -> Result<Option<NaiveDate>, StorageError> {
        let latest: Option<String> = self.conn.query_row(
            "SELECT MAX(completion_date) FROM habit_completions
             WHERE habit_id = ?1 AND completion_date < ?2",
            params![habit_id.to_string(), format_date(date)],
            |row| row.get(0),
        )?;

        latest.map(|value| parse_date_column("completion_date", &value)).transpose()
    }

    fn insert_completion(&self, completion: &Completion) -> Result<(), StorageError> {
        let result = self.conn.execute(
            &format!(
                "INSERT INTO habit_completions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                COMPLETION_COLUMNS
            ),
            params![
                completion.id.to_string(),
                completion.habit_id.to_string(),
                completion.user_id.as_str(),
                format_timestamp(completion.completed_at),
                format_date(completion.completion_date),
                completion.count,
                completion.notes,
                format_timestamp(completion.created_at),
            ],
        );

        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(StorageError::DuplicateCompletion {
                    habit_id: completion.habit_id.to_string(),
                    date: format_date(completion.completion_date),
                });
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(
            "Created completion {} for habit {} on {}",
            completion.id,
            completion.habit_id,
            completion.completion_date
        );
        Ok(())
    }

    fn update_completion(&self, completion: &Completion) -> Result<(), StorageError> {
        let rows_affected = self.conn.execute(
            "UPDATE habit_completions SET count = ?2, notes = ?3 WHERE id = ?1",
            params![completion.id.to_string(), completion.count, completion.notes],
        )?;

        if rows_affected == 0 {
            return Err(StorageError::ZeroRowsAffected {
                entity: "completion",
                id: completion.id.to_string(),
            });
        }

        tracing::debug!("Updated completion: {}", completion.id);
        Ok(())
    }

    fn delete_completion(&self, completion_id: &CompletionId) -> Result<(), StorageError> {
        let rows_affected = self.conn.execute(
            "DELETE FROM habit_completions WHERE id = ?1",
            params![completion_id.to_string()],
        )?;

        if rows_affected == 0 {
            return Err(StorageError::ZeroRowsAffected {
                entity: "completion",
                id: completion_id.to_string(),
            });
        }

        tracing::debug!("Deleted completion: {}", completion_id);
        Ok(())
    }

    fn list_completions(
        &self,
        filter: &CompletionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Completion>, StorageError> {
        let (clause, mut values) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM habit_completions{} ORDER BY completion_date DESC, created_at DESC LIMIT ? OFFSET ?",
            COMPLETION_COLUMNS, clause
        );
        values.push(Value::Integer(i64::from(limit)));
        values.push(Value::Integer(i64::from(offset)));

        self.query_completions(&sql, &values)
    }

    fn count_completions(&self, filter: &CompletionFilter) -> Result<u64, StorageError> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM habit_completions{}", clause);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Build the WHERE clause and its bound values for a completion filter
fn filter_clause(filter: &CompletionFilter) -> (String, Vec<Value>) {
    let mut clause = String::from(" WHERE user_id = ?");
    let mut values = vec![Value::Text(filter.user_id.as_str().to_string())];

    if let Some(habit_id) = &filter.habit_id {
        clause.push_str(" AND habit_id = ?");
        values.push(Value::Text(habit_id.to_string()));
    }
    if let Some(start) = filter.start_date {
        clause.push_str(" AND completion_date >= ?");
        values.push(Value::Text(format_date(start)));
    }
    if let Some(end) = filter.end_date {
        clause.push_str(" AND completion_date <= ?");
        values.push(Value::Text(format_date(end)));
    }

    (clause, values)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Raw column values of a `habits` row
struct HabitRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    motivation: Option<String>,
    category: Option<String>,
    color: String,
    frequency: String,
    target_count: u32,
    target_days: Option<String>,
    current_streak: u32,
    best_streak: u32,
    total_completions: u32,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl HabitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            motivation: row.get(4)?,
            category: row.get(5)?,
            color: row.get(6)?,
            frequency: row.get(7)?,
            target_count: row.get(8)?,
            target_days: row.get(9)?,
            current_streak: row.get(10)?,
            best_streak: row.get(11)?,
            total_completions: row.get(12)?,
            is_active: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }

    fn into_habit(self) -> Result<Habit, StorageError> {
        let id = HabitId::from_string(&self.id)
            .map_err(|e| StorageError::Corrupt(format!("habit id '{}': {}", self.id, e)))?;
        let frequency: Frequency = self
            .frequency
            .parse()
            .map_err(|e| StorageError::Corrupt(format!("habit {} frequency: {}", id, e)))?;
        let target_days = self
            .target_days
            .as_deref()
            .map(|json| serde_json::from_str::<TargetDaySchedule>(json))
            .transpose()?;

        Ok(Habit::from_existing(
            id,
            UserId::new(self.user_id),
            self.name,
            self.description,
            self.motivation,
            self.category,
            self.color,
            frequency,
            self.target_count,
            target_days,
            HabitStats::new(self.current_streak, self.best_streak, self.total_completions),
            self.is_active,
            parse_timestamp("created_at", &self.created_at)?,
            parse_timestamp("updated_at", &self.updated_at)?,
        ))
    }
}

/// Raw column values of a `habit_completions` row
struct CompletionRow {
    id: String,
    habit_id: String,
    user_id: String,
    completed_at: String,
    completion_date: String,
    count: u32,
    notes: Option<String>,
    created_at: String,
}

impl CompletionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            habit_id: row.get(1)?,
            user_id: row.get(2)?,
            completed_at: row.get(3)?,
            completion_date: row.get(4)?,
            count: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_completion(self) -> Result<Completion, StorageError> {
        let id = CompletionId::from_string(&self.id)
            .map_err(|e| StorageError::Corrupt(format!("completion id '{}': {}", self.id, e)))?;
        let habit_id = HabitId::from_string(&self.habit_id)
            .map_err(|e| StorageError::Corrupt(format!("completion {} habit id: {}", id, e)))?;

        Ok(Completion::from_existing(
            id,
            habit_id,
            UserId::new(self.user_id),
            parse_timestamp("completed_at", &self.completed_at)?,
            parse_date_column("completion_date", &self.completion_date)?,
            self.count,
            self.notes,
            parse_timestamp("created_at", &self.created_at)?,
        ))
    }
}

fn encode_target_days(target_days: Option<&TargetDaySchedule>) -> Result<Option<String>, StorageError> {
    Ok(target_days.map(serde_json::to_string).transpose()?)
}

/// Fixed-width RFC 3339 so stored timestamps sort as text
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("{} '{}': {}", column, value, e)))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date_column(column: &str, value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StorageError::Corrupt(format!("{} '{}': {}", column, value, e)))
}
