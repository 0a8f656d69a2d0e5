/// Schema migrations for the habit database
///
/// Migrations are numbered and applied in order; the highest applied
/// number is kept in `schema_version`.

use rusqlite::Connection;

use crate::storage::StorageError;

/// Schema version this build writes
pub(crate) const CURRENT_VERSION: i32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]
///
/// Safe to call on every open. A database written by a newer build is
/// refused rather than modified.
pub fn initialize_database(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let current_version = get_current_version(conn)?;

    if current_version > CURRENT_VERSION {
        return Err(StorageError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current_version, CURRENT_VERSION
        )));
    }

    if current_version < CURRENT_VERSION {
        run_migrations(conn, current_version)?;
        set_version(conn, CURRENT_VERSION)?;
    }

    Ok(())
}

/// Get the current database schema version (0 for a fresh database)
pub(crate) fn get_current_version(conn: &Connection) -> Result<i32, StorageError> {
    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

fn set_version(conn: &Connection, version: i32) -> Result<(), StorageError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Run database migrations from the current version to the latest
fn run_migrations(conn: &Connection, from_version: i32) -> Result<(), StorageError> {
    if from_version < 1 {
        migration_v1(conn)?;
    }

    Ok(())
}

/// Migration to version 1: habits and their completions
///
/// Habit statistics live on the habit row so a completion write and the
/// matching stats update can share one transaction.
fn migration_v1(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS habits (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            motivation TEXT,
            category TEXT,
            color TEXT NOT NULL,
            frequency TEXT NOT NULL,
            target_count INTEGER NOT NULL DEFAULT 1,
            target_days TEXT,
            current_streak INTEGER NOT NULL DEFAULT 0,
            best_streak INTEGER NOT NULL DEFAULT 0,
            total_completions INTEGER NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS habit_completions (
            id TEXT PRIMARY KEY,
            habit_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            completion_date TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 1,
            notes TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (habit_id) REFERENCES habits (id) ON DELETE CASCADE
        );",
    )?;

    create_indexes_v1(conn)?;

    tracing::info!("Applied migration v1: Created initial database schema");
    Ok(())
}

fn create_indexes_v1(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_habits_user ON habits (user_id, is_active);

        -- One completion per habit per day
        CREATE UNIQUE INDEX IF NOT EXISTS idx_habit_completions_habit_date
            ON habit_completions (habit_id, completion_date);

        CREATE INDEX IF NOT EXISTS idx_habit_completions_user_date
            ON habit_completions (user_id, completion_date);",
    )?;

    tracing::info!("Created database indexes for v1");
    Ok(())
}
