/// Main entry point for the Habit Tracker MCP server
///
/// This file sets up logging, parses command line arguments, and starts the MCP server.
/// The server listens for JSON-RPC requests over stdin/stdout following the MCP protocol.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use habit_tracker::config::DEFAULT_USER_ID;
use habit_tracker::{DatabaseLocation, HabitTrackerServer, ServerConfig, StreakPolicy, UserId};

/// Get the default database path with robust fallback strategy
fn get_default_database_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    // Try various locations in order of preference
    let potential_paths = [
        dirs::home_dir().map(|p| p.join(".habit_tracker")),
        dirs::data_dir().map(|p| p.join("habit_tracker")),
        dirs::config_dir().map(|p| p.join("habit_tracker")),
        std::env::current_dir().ok().map(|p| p.join(".habit_tracker")),
    ];

    for potential_path in potential_paths.iter().flatten() {
        if std::fs::create_dir_all(potential_path).is_ok() {
            // Make sure the directory is actually writable
            let test_file = potential_path.join(".test_write");
            if std::fs::write(&test_file, "test").is_ok() {
                let _ = std::fs::remove_file(&test_file);
                return Ok(potential_path.join("habits.db"));
            }
        }
    }

    // Ultimate fallback: use a temporary directory
    let temp_path = std::env::temp_dir().join("habit_tracker");
    std::fs::create_dir_all(&temp_path)?;

    tracing::warn!("Using temporary directory for database: {}", temp_path.display());
    Ok(temp_path.join("habits.db"))
}

/// Command line arguments for the Habit Tracker MCP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite database file
    /// If not provided, uses a default location in the user's home directory
    #[arg(long, env = "HABIT_TRACKER_DB")]
    database: Option<PathBuf>,

    /// Keep all data in memory; nothing survives the process
    #[arg(long, conflicts_with = "database")]
    in_memory: bool,

    /// User that every tool call acts as
    #[arg(long, env = "HABIT_TRACKER_USER_ID", default_value = DEFAULT_USER_ID)]
    user_id: String,

    /// Streak rule: recent-day or consecutive
    #[arg(long, env = "HABIT_TRACKER_STREAK_POLICY", default_value_t = StreakPolicy::RecentDay)]
    streak_policy: StreakPolicy,

    /// Roll back any operation still running after this many milliseconds
    #[arg(long, env = "HABIT_TRACKER_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    // RUST_LOG wins over the command line flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("habit_tracker={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // Send logs to stderr, not stdout
        .init();

    info!("Starting Habit Tracker MCP server");

    let database = if args.in_memory {
        DatabaseLocation::InMemory
    } else {
        let db_path = match args.database {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                path
            }
            None => get_default_database_path()?,
        };
        info!("Using database at: {}", db_path.display());
        DatabaseLocation::File(db_path)
    };

    let config = ServerConfig::new(database)
        .with_user_id(UserId::new(args.user_id.trim()))
        .with_streak_policy(args.streak_policy)
        .with_request_timeout(args.timeout_ms.map(Duration::from_millis));

    let server = HabitTrackerServer::new(config).await?;

    // Handles JSON-RPC over stdin/stdout until stdin closes
    server.run().await?;

    info!("Habit Tracker MCP server shutdown complete");
    Ok(())
}
