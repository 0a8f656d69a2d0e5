/// Public library interface for the Habit Tracker server
///
/// This module exports the main server implementation and public types
/// that can be used by other applications or tests.

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod mcp;
pub mod operations;
pub mod storage;
pub mod tools;

// Re-export public modules and types
pub use config::{DatabaseLocation, ServerConfig};
pub use domain::*;
pub use operations::{OperationError, RequestContext};
pub use storage::{HabitRepository, HabitStorage, SqliteStorage, StorageError};

/// Errors that can occur during server operation
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] storage::StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation failed: {0}")]
    Operation(#[from] operations::OperationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main habit tracker server
///
/// Owns the SQLite storage and the configuration every request is run
/// with, and exposes the habit and completion operations over MCP.
pub struct HabitTrackerServer {
    storage: SqliteStorage,
    config: ServerConfig,
}

impl HabitTrackerServer {
    /// Create a new habit tracker server from its configuration
    ///
    /// This will initialize the SQLite database with the required schema
    /// if it doesn't already exist.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;
        tracing::info!("Initializing Habit Tracker server with database: {:?}", config.database);

        let storage = match &config.database {
            DatabaseLocation::File(path) => SqliteStorage::new(path)?,
            DatabaseLocation::InMemory => SqliteStorage::in_memory()?,
        };

        Ok(Self { storage, config })
    }

    /// Run the MCP server, handling JSON-RPC requests over stdin/stdout
    ///
    /// This method will block until stdin is closed or an error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        let habits = operations::list_habits(&self.storage, &self.request_context(), true)?;
        tracing::info!(
            "Server started for user {}, found {} active habits",
            self.config.user_id,
            habits.len()
        );

        let mut mcp_server = mcp::McpServer::new(self);
        mcp_server.run().await?;

        Ok(())
    }

    /// Get a reference to the storage layer (useful for testing)
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Context for one request, acting as the configured user
    pub fn request_context(&self) -> RequestContext {
        self.config.request_context()
    }
}
