/// Server configuration
///
/// Everything the server needs is gathered into one [`ServerConfig`] at
/// startup and passed in explicitly; nothing is read from the environment
/// after that.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{StreakPolicy, UserId};
use crate::operations::RequestContext;

/// User that requests are attributed to when none is configured
pub const DEFAULT_USER_ID: &str = "local";

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Throwaway database, gone when the process exits
    InMemory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database: DatabaseLocation,
    /// The identity every tool call acts as
    pub user_id: UserId,
    pub streak_policy: StreakPolicy,
    /// Upper bound on how long one operation may take before its
    /// transaction is rolled back
    pub request_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn new(database: DatabaseLocation) -> Self {
        Self {
            database,
            user_id: UserId::new(DEFAULT_USER_ID),
            streak_policy: StreakPolicy::default(),
            request_timeout: None,
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_streak_policy(mut self, policy: StreakPolicy) -> Self {
        self.streak_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.is_empty() {
            return Err("user ID cannot be empty".to_string());
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err("request timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    /// A fresh context for one incoming request
    pub fn request_context(&self) -> RequestContext {
        let ctx = RequestContext::new(self.user_id.clone()).with_streak_policy(self.streak_policy);
        match self.request_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}
