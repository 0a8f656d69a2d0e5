/// MCP tools for habit management
///
/// This module contains all the MCP tools that external clients can call to
/// interact with the habit tracker. Each tool takes a typed parameter struct
/// (whose JSON schema is advertised through `tools/list`) and turns it into
/// an operation call.

pub mod completion;
pub mod habit;

pub use completion::*;
pub use habit::*;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

/// What a tool hands back on success
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    /// Short human-readable summary
    pub message: String,
    /// The affected entity or listing, as JSON
    pub data: Value,
}

impl ToolResponse {
    /// A summary plus its data; data that fails to serialize is logged and
    /// left out, so the summary still reaches the client
    pub fn new(message: impl Into<String>, data: &impl Serialize) -> Self {
        let message = message.into();
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to serialize data for '{}': {}", message, e);
                Value::Null
            }
        };
        Self { message, data }
    }

    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Text sent back to the client: the summary, then the data
    pub fn render(&self) -> String {
        if self.data.is_null() {
            return self.message.clone();
        }
        match serde_json::to_string_pretty(&self.data) {
            Ok(data) => format!("{}\n\n{}", self.message, data),
            Err(e) => {
                tracing::error!("Failed to render tool data: {}", e);
                self.message.clone()
            }
        }
    }
}

/// JSON schema describing a tool's parameters
pub fn input_schema<P: JsonSchema>() -> Value {
    match serde_json::to_value(schemars::schema_for!(P)) {
        Ok(schema) => schema,
        Err(e) => {
            tracing::error!("Failed to build input schema: {}", e);
            Value::Null
        }
    }
}
