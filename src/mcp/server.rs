/// MCP server implementation that handles JSON-RPC communication
///
/// This module implements the actual MCP server that:
/// 1. Reads JSON-RPC requests from stdin, one per line
/// 2. Dispatches tool calls to the habit and completion tools
/// 3. Sends JSON-RPC responses to stdout

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::mcp::protocol::*;
use crate::operations::{OperationError, RequestContext};
use crate::storage::SqliteStorage;
use crate::tools::{self, ToolResponse};
use crate::{HabitTrackerServer, ServerError};

/// Name and description of every tool, in the order `tools/list` reports them
const TOOLS: &[(&str, &str)] = &[
    ("habit_create", "Create a new habit to track"),
    ("habit_get", "Show one habit with its streaks and total completions"),
    ("habit_list", "List your habits with their streaks and totals"),
    ("habit_update", "Change a habit's settings, or pause and resume it"),
    ("habit_delete", "Delete a habit together with all of its completions"),
    ("completion_create", "Log that a habit was done today or on a specific date"),
    ("completion_get", "Show one logged completion"),
    ("completion_list", "List logged completions, newest first, optionally by habit and date range"),
    ("completion_update", "Change a logged completion's count or notes"),
    ("completion_delete", "Remove a logged completion"),
];

/// MCP server that handles communication with the client
pub struct McpServer {
    /// The underlying habit tracker server
    habit_tracker: HabitTrackerServer,
    /// Whether the client has confirmed initialization
    initialized: bool,
}

impl McpServer {
    pub fn new(habit_tracker: HabitTrackerServer) -> Self {
        Self {
            habit_tracker,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the MCP server, handling JSON-RPC over stdin/stdout
    pub async fn run(&mut self) -> Result<(), ServerError> {
        info!("Starting MCP server, waiting for JSON-RPC requests...");

        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin);
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();

        loop {
            line.clear();

            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("MCP server shutting down (stdin closed)");
                    break;
                }
                Ok(_) => {
                    if let Some(response) = self.process_line(&line).await {
                        let response_str = serde_json::to_string(&response)?;

                        stdout.write_all(response_str.as_bytes()).await?;
                        stdout.write_all(b"\n").await?;
                        stdout.flush().await?;

                        debug!("Sent response: {}", response_str);
                    }
                }
                Err(e) => {
                    error!("Failed to read from stdin: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Process a single line of JSON-RPC input
    ///
    /// Returns `None` for blank lines and notifications.
    pub async fn process_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        debug!("Processing request: {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse JSON-RPC request: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Invalid JSON: {}", e),
                    None,
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                error_codes::INVALID_REQUEST,
                format!("Unsupported JSON-RPC version '{}'", request.jsonrpc),
                None,
            ));
        }

        if request.is_notification() {
            self.handle_notification(&request.method);
            return None;
        }

        Some(self.handle_request(request).await)
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                self.initialized = true;
                info!("MCP client finished initialization");
            }
            other => debug!("Ignoring notification '{}'", other),
        }
    }

    async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id).await,
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id).await,
            "tools/call" => self.handle_tools_call(id, request.params).await,
            _ => JsonRpcResponse::error(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method '{}' not found", request.method),
                None,
            ),
        }
    }

    async fn handle_initialize(&mut self, id: Value) -> JsonRpcResponse {
        info!("MCP client connected");

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: "Habit Tracker".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        to_response(id, &result)
    }

    async fn handle_tools_list(&mut self, id: Value) -> JsonRpcResponse {
        let tools: Vec<ToolDefinition> = TOOLS
            .iter()
            .map(|(name, description)| ToolDefinition {
                name: name.to_string(),
                description: description.to_string(),
                input_schema: input_schema_for(name),
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&mut self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let tool_params: ToolCallParams = match params.map(serde_json::from_value) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid parameters: {}", e),
                    None,
                );
            }
            None => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    "Missing parameters".to_string(),
                    None,
                );
            }
        };

        let args = tool_params.arguments;
        let result = match tool_params.name.as_str() {
            "habit_create" => self.call_tool(args, tools::habit_create),
            "habit_get" => self.call_tool(args, tools::habit_get),
            "habit_list" => self.call_tool(args, tools::habit_list),
            "habit_update" => self.call_tool(args, tools::habit_update),
            "habit_delete" => self.call_tool(args, tools::habit_delete),
            "completion_create" => self.call_tool(args, tools::completion_create),
            "completion_get" => self.call_tool(args, tools::completion_get),
            "completion_list" => self.call_tool(args, tools::completion_list),
            "completion_update" => self.call_tool(args, tools::completion_update),
            "completion_delete" => self.call_tool(args, tools::completion_delete),
            other => ToolCallResult::error("unknown_tool", format!("Unknown tool: {}", other)),
        };

        to_response(id, &result)
    }

    /// Decode a tool's arguments and run it as the configured user
    fn call_tool<P, F>(&self, args: Map<String, Value>, tool: F) -> ToolCallResult
    where
        P: DeserializeOwned,
        F: FnOnce(&SqliteStorage, &RequestContext, P) -> Result<ToolResponse, OperationError>,
    {
        let params: P = match serde_json::from_value(Value::Object(args)) {
            Ok(params) => params,
            Err(e) => {
                return ToolCallResult::error("invalid_input", format!("Invalid arguments: {}", e));
            }
        };

        let ctx = self.habit_tracker.request_context();
        match tool(self.habit_tracker.storage(), &ctx, params) {
            Ok(response) => ToolCallResult::success(response.render()),
            Err(err) => {
                warn!("Tool call failed ({}): {}", err.code(), err);
                ToolCallResult::from_operation_error(&err)
            }
        }
    }
}

fn input_schema_for(name: &str) -> Value {
    match name {
        "habit_create" => tools::input_schema::<tools::CreateHabitParams>(),
        "habit_get" | "habit_delete" => tools::input_schema::<tools::HabitIdParams>(),
        "habit_list" => tools::input_schema::<tools::ListHabitsParams>(),
        "habit_update" => tools::input_schema::<tools::UpdateHabitParams>(),
        "completion_create" => tools::input_schema::<tools::CreateCompletionParams>(),
        "completion_get" | "completion_delete" => tools::input_schema::<tools::CompletionIdParams>(),
        "completion_list" => tools::input_schema::<tools::ListCompletionsParams>(),
        "completion_update" => tools::input_schema::<tools::UpdateCompletionParams>(),
        _ => json!({ "type": "object" }),
    }
}

fn to_response(id: Value, result: &impl serde::Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            id,
            error_codes::INTERNAL_ERROR,
            format!("Failed to encode result: {}", e),
            None,
        ),
    }
}
