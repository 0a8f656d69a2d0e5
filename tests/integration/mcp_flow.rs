/// JSON-RPC lines in, JSON-RPC responses out
use habit_tracker::mcp::McpServer;
use habit_tracker::*;
use serde_json::{json, Value};

async fn mcp_server() -> McpServer {
    let config = ServerConfig::new(DatabaseLocation::InMemory);
    let server = HabitTrackerServer::new(config).await.expect("Failed to create server");
    McpServer::new(server)
}

async fn call(server: &mut McpServer, id: u64, name: &str, arguments: Value) -> (bool, String) {
    let line = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
    .to_string();

    let response = server.process_line(&line).await.expect("tool calls get a response");
    assert_eq!(response.id, json!(id));
    let result = response.result.expect("tool failures are reported as results");
    let text = result["content"][0]["text"].as_str().unwrap_or_default().to_string();
    (result["isError"].as_bool().unwrap_or(false), text)
}

/// The JSON document that follows a successful tool's summary line(s)
fn payload(text: &str) -> Value {
    let (_, data) = text.split_once("\n\n").expect("tool output carries data");
    serde_json::from_str(data).expect("data is JSON")
}

#[tokio::test]
async fn test_handshake_and_tool_listing() {
    let mut server = mcp_server().await;

    let response = server
        .process_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["serverInfo"]["name"], json!("Habit Tracker"));
    assert!(result.get("protocolVersion").is_some());

    let ack = server
        .process_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    assert!(ack.is_none());
    assert!(server.is_initialized());

    let response = server
        .process_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().cloned().unwrap();
    assert_eq!(tools.len(), 10);
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert!(names.contains(&"completion_create"));
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == json!("object")));
}

#[tokio::test]
async fn test_habit_and_completion_tools() {
    let mut server = mcp_server().await;

    let (is_error, text) = call(
        &mut server,
        1,
        "habit_create",
        json!({"name": "Drink water", "frequency": "daily", "target_count": 8}),
    )
    .await;
    assert!(!is_error, "{}", text);
    let habit_id = payload(&text)["id"].as_str().unwrap().to_string();

    let (is_error, text) = call(
        &mut server,
        2,
        "completion_create",
        json!({"habit_id": habit_id, "count": 3}),
    )
    .await;
    assert!(!is_error, "{}", text);
    let created = payload(&text);
    assert_eq!(created["habit_stats"]["total_completions"], json!(3));
    assert_eq!(created["habit_stats"]["current_streak"], json!(1));

    let (is_error, text) = call(&mut server, 3, "completion_create", json!({"habit_id": habit_id})).await;
    assert!(is_error);
    assert!(text.starts_with("Error [already_exists]"), "{}", text);

    let completion_id = created["completion"]["id"].as_str().unwrap().to_string();
    let (_, text) = call(
        &mut server,
        4,
        "completion_update",
        json!({"completion_id": completion_id, "count": 5}),
    )
    .await;
    assert_eq!(payload(&text)["habit_stats"]["total_completions"], json!(5));

    let (_, text) = call(&mut server, 5, "habit_get", json!({"habit_id": habit_id})).await;
    assert_eq!(payload(&text)["total_completions"], json!(5));

    let (is_error, _) = call(&mut server, 6, "habit_delete", json!({"habit_id": habit_id})).await;
    assert!(!is_error);

    let (is_error, text) = call(&mut server, 7, "completion_get", json!({"completion_id": completion_id})).await;
    assert!(is_error);
    assert!(text.starts_with("Error [not_found]"), "{}", text);
}

#[tokio::test]
async fn test_bad_input_is_reported() {
    let mut server = mcp_server().await;

    let (is_error, text) = call(
        &mut server,
        1,
        "habit_create",
        json!({"name": "Gym", "frequency": "weekly", "target_days": [1, 2]}),
    )
    .await;
    assert!(is_error);
    assert!(text.starts_with("Error [invalid_input]"), "{}", text);

    let (is_error, text) = call(&mut server, 2, "habit_fly", json!({})).await;
    assert!(is_error);
    assert!(text.contains("Unknown tool"));

    let response = server.process_line("{not json").await.unwrap();
    assert_eq!(response.error.unwrap().code, -32700);

    let response = server
        .process_line(r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#)
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}
