/// Integration tests: storage on disk, operations end to end, and the MCP
/// request loop
mod mcp_flow;
mod operations_flow;
mod storage_persistence;
