/// Model Context Protocol surface
///
/// Line-delimited JSON-RPC over stdio: the handshake, tool discovery and
/// dispatch of tool calls to the habit and completion tools.

pub mod protocol;
pub mod server;

pub use server::McpServer;
