//! MCP client for ghbridge.
//!
//! Drives a Model Context Protocol server running as a child process,
//! speaking newline-delimited JSON-RPC 2.0 over its stdin/stdout.
//!
//! # Usage
//!
//! ```ignore
//! use ghbridge_core::ServerConfig;
//! use ghbridge_mcp::McpClient;
//!
//! let client = McpClient::from_env(&ServerConfig::default())?;
//! let tools = client.list_tools().await?;
//! client.stop().await;
//! ```

pub mod client;
pub mod protocol;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use client::{ClientOptions, McpClient, ToolClient};
pub use protocol::ToolDescriptor;
pub use worker::{CommandSpawner, Spawner, Worker};
