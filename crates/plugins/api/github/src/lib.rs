//! GitHub tools for ghbridge.
//!
//! A fixed set of GitHub operations, each mapped onto one call against
//! the GitHub MCP server. Results are always text: the tool output, or a
//! JSON document with an `error` field.

mod handlers;
mod tools;

pub use handlers::ToolDefinition;
pub use tools::GitHubTools;

/// Default `limit` for `search_repositories`.
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;

/// Default `state` for `get_issues`.
pub const DEFAULT_ISSUE_STATE: &str = "open";

/// Default `limit` for `get_issues`.
pub const DEFAULT_ISSUE_LIMIT: u32 = 10;
