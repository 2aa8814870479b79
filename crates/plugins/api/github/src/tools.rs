use std::sync::Arc;

use ghbridge_mcp::protocol::{error_payload, pretty_json};
use ghbridge_mcp::ToolClient;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::{DEFAULT_ISSUE_LIMIT, DEFAULT_ISSUE_STATE, DEFAULT_SEARCH_LIMIT};

/// GitHub operations backed by an MCP tool client.
///
/// Every operation returns a `String` and never fails: client faults are
/// logged and turned into `{"error": "<message>"}`.
#[derive(Clone)]
pub struct GitHubTools {
    client: Arc<dyn ToolClient>,
}

impl GitHubTools {
    pub fn new(client: Arc<dyn ToolClient>) -> Self {
        Self { client }
    }

    /// Repository information.
    pub async fn get_repository(&self, owner: &str, repo: &str) -> String {
        self.invoke(
            "get_repository",
            json!({ "owner": owner, "repo": repo }),
            || format!("Error getting repository {}/{}", owner, repo),
        )
        .await
    }

    /// Search repositories. `limit` defaults to 5.
    pub async fn search_repositories(&self, query: &str, limit: Option<u32>) -> String {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        self.invoke(
            "search_repositories",
            json!({ "query": query, "limit": limit }),
            || format!("Error searching repositories with query '{}'", query),
        )
        .await
    }

    /// Contents of a file or directory.
    pub async fn get_file_contents(&self, owner: &str, repo: &str, path: &str) -> String {
        self.invoke(
            "get_file_contents",
            json!({ "owner": owner, "repo": repo, "path": path }),
            || format!("Error getting file contents {}/{}:{}", owner, repo, path),
        )
        .await
    }

    /// Tools offered by the server, as `{"available_tools": [...]}`.
    pub async fn list_tools(&self) -> String {
        let listed = self
            .client
            .list_tools()
            .await
            .and_then(|tools| Ok(serde_json::to_value(tools)?));

        match listed {
            Ok(tools) => pretty_json(&json!({ "available_tools": tools })),
            Err(e) => {
                error!("Error listing MCP tools: {}", e);
                error_payload(e)
            }
        }
    }

    /// Open an issue. `body` defaults to empty.
    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: Option<&str>,
    ) -> String {
        self.invoke(
            "create_issue",
            json!({
                "owner": owner,
                "repo": repo,
                "title": title,
                "body": body.unwrap_or_default(),
            }),
            || format!("Error creating issue '{}' in {}/{}", title, owner, repo),
        )
        .await
    }

    /// List issues. `state` defaults to `open`, `limit` to 10.
    pub async fn get_issues(
        &self,
        owner: &str,
        repo: &str,
        state: Option<&str>,
        limit: Option<u32>,
    ) -> String {
        let state = state.unwrap_or(DEFAULT_ISSUE_STATE);
        let limit = limit.unwrap_or(DEFAULT_ISSUE_LIMIT);
        self.invoke(
            "get_issues",
            json!({ "owner": owner, "repo": repo, "state": state, "limit": limit }),
            || format!("Error getting issues from {}/{} (state: {})", owner, repo, state),
        )
        .await
    }

    async fn invoke(
        &self,
        tool: &str,
        arguments: Value,
        context: impl FnOnce() -> String,
    ) -> String {
        debug!(tool, "Invoking GitHub tool");
        match self.client.call_tool(tool, arguments).await {
            Ok(text) => text,
            Err(e) => {
                error!("{}: {}", context(), e);
                error_payload(e)
            }
        }
    }
}
