//! Tool definitions and name-based dispatch for agent runtimes.
//!
//! The six GitHub operations are exposed as `mcp_*` tools with JSON
//! schemas, so a model can call them by name with JSON arguments.

use ghbridge_mcp::protocol::error_payload;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::tools::GitHubTools;

/// Tool definition handed to an agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepositoryParams {
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FileParams {
    owner: String,
    repo: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct CreateIssueParams {
    owner: String,
    repo: String,
    title: String,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetIssuesParams {
    owner: String,
    repo: String,
    state: Option<String>,
    limit: Option<u32>,
}

fn owner_repo() -> Value {
    serde_json::json!({
        "owner": {
            "type": "string",
            "description": "Repository owner (user or organization)"
        },
        "repo": {
            "type": "string",
            "description": "Repository name"
        }
    })
}

fn with_owner_repo(extra: Value) -> Value {
    let mut properties = owner_repo();
    if let (Some(base), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        base.extend(extra);
    }
    properties
}

impl GitHubTools {
    /// Definitions of every tool [`GitHubTools::execute`] accepts.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "mcp_get_repository",
                "Get repository information using the GitHub MCP server",
                serde_json::json!({
                    "type": "object",
                    "properties": owner_repo(),
                    "required": ["owner", "repo"]
                }),
            ),
            ToolDefinition::new(
                "mcp_search_repositories",
                "Search GitHub repositories",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "GitHub search query"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results (default: 5)",
                            "minimum": 1
                        }
                    },
                    "required": ["query"]
                }),
            ),
            ToolDefinition::new(
                "mcp_get_file_contents",
                "Get the contents of a file or directory in a repository",
                serde_json::json!({
                    "type": "object",
                    "properties": with_owner_repo(serde_json::json!({
                        "path": {
                            "type": "string",
                            "description": "Path within the repository"
                        }
                    })),
                    "required": ["owner", "repo", "path"]
                }),
            ),
            ToolDefinition::new(
                "mcp_list_tools",
                "List the tools offered by the GitHub MCP server",
                serde_json::json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            ToolDefinition::new(
                "mcp_create_issue",
                "Create an issue in a repository",
                serde_json::json!({
                    "type": "object",
                    "properties": with_owner_repo(serde_json::json!({
                        "title": {
                            "type": "string",
                            "description": "Issue title"
                        },
                        "body": {
                            "type": "string",
                            "description": "Issue body (default: empty)"
                        }
                    })),
                    "required": ["owner", "repo", "title"]
                }),
            ),
            ToolDefinition::new(
                "mcp_get_issues",
                "Get issues of a repository",
                serde_json::json!({
                    "type": "object",
                    "properties": with_owner_repo(serde_json::json!({
                        "state": {
                            "type": "string",
                            "enum": ["open", "closed", "all"],
                            "description": "Filter by issue state (default: open)"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results (default: 10)",
                            "minimum": 1
                        }
                    })),
                    "required": ["owner", "repo"]
                }),
            ),
        ]
    }

    /// Execute a tool by name with arguments.
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> String {
        match name {
            "mcp_get_repository" => match params::<RepositoryParams>(name, arguments) {
                Ok(p) => self.get_repository(&p.owner, &p.repo).await,
                Err(e) => e,
            },
            "mcp_search_repositories" => match params::<SearchParams>(name, arguments) {
                Ok(p) => self.search_repositories(&p.query, p.limit).await,
                Err(e) => e,
            },
            "mcp_get_file_contents" => match params::<FileParams>(name, arguments) {
                Ok(p) => self.get_file_contents(&p.owner, &p.repo, &p.path).await,
                Err(e) => e,
            },
            "mcp_list_tools" => self.list_tools().await,
            "mcp_create_issue" => match params::<CreateIssueParams>(name, arguments) {
                Ok(p) => {
                    self.create_issue(&p.owner, &p.repo, &p.title, p.body.as_deref())
                        .await
                }
                Err(e) => e,
            },
            "mcp_get_issues" => match params::<GetIssuesParams>(name, arguments) {
                Ok(p) => {
                    self.get_issues(&p.owner, &p.repo, p.state.as_deref(), p.limit)
                        .await
                }
                Err(e) => e,
            },
            _ => {
                warn!(tool = name, "Unknown tool");
                error_payload(format!("Unknown tool: {}", name))
            }
        }
    }
}

/// Decode arguments, or the error payload to return instead.
fn params<T: DeserializeOwned>(tool: &str, arguments: Option<Value>) -> Result<T, String> {
    let arguments = arguments.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(arguments).map_err(|e| {
        warn!(tool, error = %e, "Invalid tool arguments");
        error_payload(format!("Invalid arguments for {}: {}", tool, e))
    })
}
