//! ghbridge CLI - GitHub tools over the GitHub MCP server.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ghbridge_core::{Config, ServerConfig};
use ghbridge_github::GitHubTools;
use ghbridge_mcp::McpClient;
use ghbridge_model::ModelProxyClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ghbridge")]
#[command(author, version, about = "ghbridge - GitHub tools over MCP", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Mcp(McpCommands),

    /// Print tool definitions for agent runtimes
    Definitions,

    /// Ask the model proxy a single question
    Ask {
        /// Prompt text
        prompt: String,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Completion token limit
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that talk to the MCP server.
#[derive(Subcommand)]
enum McpCommands {
    /// Start the MCP server, list a few tools, and stop it
    TestMcp,

    /// List the tools offered by the MCP server
    Tools,

    /// Get repository information
    Repo {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
    },

    /// Search repositories
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = ghbridge_github::DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },

    /// Get file contents
    File {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Path within the repository
        path: String,
    },

    /// List repository issues
    Issues {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,

        /// Filter by state
        #[arg(short, long, default_value = ghbridge_github::DEFAULT_ISSUE_STATE)]
        state: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = ghbridge_github::DEFAULT_ISSUE_LIMIT)]
        limit: u32,
    },

    /// Create an issue
    CreateIssue {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Issue title
        title: String,

        /// Issue body
        #[arg(short, long, default_value = "")]
        body: String,
    },

    /// Call any MCP tool with JSON arguments
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Get a configuration value (e.g. server.image)
    Get {
        /// Key in section.field form
        key: String,
    },

    /// Set a configuration value (e.g. server.read_timeout_secs 120)
    Set {
        /// Key in section.field form
        key: String,
        /// New value
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging. stdout carries command output only.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = ?path, "Loaded .env file");
    }

    let Some(command) = cli.command else {
        println!("ghbridge - GitHub tools over MCP");
        println!("Run with --help for usage information");
        return Ok(());
    };

    match command {
        Commands::Config { command } => run_config(command),
        Commands::Definitions => {
            let definitions = serde_json::to_string_pretty(&GitHubTools::definitions())?;
            println!("{}", definitions);
            Ok(())
        }
        Commands::Ask {
            prompt,
            system,
            max_tokens,
        } => {
            let mut config = Config::load()?;
            if let Some(max_tokens) = max_tokens {
                config.model.max_tokens = max_tokens;
            }
            let client = ModelProxyClient::from_config(&config.model)?;
            let answer = client.ask(system.as_deref(), &prompt).await?;
            println!("{}", answer);
            Ok(())
        }
        Commands::Mcp(command) => {
            let config = Config::load()?;
            run_with_client(command, &config.server).await
        }
    }
}

/// Run a command against a fresh MCP client, stopping it on every path.
async fn run_with_client(command: McpCommands, server: &ServerConfig) -> anyhow::Result<()> {
    let client = Arc::new(McpClient::from_env(server)?);

    let result = tokio::select! {
        result = run_tool_command(command, &client) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    client.stop().await;
    result
}

async fn run_tool_command(command: McpCommands, client: &Arc<McpClient>) -> anyhow::Result<()> {
    let tools = GitHubTools::new(client.clone());

    let output = match command {
        McpCommands::TestMcp => return test_mcp(client).await,
        McpCommands::Tools => tools.list_tools().await,
        McpCommands::Repo { owner, repo } => tools.get_repository(&owner, &repo).await,
        McpCommands::Search { query, limit } => {
            tools.search_repositories(&query, Some(limit)).await
        }
        McpCommands::File { owner, repo, path } => {
            tools.get_file_contents(&owner, &repo, &path).await
        }
        McpCommands::Issues {
            owner,
            repo,
            state,
            limit,
        } => {
            tools
                .get_issues(&owner, &repo, Some(&state), Some(limit))
                .await
        }
        McpCommands::CreateIssue {
            owner,
            repo,
            title,
            body,
        } => tools.create_issue(&owner, &repo, &title, Some(&body)).await,
        McpCommands::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            client.call_tool(&tool, arguments).await?
        }
    };

    println!("{}", output);
    Ok(())
}

async fn test_mcp(client: &McpClient) -> anyhow::Result<()> {
    if !client.start().await? {
        anyhow::bail!("Failed to start MCP server");
    }
    println!("MCP server started");

    let tools = client.list_tools().await?;
    println!("Available tools: {}", tools.len());
    for tool in tools.iter().take(3) {
        println!("  - {}", tool.name);
    }
    if tools.len() > 3 {
        println!("  ... and {} more", tools.len() - 3);
    }

    Ok(())
}

fn run_config(command: ConfigCommands) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            println!("{}", Config::config_path()?.display());
        }
        ConfigCommands::Get { key } => {
            let config = Config::load()?;
            match config.get(&key)? {
                Some(value) => println!("{}", value),
                None => println!("(not set)"),
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            tracing::info!("Set {} = {}", key, value);
        }
    }
    Ok(())
}
