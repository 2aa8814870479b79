//! MCP server worker processes.
//!
//! A [`Worker`] owns the child process and its line transport. Workers are
//! produced by a [`Spawner`]; the default [`CommandSpawner`] launches the
//! configured command (normally `docker run -i ...`) with the access token
//! injected through the environment, never through argv.
//!
//! Graceful stop is end of input: closing the worker's stdin makes
//! `docker run -i` and the server inside it exit. A worker that is still
//! running after the grace period is killed.

use std::process::Stdio;
use std::time::Duration;

use ghbridge_core::{AccessToken, Error, Result, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::transport::LineTransport;

/// Produces running workers.
pub trait Spawner: Send + Sync {
    fn spawn(&self, token: &AccessToken) -> Result<Worker>;
}

/// A running MCP server.
pub struct Worker {
    transport: LineTransport,
    child: Option<Child>,
    container: Option<Container>,
}

/// Named container backing a worker, removed on shutdown.
#[derive(Debug, Clone)]
struct Container {
    program: String,
    name: String,
}

impl Worker {
    /// Wrap a transport and, optionally, the process behind it.
    pub fn new(transport: LineTransport, child: Option<Child>) -> Self {
        Self {
            transport,
            child,
            container: None,
        }
    }

    /// Remove the named container with `<program> rm` once the worker stops.
    pub fn with_container(mut self, program: impl Into<String>, name: impl Into<String>) -> Self {
        self.container = Some(Container {
            program: program.into(),
            name: name.into(),
        });
        self
    }

    pub fn transport(&mut self) -> &mut LineTransport {
        &mut self.transport
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Stop the worker.
    ///
    /// Closes stdin and waits up to `grace` for the process to exit, then
    /// kills it. Container removal failures are logged and ignored.
    pub async fn shutdown(&mut self, grace: Duration) -> Result<()> {
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "Closing MCP server stdin failed");
        }

        let mut forced = false;
        let mut outcome = Ok(());

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => info!(%status, "MCP server exited"),
                Ok(Err(e)) => {
                    forced = true;
                    let _ = child.start_kill();
                    outcome = Err(Error::Teardown(format!(
                        "failed to wait for MCP server: {}",
                        e
                    )));
                }
                Err(_) => {
                    forced = true;
                    warn!(
                        "MCP server did not exit within {:?}, killing it",
                        grace
                    );
                    if let Err(e) = child.kill().await {
                        outcome = Err(Error::Teardown(format!(
                            "failed to kill MCP server: {}",
                            e
                        )));
                    }
                }
            }
        }

        if let Some(container) = self.container.take() {
            if let Err(e) = container.remove(forced).await {
                warn!(error = %e, container = %container.name, "Container cleanup failed");
            }
        }

        outcome
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };

        let _ = child.start_kill();
        if let Some(container) = self.container.take() {
            container.remove_detached();
        }
    }
}

impl Container {
    async fn remove(&self, force: bool) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.arg("rm");
        if force {
            command.arg("-f");
        }

        let status = command
            .arg(&self.name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Teardown(format!("failed to run {} rm: {}", self.program, e)))?;

        if status.success() {
            debug!(container = %self.name, "Container removed");
        } else {
            // Already gone, or never created.
            debug!(container = %self.name, %status, "Container removal returned non-zero");
        }
        Ok(())
    }

    /// Fire-and-forget forced removal, for use where we cannot await.
    fn remove_detached(&self) {
        let spawned = std::process::Command::new(&self.program)
            .args(["rm", "-f", &self.name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            debug!(error = %e, container = %self.name, "Detached container removal failed");
        }
    }
}

/// Launches the configured worker command.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    command: String,
    args: Vec<String>,
    token_env: String,
    container_name: Option<String>,
}

impl CommandSpawner {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.worker_args(),
            token_env: config.token_env.clone(),
            container_name: config.managed_container().map(str::to_string),
        }
    }
}

impl Spawner for CommandSpawner {
    fn spawn(&self, token: &AccessToken) -> Result<Worker> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .env(&self.token_env, token.expose())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Startup(format!("failed to spawn {}: {}", self.command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Startup("failed to capture MCP server stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Startup("failed to capture MCP server stdout".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        info!(
            pid = child.id(),
            command = %self.command,
            "MCP server process spawned"
        );

        let worker = Worker::new(LineTransport::from_child(stdin, stdout), Some(child));
        Ok(match &self.container_name {
            Some(name) => worker.with_container(&self.command, name),
            None => worker,
        })
    }
}

/// Forward the worker's stderr to the log so it never fills the pipe.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(target: "ghbridge_mcp::server_stderr", "{}", line),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Stopped reading MCP server stderr");
                break;
            }
        }
    }
}
