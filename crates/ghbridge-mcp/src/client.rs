//! MCP client over a stdio worker.
//!
//! One request is in flight at a time: every round-trip holds the state
//! lock from write to read. Notifications the server sends in between are
//! skipped; the first response after them must carry the request's id. The
//! worker is started lazily by the first tool operation and discarded after
//! a transport fault or an out-of-step response, so the next operation
//! starts a fresh one.

use std::time::Duration;

use async_trait::async_trait;
use ghbridge_core::{AccessToken, Error, Result, ServerConfig};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::protocol::{
    error_payload, is_server_message, tool_result_text, ClientCapabilities, ClientInfo, InitializeParams,
    InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    ToolDescriptor, ToolsListResult, MCP_VERSION,
};
use crate::worker::{CommandSpawner, Spawner, Worker};

/// Id used by the `initialize` request. Tool calls count up from 1.
///
/// The handshake accepts a response with any id, since some servers answer
/// `initialize` with id 1.
pub const HANDSHAKE_ID: i64 = 0;

const NO_RESPONSE: &str = "No response from MCP server";

/// Tool-level operations, the seam between the GitHub facade and MCP.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Tools the server offers. Empty on any failure after startup.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool and reduce the result to text.
    ///
    /// Failures after startup come back as a `{"error": ...}` document.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String>;
}

/// Client tunables.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub read_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub client_info: ClientInfo,
}

impl ClientOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
            client_info: ClientInfo {
                name: config.client_name.clone(),
                version: config.client_version.clone(),
            },
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

#[derive(Default)]
struct ClientState {
    worker: Option<Worker>,
    initialized: bool,
    request_id: i64,
}

/// MCP client driving one worker process.
pub struct McpClient {
    spawner: Box<dyn Spawner>,
    token: AccessToken,
    options: ClientOptions,
    state: Mutex<ClientState>,
}

impl McpClient {
    /// Create a client reading the access token from `config.token_env`.
    pub fn from_env(config: &ServerConfig) -> Result<Self> {
        let token = AccessToken::from_env(&config.token_env)?;
        Ok(Self::new(config, token))
    }

    pub fn new(config: &ServerConfig, token: AccessToken) -> Self {
        Self::with_spawner(
            CommandSpawner::from_config(config),
            token,
            ClientOptions::from_config(config),
        )
    }

    pub fn with_spawner(
        spawner: impl Spawner + 'static,
        token: AccessToken,
        options: ClientOptions,
    ) -> Self {
        Self {
            spawner: Box::new(spawner),
            token,
            options,
            state: Mutex::new(ClientState::default()),
        }
    }

    /// Start the worker and perform the handshake.
    ///
    /// Returns `Ok(true)` once initialized (immediately, if already so) and
    /// `Ok(false)` if the handshake failed. A worker that cannot be spawned
    /// is an error.
    pub async fn start(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.worker.is_some()
    }

    /// Send one request and read its response line.
    ///
    /// Server notifications read before the response are skipped. Returns
    /// `None` for a blank, closed, or unparsable response. A response for a
    /// different request is a transport error and discards the worker.
    pub async fn send_request(&self, request: &JsonRpcRequest) -> Result<Option<JsonRpcResponse>> {
        let mut state = self.state.lock().await;
        self.exchange_locked(&mut state, request).await
    }

    /// Send a notification. Nothing is read back.
    pub async fn send_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let mut state = self.state.lock().await;
        let worker = state
            .worker
            .as_mut()
            .ok_or_else(|| Error::Transport("MCP server not started".to_string()))?;
        worker.transport().write_message(notification).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut state = self.state.lock().await;
        self.ensure_started(&mut state).await?;

        let response = match self.request(&mut state, "tools/list", None).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                warn!("{}", NO_RESPONSE);
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!(error = %e, "tools/list failed");
                return Ok(Vec::new());
            }
        };

        let tools = response
            .into_result()
            .and_then(|result| Ok(serde_json::from_value::<ToolsListResult>(result)?));

        match tools {
            Ok(list) => {
                debug!(count = list.tools.len(), "Listed MCP tools");
                Ok(list.tools)
            }
            Err(e) => {
                warn!(error = %e, "tools/list returned no usable result");
                Ok(Vec::new())
            }
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let mut state = self.state.lock().await;
        self.ensure_started(&mut state).await?;

        let params = json!({ "name": name, "arguments": arguments });
        debug!(tool = name, "Calling MCP tool");

        let text = match self.request(&mut state, "tools/call", Some(params)).await {
            Ok(Some(response)) => match response.into_result() {
                Ok(result) => tool_result_text(&result),
                Err(e) => {
                    warn!(tool = name, error = %e, "MCP tool returned an error");
                    error_payload(e)
                }
            },
            Ok(None) => {
                warn!(tool = name, "{}", NO_RESPONSE);
                error_payload(NO_RESPONSE)
            }
            Err(e) => {
                warn!(tool = name, error = %e, "MCP tool call failed");
                error_payload(e)
            }
        };

        Ok(text)
    }

    /// Stop the worker if one is running. Cleanup problems are logged only.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if state.worker.is_some() {
            info!("Stopping MCP server");
        }
        self.teardown(&mut state).await;
    }

    async fn start_locked(&self, state: &mut ClientState) -> Result<bool> {
        if state.initialized {
            return Ok(true);
        }
        // A worker without a completed handshake is never reused.
        self.teardown(state).await;

        info!("Starting MCP server");
        let mut worker = self.spawner.spawn(&self.token)?;

        match self.handshake(&mut worker).await {
            Ok(()) => {
                state.worker = Some(worker);
                state.initialized = true;
                info!("MCP server initialized");
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "MCP handshake failed");
                if let Err(e) = worker.shutdown(self.options.shutdown_timeout).await {
                    warn!(error = %e, "Error stopping MCP server");
                }
                Ok(false)
            }
        }
    }

    async fn ensure_started(&self, state: &mut ClientState) -> Result<()> {
        if self.start_locked(state).await? {
            Ok(())
        } else {
            Err(Error::Startup("Failed to start MCP server".to_string()))
        }
    }

    async fn handshake(&self, worker: &mut Worker) -> Result<()> {
        let params = InitializeParams {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: self.options.client_info.clone(),
        };
        let request = JsonRpcRequest::new(
            HANDSHAKE_ID,
            "initialize",
            Some(serde_json::to_value(params)?),
        );

        let response = self
            .exchange(worker, &request)
            .await?
            .ok_or_else(|| Error::Startup("no initialize response".to_string()))?;
        let result = response.into_result()?;

        let init: InitializeResult = serde_json::from_value(result).unwrap_or_default();
        if let Some(server) = &init.server_info {
            info!(
                server = %server.name,
                version = %server.version,
                protocol = init.protocol_version.as_deref().unwrap_or("unknown"),
                "Connected to MCP server"
            );
        }

        worker
            .transport()
            .write_message(&JsonRpcNotification::new("notifications/initialized", None))
            .await
    }

    /// Numbered request against the running worker. Faults that leave the
    /// stream out of step discard the worker.
    async fn request(
        &self,
        state: &mut ClientState,
        method: &str,
        params: Option<Value>,
    ) -> Result<Option<JsonRpcResponse>> {
        state.request_id += 1;
        let request = JsonRpcRequest::new(state.request_id, method, params);
        self.exchange_locked(state, &request).await
    }

    async fn exchange_locked(
        &self,
        state: &mut ClientState,
        request: &JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>> {
        let worker = state
            .worker
            .as_mut()
            .ok_or_else(|| Error::Transport("MCP server not started".to_string()))?;

        let response = self.exchange(worker, request).await;
        if let Err(e) = &response {
            if e.poisons_stream() {
                warn!(error = %e, "Discarding MCP server after transport fault");
                self.teardown(state).await;
            }
        }
        response
    }

    async fn exchange(
        &self,
        worker: &mut Worker,
        request: &JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>> {
        let read_timeout = self.options.read_timeout;
        let transport = worker.transport();
        transport.write_message(request).await?;

        let deadline = Instant::now() + read_timeout;
        let line = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(read_timeout));
            }

            let line = match transport.read_line(remaining).await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(Error::Timeout(_)) => return Err(Error::Timeout(read_timeout)),
                Err(e) => return Err(e),
            };

            if is_server_message(&line) {
                debug!("Skipping MCP server message: {}", line);
                continue;
            }
            break line;
        };

        let Some(response) = JsonRpcResponse::from_line(&line) else {
            warn!("Unparsable MCP server response: {}", line);
            return Ok(None);
        };

        if response.id != request.id && response.id != RequestId::Null {
            if request.method == "initialize" {
                warn!(
                    expected = ?request.id,
                    received = ?response.id,
                    "MCP initialize response id does not match request"
                );
            } else {
                return Err(Error::Transport(format!(
                    "response id {:?} does not match request id {:?}",
                    response.id, request.id
                )));
            }
        }
        Ok(Some(response))
    }

    async fn teardown(&self, state: &mut ClientState) {
        state.initialized = false;
        if let Some(mut worker) = state.worker.take() {
            if let Err(e) = worker.shutdown(self.options.shutdown_timeout).await {
                warn!(error = %e, "Error stopping MCP server");
            }
        }
    }
}

#[async_trait]
impl ToolClient for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        McpClient::call_tool(self, name, arguments).await
    }
}
