//! MCP Client Layer
//!
//! This module provides the MCP client the interviewer drives a server with.
//!
//! # Architecture
//!
//! The client is generic over the transport layer, allowing it to work
//! with different transport mechanisms (stdio, SSE, streamable HTTP) through
//! the [`Transport`] trait.
//!
//! MCP sessions are bidirectional. While the client waits for the response to
//! one of its requests, the server may send requests of its own (sampling,
//! elicitation, roots) and notifications (log messages). Those are answered
//! and counted by the [`CallbackMultiplexer`] the client owns, inline, before
//! the awaited response arrives.
//!
//! # Usage
//!
//! ```ignore
//! use mcp_interviewer::mcp::{McpClient, StdioTransport};
//!
//! let transport = StdioTransport::spawn("python", &["server.py".into()], &env, None).await?;
//! let mut client = McpClient::new(transport);
//! let init = client.initialize().await?;
//! let page = client.list(ListKind::Tools, None).await?;
//! let result = client.call_tool("read_file", &json!({"path": "/tmp/file.txt"})).await?;
//! ```

use crate::error::SessionError;
use crate::interview::callbacks::{CallbackMultiplexer, RequestCounts};
use crate::mcp::protocol::{
    CallToolResult, ClientCapabilities, Implementation, InitializeParams, InitializeResult,
    JsonRpcMessage, ListKind, ListPage, McpMethod, McpNotification, McpRequest, McpResponse,
    RequestId, PROTOCOL_VERSION,
};
use crate::mcp::retry::RetryConfig;
use crate::mcp::transport::Transport;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// Client state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Client is created but not initialized
    Created,

    /// Initialization is in progress
    Initializing,

    /// Client is initialized and ready
    Ready,

    /// Client is disconnected
    Disconnected,
}

/// MCP client over any [`Transport`]
///
/// # Lifecycle
///
/// 1. Create client with `McpClient::new(transport)`
/// 2. Initialize with `client.initialize()` (exactly once)
/// 3. List and call tools
/// 4. `close()` or drop the client (transport auto-cleanup)
pub struct McpClient<T>
where
    T: Transport,
{
    /// Underlying transport for sending/receiving messages
    transport: T,

    /// Next request ID (monotonically increasing)
    next_id: AtomicU64,

    /// Result of the initialize handshake
    initialize_result: Option<InitializeResult>,

    /// Client state
    state: ClientState,

    /// Retry configuration for listing requests
    retry_config: Option<RetryConfig>,

    /// Handlers for server-initiated requests
    callbacks: CallbackMultiplexer,
}

impl<T> McpClient<T>
where
    T: Transport,
{
    /// Create a new MCP client with the given transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            initialize_result: None,
            state: ClientState::Created,
            retry_config: None,
            callbacks: CallbackMultiplexer::default(),
        }
    }

    /// Retry listing requests that fail at the transport level
    ///
    /// Tool calls are never retried.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackMultiplexer) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Get the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the current client state
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether requests can still be sent
    ///
    /// A failed exchange (an HTTP error status, say) leaves the client usable
    /// as long as the transport stays connected.
    pub fn is_usable(&self) -> bool {
        self.state != ClientState::Disconnected && self.transport.is_connected()
    }

    /// Initialize result (after initialization)
    pub fn initialize_result(&self) -> Option<&InitializeResult> {
        self.initialize_result.as_ref()
    }

    /// Counters of server-initiated requests seen so far
    pub fn request_counts(&self) -> RequestCounts {
        self.callbacks.snapshot()
    }

    /// Send a request and wait for its response
    ///
    /// Server requests and notifications that arrive first are dispatched to
    /// the callback multiplexer. Responses with a foreign id are stale (for
    /// example the late answer to a call that already timed out) and dropped.
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, SessionError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = McpRequest::new(id.clone(), method, params);

        if let Err(e) = self.transport.send(&request.into()).await {
            self.mark_disconnected();
            return Err(e.context(format!("Failed to send {} request", method)).into());
        }

        loop {
            let message = match self.transport.recv().await {
                Ok(message) => message,
                Err(e) => {
                    self.mark_disconnected();
                    return Err(e.context(format!("Failed to receive {} response", method)).into());
                }
            };

            match message {
                JsonRpcMessage::Response(response) if response.id == id => {
                    return response.into_result().map_err(SessionError::Rpc);
                }
                JsonRpcMessage::Response(response) => {
                    tracing::debug!("Discarding stale response with id {}", response.id);
                }
                JsonRpcMessage::Request(server_request) => {
                    self.answer(server_request).await?;
                }
                JsonRpcMessage::Notification(notification) => {
                    self.callbacks.handle_notification(&notification);
                }
            }
        }
    }

    async fn answer(&mut self, server_request: McpRequest) -> Result<(), SessionError> {
        tracing::debug!("Server request: {}", server_request.method);
        let response = match self.callbacks.handle_request(&server_request) {
            Ok(result) => McpResponse::ok(server_request.id, result),
            Err(error) => McpResponse::err(server_request.id, error),
        };
        if let Err(e) = self.transport.send(&response.into()).await {
            self.mark_disconnected();
            return Err(e.context("Failed to answer server request").into());
        }
        Ok(())
    }

    async fn notify(&mut self, method: McpMethod) -> Result<(), SessionError> {
        let notification = McpNotification::new(method.as_str(), None);
        self.transport
            .send(&notification.into())
            .await
            .map_err(SessionError::from)
    }

    fn mark_disconnected(&mut self) {
        if !self.transport.is_connected() {
            self.state = ClientState::Disconnected;
        }
    }

    /// Run the initialize handshake
    ///
    /// Advertises sampling, elicitation and roots support, stores the
    /// server's answer and sends `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyNegotiated`] when called a second time.
    pub async fn initialize(&mut self) -> Result<InitializeResult, SessionError> {
        if self.state != ClientState::Created {
            return Err(SessionError::AlreadyNegotiated);
        }
        if !self.transport.is_connected() {
            return Err(anyhow::anyhow!("Cannot initialize: transport is disconnected").into());
        }

        self.state = ClientState::Initializing;
        tracing::info!("Initializing MCP connection...");

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                sampling: Some(json!({})),
                elicitation: Some(json!({})),
                roots: Some(json!({"listChanged": false})),
                experimental: None,
            },
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
        };

        let method = McpMethod::Initialize;
        let result = self.request(method.as_str(), Some(json!(params))).await?;
        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| SessionError::InvalidResponse {
                method: method.as_str().to_string(),
                reason: e.to_string(),
            })?;

        self.notify(McpMethod::Initialized).await?;

        self.state = ClientState::Ready;
        tracing::info!(
            "MCP connection initialized: {} v{} (protocol {})",
            init.server_info.name,
            init.server_info.version,
            init.protocol_version
        );

        self.initialize_result = Some(init.clone());
        Ok(init)
    }

    /// Fetch one page of a listing
    pub async fn list(
        &mut self,
        kind: ListKind,
        cursor: Option<&str>,
    ) -> Result<ListPage, SessionError> {
        self.ensure_ready()?;

        let method = kind.method();
        let params = cursor.map(|c| json!({ "cursor": c }));
        tracing::debug!("Listing {} (cursor: {:?})", kind, cursor);

        let result = match self.retry_config.clone() {
            Some(config) => {
                self.request_with_retry(&config, method.as_str(), params)
                    .await?
            }
            None => self.request(method.as_str(), params).await?,
        };

        ListPage::from_result(kind, &result).map_err(|reason| SessionError::InvalidResponse {
            method: method.as_str().to_string(),
            reason,
        })
    }

    /// Same backoff as [`retry_with_backoff`], written out by hand because
    /// each attempt needs `&mut self`
    ///
    /// [`retry_with_backoff`]: crate::mcp::retry::retry_with_backoff
    async fn request_with_retry(
        &mut self,
        config: &RetryConfig,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, SessionError> {
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.request(method, params.clone()).await {
                Err(e)
                    if e.is_transport()
                        && attempt + 1 < max_attempts
                        && self.transport.is_connected() =>
                {
                    let delay = config.calculate_delay(attempt);
                    tracing::warn!(
                        "{} attempt {} failed: {}, retrying after {:?}",
                        method,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Call a tool on the MCP server
    ///
    /// A tool that reports failure in-band (`isError: true`) is a successful
    /// call. A JSON-RPC error comes back as [`SessionError::Rpc`].
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: &Value,
    ) -> Result<CallToolResult, SessionError> {
        self.ensure_ready()?;

        tracing::debug!("Calling tool: {} with arguments: {}", name, arguments);

        let method = McpMethod::ToolsCall;
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request(method.as_str(), Some(params)).await?;

        serde_json::from_value(result).map_err(|e| SessionError::InvalidResponse {
            method: method.as_str().to_string(),
            reason: e.to_string(),
        })
    }

    /// Close the underlying transport
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.state = ClientState::Disconnected;
        self.transport.close().await
    }

    /// Check if the client is ready for operations
    fn ensure_ready(&self) -> Result<(), SessionError> {
        match self.state {
            ClientState::Created | ClientState::Initializing => Err(SessionError::NotNegotiated),
            ClientState::Ready => Ok(()),
            ClientState::Disconnected => {
                Err(anyhow::anyhow!("Client is disconnected").into())
            }
        }
    }
}
