//! The session seam between the interview engine and a live server.
//!
//! The engine only needs four operations from a server connection. Keeping
//! them behind a trait lets the phases run against [`McpClient`] in
//! production and against scripted sessions in tests.

use crate::error::SessionError;
use crate::interview::callbacks::RequestCounts;
use crate::mcp::client::McpClient;
use crate::mcp::params::ServerParameters;
use crate::mcp::protocol::{CallToolResult, InitializeResult, ListKind, ListPage};
use crate::mcp::retry::RetryConfig;
use crate::mcp::transport::{AnyTransport, Transport};
use serde_json::Value;

/// A negotiated (or negotiable) bidirectional channel to one server
#[allow(async_fn_in_trait)]
pub trait Session: Send {
    /// Run the capability handshake; a second call is an error
    async fn negotiate(&mut self) -> Result<InitializeResult, SessionError>;

    /// Fetch one page of a listing
    async fn list(
        &mut self,
        kind: ListKind,
        cursor: Option<&str>,
    ) -> Result<ListPage, SessionError>;

    /// Invoke a tool
    async fn call(
        &mut self,
        name: &str,
        arguments: &Value,
    ) -> Result<CallToolResult, SessionError>;

    /// Server-initiated request counters (monotonic)
    fn request_counts(&self) -> RequestCounts;

    /// Whether the channel can carry further requests after a failure
    fn is_usable(&self) -> bool {
        true
    }

    /// Release the connection
    async fn close(&mut self) {}
}

/// Opens sessions for server parameters
#[allow(async_fn_in_trait)]
pub trait SessionFactory {
    type Session: Session;

    async fn connect(&self, params: &ServerParameters) -> anyhow::Result<Self::Session>;
}

impl<T: Transport> Session for McpClient<T> {
    async fn negotiate(&mut self) -> Result<InitializeResult, SessionError> {
        self.initialize().await
    }

    async fn list(
        &mut self,
        kind: ListKind,
        cursor: Option<&str>,
    ) -> Result<ListPage, SessionError> {
        McpClient::list(self, kind, cursor).await
    }

    async fn call(
        &mut self,
        name: &str,
        arguments: &Value,
    ) -> Result<CallToolResult, SessionError> {
        self.call_tool(name, arguments).await
    }

    fn request_counts(&self) -> RequestCounts {
        McpClient::request_counts(self)
    }

    fn is_usable(&self) -> bool {
        McpClient::is_usable(self)
    }

    async fn close(&mut self) {
        if let Err(e) = McpClient::close(self).await {
            tracing::debug!("Error closing session: {:#}", e);
        }
    }
}

/// Connects real MCP servers through their transports
#[derive(Debug, Clone, Default)]
pub struct McpSessionFactory {
    list_retry: RetryConfig,
}

impl McpSessionFactory {
    pub fn new(list_retry: RetryConfig) -> Self {
        Self { list_retry }
    }
}

impl SessionFactory for McpSessionFactory {
    type Session = McpClient<AnyTransport>;

    async fn connect(&self, params: &ServerParameters) -> anyhow::Result<Self::Session> {
        tracing::info!(
            "Connecting to {} server: {}",
            params.connection_type(),
            params.display_target()
        );
        let transport = params.connect().await?;
        Ok(McpClient::new(transport).with_retry(self.list_retry.clone()))
    }
}
