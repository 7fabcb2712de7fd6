//! MCP Streamable HTTP Transport
//!
//! Every outgoing message is a POST to the server endpoint. The server
//! answers with either:
//!
//! - `202 Accepted` and no body (notifications and responses we send),
//! - a single JSON-RPC message as `application/json`, or
//! - a `text/event-stream` body carrying any number of messages, typically
//!   server-initiated requests followed by the final response.
//!
//! Streamed bodies are decoded by a background task that forwards messages
//! into an inbox channel, so a server request arriving mid-stream can be
//! answered (with a separate POST) before the stream completes.
//!
//! The `Mcp-Session-Id` header returned on the first response is echoed on
//! every later request, and a DELETE ends the session on close.

use crate::mcp::protocol::JsonRpcMessage;
use crate::mcp::sse::SseDecoder;
use crate::mcp::transport::Transport;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) const SESSION_ID_HEADER: &str = "mcp-session-id";

pub(crate) type Inbox = mpsc::UnboundedReceiver<Result<JsonRpcMessage>>;
pub(crate) type InboxSender = mpsc::UnboundedSender<Result<JsonRpcMessage>>;

/// HTTP connection settings shared by both URL-based transports
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Budget for establishing the connection
    pub connect_timeout: Duration,
    /// How long `recv` waits for the next message
    pub read_timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(300),
        }
    }

    pub(crate) fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name `{}`", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header `{}`", name))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .default_headers(self.header_map()?)
            .build()
            .context("Failed to build HTTP client")
    }
}

/// Decode an SSE body and forward each JSON-RPC message to the inbox
///
/// Events of other types (`endpoint`, pings) are passed to `on_event` and
/// otherwise ignored. Returns when the body ends or the inbox is dropped.
pub(crate) async fn pump_event_stream<F>(
    response: reqwest::Response,
    inbox: InboxSender,
    mut on_event: F,
) where
    F: FnMut(&str, &str) + Send,
{
    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = inbox.send(Err(anyhow::Error::new(e).context("SSE stream failed")));
                return;
            }
        };

        for event in decoder.push(&chunk) {
            if event.event_type() != "message" {
                on_event(event.event_type(), &event.data);
                continue;
            }
            let message = serde_json::from_str::<JsonRpcMessage>(&event.data)
                .with_context(|| format!("Invalid JSON-RPC message in SSE event: {}", event.data));
            match message {
                Ok(message) => {
                    if inbox.send(Ok(message)).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!("{:#}", e),
            }
        }
    }

    if let Some(event) = decoder.finish() {
        if let Ok(message) = serde_json::from_str::<JsonRpcMessage>(&event.data) {
            let _ = inbox.send(Ok(message));
        }
    }
}

pub(crate) async fn recv_from_inbox(
    inbox: &mut Inbox,
    read_timeout: Duration,
    connected: &mut bool,
) -> Result<JsonRpcMessage> {
    if !*connected {
        return Err(anyhow::anyhow!("Transport is not connected"));
    }
    match tokio::time::timeout(read_timeout, inbox.recv()).await {
        Ok(Some(message)) => message,
        Ok(None) => {
            *connected = false;
            Err(anyhow::anyhow!("MCP server stream closed"))
        }
        Err(_) => Err(anyhow::anyhow!(
            "Timed out after {:?} waiting for MCP server message",
            read_timeout
        )),
    }
}

/// Streamable HTTP transport for remote MCP servers
///
/// # Example
///
/// ```ignore
/// let transport = HttpTransport::connect(HttpTransportConfig::new("https://mcp.example.com/mcp"))?;
/// let mut client = McpClient::new(transport);
/// client.initialize().await?;
/// ```
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
    session_id: Option<String>,
    terminate_on_close: bool,
    inbox_tx: InboxSender,
    inbox: Inbox,
    connected: bool,
}

impl HttpTransport {
    /// Create the transport; no network traffic happens until the first send
    pub fn connect(config: HttpTransportConfig) -> Result<Self> {
        let client = config.build_client()?;
        let (inbox_tx, inbox) = mpsc::unbounded_channel();

        tracing::info!("Using streamable HTTP MCP endpoint: {}", config.url);

        Ok(Self {
            client,
            config,
            session_id: None,
            terminate_on_close: true,
            inbox_tx,
            inbox,
            connected: true,
        })
    }

    pub fn with_terminate_on_close(mut self, terminate: bool) -> Self {
        self.terminate_on_close = terminate;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn capture_session_id(&mut self, headers: &HeaderMap) {
        if self.session_id.is_some() {
            return;
        }
        if let Some(value) = headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok()) {
            tracing::debug!(session_id = value, "captured MCP session ID");
            self.session_id = Some(value.to_string());
        }
    }
}

impl Transport for HttpTransport {
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()> {
        if !self.connected {
            return Err(anyhow::anyhow!("Transport is not connected"));
        }

        tracing::debug!("POST {} ({})", self.config.url, message.kind());

        let mut request = self
            .client
            .post(&self.config.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_ID_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to POST to MCP server at {}", self.config.url))?;

        self.capture_session_id(response.headers());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("MCP server returned HTTP {}: {}", status, body));
        }
        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("text/event-stream") {
            let inbox = self.inbox_tx.clone();
            tokio::spawn(pump_event_stream(response, inbox, |event, _| {
                tracing::debug!("Ignoring SSE event of type `{}`", event);
            }));
            return Ok(());
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read MCP server response body")?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        // A JSON body may hold one message or a batch
        let value: serde_json::Value =
            serde_json::from_slice(&body).context("Failed to parse MCP server response body")?;
        let messages = match value {
            serde_json::Value::Array(items) => items,
            single => vec![single],
        };
        for item in messages {
            let message = serde_json::from_value::<JsonRpcMessage>(item)
                .context("MCP server response is not a JSON-RPC message")?;
            let _ = self.inbox_tx.send(Ok(message));
        }

        Ok(())
    }

    async fn recv(&mut self) -> Result<JsonRpcMessage> {
        recv_from_inbox(&mut self.inbox, self.config.read_timeout, &mut self.connected).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        if !self.terminate_on_close {
            return Ok(());
        }
        if let Some(session_id) = self.session_id.take() {
            tracing::debug!("Terminating MCP session {}", session_id);
            let response = self
                .client
                .delete(&self.config.url)
                .header(SESSION_ID_HEADER, session_id)
                .send()
                .await;
            // Servers may not support explicit termination (405)
            if let Err(e) = response {
                tracing::debug!("MCP session termination failed: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{McpResponse, RequestId};

    #[test]
    fn test_config_defaults() {
        let config = HttpTransportConfig::new("http://localhost:8000/mcp");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(300));
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = HttpTransportConfig::new("http://localhost:8000/mcp");
        config
            .headers
            .insert("Bad Header".to_string(), "x".to_string());
        assert!(config.header_map().is_err());

        let mut config = HttpTransportConfig::new("http://localhost:8000/mcp");
        config
            .headers
            .insert("Authorization".to_string(), "Bearer t0ken".to_string());
        let map = config.header_map().unwrap();
        assert_eq!(map.get("authorization").unwrap(), "Bearer t0ken");
    }

    #[tokio::test]
    async fn test_recv_drains_inbox_in_order() {
        let mut transport =
            HttpTransport::connect(HttpTransportConfig::new("http://localhost:1/mcp")).unwrap();
        transport
            .inbox_tx
            .send(Ok(McpResponse::ok(1, serde_json::json!({})).into()))
            .unwrap();
        transport
            .inbox_tx
            .send(Ok(McpResponse::ok(2, serde_json::json!({})).into()))
            .unwrap();

        for expected in [1, 2] {
            match transport.recv().await.unwrap() {
                JsonRpcMessage::Response(r) => assert_eq!(r.id, RequestId::Number(expected)),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_recv_times_out() {
        let mut config = HttpTransportConfig::new("http://localhost:1/mcp");
        config.read_timeout = Duration::from_millis(20);
        let mut transport = HttpTransport::connect(config).unwrap();

        let err = transport.recv().await.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_to_unreachable_server_fails() {
        let mut config = HttpTransportConfig::new("http://127.0.0.1:9/mcp");
        config.connect_timeout = Duration::from_millis(200);
        let mut transport = HttpTransport::connect(config).unwrap();

        let message = crate::mcp::protocol::McpRequest::new(1, "ping", None).into();
        assert!(transport.send(&message).await.is_err());
    }
}
