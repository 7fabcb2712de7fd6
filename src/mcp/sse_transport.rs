//! Legacy HTTP+SSE transport.
//!
//! The client opens a long-lived GET event stream. The server's first event
//! is `endpoint`, whose data is the URL (usually relative) that the client
//! POSTs its messages to. Everything the server sends, including responses
//! to those POSTs, arrives on the event stream as `message` events.

use crate::mcp::http_transport::{
    pump_event_stream, recv_from_inbox, HttpTransportConfig, Inbox,
};
use crate::mcp::protocol::JsonRpcMessage;
use crate::mcp::transport::Transport;
use anyhow::{Context, Result};
use reqwest::header::ACCEPT;
use reqwest::Url;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub struct SseTransport {
    client: reqwest::Client,
    endpoint: Url,
    read_timeout: std::time::Duration,
    inbox: Inbox,
    stream_task: JoinHandle<()>,
    connected: bool,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its endpoint
    pub async fn connect(config: HttpTransportConfig) -> Result<Self> {
        let client = config.build_client()?;
        let base = Url::parse(&config.url)
            .with_context(|| format!("Invalid SSE server URL `{}`", config.url))?;

        tracing::info!("Opening SSE stream: {}", base);

        let response = client
            .get(base.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .with_context(|| format!("Failed to open SSE stream at {}", base))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("SSE stream request returned HTTP {}", status));
        }

        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let mut endpoint_tx = Some(endpoint_tx);

        let stream_task = tokio::spawn(pump_event_stream(response, inbox_tx, move |event, data| {
            if event == "endpoint" {
                if let Some(tx) = endpoint_tx.take() {
                    let _ = tx.send(data.trim().to_string());
                }
            }
        }));

        let announced = match tokio::time::timeout(config.connect_timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(anyhow::anyhow!(
                    "SSE stream ended before the server announced its endpoint"
                ))
            }
            Err(_) => {
                stream_task.abort();
                return Err(anyhow::anyhow!(
                    "Timed out after {:?} waiting for SSE endpoint event",
                    config.connect_timeout
                ));
            }
        };

        let endpoint = resolve_endpoint(&base, &announced)?;
        tracing::debug!("SSE message endpoint: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            read_timeout: config.read_timeout,
            inbox,
            stream_task,
            connected: true,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Resolve the announced endpoint against the stream URL
fn resolve_endpoint(base: &Url, announced: &str) -> Result<Url> {
    base.join(announced)
        .with_context(|| format!("Invalid SSE endpoint `{}`", announced))
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.stream_task.abort();
    }
}

impl Transport for SseTransport {
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()> {
        if !self.connected {
            return Err(anyhow::anyhow!("Transport is not connected"));
        }

        tracing::debug!("POST {} ({})", self.endpoint, message.kind());

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await
            .with_context(|| format!("Failed to POST to SSE endpoint {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("SSE endpoint returned HTTP {}: {}", status, body));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<JsonRpcMessage> {
        recv_from_inbox(&mut self.inbox, self.read_timeout, &mut self.connected).await
    }

    fn is_connected(&self) -> bool {
        self.connected && !self.stream_task.is_finished()
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.stream_task.abort();
        Ok(())
    }
}
