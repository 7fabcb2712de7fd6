//! MCP Transport Layer
//!
//! This module defines the transport abstraction for talking to the server
//! under test. Three transports are supported:
//!
//! - **stdio**: the server is a child process speaking newline-delimited JSON
//! - **streamable HTTP**: one POST per message, replies as JSON or SSE ([`HttpTransport`])
//! - **SSE**: the legacy long-lived event stream plus a POST endpoint ([`SseTransport`])
//!
//! # Architecture
//!
//! The transport layer is responsible only for moving whole JSON-RPC messages.
//! Request/response correlation and server-initiated requests are handled by
//! the client layer.
//!
//! [`HttpTransport`]: crate::mcp::http_transport::HttpTransport
//! [`SseTransport`]: crate::mcp::sse_transport::SseTransport

use crate::mcp::http_transport::HttpTransport;
use crate::mcp::protocol::JsonRpcMessage;
use crate::mcp::sse_transport::SseTransport;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Transport trait for MCP communication
///
/// Messages flow in both directions: `recv` yields responses as well as
/// requests and notifications initiated by the server.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Send one message to the MCP server
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()>;

    /// Receive the next message from the MCP server
    async fn recv(&mut self) -> Result<JsonRpcMessage>;

    /// Check if the transport is still connected
    fn is_connected(&self) -> bool;

    /// Release the connection (terminate the process, end the HTTP session)
    async fn close(&mut self) -> Result<()>;
}

/// stdio transport for local MCP servers
///
/// This transport spawns an MCP server as a child process and communicates
/// with it via stdin/stdout. Each line is a JSON-RPC message. The server's
/// stderr is inherited so its diagnostics stay visible.
///
/// # Example
///
/// ```ignore
/// let transport = StdioTransport::spawn("npx", &["-y".into(), "@modelcontextprotocol/server-everything".into()], &env, None).await?;
/// ```
pub struct StdioTransport {
    /// Child process handle
    child: Option<Child>,

    /// stdin handle for sending messages
    stdin: ChildStdin,

    /// stdout handle for receiving messages
    stdout: BufReader<ChildStdout>,

    /// Server command (for diagnostics)
    command: String,

    /// Whether the transport is still connected
    connected: bool,

    /// Reusable buffer for reading lines
    line_buffer: String,
}

impl StdioTransport {
    /// Spawn a new MCP server process and create a stdio transport
    ///
    /// # Arguments
    ///
    /// * `command` - The command to spawn (e.g., "npx", "python", "./server")
    /// * `args` - Arguments to pass to the command
    /// * `env` - Extra environment variables layered over the inherited environment
    /// * `cwd` - Working directory for the server, if different from ours
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<Self> {
        tracing::info!("Spawning MCP server: {}", command);
        tracing::debug!("Server arguments: {:?}", args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn MCP server process `{}`", command))?;

        let stdin = child.stdin.take().context("Failed to get child stdin")?;
        let stdout = child.stdout.take().context("Failed to get child stdout")?;

        Ok(Self {
            child: Some(child),
            stdin,
            stdout: BufReader::new(stdout),
            command: format!("{} {}", command, args.join(" ")).trim_end().to_string(),
            connected: true,
            line_buffer: String::with_capacity(4096),
        })
    }

    /// Get the server command string (for diagnostics)
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::debug!("Dropping StdioTransport, killing MCP server");
            // Can't await in Drop, so just start the kill
            let _ = child.start_kill();
        }
    }
}

impl Transport for StdioTransport {
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()> {
        if !self.connected {
            return Err(anyhow::anyhow!("Transport is not connected"));
        }

        let mut json =
            serde_json::to_string(message).context("Failed to serialize MCP message to JSON")?;
        tracing::debug!("Sending to MCP server: {}", json);
        json.push('\n');

        let write = async {
            self.stdin.write_all(json.as_bytes()).await?;
            self.stdin.flush().await
        };
        if let Err(e) = write.await {
            self.connected = false;
            return Err(e).context("Failed to write to MCP server stdin");
        }

        Ok(())
    }

    /// Read lines until one parses as a JSON-RPC message
    ///
    /// Servers commonly print banners or stray debug output to stdout. Those
    /// lines are skipped with a warning instead of failing the session.
    async fn recv(&mut self) -> Result<JsonRpcMessage> {
        loop {
            if !self.connected {
                return Err(anyhow::anyhow!("Transport is not connected"));
            }

            self.line_buffer.clear();
            let bytes_read = self
                .stdout
                .read_line(&mut self.line_buffer)
                .await
                .context("Failed to read from MCP server stdout")?;

            if bytes_read == 0 {
                self.connected = false;
                return Err(anyhow::anyhow!(
                    "MCP server `{}` closed connection (EOF)",
                    self.command
                ));
            }

            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received from MCP server: {}", line);

            match serde_json::from_str::<JsonRpcMessage>(line) {
                Ok(message) => return Ok(message),
                Err(e) => {
                    tracing::warn!("Skipping non JSON-RPC line from server ({}): {}", e, line)
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected && self.child.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping MCP server: {}", self.command);
            child
                .kill()
                .await
                .context("Failed to kill MCP server process")?;
        }
        Ok(())
    }
}

/// One of the concrete transports, chosen at runtime from the server parameters
pub enum AnyTransport {
    Stdio(StdioTransport),
    StreamableHttp(HttpTransport),
    Sse(SseTransport),
}

impl AnyTransport {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::StreamableHttp(_) => "streamable_http",
            Self::Sse(_) => "sse",
        }
    }
}

impl Transport for AnyTransport {
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()> {
        match self {
            Self::Stdio(t) => t.send(message).await,
            Self::StreamableHttp(t) => t.send(message).await,
            Self::Sse(t) => t.send(message).await,
        }
    }

    async fn recv(&mut self) -> Result<JsonRpcMessage> {
        match self {
            Self::Stdio(t) => t.recv().await,
            Self::StreamableHttp(t) => t.recv().await,
            Self::Sse(t) => t.recv().await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Stdio(t) => t.is_connected(),
            Self::StreamableHttp(t) => t.is_connected(),
            Self::Sse(t) => t.is_connected(),
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Stdio(t) => t.close().await,
            Self::StreamableHttp(t) => t.close().await,
            Self::Sse(t) => t.close().await,
        }
    }
}
