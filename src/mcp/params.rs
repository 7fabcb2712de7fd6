//! Server connection parameters.
//!
//! A closed set of ways to reach a server under test. Each variant knows how
//! to open its own transport through [`Connect`]; callers go through
//! [`ServerParameters::connect`] and never branch on the variant themselves.

use crate::mcp::http_transport::{HttpTransport, HttpTransportConfig};
use crate::mcp::sse_transport::SseTransport;
use crate::mcp::transport::{AnyTransport, StdioTransport, Transport};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Opens a transport for one kind of server parameters
#[allow(async_fn_in_trait)]
pub trait Connect {
    type Transport: Transport;

    async fn connect(&self) -> Result<Self::Transport>;
}

/// Launch a local server process and talk to it over stdin/stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioServerParameters {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// Connect to a server over the legacy HTTP+SSE transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseServerParameters {
    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub sse_read_timeout: u64,
}

/// Connect to a server over streamable HTTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamableHttpServerParameters {
    pub url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub sse_read_timeout: u64,

    #[serde(default = "default_true")]
    pub terminate_on_close: bool,
}

fn default_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

/// How to reach the server under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "connection_type", rename_all = "snake_case")]
pub enum ServerParameters {
    Stdio(StdioServerParameters),
    Sse(SseServerParameters),
    StreamableHttp(StreamableHttpServerParameters),
}

impl ServerParameters {
    /// Interpret a command line target
    ///
    /// URLs ending in `/sse` use the SSE transport, other `http(s)://` URLs
    /// use streamable HTTP, and anything else is a whitespace-separated
    /// command with arguments.
    pub fn from_target(target: &str) -> Result<Self> {
        let target = target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            let path_end = target.split(['?', '#']).next().unwrap_or(target);
            if path_end.trim_end_matches('/').ends_with("/sse") {
                return Ok(Self::Sse(SseServerParameters {
                    url: target.to_string(),
                    headers: BTreeMap::new(),
                    timeout: default_timeout(),
                    sse_read_timeout: default_read_timeout(),
                }));
            }
            return Ok(Self::StreamableHttp(StreamableHttpServerParameters {
                url: target.to_string(),
                headers: BTreeMap::new(),
                timeout: default_timeout(),
                sse_read_timeout: default_read_timeout(),
                terminate_on_close: true,
            }));
        }

        let mut parts = target.split_whitespace().map(str::to_string);
        let command = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("Server target is empty"))?;
        Ok(Self::Stdio(StdioServerParameters {
            command,
            args: parts.collect(),
            env: BTreeMap::new(),
            cwd: None,
        }))
    }

    pub fn connection_type(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::Sse(_) => "sse",
            Self::StreamableHttp(_) => "streamable_http",
        }
    }

    /// Human-readable target for logs and reports
    pub fn display_target(&self) -> String {
        match self {
            Self::Stdio(p) => std::iter::once(p.command.as_str())
                .chain(p.args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Sse(p) => p.url.clone(),
            Self::StreamableHttp(p) => p.url.clone(),
        }
    }

    /// Add environment variables (stdio) or headers (URL variants)
    pub fn with_env(mut self, extra: BTreeMap<String, String>) -> Self {
        if let Self::Stdio(p) = &mut self {
            p.env.extend(extra);
        }
        self
    }

    pub fn with_headers(mut self, extra: BTreeMap<String, String>) -> Self {
        match &mut self {
            Self::Sse(p) => p.headers.extend(extra),
            Self::StreamableHttp(p) => p.headers.extend(extra),
            Self::Stdio(_) => {}
        }
        self
    }

    pub fn with_cwd(mut self, cwd: Option<PathBuf>) -> Self {
        if let Self::Stdio(p) = &mut self {
            p.cwd = cwd;
        }
        self
    }

    /// Open the transport for whichever variant this is
    pub async fn connect(&self) -> Result<AnyTransport> {
        Ok(match self {
            Self::Stdio(p) => AnyTransport::Stdio(p.connect().await?),
            Self::Sse(p) => AnyTransport::Sse(p.connect().await?),
            Self::StreamableHttp(p) => AnyTransport::StreamableHttp(p.connect().await?),
        })
    }
}

impl Connect for StdioServerParameters {
    type Transport = StdioTransport;

    async fn connect(&self) -> Result<StdioTransport> {
        StdioTransport::spawn(&self.command, &self.args, &self.env, self.cwd.as_deref()).await
    }
}

fn http_config(
    url: &str,
    headers: &BTreeMap<String, String>,
    timeout: u64,
    read_timeout: u64,
) -> HttpTransportConfig {
    HttpTransportConfig {
        url: url.to_string(),
        headers: headers.clone(),
        connect_timeout: Duration::from_secs(timeout),
        read_timeout: Duration::from_secs(read_timeout),
    }
}

impl Connect for SseServerParameters {
    type Transport = SseTransport;

    async fn connect(&self) -> Result<SseTransport> {
        SseTransport::connect(http_config(
            &self.url,
            &self.headers,
            self.timeout,
            self.sse_read_timeout,
        ))
        .await
    }
}

impl Connect for StreamableHttpServerParameters {
    type Transport = HttpTransport;

    async fn connect(&self) -> Result<HttpTransport> {
        let config = http_config(&self.url, &self.headers, self.timeout, self.sse_read_timeout);
        Ok(HttpTransport::connect(config)?.with_terminate_on_close(self.terminate_on_close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_command() {
        let params = ServerParameters::from_target("uvx mcp-server-fetch --flag").unwrap();
        match &params {
            ServerParameters::Stdio(p) => {
                assert_eq!(p.command, "uvx");
                assert_eq!(p.args, vec!["mcp-server-fetch", "--flag"]);
            }
            other => panic!("expected stdio, got {:?}", other),
        }
        assert_eq!(params.display_target(), "uvx mcp-server-fetch --flag");
    }

    #[test]
    fn test_target_urls() {
        let sse = ServerParameters::from_target("http://localhost:8000/sse").unwrap();
        assert_eq!(sse.connection_type(), "sse");

        let http = ServerParameters::from_target("https://example.com/mcp").unwrap();
        assert_eq!(http.connection_type(), "streamable_http");
    }

    #[test]
    fn test_empty_target_rejected() {
        assert!(ServerParameters::from_target("   ").is_err());
    }

    #[test]
    fn test_tagged_serialization() {
        let params = ServerParameters::from_target("node server.js")
            .unwrap()
            .with_env(BTreeMap::from([("TOKEN".to_string(), "x".to_string())]));
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["connection_type"], "stdio");
        assert_eq!(value["command"], "node");
        assert_eq!(value["env"]["TOKEN"], "x");

        let parsed: ServerParameters = serde_json::from_value(json!({
            "connection_type": "streamable_http",
            "url": "http://localhost:3000/mcp",
            "headers": {"Authorization": "Bearer abc"}
        }))
        .unwrap();
        match parsed {
            ServerParameters::StreamableHttp(p) => {
                assert_eq!(p.timeout, 5);
                assert_eq!(p.sse_read_timeout, 300);
                assert!(p.terminate_on_close);
                assert_eq!(p.headers["Authorization"], "Bearer abc");
            }
            other => panic!("expected streamable_http, got {:?}", other),
        }
    }

    #[test]
    fn test_headers_ignored_for_stdio() {
        let params = ServerParameters::from_target("server")
            .unwrap()
            .with_headers(BTreeMap::from([("X".to_string(), "1".to_string())]));
        assert_eq!(serde_json::to_value(&params).unwrap().get("headers"), None);
    }

    #[tokio::test]
    async fn test_connect_missing_command_fails() {
        let params = ServerParameters::from_target("no-such-mcp-server-binary-xyz").unwrap();
        assert!(params.connect().await.is_err());
    }
}
