//! MCP (Model Context Protocol) Client Implementation
//!
//! A self-contained MCP client, built on Tokio and reqwest (no external SDK),
//! with just enough surface to interview a server: handshake, paginated
//! listings, tool calls, and answering the server's own requests.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 and MCP message types
//! 2. **Transport Layer** (`transport`, `http_transport`, `sse_transport`): stdio, streamable HTTP, SSE
//! 3. **Client Layer** (`client`): request correlation and server callbacks
//! 4. **Parameters** (`params`): how to reach a server, and opening its transport

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Transport layer: stdio transport and the transport trait
pub mod transport;

// Streamable HTTP transport for remote MCP servers
pub mod http_transport;

// Legacy HTTP+SSE transport
pub mod sse_transport;

// Incremental SSE decoding shared by the HTTP transports
pub mod sse;

// Client layer: High-level MCP client API
pub mod client;

// Server connection parameters
pub mod params;

// Retry logic and error resilience
pub mod retry;

pub use protocol::{
    CallToolResult, InitializeResult, JsonRpcMessage, ListKind, ListPage, McpError, McpMethod,
    McpNotification, McpRequest, McpResponse, Prompt, RequestId, Resource, ResourceTemplate,
    ServerCapabilities, Tool,
};

pub use http_transport::{HttpTransport, HttpTransportConfig};
pub use sse_transport::SseTransport;
pub use transport::{AnyTransport, StdioTransport, Transport};

pub use client::{ClientState, McpClient};
pub use params::{Connect, ServerParameters};

// Property-based tests module
#[cfg(test)]
mod proptests;
