//! Fakes shared by the integration tests: a scripted MCP server behind the
//! `SessionFactory`/`Session` seam and a judge that answers by prompt kind.

#![allow(dead_code)]

use mcp_interviewer::error::SessionError;
use mcp_interviewer::interview::judge::{ChatMessage, ChatModel, Role};
use mcp_interviewer::interview::rubric::{PlanScoreCard, Rubric, StepScoreCard, ToolScoreCard};
use mcp_interviewer::interview::{JudgeClient, RequestCounts, Session, SessionFactory};
use mcp_interviewer::mcp::protocol::{
    CallToolResult, InitializeResult, ListKind, ListPage, McpError, ServerCapabilities,
};
use mcp_interviewer::mcp::ServerParameters;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake server behaves
#[derive(Clone, Default)]
pub struct FakeServer {
    pub capabilities: ServerCapabilities,
    /// Pages per listing kind, served in order
    pub pages: HashMap<ListKind, Vec<Vec<Value>>>,
    /// Listing kinds that fail at the given page index
    pub list_failures: HashMap<ListKind, usize>,
    /// Sampling callbacks fired during a call to the named tool
    pub sampling_per_call: HashMap<String, u32>,
    /// Tools whose call breaks the connection
    pub broken_tools: Vec<String>,
    /// Tools whose call fails in transit while the connection stays up
    pub failing_tools: Vec<String>,
    /// Listings never run out of pages; each extra page takes 10ms
    pub endless_listing: bool,
    /// Cursor handed out after the last page of a listing, instead of none
    pub loop_back: HashMap<ListKind, usize>,
    /// Tools whose call never returns in time
    pub slow_tools: Vec<String>,
    pub connect_error: Option<String>,
    pub negotiate_error: Option<String>,
    /// Every listing request made, across sessions
    pub list_calls: Arc<Mutex<Vec<(ListKind, Option<String>)>>>,
    /// Every tool called, across sessions
    pub tool_calls: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl FakeServer {
    /// A server advertising only tools, with the given names split into pages
    pub fn with_tool_pages(pages: &[&[&str]]) -> Self {
        let mut server = FakeServer {
            capabilities: ServerCapabilities {
                tools: Some(json!({})),
                ..Default::default()
            },
            ..Default::default()
        };
        server.pages.insert(
            ListKind::Tools,
            pages
                .iter()
                .map(|page| page.iter().map(|name| tool_json(name)).collect())
                .collect(),
        );
        server
    }

    pub fn with_tools(names: &[&str]) -> Self {
        Self::with_tool_pages(&[names])
    }

    pub fn listed_kinds(&self) -> Vec<ListKind> {
        self.list_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(kind, _)| *kind)
            .collect()
    }
}

pub fn tool_json(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("Does {}", name),
        "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}
    })
}

pub fn params() -> ServerParameters {
    ServerParameters::from_target("fake-server --stdio").unwrap()
}

pub struct FakeFactory(pub FakeServer);

impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn connect(&self, _params: &ServerParameters) -> anyhow::Result<FakeSession> {
        if let Some(message) = &self.0.connect_error {
            anyhow::bail!("{}", message);
        }
        Ok(FakeSession {
            server: self.0.clone(),
            counts: RequestCounts::default(),
            negotiated: false,
            usable: true,
        })
    }
}

pub struct FakeSession {
    server: FakeServer,
    counts: RequestCounts,
    negotiated: bool,
    usable: bool,
}

impl Session for FakeSession {
    async fn negotiate(&mut self) -> Result<InitializeResult, SessionError> {
        if let Some(message) = &self.server.negotiate_error {
            return Err(SessionError::Rpc(McpError::internal_error(message.clone())));
        }
        if self.negotiated {
            return Err(SessionError::AlreadyNegotiated);
        }
        self.negotiated = true;
        Ok(InitializeResult {
            protocol_version: "2025-06-18".to_string(),
            capabilities: self.server.capabilities.clone(),
            server_info: serde_json::from_value(json!({"name": "fake", "version": "1.0.0"}))
                .unwrap(),
            instructions: None,
        })
    }

    async fn list(
        &mut self,
        kind: ListKind,
        cursor: Option<&str>,
    ) -> Result<ListPage, SessionError> {
        self.server
            .list_calls
            .lock()
            .unwrap()
            .push((kind, cursor.map(str::to_string)));

        let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        if self.server.list_failures.get(&kind) == Some(&index) {
            return Err(SessionError::Rpc(McpError::internal_error("listing exploded")));
        }

        let pages = self.server.pages.get(&kind).cloned().unwrap_or_default();
        if self.server.endless_listing && index >= pages.len() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            return Ok(ListPage {
                items: vec![tool_json(&format!("extra_{}", index))],
                next_cursor: Some((index + 1).to_string()),
            });
        }

        let items = pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if index + 1 < pages.len() || self.server.endless_listing {
            Some((index + 1).to_string())
        } else {
            self.server.loop_back.get(&kind).map(usize::to_string)
        };
        Ok(ListPage { items, next_cursor })
    }

    async fn call(
        &mut self,
        name: &str,
        _arguments: &Value,
    ) -> Result<CallToolResult, SessionError> {
        self.server.tool_calls.lock().unwrap().push(name.to_string());

        if self.server.broken_tools.iter().any(|t| t == name) {
            self.usable = false;
            return Err(SessionError::Transport(anyhow::anyhow!("connection reset by peer")));
        }
        if self.server.failing_tools.iter().any(|t| t == name) {
            return Err(SessionError::Transport(anyhow::anyhow!(
                "HTTP 500 Internal Server Error: boom"
            )));
        }
        if self.server.slow_tools.iter().any(|t| t == name) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        if let Some(k) = self.server.sampling_per_call.get(name) {
            self.counts.sampling_requests += k;
        }

        Ok(CallToolResult {
            content: vec![json!({"type": "text", "text": format!("{} done", name)})],
            ..Default::default()
        })
    }

    fn request_counts(&self) -> RequestCounts {
        self.counts
    }

    fn is_usable(&self) -> bool {
        self.usable
    }

    async fn close(&mut self) {
        *self.server.closed.lock().unwrap() = true;
    }
}

/// A reply where every verdict passes
pub fn all_pass<R: Rubric>() -> String {
    fn fill(value: &mut Value) {
        if let Some(object) = value.as_object_mut() {
            if object.contains_key("score") {
                object.insert("score".to_string(), json!("pass"));
            } else if object.contains_key("value") {
                object.insert("value".to_string(), json!("No Error"));
            } else {
                object.values_mut().for_each(fill);
            }
        }
    }

    let mut value = serde_json::to_value(R::not_applicable("looks fine")).unwrap();
    fill(&mut value);
    value.to_string()
}

pub fn plan_json(tools: &[&str]) -> String {
    let steps: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "tool_name": tool,
                "tool_arguments": {"path": "/tmp/x"},
                "justification": format!("exercise {}", tool),
                "expected_output": "something useful"
            })
        })
        .collect();
    json!({"plan": "Call every tool once.", "steps": steps}).to_string()
}

/// Judge that answers each prompt kind with a canned reply
#[derive(Clone)]
pub struct FakeJudge {
    pub plan: String,
    pub tool_reply: String,
    /// Extra latency on tool scoring replies
    pub tool_delay: Duration,
    /// Extra latency on scenario replies
    pub plan_delay: Duration,
    pub conversations: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl FakeJudge {
    pub fn new(plan: String) -> Self {
        Self {
            plan,
            tool_reply: all_pass::<ToolScoreCard>(),
            tool_delay: Duration::ZERO,
            plan_delay: Duration::ZERO,
            conversations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn client(self) -> JudgeClient<FakeJudge> {
        JudgeClient::new(self)
    }

    pub fn calls(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }
}

impl ChatModel for FakeJudge {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        let prompt = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let reply = if prompt.starts_with("Evaluate the following tool definition") {
            tokio::time::sleep(self.tool_delay).await;
            self.tool_reply.clone()
        } else if prompt.starts_with("Write a realistic test scenario") {
            tokio::time::sleep(self.plan_delay).await;
            self.plan.clone()
        } else if prompt.starts_with("Evaluate the result of one tool call") {
            all_pass::<StepScoreCard>()
        } else if prompt.starts_with("Evaluate the test scenario as a whole") {
            all_pass::<PlanScoreCard>()
        } else {
            anyhow::bail!("unexpected prompt: {}", prompt)
        };
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        "fake-judge"
    }
}
