//! Session callback multiplexer.
//!
//! A server under test may call back into the client while a tool call is in
//! flight: to sample from an LLM, to elicit user input, to list roots, or to
//! emit log messages. The interviewer answers each with a fixed, valid reply
//! and counts how often each kind was used so the executor can attribute the
//! calls to individual scenario steps.

use crate::mcp::protocol::{McpError, McpMethod, McpNotification, McpRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Text returned for every `sampling/createMessage`
pub const SAMPLING_REPLY: &str = "This is a placeholder response from mcp-interviewer.";

/// Per-kind counts of server-initiated requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub sampling_requests: u32,
    pub elicitation_requests: u32,
    pub list_roots_requests: u32,
    pub logging_requests: u32,
}

impl RequestCounts {
    /// Counts accumulated since `earlier` was captured
    pub fn since(&self, earlier: &RequestCounts) -> RequestCounts {
        RequestCounts {
            sampling_requests: self.sampling_requests.saturating_sub(earlier.sampling_requests),
            elicitation_requests: self
                .elicitation_requests
                .saturating_sub(earlier.elicitation_requests),
            list_roots_requests: self
                .list_roots_requests
                .saturating_sub(earlier.list_roots_requests),
            logging_requests: self.logging_requests.saturating_sub(earlier.logging_requests),
        }
    }

    pub fn total(&self) -> u32 {
        self.sampling_requests
            + self.elicitation_requests
            + self.list_roots_requests
            + self.logging_requests
    }
}

impl std::ops::Add for RequestCounts {
    type Output = RequestCounts;

    fn add(self, other: RequestCounts) -> RequestCounts {
        RequestCounts {
            sampling_requests: self.sampling_requests + other.sampling_requests,
            elicitation_requests: self.elicitation_requests + other.elicitation_requests,
            list_roots_requests: self.list_roots_requests + other.list_roots_requests,
            logging_requests: self.logging_requests + other.logging_requests,
        }
    }
}

impl std::iter::Sum for RequestCounts {
    fn sum<I: Iterator<Item = RequestCounts>>(iter: I) -> Self {
        iter.fold(RequestCounts::default(), |acc, c| acc + c)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageResult {
    role: &'static str,
    content: TextContent,
    model: &'static str,
    stop_reason: &'static str,
}

#[derive(Serialize)]
struct TextContent {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'static str,
}

#[derive(Serialize)]
struct ElicitResult {
    action: &'static str,
}

#[derive(Serialize)]
struct ListRootsResult {
    roots: Vec<Root>,
}

#[derive(Serialize)]
struct Root {
    uri: String,
    name: String,
}

/// Answers server-initiated requests and counts them
///
/// Counters only ever increase. Callbacks run on the task awaiting the
/// in-flight call, so plain integers are enough.
#[derive(Debug, Clone)]
pub struct CallbackMultiplexer {
    counts: RequestCounts,
    root_uri: String,
}

impl Default for CallbackMultiplexer {
    fn default() -> Self {
        Self::new("file:///")
    }
}

impl CallbackMultiplexer {
    pub fn new(root_uri: impl Into<String>) -> Self {
        Self {
            counts: RequestCounts::default(),
            root_uri: root_uri.into(),
        }
    }

    /// Current counter values
    pub fn snapshot(&self) -> RequestCounts {
        self.counts
    }

    /// Produce the reply for a server request
    ///
    /// `ping` is answered but not counted. Methods the interviewer does not
    /// implement get a JSON-RPC "method not found" error.
    pub fn handle_request(&mut self, request: &McpRequest) -> Result<Value, McpError> {
        match McpMethod::from(request.method.as_str()) {
            McpMethod::SamplingCreateMessage => {
                self.counts.sampling_requests += 1;
                Ok(canned(&CreateMessageResult {
                    role: "assistant",
                    content: TextContent {
                        kind: "text",
                        text: SAMPLING_REPLY,
                    },
                    model: "mcp-interviewer",
                    stop_reason: "endTurn",
                }))
            }
            McpMethod::ElicitationCreate => {
                self.counts.elicitation_requests += 1;
                Ok(canned(&ElicitResult { action: "cancel" }))
            }
            McpMethod::RootsList => {
                self.counts.list_roots_requests += 1;
                Ok(canned(&ListRootsResult {
                    roots: vec![Root {
                        uri: self.root_uri.clone(),
                        name: "root".to_string(),
                    }],
                }))
            }
            McpMethod::Ping => Ok(json!({})),
            other => {
                tracing::debug!("Server sent unsupported request: {}", other.as_str());
                Err(McpError::method_not_found(other.as_str()))
            }
        }
    }

    /// Record a server notification
    pub fn handle_notification(&mut self, notification: &McpNotification) {
        match McpMethod::from(notification.method.as_str()) {
            McpMethod::LoggingMessage => {
                self.counts.logging_requests += 1;
                if let Some(params) = &notification.params {
                    tracing::debug!("Server log: {}", params);
                }
            }
            other => tracing::trace!("Ignoring server notification {}", other.as_str()),
        }
    }
}

/// Serialize a fixed reply. These structs contain only strings, so failure
/// here is a bug in this module.
fn canned<T: Serialize>(reply: &T) -> Value {
    serde_json::to_value(reply).expect("canned callback reply must serialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str) -> McpRequest {
        McpRequest::new("srv-1", method, Some(json!({})))
    }

    #[test]
    fn test_sampling_reply_and_count() {
        let mut mux = CallbackMultiplexer::default();
        let reply = mux.handle_request(&request("sampling/createMessage")).unwrap();

        assert_eq!(reply["role"], "assistant");
        assert_eq!(reply["content"]["type"], "text");
        assert_eq!(reply["content"]["text"], SAMPLING_REPLY);
        assert_eq!(reply["stopReason"], "endTurn");
        assert_eq!(mux.snapshot().sampling_requests, 1);
    }

    #[test]
    fn test_elicitation_is_cancelled() {
        let mut mux = CallbackMultiplexer::default();
        let reply = mux.handle_request(&request("elicitation/create")).unwrap();
        assert_eq!(reply, json!({"action": "cancel"}));
        assert_eq!(mux.snapshot().elicitation_requests, 1);
    }

    #[test]
    fn test_roots_lists_single_root() {
        let mut mux = CallbackMultiplexer::new("file:///workspace");
        let reply = mux.handle_request(&request("roots/list")).unwrap();
        assert_eq!(reply["roots"].as_array().unwrap().len(), 1);
        assert_eq!(reply["roots"][0]["uri"], "file:///workspace");
        assert_eq!(mux.snapshot().list_roots_requests, 1);
    }

    #[test]
    fn test_ping_and_unknown_methods_not_counted() {
        let mut mux = CallbackMultiplexer::default();
        assert_eq!(mux.handle_request(&request("ping")).unwrap(), json!({}));

        let err = mux.handle_request(&request("completion/complete")).unwrap_err();
        assert_eq!(err.code, -32601);
        assert_eq!(mux.snapshot(), RequestCounts::default());
    }

    #[test]
    fn test_logging_notifications_counted() {
        let mut mux = CallbackMultiplexer::default();
        mux.handle_notification(&McpNotification::new(
            "notifications/message",
            Some(json!({"level": "info", "data": "hello"})),
        ));
        mux.handle_notification(&McpNotification::new("notifications/progress", None));
        assert_eq!(mux.snapshot().logging_requests, 1);
        assert_eq!(mux.snapshot().total(), 1);
    }

    #[test]
    fn test_snapshot_delta() {
        let mut mux = CallbackMultiplexer::default();
        mux.handle_request(&request("roots/list")).unwrap();
        let before = mux.snapshot();

        mux.handle_request(&request("sampling/createMessage")).unwrap();
        mux.handle_request(&request("sampling/createMessage")).unwrap();
        let delta = mux.snapshot().since(&before);

        assert_eq!(delta.sampling_requests, 2);
        assert_eq!(delta.list_roots_requests, 0);
        assert_eq!(mux.snapshot().list_roots_requests, 1);
    }

    #[test]
    fn test_counts_sum() {
        let a = RequestCounts {
            sampling_requests: 1,
            logging_requests: 2,
            ..Default::default()
        };
        let b = RequestCounts {
            elicitation_requests: 3,
            ..Default::default()
        };
        let total: RequestCounts = [a, b].into_iter().sum();
        assert_eq!(total.total(), 6);
    }
}
