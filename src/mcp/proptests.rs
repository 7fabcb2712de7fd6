//! Property-Based Tests for the MCP layer
//!
//! - **Message classification**: whatever the payload, a message decodes to
//!   the same JSON-RPC variant it was encoded from
//! - **Listing pages**: item order and cursor survive page extraction
//! - **Retry delays**: backoff never shrinks and never exceeds its cap
//! - **SSE decoding**: chunk boundaries never change the decoded events
//!
//! # Running the Tests
//!
//! ```bash
//! cargo test --lib mcp::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::mcp::protocol::{
    JsonRpcMessage, ListKind, ListPage, McpError, McpNotification, McpRequest, McpResponse,
    RequestId,
};
use crate::mcp::retry::RetryConfig;
use crate::mcp::sse::SseDecoder;
use std::time::Duration;

fn arb_json_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
        prop::collection::vec(any::<i64>().prop_map(|n| Value::Number(n.into())), 0..3)
            .prop_map(Value::Array),
    ]
}

fn arb_request_id() -> impl Strategy<Value = RequestId> {
    prop_oneof![
        any::<u64>().prop_map(RequestId::Number),
        "[a-z0-9-]{1,12}".prop_map(RequestId::String),
    ]
}

fn arb_kind() -> impl Strategy<Value = ListKind> {
    prop::sample::select(ListKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_request_classified_as_request(
        id in arb_request_id(),
        method in "[a-z]+(/[a-zA-Z]+)?",
        params in prop::option::of(arb_json_value().prop_filter("null params read as absent", |v| !v.is_null()))
    ) {
        let original = McpRequest::new(id, method, params);
        let wire = serde_json::to_string(&JsonRpcMessage::from(original.clone())).unwrap();
        let decoded: JsonRpcMessage = serde_json::from_str(&wire).unwrap();
        prop_assert_eq!(decoded, JsonRpcMessage::Request(original));
    }

    #[test]
    fn prop_notification_classified_as_notification(method in "notifications/[a-z]+") {
        let original = McpNotification::new(method, Some(json!({"k": 1})));
        let wire = serde_json::to_string(&original).unwrap();
        let decoded: JsonRpcMessage = serde_json::from_str(&wire).unwrap();
        prop_assert_eq!(decoded, JsonRpcMessage::Notification(original));
    }

    #[test]
    fn prop_response_classified_as_response(
        id in arb_request_id(),
        result in arb_json_value().prop_filter("null result reads as absent", |v| !v.is_null()),
        code in prop::option::of(-32768i32..-32000)
    ) {
        let original = match code {
            Some(code) => McpResponse::err(id, McpError::new(code, "boom")),
            None => McpResponse::ok(id, result),
        };
        let wire = serde_json::to_string(&original).unwrap();
        let decoded: JsonRpcMessage = serde_json::from_str(&wire).unwrap();
        prop_assert_eq!(decoded, JsonRpcMessage::Response(original));
    }
}

proptest! {
    #[test]
    fn prop_list_page_preserves_items(
        kind in arb_kind(),
        names in prop::collection::vec("[a-z]{1,8}", 0..20),
        cursor in prop::option::of("[a-zA-Z0-9]{1,10}")
    ) {
        let items: Vec<Value> = names.iter().map(|n| json!({"name": n})).collect();
        let mut result = json!({ kind.result_key(): items.clone() });
        if let Some(c) = &cursor {
            result["nextCursor"] = json!(c);
        }

        let page = ListPage::from_result(kind, &result).unwrap();
        prop_assert_eq!(page.items, items);
        prop_assert_eq!(page.next_cursor, cursor);
    }
}

proptest! {
    #[test]
    fn prop_retry_delays_monotonic_and_capped(
        base_ms in 1u64..2000,
        max_ms in 1u64..60_000,
        attempts in 1usize..12
    ) {
        let config = RetryConfig::new()
            .base_delay(Duration::from_millis(base_ms))
            .max_delay(Duration::from_millis(max_ms));

        let mut previous = Duration::ZERO;
        for attempt in 0..attempts {
            let delay = config.calculate_delay(attempt);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= Duration::from_millis(max_ms));
            previous = delay;
        }
    }
}

proptest! {
    #[test]
    fn prop_sse_chunking_is_transparent(
        payloads in prop::collection::vec("[ -~]{0,40}", 1..6),
        cut in 1usize..16
    ) {
        let mut stream = String::new();
        for payload in &payloads {
            stream.push_str(&format!("event: message\ndata: {}\n\n", payload));
        }

        let mut whole = SseDecoder::new();
        let expected = whole.push(stream.as_bytes());

        let mut chunked = SseDecoder::new();
        let mut actual = Vec::new();
        for chunk in stream.as_bytes().chunks(cut) {
            actual.extend(chunked.push(chunk));
        }

        prop_assert_eq!(actual.len(), payloads.len());
        prop_assert_eq!(actual, expected);
    }
}
