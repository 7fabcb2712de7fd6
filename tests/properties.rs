//! Property tests over the enumeration and executor phases.

mod common;

use common::{params, FakeFactory, FakeServer};
use mcp_interviewer::interview::enumerate::enumerate;
use mcp_interviewer::interview::scenario::{execute, PlanStep, ScenarioPlan};
use mcp_interviewer::interview::SessionFactory;
use mcp_interviewer::mcp::protocol::ListKind;
use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Page sizes, each page at least one item
fn arb_page_sizes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..6)
}

proptest! {
    #[test]
    fn prop_pages_concatenate_in_cursor_order(sizes in arb_page_sizes()) {
        let mut counter = 0;
        let names: Vec<Vec<String>> = sizes
            .iter()
            .map(|size| {
                (0..*size)
                    .map(|_| {
                        counter += 1;
                        format!("tool_{}", counter)
                    })
                    .collect()
            })
            .collect();
        let pages: Vec<Vec<&str>> = names
            .iter()
            .map(|page| page.iter().map(String::as_str).collect())
            .collect();
        let page_refs: Vec<&[&str]> = pages.iter().map(Vec::as_slice).collect();
        let server = FakeServer::with_tool_pages(&page_refs);

        let (inventory, failures) = block_on(async {
            let mut session = FakeFactory(server.clone()).connect(&params()).await.unwrap();
            enumerate(&mut session, &server.capabilities, Duration::from_secs(5)).await
        });

        let expected: Vec<String> = names.into_iter().flatten().collect();
        let got: Vec<String> = inventory.tools.into_iter().map(|t| t.name).collect();
        prop_assert!(failures.is_empty());
        prop_assert_eq!(got, expected);
        prop_assert_eq!(server.list_calls.lock().unwrap().len(), sizes.len());
        prop_assert!(server.listed_kinds().iter().all(|k| *k == ListKind::Tools));
    }

    #[test]
    fn prop_callbacks_land_on_their_step(steps in 1usize..6, pick in 0usize..6, k in 1u32..5) {
        let target = pick % steps;
        let names: Vec<String> = (0..steps).map(|i| format!("t{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut server = FakeServer::with_tools(&refs);
        server.sampling_per_call.insert(names[target].clone(), k);

        let plan = ScenarioPlan {
            plan: String::new(),
            steps: names
                .iter()
                .map(|name| PlanStep {
                    tool_name: name.clone(),
                    tool_arguments: json!({}),
                    justification: String::new(),
                    expected_output: String::new(),
                })
                .collect(),
        };

        let report = block_on(async {
            let mut session = FakeFactory(server).connect(&params()).await.unwrap();
            execute(&mut session, &plan, Duration::from_secs(5)).await
        });

        prop_assert_eq!(report.steps.len(), steps);
        for (index, step) in report.steps.iter().enumerate() {
            let expected = if index == target { k } else { 0 };
            prop_assert_eq!(step.requests.sampling_requests, expected);
            prop_assert_eq!(step.requests.total(), expected);
        }
    }
}
