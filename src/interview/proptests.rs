// Property-based tests for judge reply parsing and scorecard evaluation

use crate::constraints::tests::scorecard_with_tools;
use crate::constraints::{Constraint, ConstraintSet};
use crate::interview::judge::{extract_json, parse_reply};
use crate::interview::rubric::Score;
use crate::interview::scorecard::ScoreBand;
use proptest::prelude::*;
use serde_json::{json, Value};

/// Chatter around a JSON payload that cannot itself open or close JSON
fn arb_chatter() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:!?\n`-]{0,40}"
}

fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..5)
        .prop_map(|map| json!(map))
}

proptest! {
    #[test]
    fn prop_extract_json_ignores_surrounding_text(
        prefix in arb_chatter(),
        suffix in arb_chatter(),
        object in arb_object(),
    ) {
        let payload = object.to_string();
        let reply = format!("{}{}{}", prefix, payload, suffix);
        prop_assert_eq!(extract_json(&reply).unwrap(), payload.as_str());

        let parsed: Value = parse_reply(&reply).unwrap();
        prop_assert_eq!(parsed, object);
    }

    #[test]
    fn prop_score_reply_in_fenced_block(justification in "[a-zA-Z ]{0,30}", pass in any::<bool>()) {
        let verdict = if pass { "pass" } else { "fail" };
        let reply = format!(
            "Sure:\n```json\n{{\"score\":\"{}\",\"justification\":\"{}\"}}\n```\nthanks!",
            verdict, justification
        );
        let score: Score = parse_reply(&reply).unwrap();
        prop_assert_eq!(score.justification, justification);
    }

    #[test]
    fn prop_constraints_are_deterministic(
        names in prop::collection::vec("[a-zA-Z0-9_.-]{0,70}", 0..30)
    ) {
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let card = scorecard_with_tools(&refs);
        let set = ConstraintSet::all();
        prop_assert_eq!(set.evaluate(&card), set.evaluate(&card));
    }

    #[test]
    fn prop_score_bands_are_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let rank = |band: ScoreBand| match band {
            ScoreBand::VeryPoor => 0,
            ScoreBand::Poor => 1,
            ScoreBand::Mixed => 2,
            ScoreBand::Good => 3,
            ScoreBand::Excellent => 4,
        };
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(rank(ScoreBand::from_score(low)) <= rank(ScoreBand::from_score(high)));
    }
}
