//! Input schema flatness.
//!
//! Models fill flat argument objects far more reliably than nested ones. A
//! tool is flagged when any top-level input property is itself an object
//! with properties, an array of such objects, or an array of arrays. Local
//! `$ref`s are followed and union branches (`oneOf`, `anyOf`, `allOf`) are
//! inspected.

use crate::constraints::{ToolConstraint, Violation};
use crate::mcp::protocol::Tool;
use serde_json::Value;
use std::collections::HashSet;

const UNION_KEYWORDS: [&str; 3] = ["oneOf", "anyOf", "allOf"];

pub struct InputSchemaFlatness;

impl ToolConstraint for InputSchemaFlatness {
    fn id(&self) -> &'static str {
        "tool-input-schema-flatness"
    }

    fn evaluate_tool(&self, tool: &Tool) -> Vec<Violation> {
        if has_nested_properties(&tool.input_schema) {
            vec![Violation::warning(
                self.id(),
                format!(
                    "Tool {}: input schema contains nested structures; prefer flat parameters.",
                    tool.name
                ),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Whether any top-level property of `root` is a nested structure
pub fn has_nested_properties(root: &Value) -> bool {
    let mut seen = HashSet::new();
    let Some(top) = resolve(root, root, &mut seen) else {
        return false;
    };

    let mut objects = vec![top];
    for keyword in UNION_KEYWORDS {
        if let Some(branches) = top.get(keyword).and_then(Value::as_array) {
            objects.extend(branches.iter().filter_map(|b| resolve(root, b, &mut seen)));
        }
    }

    objects.into_iter().any(|object| {
        object
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|properties| {
                properties
                    .values()
                    .any(|property| is_nested(root, property, &mut HashSet::new()))
            })
    })
}

/// Follow `$ref` chains into `#/definitions` or `#/$defs`
///
/// Returns `None` for refs that cannot be resolved or that loop back onto a
/// ref already followed on this path.
fn resolve<'a>(
    root: &'a Value,
    schema: &'a Value,
    seen: &mut HashSet<String>,
) -> Option<&'a Value> {
    let mut current = schema;
    while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
        if !seen.insert(reference.to_string()) {
            return None;
        }
        let pointer = reference.strip_prefix('#')?;
        if !(pointer.starts_with("/definitions/") || pointer.starts_with("/$defs/")) {
            return None;
        }
        current = root.pointer(pointer)?;
    }
    Some(current)
}

fn declares_properties(schema: &Value) -> bool {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|properties| !properties.is_empty())
}

fn is_array(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("array") || schema.get("items").is_some()
}

/// Whether a property schema is a structure rather than a scalar or a flat list
fn is_nested(root: &Value, property: &Value, seen: &mut HashSet<String>) -> bool {
    let Some(schema) = resolve(root, property, seen) else {
        return false;
    };

    if declares_properties(schema) {
        return true;
    }

    if let Some(items) = schema.get("items") {
        if let Some(items) = resolve(root, items, seen) {
            if is_array(items) || is_nested(root, items, seen) {
                return true;
            }
        }
    }

    UNION_KEYWORDS.iter().any(|keyword| {
        schema
            .get(*keyword)
            .and_then(Value::as_array)
            .is_some_and(|branches| branches.iter().any(|b| is_nested(root, b, seen)))
    })
}
