//! Capability enumeration.
//!
//! Drains every paginated listing the server advertises. Listings are
//! independent: a failure part way through one keeps whatever pages arrived
//! and does not touch the others.

use crate::interview::session::Session;
use crate::mcp::protocol::{
    ListKind, Prompt, Resource, ResourceTemplate, ServerCapabilities, Tool,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Everything the server exposes, in server order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Inventory {
    pub tools: Vec<Tool>,
    pub resources: Vec<Resource>,
    pub resource_templates: Vec<ResourceTemplate>,
    pub prompts: Vec<Prompt>,
}

impl Inventory {
    /// Number of entries collected for `kind`
    pub fn count(&self, kind: ListKind) -> usize {
        match kind {
            ListKind::Tools => self.tools.len(),
            ListKind::Resources => self.resources.len(),
            ListKind::ResourceTemplates => self.resource_templates.len(),
            ListKind::Prompts => self.prompts.len(),
        }
    }
}

/// A listing that stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFailure {
    pub kind: ListKind,
    pub reason: String,
}

/// Drain each advertised listing
///
/// Kinds the server does not advertise stay empty and are never requested.
/// Each list call gets `list_timeout`; a timeout counts as a failure of that
/// listing.
pub async fn enumerate<S: Session>(
    session: &mut S,
    capabilities: &ServerCapabilities,
    list_timeout: Duration,
) -> (Inventory, Vec<ListingFailure>) {
    let mut inventory = Inventory::default();
    let mut failures = Vec::new();
    enumerate_into(session, capabilities, list_timeout, &mut inventory, &mut failures).await;
    (inventory, failures)
}

/// Like [`enumerate`], filling `inventory` page by page
///
/// Dropping the future part way (an outer timeout) leaves every page received
/// so far in `inventory`.
pub async fn enumerate_into<S: Session>(
    session: &mut S,
    capabilities: &ServerCapabilities,
    list_timeout: Duration,
    inventory: &mut Inventory,
    failures: &mut Vec<ListingFailure>,
) {
    for kind in ListKind::ALL {
        if !capabilities.supports(kind) {
            tracing::debug!("Server does not advertise {}, skipping", kind);
            continue;
        }

        let drained = match kind {
            ListKind::Tools => drain(session, kind, list_timeout, &mut inventory.tools).await,
            ListKind::Resources => {
                drain(session, kind, list_timeout, &mut inventory.resources).await
            }
            ListKind::ResourceTemplates => {
                drain(session, kind, list_timeout, &mut inventory.resource_templates).await
            }
            ListKind::Prompts => drain(session, kind, list_timeout, &mut inventory.prompts).await,
        };

        if let Err(reason) = drained {
            tracing::warn!(
                "Failed to list {}: {} (keeping {} items)",
                kind,
                reason,
                inventory.count(kind)
            );
            failures.push(ListingFailure { kind, reason });
        }
    }

    tracing::info!(
        "Enumerated {} tools, {} resources, {} resource templates, {} prompts",
        inventory.tools.len(),
        inventory.resources.len(),
        inventory.resource_templates.len(),
        inventory.prompts.len()
    );
}

/// Follow cursors until the server stops returning one
///
/// Each page is decoded into `items` as it arrives, so a failure leaves the
/// pages already received in place. A cursor the server already handed out
/// ends the listing with an error instead of looping.
pub async fn drain<S: Session, T: DeserializeOwned>(
    session: &mut S,
    kind: ListKind,
    list_timeout: Duration,
    items: &mut Vec<T>,
) -> Result<(), String> {
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = tokio::time::timeout(list_timeout, session.list(kind, cursor.as_deref()))
            .await
            .map_err(|_| format!("timed out after {} seconds", list_timeout.as_secs()))?
            .map_err(|e| e.to_string())?;

        pages += 1;
        decode_into(kind, page.items, items);

        match page.next_cursor {
            Some(next) if !seen.insert(next.clone()) => {
                return Err(format!("server repeated cursor {:?}", next));
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::debug!("Listed {} {} over {} pages", items.len(), kind, pages);
    Ok(())
}

fn decode_into<T: DeserializeOwned>(kind: ListKind, page: Vec<Value>, items: &mut Vec<T>) {
    for (index, item) in page.into_iter().enumerate() {
        match serde_json::from_value(item) {
            Ok(decoded) => items.push(decoded),
            Err(e) => tracing::warn!("Skipping malformed {} entry {}: {}", kind, index, e),
        }
    }
}
