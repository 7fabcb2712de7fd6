// Prometheus metrics for interview runs
//
// Collected in a process-wide registry and written out in text format when
// `--metrics-file` is given:
// - Interviews by outcome (counter)
// - Phase failures by phase (counter)
// - Judge completions by outcome (counter)
// - Scenario tool calls by outcome (counter)
// - Scenario tool call duration (histogram)

use anyhow::Context;
use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, IntCounterVec, Registry, TextEncoder};
use std::path::Path;
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref INTERVIEWS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("interviews_total", "Interviews run, by outcome"),
        &["outcome"]
    ).expect("Failed to create interviews total metric");

    pub static ref PHASE_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "interview_phase_failures_total",
            "Failures recorded on scorecards, by phase"
        ),
        &["phase"]
    ).expect("Failed to create phase failures metric");

    // Judge metrics
    pub static ref JUDGE_COMPLETIONS: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("judge_completions_total", "Judge completion attempts, by outcome"),
        &["outcome"]
    ).expect("Failed to create judge completions metric");

    // Scenario metrics
    pub static ref TOOL_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("scenario_tool_calls_total", "Scenario tool calls, by outcome"),
        &["outcome"]
    ).expect("Failed to create tool calls metric");

    pub static ref TOOL_CALL_DURATION_SECONDS: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "scenario_tool_call_duration_seconds",
            "Duration of scenario tool calls"
        ),
    ).expect("Failed to create tool call duration metric");
}

/// Register every metric - call once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(INTERVIEWS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PHASE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(JUDGE_COMPLETIONS.clone()))?;
    REGISTRY.register(Box::new(TOOL_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOOL_CALL_DURATION_SECONDS.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

pub fn write_to_file(path: &Path) -> anyhow::Result<()> {
    let text = gather_metrics()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {:?}", path))?;
    tracing::debug!("Wrote metrics to {:?}", path);
    Ok(())
}
