// MCP Interviewer - Main Entry Point
//
// Interviews one MCP server:
// - connects over stdio, streamable HTTP or SSE
// - has the judge model score its tools
// - runs a synthesized scenario and scores the results
// - checks the scorecard against client constraints
// - writes JSON and markdown scorecards
//
// Exit status: 0 on success, 1 if any critical constraint was violated,
// 2 if the server could not be reached.

use anyhow::{Context, Result};
use clap::Parser;
use mcp_interviewer::config::Config;
use mcp_interviewer::constraints::{Constraint, ConstraintSet, Severity};
use mcp_interviewer::interview::{
    Interviewer, JudgeClient, McpSessionFactory, OpenAiChatModel,
};
use mcp_interviewer::mcp::ServerParameters;
use mcp_interviewer::{metrics, report};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

const EXIT_CRITICAL_VIOLATION: u8 = 1;
const EXIT_UNREACHABLE: u8 = 2;

/// Interview an MCP server and score how well it serves LLM agents
#[derive(Parser, Debug)]
#[command(name = "mcp-interviewer")]
#[command(author = "MCP Interviewer Contributors")]
#[command(version)]
#[command(
    about = "Evaluate an MCP server's tools with an LLM judge and a live scenario",
    long_about = None
)]
struct Args {
    /// Server to interview: a command line (e.g. `npx -y some-server`) or an http(s) URL
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    target: Vec<String>,

    /// Judge model name
    #[arg(long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API for the judge
    #[arg(long)]
    judge_base_url: Option<String>,

    /// Skip judging tool definitions
    #[arg(long)]
    no_score_tools: bool,

    /// Skip judging scenario results
    #[arg(long)]
    no_score_results: bool,

    /// Directory for the scorecard files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Config file (default: ./mcp-interviewer.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment variable for a stdio server, repeatable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    env: Vec<(String, String)>,

    /// HTTP header for a URL server, repeatable
    #[arg(long = "header", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    headers: Vec<(String, String)>,

    /// Working directory for a stdio server
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Write Prometheus metrics to this file when done
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(model) = &args.model {
        config.judge.model = model.clone();
    }
    if let Some(url) = &args.judge_base_url {
        config.judge.base_url = url.clone();
    }
    if args.no_score_tools {
        config.interview.score_tools = false;
    }
    if args.no_score_results {
        config.interview.score_results = false;
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }
    config.validate()?;

    init_logging(&config, args.verbose)?;
    if let Err(e) = metrics::init() {
        warn!("Failed to register metrics: {}", e);
    }

    info!("MCP Interviewer v{} starting...", env!("CARGO_PKG_VERSION"));

    let params = ServerParameters::from_target(&args.target.join(" "))?
        .with_env(args.env.into_iter().collect::<BTreeMap<_, _>>())
        .with_headers(args.headers.into_iter().collect::<BTreeMap<_, _>>())
        .with_cwd(args.cwd);

    let model = OpenAiChatModel::new(config.openai())?;
    let judge = JudgeClient::new(model).with_max_retries(config.judge.max_retries);
    let interviewer = Interviewer::new(McpSessionFactory::new(config.retry()), judge)
        .with_options(config.options())
        .with_timeouts(config.timeouts());

    let scorecard = match interviewer.try_interview(&params).await {
        Ok(scorecard) => scorecard,
        Err(e) => {
            error!("Could not interview {}: {}", params.display_target(), e);
            write_metrics(args.metrics_file.as_deref());
            return Ok(ExitCode::from(EXIT_UNREACHABLE));
        }
    };

    let violations = ConstraintSet::all().evaluate(&scorecard);
    for violation in &violations {
        match violation.severity {
            Severity::Critical => error!("[{}] {}", violation.constraint, violation.message),
            Severity::Warning => warn!("[{}] {}", violation.constraint, violation.message),
        }
    }

    let artifacts = report::write_all(&args.out_dir, &scorecard, &violations)
        .context("Failed to write scorecard")?;
    write_metrics(args.metrics_file.as_deref());

    info!(
        "{}: score {:.0}%, {} violations, report at {}",
        scorecard.server_name(),
        scorecard.score * 100.0,
        violations.len(),
        artifacts.markdown.display()
    );

    if violations.iter().any(|v| v.is_critical()) {
        Ok(ExitCode::from(EXIT_CRITICAL_VIOLATION))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// `--verbose` beats `RUST_LOG`, which beats the configured level
fn log_filter(config: &Config, verbose: bool) -> Result<EnvFilter> {
    let level: Level = config.log_level()?;
    if verbose {
        return Ok(EnvFilter::default().add_directive(level.into()));
    }
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy())
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let filter = log_filter(config, verbose)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

fn write_metrics(path: Option<&Path>) {
    if let Some(path) = path {
        if let Err(e) = metrics::write_to_file(path) {
            warn!("{:#}", e);
        }
    }
}
