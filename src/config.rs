// Configuration File Support
//
// Optional TOML file (default ./mcp-interviewer.toml) with environment
// variable overrides applied on top. Command line flags override both and
// are applied by the binary.

use crate::interview::openai::{OpenAiConfig, DEFAULT_BASE_URL};
use crate::interview::orchestrator::{InterviewOptions, InterviewTimeouts};
use crate::mcp::retry::RetryConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "mcp-interviewer.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub judge: JudgeConfig,
    pub interview: InterviewConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Judge model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JudgeConfig {
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Extra attempts allowed when a reply does not fit its schema
    pub max_retries: usize,

    pub temperature: f32,

    pub request_timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_retries: 2,
            temperature: 0.0,
            request_timeout_secs: 120,
        }
    }
}

/// Interview phases and budgets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterviewConfig {
    pub score_tools: bool,
    pub score_results: bool,

    /// Tool scoring budget, per tool
    pub tool_timeout_secs: u64,

    /// Scenario execution budget
    pub server_timeout_secs: u64,

    /// Budget for each judge analysis call
    pub analysis_timeout_secs: u64,

    pub list_timeout_secs: u64,
    pub call_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    /// Attempts for listing requests and judge HTTP calls
    pub retry_attempts: usize,

    pub retry_base_delay_ms: u64,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            score_tools: true,
            score_results: true,
            tool_timeout_secs: 30,
            server_timeout_secs: 300,
            analysis_timeout_secs: 60,
            list_timeout_secs: 30,
            call_timeout_secs: 30,
            connect_timeout_secs: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `./mcp-interviewer.toml`
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the result does not validate. A missing file gives defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file path, relative to the working directory
    pub fn config_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - MCP_INTERVIEWER_LOG_LEVEL
    /// - MCP_INTERVIEWER_LOG_FORMAT
    /// - MCP_INTERVIEWER_MODEL
    /// - MCP_INTERVIEWER_JUDGE_BASE_URL
    /// - MCP_INTERVIEWER_SERVER_TIMEOUT_SECS
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup("MCP_INTERVIEWER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("MCP_INTERVIEWER_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(model) = lookup("MCP_INTERVIEWER_MODEL") {
            self.judge.model = model;
        }
        if let Some(url) = lookup("MCP_INTERVIEWER_JUDGE_BASE_URL") {
            self.judge.base_url = url;
        }
        if let Some(secs) = lookup("MCP_INTERVIEWER_SERVER_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                if secs > 0 {
                    self.interview.server_timeout_secs = secs;
                }
            }
        }
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.judge.model.trim().is_empty() {
            anyhow::bail!("Judge model must not be empty");
        }
        if self.judge.request_timeout_secs == 0 {
            anyhow::bail!("Judge request timeout must be > 0");
        }

        let timeouts = [
            ("tool", self.interview.tool_timeout_secs),
            ("server", self.interview.server_timeout_secs),
            ("analysis", self.interview.analysis_timeout_secs),
            ("list", self.interview.list_timeout_secs),
            ("call", self.interview.call_timeout_secs),
            ("connect", self.interview.connect_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                anyhow::bail!("Interview {} timeout must be > 0", name);
            }
        }
        if self.interview.retry_attempts == 0 {
            anyhow::bail!("Retry attempts must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    pub fn options(&self) -> InterviewOptions {
        InterviewOptions {
            score_tools: self.interview.score_tools,
            score_results: self.interview.score_results,
        }
    }

    pub fn timeouts(&self) -> InterviewTimeouts {
        let i = &self.interview;
        InterviewTimeouts {
            connect: Duration::from_secs(i.connect_timeout_secs),
            list: Duration::from_secs(i.list_timeout_secs),
            call: Duration::from_secs(i.call_timeout_secs),
            tool: Duration::from_secs(i.tool_timeout_secs),
            server: Duration::from_secs(i.server_timeout_secs),
            analysis: Duration::from_secs(i.analysis_timeout_secs),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.interview.retry_attempts)
            .base_delay(Duration::from_millis(self.interview.retry_base_delay_ms))
    }

    /// Judge endpoint settings, with the API key read from the environment
    pub fn openai(&self) -> OpenAiConfig {
        let mut config = OpenAiConfig::new(&self.judge.model)
            .with_api_key_from_env(&self.judge.api_key_env);
        config.base_url = self.judge.base_url.clone();
        config.temperature = self.judge.temperature;
        config.request_timeout = Duration::from_secs(self.judge.request_timeout_secs);
        config.retry = self.retry();
        config
    }
}
