use serde::{Deserialize, Serialize};

use crate::sanitize::SanitizationConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Applied to prompts that do not carry their own sanitization settings.
    #[serde(default)]
    pub sanitization: SanitizationConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "promptloom_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker pool size. Unset means one worker per CPU.
    #[serde(default)]
    pub max_parallel: Option<usize>,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Fail every downstream task when a dependency fails.
    #[serde(default)]
    pub cascade_failures: bool,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// "fixed" or "adaptive".
    #[serde(default = "default_concurrency_strategy")]
    pub strategy: String,
    #[serde(default = "default_min_concurrency")]
    pub min_concurrency: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_base_concurrency")]
    pub base_concurrency: usize,
}

fn default_concurrency_strategy() -> String {
    "fixed".to_string()
}

fn default_min_concurrency() -> usize {
    1
}

fn default_max_concurrency() -> usize {
    32
}

fn default_base_concurrency() -> usize {
    4
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            strategy: default_concurrency_strategy(),
            min_concurrency: default_min_concurrency(),
            max_concurrency: default_max_concurrency(),
            base_concurrency: default_base_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// "text", "jsonl" or "none".
    #[serde(default = "default_output_format")]
    pub format: String,
    #[serde(default)]
    pub progress_bar: bool,
    #[serde(default)]
    pub ascii_only: bool,
}

fn default_output_format() -> String {
    "text".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            progress_bar: false,
            ascii_only: false,
        }
    }
}
