use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::AppConfig;
use crate::error::ConfigError;
use crate::sanitize::SanitizationConfig;

/// Get the default promptloom data directory: ~/.promptloom
pub fn get_promptloom_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".promptloom"))
}

/// Candidate config files, highest priority first.
fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Priority 1: $PROMPTLOOM_HOME/config.toml
    if let Ok(v) = std::env::var("PROMPTLOOM_HOME") {
        if !v.trim().is_empty() {
            candidates.push(PathBuf::from(v).join("config.toml"));
        }
    }

    // Priority 2: ~/.promptloom/config.toml
    if let Ok(dir) = get_promptloom_data_dir() {
        candidates.push(dir.join("config.toml"));
    }

    // Priority 3: ./promptloom.toml
    candidates.push(PathBuf::from("promptloom.toml"));

    candidates
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    let mut cfg = match config_candidates().into_iter().find(|p| p.exists()) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_from_path(&path)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

pub fn load_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    from_toml_str(&s)
}

pub fn from_toml_str(s: &str) -> Result<AppConfig, ConfigError> {
    let cfg = toml::from_str::<AppConfig>(s)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    let concurrency = &cfg.executor.concurrency;
    if concurrency.min_concurrency > concurrency.max_concurrency {
        return Err(ConfigError::Invalid(format!(
            "executor.concurrency.min_concurrency ({}) exceeds max_concurrency ({})",
            concurrency.min_concurrency, concurrency.max_concurrency
        )));
    }
    if cfg.executor.max_parallel == Some(0) {
        return Err(ConfigError::Invalid(
            "executor.max_parallel must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Environment variable overrides (highest priority).
pub fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    if let Ok(v) = std::env::var("PROMPTLOOM_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }

    if let Ok(v) = std::env::var("PROMPTLOOM_MAX_PARALLEL") {
        if !v.trim().is_empty() {
            let n: usize = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PROMPTLOOM_MAX_PARALLEL '{v}': {e}"))?;
            cfg.executor.max_parallel = Some(n.max(1));
        }
    }

    if let Ok(v) = std::env::var("PROMPTLOOM_SANITIZE_PRESET") {
        if !v.trim().is_empty() {
            cfg.sanitization = SanitizationConfig::preset(v.trim())?;
        }
    }

    Ok(())
}
