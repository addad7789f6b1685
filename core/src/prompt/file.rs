use std::fs;
use std::path::Path;

use tracing::debug;

use super::prompt::Prompt;
use crate::error::PromptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptFormat {
    Json,
    Yaml,
}

impl PromptFormat {
    /// `.yaml`/`.yml` select YAML; anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => PromptFormat::Yaml,
            _ => PromptFormat::Json,
        }
    }
}

impl Prompt {
    pub fn to_json(&self) -> Result<String, PromptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, PromptError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_yaml(&self) -> Result<String, PromptError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(s: &str) -> Result<Self, PromptError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PromptError> {
        let path = path.as_ref();
        let body = match PromptFormat::from_path(path) {
            PromptFormat::Json => self.to_json()?,
            PromptFormat::Yaml => self.to_yaml()?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        debug!(path = %path.display(), "saved prompt");
        Ok(())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let body = fs::read_to_string(path)?;
        match PromptFormat::from_path(path) {
            PromptFormat::Json => Self::from_json(&body),
            PromptFormat::Yaml => Self::from_yaml(&body),
        }
    }
}
