use thiserror::Error;

use super::code::ErrorCode;
use crate::sanitize::{InjectionCategory, RiskLevel};

/// Raised by the sanitization engine when a value must not be bound.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SanitizeError {
    #[error("security policy violation: risk {risk} reached threshold {threshold} (categories: {categories:?})")]
    HighRisk {
        risk: RiskLevel,
        threshold: RiskLevel,
        categories: Vec<InjectionCategory>,
        original: String,
        sanitized: String,
    },

    #[error("invalid custom pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("unknown sanitization preset: {0}")]
    UnknownPreset(String),
}

impl SanitizeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::HighRisk { .. } => ErrorCode::SecurityPolicy,
            Self::InvalidPattern { .. } | Self::UnknownPreset(_) => ErrorCode::ValidationError,
        }
    }
}

/// Structured output failures: bad schema documents and responses that do not fit them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutputError {
    #[error("invalid output schema '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    #[error("response is not valid JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("response does not match schema '{name}': {}", .errors.join("; "))]
    SchemaMismatch { name: String, errors: Vec<String> },
}

impl OutputError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidSchema { .. } => ErrorCode::ValidationError,
            Self::MalformedJson { .. } => ErrorCode::ParseError,
            Self::SchemaMismatch { .. } => ErrorCode::SchemaError,
        }
    }
}

#[derive(Error, Debug)]
pub enum PromptError {
    #[error(transparent)]
    Security(#[from] SanitizeError),

    #[error(transparent)]
    Schema(#[from] OutputError),

    #[error("cannot serialize bound value: {0}")]
    Value(String),

    #[error("invalid placeholder: {0}")]
    InvalidPlaceholder(String),

    #[error("unsupported prompt file format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid binary content: {0}")]
    InvalidContent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PromptError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Security(e) => e.error_code(),
            Self::Schema(e) => e.error_code(),
            Self::Value(_) | Self::InvalidContent(_) => ErrorCode::EncodingError,
            Self::InvalidPlaceholder(_) => ErrorCode::ValidationError,
            Self::UnsupportedFormat(_) | Self::Json(_) | Self::Yaml(_) => ErrorCode::ParseError,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            Self::Io(_) => ErrorCode::GeneralError,
        }
    }

    /// True when the failure is a sanitization rejection the caller may recover from.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security(SanitizeError::HighRisk { .. }))
    }
}
