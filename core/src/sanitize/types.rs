use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SanitizeError;

/// Risk carried by a single detection. Ordered from harmless to certain.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Safe = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Family of injection technique a detection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionCategory {
    /// "ignore your instructions", "forget the rules"
    InstructionOverride,
    /// Requests to reveal the system prompt or internal instructions.
    PromptDisclosure,
    /// "hypothetically", "between us"
    SocialEngineering,
    /// Claims to be the developer, operator or an administrator.
    AuthorityClaim,
    /// Attempts to dictate the shape of the model's output.
    OutputHijack,
    RoleManipulation,
    SafetyBypass,
    DelimiterInjection,
    ControlCharacter,
    Custom,
}

impl InjectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionCategory::InstructionOverride => "instruction_override",
            InjectionCategory::PromptDisclosure => "prompt_disclosure",
            InjectionCategory::SocialEngineering => "social_engineering",
            InjectionCategory::AuthorityClaim => "authority_claim",
            InjectionCategory::OutputHijack => "output_hijack",
            InjectionCategory::RoleManipulation => "role_manipulation",
            InjectionCategory::SafetyBypass => "safety_bypass",
            InjectionCategory::DelimiterInjection => "delimiter_injection",
            InjectionCategory::ControlCharacter => "control_character",
            InjectionCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for InjectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_preset() -> String {
    "standard".to_string()
}

fn default_threshold() -> RiskLevel {
    RiskLevel::High
}

fn default_true() -> bool {
    true
}

/// Sanitization settings attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationConfig {
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Aggregate risk at or above which `error_on_high_risk` rejects the text.
    #[serde(default = "default_threshold")]
    pub risk_threshold: RiskLevel,

    #[serde(default)]
    pub error_on_high_risk: bool,

    #[serde(default = "default_true")]
    pub sanitize_delimiters: bool,

    #[serde(default = "default_true")]
    pub sanitize_keywords: bool,

    #[serde(default = "default_true")]
    pub sanitize_control_chars: bool,

    /// Extra regexes, matched against the raw text.
    #[serde(default)]
    pub custom_patterns: Vec<String>,

    /// Minimum risk a detection of the given category must carry to count.
    #[serde(default)]
    pub category_thresholds: BTreeMap<InjectionCategory, RiskLevel>,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl SanitizationConfig {
    /// Rejects anything at or above `Low`.
    pub fn strict() -> Self {
        Self {
            preset: "strict".to_string(),
            risk_threshold: RiskLevel::Low,
            error_on_high_risk: true,
            sanitize_delimiters: true,
            sanitize_keywords: true,
            sanitize_control_chars: true,
            custom_patterns: Vec::new(),
            category_thresholds: BTreeMap::new(),
        }
    }

    /// Redacts every detection and reports the risk without rejecting.
    pub fn standard() -> Self {
        Self {
            preset: "standard".to_string(),
            risk_threshold: RiskLevel::High,
            error_on_high_risk: false,
            sanitize_delimiters: true,
            sanitize_keywords: true,
            sanitize_control_chars: true,
            custom_patterns: Vec::new(),
            category_thresholds: BTreeMap::new(),
        }
    }

    pub fn permissive() -> Self {
        Self {
            preset: "permissive".to_string(),
            risk_threshold: RiskLevel::Critical,
            error_on_high_risk: false,
            sanitize_delimiters: false,
            sanitize_keywords: true,
            sanitize_control_chars: true,
            custom_patterns: Vec::new(),
            category_thresholds: BTreeMap::new(),
        }
    }

    pub fn preset(name: &str) -> Result<Self, SanitizeError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::strict()),
            "standard" | "default" => Ok(Self::standard()),
            "permissive" => Ok(Self::permissive()),
            other => Err(SanitizeError::UnknownPreset(other.to_string())),
        }
    }

    pub fn with_error_on_high_risk(mut self, enabled: bool) -> Self {
        self.error_on_high_risk = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: RiskLevel) -> Self {
        self.risk_threshold = threshold;
        self
    }

    pub fn with_custom_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.custom_patterns.push(pattern.into());
        self
    }

    pub fn with_category_threshold(mut self, category: InjectionCategory, min: RiskLevel) -> Self {
        self.category_thresholds.insert(category, min);
        self
    }

    pub(crate) fn admits(&self, category: InjectionCategory, risk: RiskLevel) -> bool {
        self.category_thresholds
            .get(&category)
            .map_or(true, |min| risk >= *min)
    }
}

/// A merged region of the original text that was replaced by the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedSpan {
    /// Byte offsets into the original text.
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Distinct categories that contributed, in detection order.
    pub categories: Vec<InjectionCategory>,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationResult {
    pub original: String,
    pub sanitized: String,
    pub spans: Vec<RedactedSpan>,
    /// Maximum span risk; `Safe` when nothing matched.
    pub risk: RiskLevel,
}

impl SanitizationResult {
    pub fn is_clean(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn categories(&self) -> Vec<InjectionCategory> {
        let mut out: Vec<InjectionCategory> = Vec::new();
        for category in self.spans.iter().flat_map(|s| s.categories.iter()) {
            if !out.contains(category) {
                out.push(*category);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_levels_are_ordered() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Low > RiskLevel::Safe);
        assert_eq!("HIGH".parse::<RiskLevel>().unwrap(), RiskLevel::High);
    }

    #[test]
    fn test_presets_resolve_by_name() {
        assert_eq!(SanitizationConfig::preset("Strict").unwrap(), SanitizationConfig::strict());
        assert!(!SanitizationConfig::preset("standard").unwrap().error_on_high_risk);
        assert!(matches!(
            SanitizationConfig::preset("paranoid"),
            Err(SanitizeError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: SanitizationConfig =
            serde_json::from_str(r#"{"category_thresholds":{"social_engineering":"high"}}"#)
                .unwrap();
        assert_eq!(config.preset, "standard");
        assert_eq!(config.risk_threshold, RiskLevel::High);
        assert!(config.sanitize_delimiters);
        assert!(!config.admits(InjectionCategory::SocialEngineering, RiskLevel::Medium));
        assert!(config.admits(InjectionCategory::InstructionOverride, RiskLevel::Low));
    }
}
