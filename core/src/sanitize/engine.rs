use std::ops::Range;

use regex::Regex;
use tracing::debug;

use super::patterns::{control_char_risk, delimiter_patterns, phrase_patterns};
use super::types::{
    InjectionCategory, RedactedSpan, RiskLevel, SanitizationConfig, SanitizationResult,
};
use crate::error::SanitizeError;
use crate::normalize::{LeetOne, Normalizer};

/// Replacement written over every redacted span.
pub const REDACTION_MARKER: &str = "[REDACTED]";

#[derive(Debug, Clone)]
struct Detection {
    range: Range<usize>,
    category: InjectionCategory,
    risk: RiskLevel,
}

/// Compiled sanitizer for one configuration.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    config: SanitizationConfig,
    custom: Vec<Regex>,
}

impl Sanitizer {
    pub fn new(config: SanitizationConfig) -> Result<Self, SanitizeError> {
        let custom = config
            .custom_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| SanitizeError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { config, custom })
    }

    pub fn config(&self) -> &SanitizationConfig {
        &self.config
    }

    /// Detect and redact. Fails only when the config rejects high risk.
    pub fn sanitize(&self, text: &str) -> Result<SanitizationResult, SanitizeError> {
        let result = self.assess(text);

        if self.config.error_on_high_risk && result.risk >= self.config.risk_threshold {
            debug!(
                risk = %result.risk,
                threshold = %self.config.risk_threshold,
                "rejecting text above risk threshold"
            );
            return Err(SanitizeError::HighRisk {
                risk: result.risk,
                threshold: self.config.risk_threshold,
                categories: result.categories(),
                original: result.original,
                sanitized: result.sanitized,
            });
        }

        Ok(result)
    }

    /// Detect and redact without ever rejecting.
    pub fn assess(&self, text: &str) -> SanitizationResult {
        let detections = self.detect(text);
        let spans = merge(text, detections);
        let risk = spans.iter().map(|s| s.risk).max().unwrap_or_default();
        let sanitized = redact(text, &spans);

        if !spans.is_empty() {
            debug!(spans = spans.len(), risk = %risk, "redacted injection spans");
        }

        SanitizationResult {
            original: text.to_string(),
            sanitized,
            spans,
            risk,
        }
    }

    fn detect(&self, text: &str) -> Vec<Detection> {
        let mut found = Vec::new();

        if self.config.sanitize_keywords {
            for one_as in [LeetOne::AsI, LeetOne::AsL] {
                let normalized = Normalizer::new().with_leet_one(one_as).normalize(text);
                for pattern in phrase_patterns() {
                    for m in pattern.regex.find_iter(normalized.as_str()) {
                        if let Some(range) = normalized.original_range(m.range()) {
                            found.push(Detection {
                                range,
                                category: pattern.category,
                                risk: pattern.risk,
                            });
                        }
                    }
                }
            }
        }

        if self.config.sanitize_delimiters {
            for pattern in delimiter_patterns() {
                found.extend(pattern.regex.find_iter(text).map(|m| Detection {
                    range: m.range(),
                    category: pattern.category,
                    risk: pattern.risk,
                }));
            }
        }

        if self.config.sanitize_control_chars {
            for (idx, c) in text.char_indices() {
                if let Some(risk) = control_char_risk(c) {
                    found.push(Detection {
                        range: idx..idx + c.len_utf8(),
                        category: InjectionCategory::ControlCharacter,
                        risk,
                    });
                }
            }
        }

        for regex in &self.custom {
            found.extend(
                regex
                    .find_iter(text)
                    .filter(|m| !m.range().is_empty())
                    .map(|m| Detection {
                        range: m.range(),
                        category: InjectionCategory::Custom,
                        risk: RiskLevel::High,
                    }),
            );
        }

        found.retain(|d| self.config.admits(d.category, d.risk));
        found
    }
}

/// Union overlapping or touching detections into redaction spans.
fn merge(text: &str, mut detections: Vec<Detection>) -> Vec<RedactedSpan> {
    detections.sort_by_key(|d| (d.range.start, d.range.end));

    let mut spans: Vec<RedactedSpan> = Vec::new();
    for d in detections {
        match spans.last_mut() {
            Some(last) if d.range.start <= last.end => {
                last.end = last.end.max(d.range.end);
                last.risk = last.risk.max(d.risk);
                if !last.categories.contains(&d.category) {
                    last.categories.push(d.category);
                }
            }
            _ => spans.push(RedactedSpan {
                start: d.range.start,
                end: d.range.end,
                text: String::new(),
                categories: vec![d.category],
                risk: d.risk,
            }),
        }
    }

    for span in &mut spans {
        span.text = text[span.start..span.end].to_string();
    }
    spans
}

fn redact(text: &str, spans: &[RedactedSpan]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push_str(REDACTION_MARKER);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Sanitize `text` under `config`.
pub fn sanitize(text: &str, config: &SanitizationConfig) -> Result<SanitizationResult, SanitizeError> {
    Sanitizer::new(config.clone())?.sanitize(text)
}
