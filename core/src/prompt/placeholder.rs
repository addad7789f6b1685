use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::PromptError;

static PLACEHOLDER_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn placeholder_regex() -> Option<&'static Regex> {
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// `${name}` or 1-based `${1}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlaceholderKey {
    Named(String),
    Positional(usize),
}

impl PlaceholderKey {
    /// Interpret the text between `${` and `}`.
    pub fn parse(inner: &str) -> Self {
        let inner = inner.trim();
        match inner.parse::<usize>() {
            Ok(n) if n > 0 => PlaceholderKey::Positional(n),
            _ => PlaceholderKey::Named(inner.to_string()),
        }
    }

    pub fn token(&self) -> String {
        format!("${{{self}}}")
    }

    pub(crate) fn validate(&self) -> Result<(), PromptError> {
        match self {
            PlaceholderKey::Positional(0) => Err(PromptError::InvalidPlaceholder(
                "positional placeholders are 1-based".to_string(),
            )),
            PlaceholderKey::Named(name) if name.trim().is_empty() => Err(
                PromptError::InvalidPlaceholder("placeholder name is empty".to_string()),
            ),
            PlaceholderKey::Named(name) if name.contains('}') => Err(
                PromptError::InvalidPlaceholder(format!("'{name}' contains '}}'")),
            ),
            _ => Ok(()),
        }
    }

    /// Canonical form used for lookups.
    pub(crate) fn canonical(&self) -> Self {
        match self {
            PlaceholderKey::Named(name) => PlaceholderKey::parse(name),
            PlaceholderKey::Positional(n) => PlaceholderKey::Positional(*n),
        }
    }
}

impl fmt::Display for PlaceholderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceholderKey::Named(name) => f.write_str(name),
            PlaceholderKey::Positional(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for PlaceholderKey {
    fn from(value: &str) -> Self {
        PlaceholderKey::Named(value.to_string())
    }
}

impl From<String> for PlaceholderKey {
    fn from(value: String) -> Self {
        PlaceholderKey::Named(value)
    }
}

impl From<&String> for PlaceholderKey {
    fn from(value: &String) -> Self {
        PlaceholderKey::Named(value.clone())
    }
}

impl From<usize> for PlaceholderKey {
    fn from(value: usize) -> Self {
        PlaceholderKey::Positional(value)
    }
}

/// Placeholders in `text`, in order of first appearance.
pub fn extract_placeholders(text: &str) -> Vec<PlaceholderKey> {
    extract_unbound(text, &[])
}

/// Placeholders outside the `bound` byte ranges, in order of first appearance.
pub(crate) fn extract_unbound(text: &str, bound: &[Range<usize>]) -> Vec<PlaceholderKey> {
    let Some(re) = placeholder_regex() else {
        return Vec::new();
    };
    let mut keys: Vec<PlaceholderKey> = Vec::new();
    for gap in gaps(text, bound) {
        for caps in re.captures_iter(&text[gap]) {
            if let Some(inner) = caps.get(1) {
                let key = PlaceholderKey::parse(inner.as_str());
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}

/// Byte ranges of `text` not covered by `bound`, widened to char boundaries.
/// `bound` must be sorted.
fn gaps(text: &str, bound: &[Range<usize>]) -> Vec<Range<usize>> {
    let len = text.len();
    let mut out = Vec::with_capacity(bound.len() + 1);
    let mut cursor = 0;
    for span in bound {
        let mut start = span.start.min(len);
        while !text.is_char_boundary(start) {
            start -= 1;
        }
        if start > cursor {
            out.push(cursor..start);
        }
        let mut end = span.end.min(len);
        while !text.is_char_boundary(end) {
            end += 1;
        }
        cursor = cursor.max(end);
    }
    if cursor < len {
        out.push(cursor..len);
    }
    out
}

/// Sort, drop empty ranges and merge overlapping or touching ones.
pub(crate) fn merge_spans(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.retain(|s| s.start < s.end);
    spans.sort_by_key(|s| s.start);
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Replace every bound placeholder outside the `bound` ranges in one pass.
///
/// Returns the new text and the updated bound ranges, which now also cover
/// the inserted values, or `None` when nothing was replaced. Unbound tokens
/// stay as-is.
pub(crate) fn substitute(
    text: &str,
    bound: &[Range<usize>],
    values: &HashMap<PlaceholderKey, String>,
) -> Option<(String, Vec<Range<usize>>)> {
    let re = placeholder_regex()?;

    // (start, end, value) in text order.
    let mut replacements: Vec<(usize, usize, &str)> = Vec::new();
    for gap in gaps(text, bound) {
        for caps in re.captures_iter(&text[gap.clone()]) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if let Some(value) = values.get(&PlaceholderKey::parse(inner.as_str())) {
                replacements.push((gap.start + whole.start(), gap.start + whole.end(), value));
            }
        }
    }
    if replacements.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut spans = Vec::with_capacity(bound.len() + replacements.len());
    let mut previous = bound.iter().peekable();
    let mut last = 0;
    for (start, end, value) in replacements {
        // Earlier bound ranges move by however much the output has grown so far.
        let offset = out.len() as isize - last as isize;
        while let Some(span) = previous.next_if(|s| s.end <= start) {
            spans.push(shift(span, offset));
        }
        out.push_str(&text[last..start]);
        let inserted = out.len();
        out.push_str(value);
        spans.push(inserted..out.len());
        last = end;
    }
    let offset = out.len() as isize - last as isize;
    spans.extend(previous.map(|span| shift(span, offset)));
    out.push_str(&text[last..]);

    Some((out, merge_spans(spans)))
}

fn shift(span: &Range<usize>, offset: isize) -> Range<usize> {
    let apply = |at: usize| (at as isize + offset).max(0) as usize;
    apply(span.start)..apply(span.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_named_and_positional() {
        let keys = extract_placeholders("Hi ${name}, item ${1} and ${name} again ${ 2 }");
        assert_eq!(
            keys,
            vec![
                PlaceholderKey::Named("name".into()),
                PlaceholderKey::Positional(1),
                PlaceholderKey::Positional(2),
            ]
        );
    }

    #[test]
    fn test_substitute_leaves_unknown_tokens() {
        let mut values = HashMap::new();
        values.insert(PlaceholderKey::from("a"), "A".to_string());
        values.insert(PlaceholderKey::from(1usize), "one".to_string());

        let (out, spans) = substitute("${a}-${b}-${1}-${a}", &[], &values).unwrap();
        assert_eq!(out, "A-${b}-one-A");
        assert_eq!(spans, vec![0..1, 7..10, 11..12]);
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let mut values = HashMap::new();
        values.insert(PlaceholderKey::from("a"), "${b}".to_string());
        values.insert(PlaceholderKey::from("b"), "B".to_string());
        let (out, spans) = substitute("${a} ${b}", &[], &values).unwrap();
        assert_eq!(out, "${b} B");
        assert_eq!(spans, vec![0..4, 5..6]);
    }

    #[test]
    fn test_bound_ranges_are_skipped_and_shifted() {
        let mut values = HashMap::new();
        values.insert(PlaceholderKey::from("b"), "BEE".to_string());

        // "${b}" at 0..4 came from an earlier bind and must stay literal.
        let (out, spans) = substitute("${b} | ${b}", &[0..4], &values).unwrap();
        assert_eq!(out, "${b} | BEE");
        assert_eq!(spans, vec![0..4, 7..10]);
        assert!(extract_unbound(&out, &spans).is_empty());

        assert!(substitute("${b} x", &[0..4], &values).is_none());
    }

    #[test]
    fn test_token_straddling_a_bound_range_is_not_a_placeholder() {
        // A bound value "${" followed by literal "b}" does not form a token.
        assert!(extract_unbound("${b}", &[0..2]).is_empty());
        assert_eq!(
            extract_unbound("${x ${y}", &[0..3]),
            vec![PlaceholderKey::Named("y".into())]
        );
    }

    #[test]
    fn test_merge_spans() {
        assert_eq!(merge_spans(vec![5..6, 0..2, 2..3, 4..4]), vec![0..3, 5..6]);
    }

    #[test]
    fn test_validate_rejects_bad_keys() {
        assert!(PlaceholderKey::from(0usize).validate().is_err());
        assert!(PlaceholderKey::from("").validate().is_err());
        assert!(PlaceholderKey::from("x}").validate().is_err());
        assert!(PlaceholderKey::from("ok").validate().is_ok());
        assert_eq!(PlaceholderKey::from("3").canonical(), PlaceholderKey::Positional(3));
    }
}
