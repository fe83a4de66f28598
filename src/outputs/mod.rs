//! Turning a [`SummaryResult`] into something deliverable.
//!
//! # Submodules
//!
//! - [`sections`]: `## Header` Markdown → `=== Header ===` plain text
//! - [`envelope`]: raw text inside a fixed header, plus grounding lists
//! - [`analysis`]: per-subject analysis files consumed by later runs
//!
//! Both formatters are idempotent: running them over their own output
//! changes nothing.

pub mod analysis;
pub mod envelope;
pub mod sections;

use crate::models::SummaryResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a profile renders its summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatterPolicy {
    Sections,
    #[default]
    PassThrough,
}

/// Render `result` under `policy`, enveloped by `header` when given.
pub fn format_summary(
    policy: FormatterPolicy,
    header: Option<&str>,
    result: &SummaryResult,
) -> String {
    match policy {
        FormatterPolicy::Sections => {
            envelope::wrap(header, &sections::format_sections(&result.text))
        }
        FormatterPolicy::PassThrough => envelope::format_pass_through(header, result),
    }
}

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*$\n?").expect("static regex"));

/// Strip Markdown code fences; pretty-print the remainder if it is JSON.
///
/// Anything that does not parse as JSON is returned cleaned but otherwise
/// untouched.
pub fn clean_response(text: &str) -> String {
    let stripped = CODE_FENCE.replace_all(text, "");
    let stripped = stripped.trim();

    match serde_json::from_str::<serde_json::Value>(stripped) {
        Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| stripped.to_string())
        }
        _ => stripped.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_response_pretty_prints_fenced_json() {
        let out = clean_response("```json\n{\"score\":3,\"sentiment\":\"Bullish\"}\n```");
        assert_eq!(out, "{\n  \"score\": 3,\n  \"sentiment\": \"Bullish\"\n}");
    }

    #[test]
    fn test_clean_response_keeps_text() {
        let out = clean_response("```\n=== Overall Market Pulse ===\nMixed\n```\n");
        assert_eq!(out, "=== Overall Market Pulse ===\nMixed");
    }

    #[test]
    fn test_clean_response_leaves_bare_numbers_as_text() {
        assert_eq!(clean_response("42"), "42");
    }

    #[test]
    fn test_sections_policy_wraps_header() {
        let result = SummaryResult::text("## Key Themes\n* IT rally");
        let body = format_summary(
            FormatterPolicy::Sections,
            Some("Groww Daily Digest Analysis"),
            &result,
        );
        assert_eq!(
            body,
            "Groww Daily Digest Analysis\n\n=== Key Themes ===\n\n- IT rally"
        );

        let again = format_summary(
            FormatterPolicy::Sections,
            Some("Groww Daily Digest Analysis"),
            &SummaryResult::text(body.clone()),
        );
        assert_eq!(again, body);
    }
}
