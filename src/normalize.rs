//! Content normalization: raw fetched bytes → text, JSON or binary that
//! can be handed to the model.
//!
//! Markup loses its `script`/`style` subtrees and whitespace runs, JSON
//! lists are cut down to their first record, and text is truncated to a
//! character budget by keeping the prefix. Nothing empty gets through.

use crate::error::PipelineError;
use crate::models::{NormalizedContent, RawContent};
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Content-type hint supplied by the profile for its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Html,
    Json,
    Text,
    Binary,
}

const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Normalize `raw` according to `format`.
///
/// `max_chars` bounds text output (HTML and plain text); the prefix is kept.
#[instrument(level = "debug", skip(raw), fields(origin = %raw.origin, bytes = raw.bytes.len()))]
pub fn normalize(
    raw: RawContent,
    format: ContentFormat,
    max_chars: Option<usize>,
) -> Result<NormalizedContent, PipelineError> {
    let RawContent {
        origin,
        bytes,
        mime_type,
    } = raw;

    let normalized = match format {
        ContentFormat::Html => {
            let text = html_to_text(&String::from_utf8_lossy(&bytes));
            NormalizedContent::Text(non_empty_text(&origin, text, max_chars)?)
        }
        ContentFormat::Text => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            NormalizedContent::Text(non_empty_text(&origin, text, max_chars)?)
        }
        ContentFormat::Json => NormalizedContent::Json(first_record(&origin, &bytes)?),
        ContentFormat::Binary => {
            if bytes.is_empty() {
                return Err(PipelineError::empty(origin));
            }
            NormalizedContent::Binary {
                bytes,
                mime_type: mime_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            }
        }
    };

    debug!(mime_type = normalized.mime_type(), "Normalized content");
    Ok(normalized)
}

fn non_empty_text(
    origin: &str,
    text: String,
    max_chars: Option<usize>,
) -> Result<String, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::empty(origin));
    }
    Ok(match max_chars {
        Some(max) => truncate_chars(&text, max).to_string(),
        None => text,
    })
}

/// Parse JSON and keep the first record when the payload is a list.
fn first_record(origin: &str, bytes: &[u8]) -> Result<Value, PipelineError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| PipelineError::fetch(origin, format!("invalid JSON: {e}")))?;

    let record = match value {
        Value::Array(items) => items.into_iter().next(),
        other => Some(other),
    };

    match record {
        None | Some(Value::Null) => Err(PipelineError::empty(origin)),
        Some(Value::Object(map)) if map.is_empty() => Err(PipelineError::empty(origin)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(PipelineError::empty(origin)),
        Some(record) => Ok(record),
    }
}

/// Visible text of an HTML document, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut pieces: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            pieces.push(text);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

/// Replace every whitespace run with a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Longest prefix of `s` holding at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(bytes: &[u8]) -> RawContent {
        RawContent::new("test://source", bytes.to_vec())
    }

    #[test]
    fn test_html_drops_scripts_and_styles() {
        let html = r#"<html><head><style>.x{color:red}</style>
            <script>var tracking = 1;</script></head>
            <body><h1>Market   Pulse</h1>
            <p>Nifty closes
               higher</p><noscript>enable js</noscript></body></html>"#;
        assert_eq!(html_to_text(html), "Market Pulse Nifty closes higher");
    }

    #[test]
    fn test_normalize_html_truncates_prefix() {
        let html = b"<p>abcdefghij</p>";
        let out = normalize(raw(html), ContentFormat::Html, Some(4)).unwrap();
        assert_eq!(out, NormalizedContent::Text("abcd".to_string()));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("₹500 Cr", 2), "₹5");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_whitespace_only_text_is_empty_error() {
        let err = normalize(raw(b"  \n\t \n"), ContentFormat::Text, None).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyContent { .. }));
    }

    #[test]
    fn test_script_only_html_is_empty_error() {
        let err = normalize(
            raw(b"<html><script>alert(1)</script></html>"),
            ContentFormat::Html,
            Some(15000),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyContent { .. }));
    }

    #[test]
    fn test_json_list_keeps_first_record() {
        let body = br#"[{"title":"Day one"},{"title":"Day two"}]"#;
        let out = normalize(raw(body), ContentFormat::Json, None).unwrap();
        assert_eq!(out, NormalizedContent::Json(json!({"title": "Day one"})));
    }

    #[test]
    fn test_json_empty_list_is_empty_error() {
        for body in [&b"[]"[..], b"null", b"{}", b"[null]"] {
            let err = normalize(raw(body), ContentFormat::Json, None).unwrap_err();
            assert!(
                matches!(err, PipelineError::EmptyContent { .. }),
                "{:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_invalid_json_is_fetch_error() {
        let err = normalize(raw(b"<html>"), ContentFormat::Json, None).unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }

    #[test]
    fn test_binary_keeps_mime() {
        let out = normalize(
            raw(&[1, 2, 3]).with_mime("application/pdf"),
            ContentFormat::Binary,
            Some(2),
        )
        .unwrap();
        assert_eq!(
            out,
            NormalizedContent::Binary {
                bytes: vec![1, 2, 3],
                mime_type: "application/pdf".to_string()
            }
        );
    }

    #[test]
    fn test_empty_binary_is_empty_error() {
        let err = normalize(raw(b""), ContentFormat::Binary, None).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyContent { .. }));
    }
}
