//! Pass-through formatter: the model text goes out as-is inside a fixed
//! envelope, followed by grounding metadata when there is any.

use crate::models::SummaryResult;

pub const SEARCH_QUERIES_HEADING: &str = "Search queries:";
pub const SOURCES_HEADING: &str = "Sources:";

/// Prefix `body` with `header` unless it already starts with it.
pub fn wrap(header: Option<&str>, body: &str) -> String {
    let body = body.trim();
    match header.map(str::trim).filter(|h| !h.is_empty()) {
        Some(header) if !body.starts_with(header) => format!("{header}\n\n{body}"),
        _ => body.to_string(),
    }
}

/// Envelope the summary and append its grounding lists.
pub fn format_pass_through(header: Option<&str>, result: &SummaryResult) -> String {
    let mut out = wrap(header, &result.text);
    if !result.has_grounding() {
        return out;
    }

    if !result.search_queries.is_empty() && !out.contains(SEARCH_QUERIES_HEADING) {
        out.push_str(&format!("\n\n{SEARCH_QUERIES_HEADING}"));
        for query in &result.search_queries {
            out.push_str(&format!("\n- {query}"));
        }
    }

    if !result.sources.is_empty() && !out.contains(SOURCES_HEADING) {
        out.push_str(&format!("\n\n{SOURCES_HEADING}"));
        for source in &result.sources {
            if source.title == source.uri {
                out.push_str(&format!("\n- {}", source.uri));
            } else {
                out.push_str(&format!("\n- {} ({})", source.title, source.uri));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroundingSource;

    const HEADER: &str = "=== Indian Stock News Analysis ===";

    #[test]
    fn test_wrap_adds_header_once() {
        let once = wrap(Some(HEADER), "| Company | Type |\n|---|---|");
        assert_eq!(once, format!("{HEADER}\n\n| Company | Type |\n|---|---|"));
        assert_eq!(wrap(Some(HEADER), &once), once);
    }

    #[test]
    fn test_wrap_without_header_trims() {
        assert_eq!(wrap(None, "  body \n"), "body");
        assert_eq!(wrap(Some("  "), "body"), "body");
    }

    #[test]
    fn test_pass_through_appends_grounding() {
        let result = SummaryResult {
            text: "Markets mixed.".to_string(),
            search_queries: vec!["sensex today".to_string()],
            sources: vec![
                GroundingSource {
                    title: "moneycontrol.com".to_string(),
                    uri: "https://moneycontrol.com/x".to_string(),
                },
                GroundingSource {
                    title: "https://et.com/y".to_string(),
                    uri: "https://et.com/y".to_string(),
                },
            ],
        };

        let body = format_pass_through(None, &result);
        assert_eq!(
            body,
            "Markets mixed.\n\nSearch queries:\n- sensex today\n\nSources:\n- moneycontrol.com (https://moneycontrol.com/x)\n- https://et.com/y"
        );
    }

    #[test]
    fn test_pass_through_plain_text_is_idempotent() {
        let result = SummaryResult::text("No relevant news found.");
        let once = format_pass_through(Some(HEADER), &result);
        let again = format_pass_through(Some(HEADER), &SummaryResult::text(once.clone()));
        assert_eq!(once, again);
    }
}
