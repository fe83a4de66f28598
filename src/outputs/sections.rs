//! Section formatter: Markdown-ish model output → plain-text email body.
//!
//! ```text
//! ## Key Themes            === Key Themes ===
//! * **RBI** dividend   →
//!                          - RBI dividend
//! ```
//!
//! Output never contains `## ` headers, so formatting it again only re-runs
//! the emphasis cleanup, which is a no-op on clean text.

use once_cell::sync::Lazy;
use regex::Regex;

static SECTION_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^##[ \t]+(.*)$").expect("static regex"));
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[*•+][ \t]+").expect("static regex"));
static SINGLE_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^\s*](?:[^*\n]*[^\s*])?)\*").expect("static regex"));
static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("static regex"));

/// Render `text` as `=== Title ===` sections.
pub fn format_sections(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let mut blocks: Vec<String> = Vec::new();

    let mut cursor = 0;
    let mut pending_title: Option<String> = None;
    for caps in SECTION_HEADER.captures_iter(&text) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        push_block(&mut blocks, pending_title.take(), &text[cursor..whole.start]);
        pending_title = Some(clean_inline(caps.get(1).map_or("", |m| m.as_str())));
        cursor = whole.end;
    }
    push_block(&mut blocks, pending_title, &text[cursor..]);

    blocks.join("\n\n")
}

fn push_block(blocks: &mut Vec<String>, title: Option<String>, body: &str) {
    let body = clean_body(body);
    match title {
        Some(title) if !title.is_empty() => {
            if body.is_empty() {
                blocks.push(format!("=== {title} ==="));
            } else {
                blocks.push(format!("=== {title} ===\n\n{body}"));
            }
        }
        _ if !body.is_empty() => blocks.push(body),
        _ => {}
    }
}

/// Strip emphasis, normalize bullets, collapse blank runs.
///
/// Emphasis goes first: a `***` bullet only becomes a `*` bullet once the
/// bold marker is gone.
fn clean_body(body: &str) -> String {
    let plain = clean_inline(body);
    let bulleted = BULLET.replace_all(&plain, "${1}- ");
    let lines = bulleted
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUNS.replace_all(&lines, "\n\n").trim().to_string()
}

/// Emphasis markers only count when they hug a word, so `2 * 3 * 4`
/// survives.
fn clean_inline(s: &str) -> String {
    let without_bold = s.replace("**", "").replace("__", "");
    SINGLE_EMPHASIS
        .replace_all(&without_bold, "$1")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_OUTPUT: &str = concat!(
        "## Overall Market Pulse\n",
        "**Bullish** 📈 as *Nifty* closes higher.\n\n\n",
        "## Key Themes (2-4)\n",
        "* RBI Dividend Payout: record transfer.\n",
        "* **FMCG** rally\n",
        "  + nested point\n",
    );

    #[test]
    fn test_sections_render_headers_and_bullets() {
        let out = format_sections(MODEL_OUTPUT);
        assert_eq!(
            out,
            concat!(
                "=== Overall Market Pulse ===\n\n",
                "Bullish 📈 as Nifty closes higher.\n\n",
                "=== Key Themes (2-4) ===\n\n",
                "- RBI Dividend Payout: record transfer.\n",
                "- FMCG rally\n",
                "  - nested point",
            )
        );
    }

    #[test]
    fn test_sections_are_idempotent() {
        let once = format_sections(MODEL_OUTPUT);
        let twice = format_sections(&once);
        assert_eq!(once, twice);
        assert_eq!(twice.matches("=== Key Themes (2-4) ===").count(), 1);
    }

    #[test]
    fn test_already_plain_text_is_unchanged() {
        let plain = "=== Overall Market Pulse ===\n\nMixed 📊\n\n=== Key Themes ===\n\n- IT rally";
        assert_eq!(format_sections(plain), plain);
    }

    #[test]
    fn test_preamble_kept_before_first_header() {
        let out = format_sections("Digest for today\n## Top News\n- Item");
        assert_eq!(out, "Digest for today\n\n=== Top News ===\n\n- Item");
    }

    #[test]
    fn test_arithmetic_star_survives() {
        let out = format_sections("## Math\n2 * 3 = 6");
        assert_eq!(out, "=== Math ===\n\n2 * 3 = 6");

        let plain = "=== Math ===\n\nLot size 2 * 3 * 4 units";
        assert_eq!(format_sections(plain), plain);
    }

    #[test]
    fn test_bold_bullet_settles_in_one_pass() {
        let once = format_sections("## Notes\n*** Record dividend");
        assert_eq!(once, "=== Notes ===\n\n- Record dividend");
        assert_eq!(format_sections(&once), once);
    }
}
