//! Timeline capture through public Nitter mirrors.
//!
//! For each subject we query the mirror's search page for posts from that
//! account since a cutoff, and keep the visible text of every timeline
//! item. Mirrors are tried in order; the first one that answers with a
//! non-empty timeline wins.

use crate::error::PipelineError;
use crate::normalize::collapse_whitespace;
use crate::sources::http;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

/// Mirrors tried when none are given on the command line.
pub const DEFAULT_MIRRORS: [&str; 3] = [
    "https://nitter.net",
    "https://nitter.cz",
    "https://nitter.it",
];

/// Page load budget per mirror.
const MIRROR_TIMEOUT: Duration = Duration::from_secs(60);

static TIMELINE_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.timeline-item").expect("static selector"));

/// Build the search URL for posts from `subject` since `since`.
///
/// ```text
/// https://nitter.net/search?f=tweets&q=from%3Aalice%20since%3A2025-05-12_08%3A00%3A00_UTC&since=&until=&near=
/// ```
pub fn search_url(mirror: &str, subject: &str, since: DateTime<Utc>) -> Result<Url, PipelineError> {
    // Without a trailing slash `join` would replace the last path segment.
    let base = if mirror.ends_with('/') {
        mirror.to_string()
    } else {
        format!("{mirror}/")
    };
    let base = Url::parse(&base)
        .map_err(|e| PipelineError::config(format!("invalid mirror URL {mirror}: {e}")))?;
    let query = format!(
        "from:{} since:{}",
        subject,
        since.format("%Y-%m-%d_%H:%M:%S_UTC")
    );
    let relative = format!(
        "search?f=tweets&q={}&since=&until=&near=",
        urlencoding::encode(&query)
    );
    base.join(&relative)
        .map_err(|e| PipelineError::config(format!("invalid search URL for {mirror}: {e}")))
}

/// Visible text of every timeline item on a Nitter page.
pub fn extract_timeline(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&TIMELINE_ITEM)
        .map(|item| collapse_whitespace(&item.text().collect::<Vec<_>>().join(" ")))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Capture the recent timeline of one subject.
///
/// Returns the timeline items separated by blank lines. A mirror that
/// fails, or answers without any timeline item, is skipped.
#[instrument(level = "info", skip(client, mirrors, since))]
pub async fn capture_subject(
    client: &Client,
    mirrors: &[String],
    subject: &str,
    since: DateTime<Utc>,
) -> Result<String, PipelineError> {
    let mut last_error = None;

    for mirror in mirrors {
        let url = search_url(mirror, subject, since)?;
        info!(%url, "Trying mirror");

        match http::fetch(client, url.as_str(), &BTreeMap::new(), MIRROR_TIMEOUT).await {
            Ok(raw) => {
                let html = String::from_utf8_lossy(&raw.bytes);
                let items = extract_timeline(&html);
                if items.is_empty() {
                    warn!(%mirror, "Mirror returned no timeline items");
                    last_error = Some(PipelineError::empty(url.to_string()));
                    continue;
                }
                info!(%mirror, items = items.len(), "Captured timeline");
                return Ok(items.join("\n\n"));
            }
            Err(e) => {
                warn!(%mirror, error = %e, "Mirror failed; trying next");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PipelineError::config("no Nitter mirrors configured")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMELINE_HTML: &str = r#"
        <html><body>
          <div class="timeline">
            <div class="timeline-item">
              <a class="username">@alice</a>
              <div class="tweet-content">Quarterly   results
                beat estimates</div>
            </div>
            <div class="timeline-item"><div class="tweet-content">Board meeting on Friday</div></div>
          </div>
        </body></html>"#;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 12, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_search_url_encodes_query() {
        let url = search_url("https://nitter.net", "alice", since()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://nitter.net/search?f=tweets&q=from%3Aalice%20since%3A2025-05-12_08%3A00%3A00_UTC&since=&until=&near="
        );
    }

    #[test]
    fn test_search_url_keeps_mirror_path() {
        for mirror in ["https://host.example/nitter", "https://host.example/nitter/"] {
            let url = search_url(mirror, "alice", since()).unwrap();
            assert_eq!(url.path(), "/nitter/search");
        }
    }

    #[test]
    fn test_search_url_rejects_bad_mirror() {
        assert!(search_url("not a url", "alice", since()).is_err());
    }

    #[test]
    fn test_extract_timeline_collapses_whitespace() {
        let items = extract_timeline(TIMELINE_HTML);
        assert_eq!(
            items,
            vec![
                "@alice Quarterly results beat estimates".to_string(),
                "Board meeting on Friday".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_timeline_empty_page() {
        assert!(extract_timeline("<html><body><p>Rate limited</p></body></html>").is_empty());
    }

    #[tokio::test]
    async fn test_capture_falls_back_to_next_mirror() {
        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&down)
            .await;

        let up = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("f", "tweets"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TIMELINE_HTML))
            .expect(1)
            .mount(&up)
            .await;

        let client = http::build_client().unwrap();
        let mirrors = vec![down.uri(), up.uri()];
        let text = capture_subject(&client, &mirrors, "alice", since())
            .await
            .unwrap();

        assert!(text.contains("Quarterly results beat estimates"));
        assert!(text.contains("\n\nBoard meeting on Friday"));
    }

    #[tokio::test]
    async fn test_capture_all_mirrors_failing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = http::build_client().unwrap();
        let err = capture_subject(&client, &[server.uri()], "alice", since())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyContent { .. }));
    }
}
