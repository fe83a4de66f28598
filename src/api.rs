//! Gemini `generateContent` client with bounded retry.
//!
//! # Architecture
//!
//! - [`GenerateContent`]: one model call, no retry
//! - [`GeminiClient`]: REST implementation of [`GenerateContent`]
//! - [`RetrySummarizer`]: wraps any [`GenerateContent`] and retries it under
//!   a [`RetryPolicy`]
//!
//! # Retry Strategy
//!
//! - `max_attempts` calls in total (default 3)
//! - Constant delay between attempts (default 5 seconds), no jitter
//! - Profiles may opt into exponential backoff capped at `max_delay_secs`
//!   with 0-250ms of jitter
//! - After the last failure the caller gets
//!   [`PipelineError::Summarization`] wrapping the last error

use crate::error::{ModelError, PipelineError};
use crate::models::{GroundingSource, NormalizedContent, SummaryResult};
use crate::utils::truncate_for_log;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Placeholder in a prompt template replaced by text content.
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Request flags for one model call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenerationOptions {
    /// Let the model run Google searches and report grounding metadata.
    #[serde(default)]
    pub search_grounding: bool,
    #[serde(default)]
    pub thinking_budget: Option<u32>,
    /// Restrict output modality to text.
    #[serde(default)]
    pub text_only: bool,
}

/// Bounded retry policy for model calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    /// Double the delay after each failure instead of keeping it fixed.
    #[serde(default)]
    pub exponential: bool,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    30
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
            exponential: false,
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `failed`-th failed attempt (1-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let base = Duration::from_secs(self.delay_secs);
        if !self.exponential {
            return base;
        }
        let shift = failed.saturating_sub(1).min(16);
        let delay = base
            .saturating_mul(1 << shift)
            .min(Duration::from_secs(self.max_delay_secs));
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Everything one model call needs.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub content: &'a NormalizedContent,
    pub options: &'a GenerationOptions,
}

/// A single, non-retrying model call.
pub trait GenerateContent {
    async fn generate(&self, request: &SummaryRequest<'_>) -> Result<SummaryResult, ModelError>;
}

/// Retry decorator around any [`GenerateContent`].
#[derive(Debug)]
pub struct RetrySummarizer<T> {
    inner: T,
}

impl<T> RetrySummarizer<T>
where
    T: GenerateContent,
{
    /// Wrap `inner`. The retry policy is passed to each
    /// [`summarize`](Self::summarize) call.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Call the model until it succeeds or `policy.max_attempts` calls
    /// have failed.
    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    pub async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
        policy: &RetryPolicy,
    ) -> Result<SummaryResult, PipelineError> {
        let max_attempts = policy.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            info!(attempt, max = max_attempts, "Sending content to Gemini API");
            let attempt_t0 = Instant::now();

            match self.inner.generate(request).await {
                Ok(result) => {
                    info!(
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        chars = result.text.chars().count(),
                        preview = %truncate_for_log(&result.text, 100),
                        "Received response from Gemini API"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                    if attempt >= max_attempts {
                        error!(
                            attempt,
                            max = max_attempts,
                            elapsed_ms_attempt,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "Gemini API exhausted attempts"
                        );
                        return Err(PipelineError::Summarization {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt,
                        ?delay,
                        error = %e,
                        "Gemini API attempt failed; retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// REST client
// ---------------------------------------------------------------------------

/// Gemini REST client authenticated with an API key.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

impl GenerateContent for GeminiClient {
    #[instrument(level = "debug", skip_all)]
    async fn generate(&self, request: &SummaryRequest<'_>) -> Result<SummaryResult, ModelError> {
        let body = build_request(request);
        let response = self
            .http
            .post(self.endpoint(request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&text, 500),
            });
        }

        let text = response.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            ModelError::Other(format!(
                "malformed Gemini response: {e}: {}",
                truncate_for_log(&text, 200)
            ))
        })?;
        parsed.into_summary()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
    /// Set on thought-summary parts when thinking output is included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn inline(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(bytes),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    web_search_queries: Vec<String>,
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl GenerateContentResponse {
    /// Join the non-thought text parts of the first candidate.
    fn into_summary(self) -> Result<SummaryResult, ModelError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ModelError::EmptyResponse {
                reason: block_reason,
            });
        };

        let text = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(ModelError::EmptyResponse {
                reason: candidate.finish_reason.or(block_reason),
            });
        }

        let (search_queries, sources) = match candidate.grounding_metadata {
            Some(meta) => (
                meta.web_search_queries,
                meta.grounding_chunks
                    .into_iter()
                    .filter_map(|c| c.web)
                    .filter_map(|w| {
                        let uri = w.uri?;
                        Some(GroundingSource {
                            title: w.title.unwrap_or_else(|| uri.clone()),
                            uri,
                        })
                    })
                    .collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        Ok(SummaryResult {
            text,
            search_queries,
            sources,
        })
    }
}

/// Assemble the request parts for `request`.
///
/// A prompt carrying [`CONTENT_PLACEHOLDER`] gets text and JSON content
/// inlined and travels as a single part. Otherwise the prompt and the
/// content are separate parts; JSON and binary content go as base64
/// `inlineData`, binary first.
fn build_parts(prompt: &str, content: &NormalizedContent) -> Vec<Part> {
    let inline_target = prompt.contains(CONTENT_PLACEHOLDER);

    match content {
        NormalizedContent::Text(text) if inline_target => {
            vec![Part::text(prompt.replace(CONTENT_PLACEHOLDER, text))]
        }
        NormalizedContent::Json(value) if inline_target => {
            let rendered = serde_json::to_string(value).unwrap_or_default();
            vec![Part::text(prompt.replace(CONTENT_PLACEHOLDER, &rendered))]
        }
        NormalizedContent::Text(text) => vec![Part::text(prompt), Part::text(text.clone())],
        NormalizedContent::Json(value) => {
            let rendered = serde_json::to_vec(value).unwrap_or_default();
            vec![
                Part::text(prompt),
                Part::inline("application/json", &rendered),
            ]
        }
        NormalizedContent::Binary { bytes, mime_type } => vec![
            Part::inline(mime_type, bytes),
            Part::text(prompt.replace(CONTENT_PLACEHOLDER, "")),
        ],
    }
}

fn build_request(request: &SummaryRequest<'_>) -> GenerateContentRequest {
    let options = request.options;
    let tools = if options.search_grounding {
        vec![Tool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    };

    let generation_config = if options.thinking_budget.is_some() || options.text_only {
        Some(GenerationConfig {
            thinking_config: options
                .thinking_budget
                .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            response_modalities: options.text_only.then(|| vec!["TEXT".to_string()]),
        })
    } else {
        None
    };

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: build_parts(request.prompt, request.content),
        }],
        tools,
        generation_config,
    }
}
