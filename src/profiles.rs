//! Profiles: the configuration table that selects what one pipeline run
//! does.
//!
//! Each built-in profile corresponds to one kind of digest. A YAML file can
//! add profiles or replace built-ins by name:
//!
//! ```yaml
//! profiles:
//!   - name: pulse-news
//!     source: { kind: http, url: "https://pulse.zerodha.com/", format: html }
//!     prompt: "Summarize: {content}"
//!     model: gemini-2.5-flash
//!     subject: "Pulse - {date}"
//! ```
//!
//! Templates understand `{date}` (local `YYYY-MM-DD`) and `{subject}`;
//! prompts additionally take `{content}`, see [`crate::api`].

use crate::api::{GenerationOptions, RetryPolicy};
use crate::config::Paths;
use crate::error::PipelineError;
use crate::normalize::ContentFormat;
use crate::outputs::FormatterPolicy;
use crate::sources::http::DEFAULT_TIMEOUT_SECS;
use crate::sources::local::{ARTIFACT_EXTENSIONS, CAPTURE_DELIMITER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const GROWW_PROMPT: &str = include_str!("../prompts/groww_digest.txt");
const PULSE_PROMPT: &str = include_str!("../prompts/pulse_news.txt");
const STOCK_NEWS_PROMPT: &str = include_str!("../prompts/stock_news.txt");
const SCREENSHOT_PROMPT: &str = include_str!("../prompts/screenshot_analysis.txt");

/// Where a profile's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Http {
        url: String,
        format: ContentFormat,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    File {
        path: PathBuf,
        #[serde(default = "default_file_format")]
        format: ContentFormat,
    },
    /// One pipeline per capture artifact found in `path`.
    Directory {
        path: PathBuf,
        #[serde(default = "default_extensions")]
        extensions: Vec<String>,
        #[serde(default = "default_delimiter")]
        delimiter: String,
        /// Per-subject analysis files land here.
        output_dir: PathBuf,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_file_format() -> ContentFormat {
    ContentFormat::Text
}

fn default_extensions() -> Vec<String> {
    ARTIFACT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_delimiter() -> String {
    CAPTURE_DELIMITER.to_string()
}

impl SourceSpec {
    pub fn describe(&self) -> String {
        match self {
            SourceSpec::Http { url, .. } => url.clone(),
            SourceSpec::File { path, .. } => path.display().to_string(),
            SourceSpec::Directory { path, .. } => format!("{}/ (per subject)", path.display()),
        }
    }
}

/// One row of the configuration table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub name: String,
    pub source: SourceSpec,
    pub prompt: String,
    pub model: String,
    /// Character budget for text content; the prefix is kept.
    #[serde(default)]
    pub max_chars: Option<usize>,
    #[serde(default)]
    pub generation: GenerationOptions,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub formatter: FormatterPolicy,
    /// First line of every successful body.
    #[serde(default)]
    pub envelope_header: Option<String>,
    pub subject: String,
    /// Subject used when the run fails; defaults to `subject`.
    #[serde(default)]
    pub failure_subject: Option<String>,
    /// Strip code fences and pretty-print JSON answers.
    #[serde(default)]
    pub clean_response: bool,
    /// Attach the source artifact to the email (directory sources).
    #[serde(default)]
    pub attach_artifact: bool,
    /// Pause between subjects in directory runs.
    #[serde(default)]
    pub subject_delay_secs: u64,
}

/// Substitute `{date}` and `{subject}` in a template.
pub fn render_template(template: &str, date: &str, subject: Option<&str>) -> String {
    let rendered = template.replace("{date}", date);
    match subject {
        Some(subject) => rendered.replace("{subject}", subject),
        None => rendered,
    }
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    profiles: Vec<Profile>,
}

/// Named profiles, in listing order.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    profiles: Vec<Profile>,
}

impl ProfileTable {
    /// The built-in profiles, with paths taken from `paths`.
    pub fn builtin(paths: &Paths) -> Self {
        let groww_headers = [
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:138.0) Gecko/20100101 Firefox/138.0",
            ),
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Origin", "https://groww.in"),
            ("Referer", "https://groww.in/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let profiles = vec![
            Profile {
                name: "groww-digest".to_string(),
                source: SourceSpec::Http {
                    url: "https://cmsapi.groww.in/api/v1/dailydigests?_limit=1&_start=0".to_string(),
                    format: ContentFormat::Json,
                    headers: groww_headers,
                    timeout_secs: DEFAULT_TIMEOUT_SECS,
                },
                prompt: GROWW_PROMPT.to_string(),
                model: "gemini-1.5-flash".to_string(),
                max_chars: None,
                generation: GenerationOptions::default(),
                retry: RetryPolicy::default(),
                formatter: FormatterPolicy::Sections,
                envelope_header: Some("Groww Daily Digest Analysis".to_string()),
                subject: "Groww Daily Digest".to_string(),
                failure_subject: Some("Groww Digest Analysis Failed".to_string()),
                clean_response: true,
                attach_artifact: false,
                subject_delay_secs: 0,
            },
            Profile {
                name: "pulse-news".to_string(),
                source: SourceSpec::Http {
                    url: "https://pulse.zerodha.com/".to_string(),
                    format: ContentFormat::Html,
                    headers: [("User-Agent".to_string(), "Mozilla/5.0".to_string())]
                        .into_iter()
                        .collect(),
                    timeout_secs: 10,
                },
                prompt: PULSE_PROMPT.to_string(),
                model: "gemini-2.5-flash-preview-05-20".to_string(),
                max_chars: Some(15_000),
                generation: GenerationOptions {
                    search_grounding: true,
                    thinking_budget: Some(10_000),
                    text_only: true,
                },
                retry: RetryPolicy::default(),
                formatter: FormatterPolicy::PassThrough,
                envelope_header: None,
                subject: "Pulse Zerodha News Summary - {date}".to_string(),
                failure_subject: None,
                clean_response: false,
                attach_artifact: false,
                subject_delay_secs: 0,
            },
            Profile {
                name: "stock-news".to_string(),
                source: SourceSpec::File {
                    path: paths.news_file.clone(),
                    format: ContentFormat::Text,
                },
                prompt: STOCK_NEWS_PROMPT.to_string(),
                model: "gemini-2.5-flash-preview-05-20".to_string(),
                max_chars: None,
                generation: GenerationOptions {
                    text_only: true,
                    ..GenerationOptions::default()
                },
                retry: RetryPolicy::default(),
                formatter: FormatterPolicy::PassThrough,
                envelope_header: Some("=== Indian Stock News Analysis ===".to_string()),
                subject: "Indian Stock News Analysis - {date}".to_string(),
                failure_subject: None,
                clean_response: false,
                attach_artifact: false,
                subject_delay_secs: 0,
            },
            Profile {
                name: "screenshot-analysis".to_string(),
                source: SourceSpec::Directory {
                    path: paths.capture_dir.clone(),
                    extensions: default_extensions(),
                    delimiter: default_delimiter(),
                    output_dir: paths.analysis_dir.clone(),
                },
                prompt: SCREENSHOT_PROMPT.to_string(),
                model: "gemini-2.5-flash-preview-04-17".to_string(),
                max_chars: None,
                generation: GenerationOptions::default(),
                retry: RetryPolicy::default(),
                formatter: FormatterPolicy::PassThrough,
                envelope_header: Some("=== Timeline Analysis: {subject} ===".to_string()),
                subject: "Timeline Analysis - {subject} - {date}".to_string(),
                failure_subject: None,
                clean_response: false,
                attach_artifact: true,
                subject_delay_secs: 0,
            },
        ];

        Self { profiles }
    }

    /// Add `overrides`, replacing profiles that share a name.
    pub fn merge(&mut self, overrides: Vec<Profile>) {
        for profile in overrides {
            match self.profiles.iter_mut().find(|p| p.name == profile.name) {
                Some(existing) => *existing = profile,
                None => self.profiles.push(profile),
            }
        }
    }

    /// Built-ins merged with the profiles in the YAML file at `path`.
    ///
    /// # Arguments
    ///
    /// * `paths` - Locations the built-in profiles read from and write to
    /// * `path` - Optional YAML file with a top-level `profiles:` list
    ///
    /// # Errors
    ///
    /// [`PipelineError::Io`] when the file cannot be read and
    /// [`PipelineError::Config`] when it does not parse.
    #[instrument(level = "info", skip(paths))]
    pub async fn load(paths: &Paths, path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut table = Self::builtin(paths);
        if let Some(path) = path {
            let text = fs::read_to_string(path)
                .await
                .map_err(|e| PipelineError::io(path, e))?;
            let overrides = parse_profiles_yaml(&text)?;
            info!(count = overrides.len(), "Loaded profile overrides");
            table.merge(overrides);
        }
        Ok(table)
    }

    /// Look up a profile by name.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Config`] naming every available profile when `name`
    /// is unknown.
    pub fn get(&self, name: &str) -> Result<&Profile, PipelineError> {
        self.profiles.iter().find(|p| p.name == name).ok_or_else(|| {
            PipelineError::config(format!(
                "unknown profile {name:?} (available: {})",
                self.names().join(", ")
            ))
        })
    }

    /// Profile names in listing order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }
}

fn parse_profiles_yaml(text: &str) -> Result<Vec<Profile>, PipelineError> {
    serde_yaml::from_str::<ProfilesFile>(text)
        .map(|file| file.profiles)
        .map_err(|e| PipelineError::config(format!("invalid profiles file: {e}")))
}
