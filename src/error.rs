//! Error types for the fetch → summarize → deliver pipeline.
//!
//! [`PipelineError`] is the taxonomy every pipeline step reports in. A single
//! Gemini attempt fails with the narrower [`ModelError`]; the retry layer in
//! [`crate::api`] folds the last one into [`PipelineError::Summarization`].

use std::path::PathBuf;

/// Top-level error for one pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network or filesystem source unreachable, or non-success HTTP status.
    #[error("fetch error for {origin}: {message}")]
    Fetch { origin: String, message: String },

    /// The source answered but yielded nothing usable.
    #[error("no usable content in {origin}")]
    EmptyContent { origin: String },

    /// The model call failed after exhausting every attempt.
    #[error("Gemini API failed after {attempts} attempts: {last_error}")]
    Summarization { attempts: u32, last_error: String },

    /// SMTP authentication or transmission failure.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Missing credential, unknown profile, malformed profiles file.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O outside of source fetching (artifacts, analysis files).
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn fetch(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    pub fn empty(origin: impl Into<String>) -> Self {
        Self::EmptyContent {
            origin: origin.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single `generateContent` attempt.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response carried no candidate text (blocked, truncated, or empty).
    #[error("no analysis returned by Gemini API{}", reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    EmptyResponse { reason: Option<String> },

    /// Anything else, e.g. a body that is not a `generateContent` response.
    #[error("{0}")]
    Other(String),
}
