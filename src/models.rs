//! Data models that flow through one pipeline run.
//!
//! All of these are transient and single-use:
//! - [`RawContent`]: bytes as fetched from a source
//! - [`NormalizedContent`]: text, JSON or binary ready for the model
//! - [`SummaryResult`]: model output plus grounding metadata
//! - [`DeliveryPayload`]: the message handed to the notifier

use serde::{Deserialize, Serialize};

/// Unprocessed bytes obtained from a source.
///
/// `origin` is the URL or path the bytes came from and is only used for
/// logging and error messages.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub origin: String,
    pub bytes: Vec<u8>,
    /// MIME type when the source knows it (directory artifacts, HTTP headers).
    pub mime_type: Option<String>,
}

impl RawContent {
    pub fn new(origin: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            bytes,
            mime_type: None,
        }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Content stripped of noise, never empty.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedContent {
    Text(String),
    Json(serde_json::Value),
    Binary { bytes: Vec<u8>, mime_type: String },
}

impl NormalizedContent {
    /// MIME type used when the content travels as a separate request part.
    pub fn mime_type(&self) -> &str {
        match self {
            NormalizedContent::Text(_) => "text/plain",
            NormalizedContent::Json(_) => "application/json",
            NormalizedContent::Binary { mime_type, .. } => mime_type,
        }
    }
}

/// A web source the model consulted while answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Model output for one pipeline run.
///
/// `text` is never empty: the client reports an error instead of returning
/// an empty result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryResult {
    pub text: String,
    /// Web searches issued when search grounding was enabled.
    pub search_queries: Vec<String>,
    pub sources: Vec<GroundingSource>,
}

impl SummaryResult {
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn has_grounding(&self) -> bool {
        !self.search_queries.is_empty() || !self.sources.is_empty()
    }
}

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Final message handed to the notifier. One per run, or one per subject
/// in batch runs.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPayload {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl DeliveryPayload {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A captured artifact on disk, tagged with the subject it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub subject: String,
    pub path: std::path::PathBuf,
    pub mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_mime_types() {
        assert_eq!(NormalizedContent::Text("x".into()).mime_type(), "text/plain");
        assert_eq!(
            NormalizedContent::Json(serde_json::json!({"a": 1})).mime_type(),
            "application/json"
        );
        let pdf = NormalizedContent::Binary {
            bytes: vec![1, 2, 3],
            mime_type: "application/pdf".to_string(),
        };
        assert_eq!(pdf.mime_type(), "application/pdf");
    }

    #[test]
    fn grounding_detection() {
        let mut result = SummaryResult::text("Markets rallied");
        assert!(!result.has_grounding());

        result.search_queries.push("nifty today".to_string());
        assert!(result.has_grounding());
    }

    #[test]
    fn payload_builder_collects_attachments() {
        let payload = DeliveryPayload::new("Subject", "Body").with_attachment(Attachment {
            filename: "alice_screenshot.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50],
        });
        assert_eq!(payload.attachments.len(), 1);
        assert_eq!(payload.attachments[0].filename, "alice_screenshot.png");
    }
}
