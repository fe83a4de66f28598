//! The generic fetch → normalize → summarize → format → deliver run.
//!
//! A [`Pipeline`] executes one [`Profile`]. Single-source profiles produce
//! exactly one payload; directory profiles produce one per subject, in
//! file-name order with `subject_delay_secs` between subjects. Every step
//! is awaited in sequence.
//!
//! Errors never escape a run. A failing step turns into a failure payload
//! (`Failed to generate analysis.` plus the error text) and the notifier is
//! invoked regardless. Delivery errors are logged and counted, nothing more.

use crate::api::{GenerateContent, RetrySummarizer, SummaryRequest};
use crate::error::PipelineError;
use crate::models::{Artifact, Attachment, DeliveryPayload, NormalizedContent, RawContent};
use crate::normalize::{ContentFormat, normalize};
use crate::notify::Notify;
use crate::outputs::{analysis, clean_response, format_summary};
use crate::profiles::{Profile, SourceSpec, render_template};
use crate::sources::{http, local, nitter};
use crate::utils::{ensure_writable_dir, truncate_for_log};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// First line of every failure body.
pub const FAILURE_PREAMBLE: &str = "Failed to generate analysis.";

/// Counters for one profile run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub delivered: usize,
    pub failed_deliveries: usize,
}

/// Counters for one capture run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<String>,
}

pub fn failure_body(error: &PipelineError) -> String {
    format!("{FAILURE_PREAMBLE}\nError: {error}")
}

/// Borrowed collaborators for profile runs.
pub struct Pipeline<'a, G, N> {
    http: &'a Client,
    summarizer: &'a RetrySummarizer<G>,
    notifier: &'a N,
    today: String,
}

impl<'a, G, N> Pipeline<'a, G, N>
where
    G: GenerateContent,
    N: Notify,
{
    /// `today` is the `{date}` substituted into prompts, subjects and headers.
    pub fn new(
        http: &'a Client,
        summarizer: &'a RetrySummarizer<G>,
        notifier: &'a N,
        today: impl Into<String>,
    ) -> Self {
        Self {
            http,
            summarizer,
            notifier,
            today: today.into(),
        }
    }

    /// Run `profile` to completion.
    #[instrument(level = "info", skip_all, fields(profile = %profile.name))]
    pub async fn run(&self, profile: &Profile) -> RunReport {
        let t0 = Instant::now();
        let mut report = RunReport::default();

        match &profile.source {
            SourceSpec::Directory {
                path,
                extensions,
                delimiter,
                output_dir,
            } => {
                self.run_batch(profile, path, extensions, delimiter, output_dir, &mut report)
                    .await
            }
            _ => self.run_single(profile, &mut report).await,
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            delivered = report.delivered,
            failed_deliveries = report.failed_deliveries,
            elapsed_ms = t0.elapsed().as_millis(),
            "Profile run finished"
        );
        report
    }

    async fn run_single(&self, profile: &Profile, report: &mut RunReport) {
        let payload = match self.summarize_source(profile).await {
            Ok(body) => {
                report.succeeded += 1;
                DeliveryPayload::new(self.subject_line(profile, None), body)
            }
            Err(e) => {
                error!(error = %e, "Pipeline failed; sending failure notice");
                report.failed += 1;
                self.failure_payload(profile, None, &e)
            }
        };
        self.deliver(&payload, report).await;
    }

    async fn summarize_source(&self, profile: &Profile) -> Result<String, PipelineError> {
        let (raw, format) = match &profile.source {
            SourceSpec::Http {
                url,
                format,
                headers,
                timeout_secs,
            } => (
                http::fetch(self.http, url, headers, Duration::from_secs(*timeout_secs)).await?,
                *format,
            ),
            SourceSpec::File { path, format } => (local::read_file(path).await?, *format),
            SourceSpec::Directory { path, .. } => {
                return Err(PipelineError::config(format!(
                    "{} is a directory source and runs per subject",
                    path.display()
                )));
            }
        };

        let content = normalize(raw, format, profile.max_chars)?;
        self.summarize_content(profile, &content, None).await
    }

    async fn summarize_content(
        &self,
        profile: &Profile,
        content: &NormalizedContent,
        subject: Option<&str>,
    ) -> Result<String, PipelineError> {
        let prompt = render_template(&profile.prompt, &self.today, subject);
        let request = SummaryRequest {
            model: &profile.model,
            prompt: &prompt,
            content,
            options: &profile.generation,
        };
        let mut result = self.summarizer.summarize(&request, &profile.retry).await?;

        if profile.clean_response {
            result.text = clean_response(&result.text);
        }
        let header = profile
            .envelope_header
            .as_deref()
            .map(|h| render_template(h, &self.today, subject));
        Ok(format_summary(profile.formatter, header.as_deref(), &result))
    }

    async fn run_batch(
        &self,
        profile: &Profile,
        dir: &Path,
        extensions: &[String],
        delimiter: &str,
        output_dir: &Path,
        report: &mut RunReport,
    ) {
        let artifacts = match local::list_artifacts(dir, extensions, delimiter).await {
            Ok(artifacts) if artifacts.is_empty() => {
                Err(PipelineError::empty(dir.display().to_string()))
            }
            other => other,
        };
        let artifacts = match artifacts {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!(error = %e, "No artifacts to analyze; sending failure notice");
                report.failed += 1;
                let payload = self.failure_payload(profile, None, &e);
                self.deliver(&payload, report).await;
                return;
            }
        };

        if let Err(e) = ensure_writable_dir(output_dir).await {
            warn!(error = %e, "Analysis directory is not writable; results will only be mailed");
        }

        let total = artifacts.len();
        for (i, artifact) in artifacts.iter().enumerate() {
            if i > 0 && profile.subject_delay_secs > 0 {
                sleep(Duration::from_secs(profile.subject_delay_secs)).await;
            }
            info!(subject = %artifact.subject, index = i + 1, total, "Processing subject");
            self.run_subject(profile, artifact, output_dir, report).await;
        }
    }

    #[instrument(level = "info", skip_all, fields(subject = %artifact.subject))]
    async fn run_subject(
        &self,
        profile: &Profile,
        artifact: &Artifact,
        output_dir: &Path,
        report: &mut RunReport,
    ) {
        let subject = artifact.subject.as_str();
        let raw = local::read_artifact(artifact).await;

        let attachment = match &raw {
            Ok(raw) if profile.attach_artifact => Some(attachment_for(artifact, raw)),
            _ => None,
        };

        let outcome = match raw {
            Ok(raw) => self.summarize_artifact(profile, raw, subject).await,
            Err(e) => Err(e),
        };

        let (saved_text, mut payload) = match outcome {
            Ok(body) => {
                report.succeeded += 1;
                let payload =
                    DeliveryPayload::new(self.subject_line(profile, Some(subject)), body.clone());
                (body, payload)
            }
            Err(e) => {
                error!(error = %e, "Subject failed; continuing with the next one");
                report.failed += 1;
                let payload = self.failure_payload(profile, Some(subject), &e);
                (payload.body.clone(), payload)
            }
        };

        if let Err(e) = analysis::write_analysis(output_dir, subject, &saved_text).await {
            warn!(error = %e, "Failed to save analysis file");
        }

        if let Some(attachment) = attachment {
            payload = payload.with_attachment(attachment);
        }
        self.deliver(&payload, report).await;
    }

    async fn summarize_artifact(
        &self,
        profile: &Profile,
        raw: RawContent,
        subject: &str,
    ) -> Result<String, PipelineError> {
        let format = match raw.mime_type.as_deref() {
            Some(m) if m.starts_with("text/") => ContentFormat::Text,
            _ => ContentFormat::Binary,
        };
        let content = normalize(raw, format, profile.max_chars)?;
        self.summarize_content(profile, &content, Some(subject)).await
    }

    fn subject_line(&self, profile: &Profile, subject: Option<&str>) -> String {
        render_template(&profile.subject, &self.today, subject)
    }

    fn failure_payload(
        &self,
        profile: &Profile,
        subject: Option<&str>,
        error: &PipelineError,
    ) -> DeliveryPayload {
        let template = profile
            .failure_subject
            .as_deref()
            .unwrap_or(&profile.subject);
        DeliveryPayload::new(
            render_template(template, &self.today, subject),
            failure_body(error),
        )
    }

    async fn deliver(&self, payload: &DeliveryPayload, report: &mut RunReport) {
        match self.notifier.deliver(payload).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                error!(
                    subject = %payload.subject,
                    error = %e,
                    body_preview = %truncate_for_log(&payload.body, 200),
                    "Delivery failed"
                );
                report.failed_deliveries += 1;
            }
        }
    }
}

fn attachment_for(artifact: &Artifact, raw: &RawContent) -> Attachment {
    let filename = artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}_artifact", artifact.subject));
    Attachment {
        filename,
        mime_type: artifact.mime_type.clone(),
        bytes: raw.bytes.clone(),
    }
}

/// Capture every subject's recent timeline into
/// `<capture_dir>/<subject>_screenshot.txt`.
///
/// Subjects are processed in list order with `throttle` between them; a
/// subject whose mirrors all fail is recorded and skipped.
#[instrument(level = "info", skip_all, fields(subjects_file = %subjects_file.display(), capture_dir = %capture_dir.display()))]
pub async fn run_capture(
    client: &Client,
    subjects_file: &Path,
    capture_dir: &Path,
    mirrors: &[String],
    throttle: Duration,
    since: DateTime<Utc>,
) -> Result<CaptureReport, PipelineError> {
    let subjects = local::read_subjects(subjects_file).await?;
    if subjects.is_empty() {
        return Err(PipelineError::empty(subjects_file.display().to_string()));
    }
    ensure_writable_dir(capture_dir).await?;

    let mut report = CaptureReport::default();
    for (i, subject) in subjects.iter().enumerate() {
        if i > 0 && !throttle.is_zero() {
            info!(?throttle, "Waiting before next subject");
            sleep(throttle).await;
        }

        match nitter::capture_subject(client, mirrors, subject, since).await {
            Ok(text) => {
                let path = capture_dir.join(format!("{subject}{}.txt", local::CAPTURE_DELIMITER));
                match tokio::fs::write(&path, text).await {
                    Ok(()) => {
                        info!(%subject, path = %path.display(), "Saved capture");
                        report.written.push(path);
                    }
                    Err(e) => {
                        let e = PipelineError::io(&path, e);
                        error!(%subject, error = %e, "Failed to save capture");
                        report.failed.push(subject.clone());
                    }
                }
            }
            Err(e) => {
                error!(%subject, error = %e, "Capture failed on every mirror");
                report.failed.push(subject.clone());
            }
        }
    }

    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "Capture finished"
    );
    Ok(report)
}
