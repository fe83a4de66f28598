//! Local filesystem sources: news files, subject lists and capture
//! directories.
//!
//! Capture files follow the `<subject><delimiter>.<ext>` convention
//! (`alice_screenshot.png`); the subject is everything before the
//! delimiter.

use crate::error::PipelineError;
use crate::models::{Artifact, RawContent};
use itertools::Itertools;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Delimiter separating the subject from the rest of a capture file name.
pub const CAPTURE_DELIMITER: &str = "_screenshot";

/// Extensions picked up from a capture directory.
pub const ARTIFACT_EXTENSIONS: [&str; 3] = ["png", "pdf", "txt"];

/// Read a whole file as raw content.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_file(path: &Path) -> Result<RawContent, PipelineError> {
    let origin = path.display().to_string();
    let bytes = fs::read(path)
        .await
        .map_err(|e| PipelineError::fetch(&origin, e))?;
    info!(bytes = bytes.len(), "Read source file");
    Ok(RawContent::new(origin, bytes))
}

/// Read a newline-delimited subject list.
///
/// Lines are trimmed, blank lines skipped and repeated subjects dropped
/// (first occurrence wins).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_subjects(path: &Path) -> Result<Vec<String>, PipelineError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::fetch(path.display().to_string(), e))?;
    let subjects = parse_subjects(&text);
    info!(count = subjects.len(), ?subjects, "Read subjects");
    Ok(subjects)
}

/// Parse a newline-delimited subject list.
///
/// # Arguments
///
/// * `text` - File contents, one subject per line
///
/// # Returns
///
/// Trimmed subjects in file order, without blanks or repeats. Lines that
/// could escape the capture directory when used as a file name (containing
/// `/`, `\` or `..`) are dropped with a warning.
pub fn parse_subjects(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let safe = is_safe_subject(line);
            if !safe {
                warn!(subject = %line, "Skipping subject that is not a plain name");
            }
            safe
        })
        .unique()
        .map(str::to_string)
        .collect()
}

fn is_safe_subject(subject: &str) -> bool {
    !subject.contains('/') && !subject.contains('\\') && !subject.contains("..")
}

/// Derive the subject from a capture file name.
///
/// Names without the delimiter fall back to the file stem.
pub fn subject_from_filename(filename: &str, delimiter: &str) -> String {
    match filename.find(delimiter) {
        Some(idx) if idx > 0 => filename[..idx].to_string(),
        _ => Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename)
            .to_string(),
    }
}

/// MIME type for a capture file extension, compared case-insensitively.
///
/// # Returns
///
/// `None` for extensions the model is never sent.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        _ => None,
    }
}

/// Enumerate capture artifacts in `dir`, sorted by file name.
///
/// Only regular files whose extension (case-insensitive) is in
/// `extensions` are returned.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), %delimiter))]
pub async fn list_artifacts(
    dir: &Path,
    extensions: &[String],
    delimiter: &str,
) -> Result<Vec<Artifact>, PipelineError> {
    let origin = dir.display().to_string();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::fetch(&origin, e))?;

    let mut artifacts = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::fetch(&origin, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)) {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let subject = subject_from_filename(filename, delimiter);
        let mime_type = mime_for_extension(ext)
            .unwrap_or("application/octet-stream")
            .to_string();
        debug!(%filename, %subject, %mime_type, "Found artifact");
        artifacts.push(Artifact {
            subject,
            path,
            mime_type,
        });
    }

    let artifacts = artifacts
        .into_iter()
        .sorted_by(|a, b| a.path.file_name().cmp(&b.path.file_name()))
        .collect::<Vec<_>>();
    info!(count = artifacts.len(), "Listed capture artifacts");
    Ok(artifacts)
}

/// Read one artifact, tagging the content with its MIME type.
pub async fn read_artifact(artifact: &Artifact) -> Result<RawContent, PipelineError> {
    Ok(read_file(&artifact.path)
        .await?
        .with_mime(artifact.mime_type.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn default_extensions() -> Vec<String> {
        ARTIFACT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_subject_from_png_and_pdf_match() {
        assert_eq!(subject_from_filename("alice_screenshot.png", CAPTURE_DELIMITER), "alice");
        assert_eq!(subject_from_filename("alice_screenshot.pdf", CAPTURE_DELIMITER), "alice");
    }

    #[test]
    fn test_subject_keeps_inner_underscores() {
        assert_eq!(
            subject_from_filename("money_control_screenshot.png", CAPTURE_DELIMITER),
            "money_control"
        );
    }

    #[test]
    fn test_subject_without_delimiter_uses_stem() {
        assert_eq!(subject_from_filename("bob.png", CAPTURE_DELIMITER), "bob");
    }

    #[test]
    fn test_parse_subjects_skips_blank_and_duplicates() {
        let subjects = parse_subjects("alice\n\n  bob \n\nalice\n   \ncarol");
        assert_eq!(subjects, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_parse_subjects_drops_path_like_lines() {
        let subjects = parse_subjects("alice\n../x\nbob/../../etc\nc\\d\nbob\n..");
        assert_eq!(subjects, vec!["alice", "bob"]);
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("PNG"), Some("image/png"));
        assert_eq!(mime_for_extension("pdf"), Some("application/pdf"));
        assert_eq!(mime_for_extension("exe"), None);
    }

    #[tokio::test]
    async fn test_list_artifacts_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("bob_screenshot.png"), b"png").unwrap();
        std::fs::write(tmp.path().join("alice_screenshot.pdf"), b"pdf").unwrap();
        std::fs::write(tmp.path().join("notes.md"), b"skip").unwrap();
        std::fs::create_dir(tmp.path().join("gemini_analysis.png")).unwrap();

        let artifacts = list_artifacts(tmp.path(), &default_extensions(), CAPTURE_DELIMITER)
            .await
            .unwrap();

        let subjects: Vec<_> = artifacts.iter().map(|a| a.subject.as_str()).collect();
        assert_eq!(subjects, vec!["alice", "bob"]);
        assert_eq!(artifacts[0].mime_type, "application/pdf");
        assert_eq!(artifacts[1].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_list_artifacts_missing_dir_is_fetch_error() {
        let tmp = TempDir::new().unwrap();
        let err = list_artifacts(&tmp.path().join("nope"), &default_extensions(), CAPTURE_DELIMITER)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_read_artifact_carries_mime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("alice_screenshot.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let artifact = Artifact {
            subject: "alice".to_string(),
            path,
            mime_type: "image/png".to_string(),
        };
        let raw = read_artifact(&artifact).await.unwrap();
        assert_eq!(raw.mime_type.as_deref(), Some("image/png"));
        assert_eq!(raw.bytes.len(), 4);
    }

    #[tokio::test]
    async fn test_read_file_missing_is_fetch_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_file(&tmp.path().join("all_stock_news.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
