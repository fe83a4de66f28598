//! Small helpers for logging, dates, and output directories.

use crate::error::PipelineError;
use chrono::Local;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a
/// remaining-byte count appended. Cuts never split a character.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
    }
}

/// Today's local date as `YYYY-MM-DD`, the form used in subjects and
/// prompts.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path).map_err(|e| PipelineError::io(&probe_path, e))?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let result = truncate_for_log("📈📉📊", 1);
        assert_eq!(result, "📈…(+8 bytes)");
    }

    #[test]
    fn test_today_shape() {
        let date = today();
        assert_eq!(date.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scraped/screenshots/gemini_analysis");
        ensure_writable_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        let err = ensure_writable_dir(&file).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
