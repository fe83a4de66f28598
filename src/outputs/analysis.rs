//! Per-subject analysis files.
//!
//! Batch runs leave one `<subject>_analysis.txt` per subject in the
//! analysis directory, holding either the model's answer or the error that
//! replaced it. A later run (or a human) picks them up from there.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Location of the analysis file for `subject` inside `dir`.
///
/// # Returns
///
/// `<dir>/<subject>_analysis.txt`; later runs look for exactly this name.
pub fn analysis_path(dir: &Path, subject: &str) -> PathBuf {
    dir.join(format!("{subject}_analysis.txt"))
}

/// Write `text` to the subject's analysis file, replacing any previous one.
#[instrument(level = "info", skip(text), fields(dir = %dir.display()))]
pub async fn write_analysis(
    dir: &Path,
    subject: &str,
    text: &str,
) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;

    let path = analysis_path(dir, subject);
    fs::write(&path, text)
        .await
        .map_err(|e| PipelineError::io(&path, e))?;
    info!(path = %path.display(), "Saved analysis result");
    Ok(path)
}
