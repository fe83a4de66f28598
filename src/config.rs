//! Process configuration, built once at startup and passed by reference.
//!
//! Credentials are optional at parse time; each command asks for the ones
//! it needs through [`AppConfig::require_gemini`] and
//! [`AppConfig::require_email`] before touching the network.

use crate::cli::Cli;
use crate::error::PipelineError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub user: String,
    pub password: String,
    pub to: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

/// Filesystem locations shared by the profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub subjects_file: PathBuf,
    pub news_file: PathBuf,
    pub capture_dir: PathBuf,
    pub analysis_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            subjects_file: PathBuf::from("usernames.txt"),
            news_file: PathBuf::from("all_stock_news.txt"),
            capture_dir: PathBuf::from("scraped/screenshots"),
            analysis_dir: PathBuf::from("scraped/screenshots/gemini_analysis"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    gemini_api_key: Option<String>,
    gemini_base_url: String,
    email_user: Option<String>,
    email_pass: Option<String>,
    email_to: Option<String>,
    smtp_host: String,
    smtp_port: u16,
    pub paths: Paths,
    pub profiles_file: Option<PathBuf>,
    pub dry_run: bool,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl AppConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            gemini_api_key: non_blank(&cli.gemini_api_key),
            gemini_base_url: cli.gemini_base_url.clone(),
            email_user: non_blank(&cli.email_user),
            email_pass: non_blank(&cli.email_pass),
            email_to: non_blank(&cli.email_to),
            smtp_host: cli.smtp_host.clone(),
            smtp_port: cli.smtp_port,
            paths: Paths {
                subjects_file: cli.subjects_file.clone(),
                news_file: cli.news_file.clone(),
                capture_dir: cli.capture_dir.clone(),
                analysis_dir: cli.analysis_dir.clone(),
            },
            profiles_file: cli.profiles.clone(),
            dry_run: cli.dry_run,
        }
    }

    pub fn require_gemini(&self) -> Result<GeminiSettings, PipelineError> {
        let api_key = self.gemini_api_key.clone().ok_or_else(|| {
            PipelineError::config("GEMINI_API_KEY is not set in environment variables")
        })?;
        Ok(GeminiSettings {
            api_key,
            base_url: self.gemini_base_url.clone(),
        })
    }

    /// Email settings; the recipient falls back to the sending account.
    pub fn require_email(&self) -> Result<EmailSettings, PipelineError> {
        let (Some(user), Some(password)) = (self.email_user.clone(), self.email_pass.clone())
        else {
            return Err(PipelineError::config(
                "EMAIL_USER or EMAIL_PASS is not set in environment variables",
            ));
        };
        Ok(EmailSettings {
            to: self.email_to.clone().unwrap_or_else(|| user.clone()),
            user,
            password,
            smtp_host: self.smtp_host.clone(),
            smtp_port: self.smtp_port,
        })
    }
}
