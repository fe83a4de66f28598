//! Command-line interface definitions for Digest Courier.
//!
//! Every option can also come from the environment, so cron entries only
//! need to export credentials and pick a command.

use crate::api::DEFAULT_GEMINI_BASE_URL;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Digest Courier application.
///
/// # Examples
///
/// ```sh
/// # Capture yesterday's timelines for every handle in usernames.txt
/// digest_courier capture --throttle-secs 30
///
/// # Summarize the Groww daily digest and mail it
/// digest_courier run groww-digest
///
/// # Print the pulse summary instead of emailing it
/// digest_courier --dry-run run pulse-news
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini REST endpoint
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    /// Sending email account (also the SMTP login)
    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    /// Password or app password for the sending account
    #[arg(long, env = "EMAIL_PASS", hide_env_values = true)]
    pub email_pass: Option<String>,

    /// Recipient; defaults to the sending account
    #[arg(long, env = "EMAIL_TO")]
    pub email_to: Option<String>,

    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 465)]
    pub smtp_port: u16,

    /// Newline-delimited list of subjects (social handles)
    #[arg(long, env = "SUBJECTS_FILE", default_value = "usernames.txt")]
    pub subjects_file: PathBuf,

    /// Pre-fetched news titles for the stock-news profile
    #[arg(long, env = "NEWS_FILE", default_value = "all_stock_news.txt")]
    pub news_file: PathBuf,

    /// Where captures are written and read from
    #[arg(long, env = "CAPTURE_DIR", default_value = "scraped/screenshots")]
    pub capture_dir: PathBuf,

    /// Where per-subject analysis files are written
    #[arg(
        long,
        env = "ANALYSIS_DIR",
        default_value = "scraped/screenshots/gemini_analysis"
    )]
    pub analysis_dir: PathBuf,

    /// YAML file adding profiles or replacing built-in ones by name
    #[arg(long, env = "PROFILES_FILE")]
    pub profiles: Option<PathBuf>,

    /// Print payloads instead of emailing them
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Capture recent posts for every subject from Nitter mirrors
    Capture {
        /// Pause between subjects
        #[arg(long, default_value_t = 30)]
        throttle_secs: u64,

        /// Mirror base URL, tried in the order given (repeatable)
        #[arg(long = "mirror")]
        mirrors: Vec<String>,
    },

    /// Run one summarization profile end to end
    Run {
        /// Profile name, see `profiles`
        profile: String,
    },

    /// List available profiles
    Profiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_profile() {
        let cli = Cli::parse_from(["digest_courier", "--dry-run", "run", "groww-digest"]);

        assert!(cli.dry_run);
        assert_eq!(
            cli.command,
            Command::Run {
                profile: "groww-digest".to_string()
            }
        );
    }

    #[test]
    fn test_cli_capture_mirrors() {
        let cli = Cli::parse_from([
            "digest_courier",
            "--capture-dir",
            "/tmp/shots",
            "capture",
            "--throttle-secs",
            "5",
            "--mirror",
            "https://nitter.net",
            "--mirror",
            "https://nitter.cz",
        ]);

        assert_eq!(cli.capture_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(
            cli.command,
            Command::Capture {
                throttle_secs: 5,
                mirrors: vec![
                    "https://nitter.net".to_string(),
                    "https://nitter.cz".to_string()
                ],
            }
        );
    }

    #[test]
    fn test_cli_capture_defaults() {
        let cli = Cli::parse_from(["digest_courier", "capture"]);
        assert_eq!(
            cli.command,
            Command::Capture {
                throttle_secs: 30,
                mirrors: vec![],
            }
        );
    }
}
