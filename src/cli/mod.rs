//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;
use crate::domain::Verdict;

/// Scan History - store media analysis results and follow their history.
#[derive(Parser, Debug)]
#[command(name = "scan-history")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (defaults to ~/.scan-history/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store the result of an analysis run.
    Submit {
        /// Display name of the analyzed media.
        #[arg(short = 'n', long, default_value = "")]
        file_name: String,

        /// Verdict: genuine or manipulated.
        #[arg(short, long)]
        result: Verdict,

        /// Confidence percentage (0-100).
        #[arg(short, long)]
        confidence: f64,

        /// Finding to attach (repeatable).
        #[arg(short, long = "issue")]
        issues: Vec<String>,
    },

    /// Show analysis history, newest first.
    History {
        /// Keep running and print every change until Ctrl-C.
        #[arg(short, long)]
        watch: bool,

        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show which store this process selected.
    Mode,

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Write the default configuration file if missing.
    Init,
    /// Print the effective configuration.
    Show,
    /// Print the configuration file path.
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submit() {
        let cli = Cli::parse_from([
            "scan-history",
            "submit",
            "--file-name",
            "clip1.mp4",
            "--result",
            "fake",
            "--confidence",
            "96.4",
            "--issue",
            "Unnatural Blinking",
            "--issue",
            "Lip Sync mismatch",
        ]);

        let Commands::Submit {
            file_name,
            result,
            confidence,
            issues,
        } = cli.command
        else {
            panic!("expected submit");
        };
        assert_eq!(file_name, "clip1.mp4");
        assert_eq!(result, Verdict::Manipulated);
        assert!((confidence - 96.4).abs() < f64::EPSILON);
        assert_eq!(issues, ["Unnatural Blinking", "Lip Sync mismatch"]);
    }

    #[test]
    fn test_parse_history_watch_json() {
        let cli = Cli::parse_from(["scan-history", "-vv", "history", "--watch", "-f", "json"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::History {
                watch: true,
                format: OutputFormat::Json
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_verdict() {
        let parsed = Cli::try_parse_from([
            "scan-history",
            "submit",
            "--result",
            "maybe",
            "--confidence",
            "1",
        ]);
        assert!(parsed.is_err());
    }
}
