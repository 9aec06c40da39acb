//! CLI definition and command handling

pub mod commands;
pub mod output;

use clap::Parser;

use crate::exit_codes;
use commands::DeployCommand;

/// Publish an Android App Bundle to a Google Play release track
///
/// The service account key is read from --service-account-key or, when the
/// flag is absent, from the GOOGLE_PLAY_SERVICE_ACCOUNT_KEY environment
/// variable (JSON content or a path to the JSON file).
#[derive(Debug, Parser)]
#[command(name = "playdeploy")]
#[command(author, version, about, long_about)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub deploy: DeployCommand,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

impl Cli {
    /// Console log level used when RUST_LOG is not set
    pub fn console_log_level(&self) -> &'static str {
        if self.verbose {
            "info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Execute the CLI command, returning the process exit code
    pub fn execute(&self) -> i32 {
        match self.deploy.execute(self) {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => {
                output::error(&e.to_string());
                exit_codes::ERROR
            }
        }
    }
}
