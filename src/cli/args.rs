//! CLI argument definitions using clap

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// reqchain - run collection requests with cross-request response chaining
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "reqchain", version, about, long_about = None)]
pub struct Args {
    // =========================================================================
    // POSITIONAL ARGUMENTS
    // =========================================================================

    /// Collection file (YAML or JSON)
    #[arg(value_name = "COLLECTION")]
    pub collection: PathBuf,

    /// Request to run, as a slash path of folder and request names
    #[arg(value_name = "REQUEST_PATH", conflicts_with = "id")]
    pub request_path: Option<String>,

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Run the request with this id instead of a path
    #[arg(long = "id", value_name = "ID")]
    pub id: Option<String>,

    /// List every request with its id and method
    #[arg(short = 'l', long = "list", action = ArgAction::SetTrue)]
    pub list: bool,

    /// Start an interactive prompt
    #[arg(short = 'i', long = "interactive", action = ArgAction::SetTrue)]
    pub interactive: bool,

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Print the resolved request without sending it
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Fail on undefined variables instead of leaving them in place
    #[arg(long = "strict", action = ArgAction::SetTrue)]
    pub strict: bool,

    /// Sub-environment of the collection to use
    #[arg(short = 'e', long = "env", value_name = "NAME")]
    pub env: Option<String>,

    /// dotenv file with override variables (default: .env beside the collection)
    #[arg(long = "env-file", value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Override a variable; may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Never prompt; prompt directives use their defaults
    #[arg(long = "no-prompt", action = ArgAction::SetTrue)]
    pub no_prompt: bool,

    // =========================================================================
    // NETWORK
    // =========================================================================

    /// Request timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Exit with an error for non-2xx responses
    #[arg(long = "check-status", action = ArgAction::SetTrue)]
    pub check_status: bool,

    // =========================================================================
    // CACHE
    // =========================================================================

    /// Remove cached values (optionally only keys starting with PREFIX) and exit
    #[arg(long = "clear-cache", value_name = "PREFIX", num_args = 0..=1, default_missing_value = "")]
    pub clear_cache: Option<String>,

    // =========================================================================
    // OUTPUT
    // =========================================================================

    /// Verbose output. Use -vv for even more verbose
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log line format
    #[arg(long = "log-format", value_name = "FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Whether a single request is to be run or printed
    pub fn targets_request(&self) -> bool {
        self.request_path.is_some() || self.id.is_some()
    }
}
