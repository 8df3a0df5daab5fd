//! CLI - Command Line Interface for StreamHub
//!
//! Every action is scriptable. With `--json` (or when stdout is not a TTY)
//! results are printed as JSON and logs go to stderr.
//!
//! # Examples
//!
//! ```bash
//! # Find a torrent and check if Real-Debrid already has it
//! streamhub search "big buck bunny"
//! streamhub available "magnet:?xt=urn:btih:..."
//!
//! # Resolve and play
//! streamhub stream "magnet:?xt=urn:btih:..." --player vlc
//!
//! # Browse what is already downloaded
//! streamhub library
//! streamhub play ABCDEF123 --file 1
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::api::DebridError;
use crate::models::MAGNET_PREFIX;
use crate::stream::PlayerType;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error or provider failure
    NetworkError = 3,
    /// Missing or rejected API token
    AuthRequired = 4,
    /// No streams available
    NoStreams = 5,
    /// Player failed to start or crashed
    PlaybackFailed = 6,
    /// Torrent still processing when the wait budget ran out
    Timeout = 7,
    /// Interrupted by the user
    Cancelled = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

impl From<&DebridError> for ExitCode {
    fn from(err: &DebridError) -> Self {
        match err {
            DebridError::Validation(_) => ExitCode::InvalidArgs,
            DebridError::Auth(_) => ExitCode::AuthRequired,
            DebridError::Timeout(_) => ExitCode::Timeout,
            DebridError::Cancelled => ExitCode::Cancelled,
            DebridError::Remote { .. } | DebridError::Decode(_) | DebridError::Network(_) => {
                ExitCode::NetworkError
            }
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// StreamHub - stream torrents through Real-Debrid
#[derive(Parser, Debug)]
#[command(
    name = "streamhub",
    version,
    about = "Stream torrents through Real-Debrid",
    long_about = "Search torrents, submit magnet links to Real-Debrid, wait \
                  for them to be cached and play the result in mpv or VLC.",
    after_help = "EXAMPLES:\n\
                  streamhub token set <TOKEN>           Store your API token\n\
                  streamhub search \"big buck bunny\"     Search torrents\n\
                  streamhub stream <MAGNET>             Resolve and play\n\
                  streamhub library --json              List downloaded torrents"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the torrent index
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Check whether Real-Debrid already has a magnet cached
    #[command(visible_alias = "av")]
    Available(AvailableCmd),

    /// Add a magnet to the library without waiting for it
    Add(AddCmd),

    /// Resolve a magnet into a stream and play it
    #[command(visible_alias = "st")]
    Stream(StreamCmd),

    /// List torrents on the account
    #[command(visible_alias = "lib")]
    Library(LibraryCmd),

    /// Play a file of a downloaded library torrent
    #[command(visible_alias = "pl")]
    Play(PlayCmd),

    /// Remove a torrent from the account
    #[command(visible_alias = "rm")]
    Delete(DeleteCmd),

    /// Manage the Real-Debrid API token
    Token(TokenCmd),
}

// =============================================================================
// Search Command
// =============================================================================

/// Search torrents by keywords
#[derive(Args, Debug)]
pub struct SearchCmd {
    /// Search query (title, keywords)
    #[arg(required = true)]
    pub query: String,

    /// Result page (1-based)
    #[arg(long, short = 'p', default_value = "1")]
    pub page: u32,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

// =============================================================================
// Magnet Commands
// =============================================================================

/// Check instant availability of a magnet
#[derive(Args, Debug)]
pub struct AvailableCmd {
    /// Magnet URI
    #[arg(required = true)]
    pub magnet: String,
}

/// Submit a magnet and select all of its files
#[derive(Args, Debug)]
pub struct AddCmd {
    /// Magnet URI
    #[arg(required = true)]
    pub magnet: String,
}

/// Resolve a magnet into a playable stream
#[derive(Args, Debug)]
pub struct StreamCmd {
    /// Magnet URI
    #[arg(required = true)]
    pub magnet: String,

    /// Title shown by the player
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Player to use (overrides config)
    #[arg(long, value_enum)]
    pub player: Option<PlayerChoice>,

    /// Print the resolved stream instead of playing it
    #[arg(long)]
    pub url_only: bool,
}

/// Local player choice
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerChoice {
    Mpv,
    Vlc,
}

impl From<PlayerChoice> for PlayerType {
    fn from(choice: PlayerChoice) -> Self {
        match choice {
            PlayerChoice::Mpv => PlayerType::Mpv,
            PlayerChoice::Vlc => PlayerType::Vlc,
        }
    }
}

// =============================================================================
// Library Commands
// =============================================================================

/// List torrents on the account
#[derive(Args, Debug)]
pub struct LibraryCmd {
    /// Include torrents that are not downloaded yet
    #[arg(long, short = 'a')]
    pub all: bool,
}

/// Play a downloaded torrent
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Torrent id as shown by `library`
    #[arg(required = true)]
    pub torrent_id: String,

    /// Index of the link to play (defaults to the first)
    #[arg(long, short = 'f')]
    pub file: Option<usize>,

    /// Player to use (overrides config)
    #[arg(long, value_enum)]
    pub player: Option<PlayerChoice>,

    /// Print the resolved stream instead of playing it
    #[arg(long)]
    pub url_only: bool,
}

/// Remove a torrent
#[derive(Args, Debug)]
pub struct DeleteCmd {
    /// Torrent id
    #[arg(required = true)]
    pub torrent_id: String,
}

// =============================================================================
// Token Command
// =============================================================================

#[derive(Args, Debug)]
pub struct TokenCmd {
    #[command(subcommand)]
    pub action: TokenAction,
}

#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Store a new API token
    Set {
        /// Token from https://real-debrid.com/apitoken
        token: String,
    },
    /// Remove the stored token
    Clear,
    /// Check the token against the API and show the account
    Verify,
    /// Show whether a token is configured
    Show,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Status OK response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOk {
    pub status: &'static str,
}

impl Default for StatusOk {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print a plain line of human-readable results (JSON mode prints nothing)
    pub fn line(&self, msg: impl std::fmt::Display) {
        if !self.json {
            println!("{}", msg);
        }
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Report a debrid failure with its user-facing message
    pub fn debrid_error(&self, err: &DebridError) -> ExitCode {
        self.error(err.user_message(), ExitCode::from(err))
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Magnet Validation
// =============================================================================

/// Cheap local check before anything touches the network
pub fn validate_magnet(uri: &str) -> Result<&str, &'static str> {
    if uri.starts_with(MAGNET_PREFIX) {
        Ok(uri)
    } else {
        Err("Invalid magnet link (expected magnet:?xt=urn:btih:...)")
    }
}

// =============================================================================
// Tests
// =============================================================================
