use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

use crate::application::token::TokenPurpose;

/// Command-line arguments for the Frugal binary.
#[derive(Debug, Parser)]
#[command(
    name = "frugal",
    version,
    about = "Frugal response cache and regeneration tooling"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FRUGAL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the runtime mode (production|watch).
    #[arg(long = "mode", value_name = "MODE", global = true)]
    pub mode: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print a freshly generated signing key.
    Keygen,
    /// Mint a signed marker token.
    Token(TokenArgs),
    /// Response cache utilities.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Args, Clone)]
pub struct TokenArgs {
    /// Token family to mint.
    #[arg(value_enum)]
    pub kind: TokenKind,

    /// Signing key to use instead of `runtime.signing_key`.
    #[arg(long = "key", value_name = "KEY")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TokenKind {
    Refresh,
    ForceGenerate,
}

impl From<TokenKind> for TokenPurpose {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Refresh => TokenPurpose::Refresh,
            TokenKind::ForceGenerate => TokenPurpose::ForceGenerate,
        }
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// List the entries of a persisted cache snapshot.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Snapshot file to read. Defaults to `cache.snapshot_path`.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}
