//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--config <path>`: Use this config file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Warnings and errors only
//! - `--dry-run`: Decide everything, write nothing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// linecook - keeps vendored Chef cookbooks in sync with their upstreams
#[derive(Parser, Debug)]
#[command(name = "linecook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if linecook was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Config file (default: $LINECOOK_CONFIG, .github/linecook.yml, .linecook.yml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Log every push, PR, issue and comment instead of making it
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sync cookbooks from their upstreams
    #[command(
        long_about = "Sync cookbooks from their upstreams.\n\n\
            For every configured upstream, cherry-picks the upstream commits the \
            downstream cookbooks do not have yet onto a sync branch and opens or \
            updates one PR for it. An upstream without sync history is bootstrapped \
            instead. Conflicts and local changes are reported as issues.",
        after_help = "\
EXAMPLES:
    # Sync everything
    linecook sync

    # Only the pd upstream, without touching anything
    linecook --dry-run sync --upstream pd

    # Re-detect baselines for fb
    linecook sync --upstream fb --force-bootstrap"
    )]
    Sync {
        /// Only sync the upstream with this prefix (repeatable)
        #[arg(long = "upstream", value_name = "PREFIX")]
        upstreams: Vec<String>,

        /// Enter bootstrap even if a sync pointer exists
        #[arg(long)]
        force_bootstrap: bool,
    },

    /// Run the bot command in a PR comment
    #[command(after_help = "\
EXAMPLES:
    linecook command --pr 42 --body '#linecook split abc1234-def5678'
    linecook command --pr 42 --body '#linecook rebase'")]
    Command {
        /// Pull request number
        #[arg(long)]
        pr: u64,

        /// Comment text
        #[arg(long)]
        body: String,
    },

    /// Handle a GitHub webhook event payload
    #[command(long_about = "Handle a GitHub webhook event payload.\n\n\
        A new comment on a pull request is run as a bot command. A closed PR or \
        issue carrying the bot label triggers a full sync. Anything else is ignored.")]
    Event {
        /// Path to the event JSON (e.g. $GITHUB_EVENT_PATH)
        #[arg(long, env = "GITHUB_EVENT_PATH")]
        path: PathBuf,
    },

    /// Generate shell completion scripts
    #[command(after_help = "\
EXAMPLES:
    linecook completion bash > ~/.local/share/bash-completion/completions/linecook
    linecook completion zsh > ~/.zfunc/_linecook")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
