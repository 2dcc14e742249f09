//! cli
//!
//! Command-line interface layer for linecook.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Open the repository, config and forge for a command
//! - Delegate to the engine and print a summary
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`]. Errors are `anyhow` from here up; everything below
//! uses typed errors.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use crate::engine;
use anyhow::Result;

/// Run the CLI application with already-parsed arguments.
///
/// This is the main entry point called from `main.rs`, after logging is
/// initialized from the same flags.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        config_path: cli.config.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        dry_run: cli.dry_run,
    };

    commands::dispatch(cli.command, &ctx)
}
