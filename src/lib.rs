//! linecook - keeps vendored Chef cookbooks in sync with their upstreams
//!
//! A downstream repository vendors cookbooks named `{prefix}_{name}` from
//! one or more upstream repositories. linecook cherry-picks the upstream
//! commits the downstream is missing, records each one with a trailer, and
//! proposes them as a pull request. Conflicts and local edits become
//! issues. PR comments drive a small command set (`split`, `rebase`).
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Sync, bootstrap, reporting and comment commands
//! - [`core`] - Domain types, config, upstreams, trailers, branch names
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - Pull requests, issues, comments and labels (GitHub)
//! - [`ui`] - PR, issue and comment text

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod git;
pub mod ui;
