//! engine
//!
//! Everything the bot decides and does.
//!
//! # Architecture
//!
//! Every entry point receives a [`Bot`]: the repository, the forge, the
//! mutation capability, the loaded config and the resolved upstreams. The
//! engine never reads flags or the environment itself.
//!
//! ```text
//! sync:    ReadModel -> per upstream (bootstrap | cherry-pick) -> PR -> Reporter
//! command: parse -> resolve upstream -> split | rebase -> one feedback comment
//! ```
//!
//! Reads go straight to [`Git`] and [`Forge`]. Writes that leave the local
//! working tree go through [`Mutations`], so a dry run exercises the same
//! decisions as a live one.
//!
//! # Modules
//!
//! - [`ledger`]: read model over downstream trailers
//! - [`sync`]: per-upstream cherry-pick loop and sync PR
//! - [`baseline`]: Bootstrap and Fixup PRs
//! - [`report`]: conflict and local-change issues
//! - [`command`]: comment parsing and dispatch
//! - [`split`] / [`rebase`]: command handlers
//! - [`mutation`]: the `Live` / `DryRun` capability

pub mod baseline;
pub mod command;
pub mod ledger;
pub mod mutation;
pub mod rebase;
pub mod report;
pub mod split;
pub mod sync;

pub use command::{handle_comment, parse_command, BotCommand, CommandError, CommandOutcome};
pub use ledger::{ReadModel, UpstreamLedger};
pub use mutation::{DryRun, Live, Mutations};
pub use sync::{sync_all, PrAction, RunSummary, SyncError, SyncOptions, SyncReport};

use std::path::PathBuf;

use crate::core::config::Config;
use crate::core::upstream::UpstreamRegistry;
use crate::forge::retry::{retry_with_backoff, RetryConfig};
use crate::forge::{Forge, ForgeError, Issue, PullRequest};
use crate::git::Git;

/// Name of the downstream remote.
pub const ORIGIN: &str = "origin";

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Explicit config file.
    pub config_path: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
    /// Log every write instead of performing it.
    pub dry_run: bool,
}

/// What the engine operates on for one invocation.
pub struct Bot<'a> {
    pub git: &'a Git,
    pub forge: &'a dyn Forge,
    pub mutations: &'a dyn Mutations,
    pub config: &'a Config,
    pub registry: &'a UpstreamRegistry,
    /// Backoff for read-only forge lookups.
    pub retry: RetryConfig,
}

impl<'a> Bot<'a> {
    pub fn new(
        git: &'a Git,
        forge: &'a dyn Forge,
        mutations: &'a dyn Mutations,
        config: &'a Config,
        registry: &'a UpstreamRegistry,
    ) -> Self {
        Self {
            git,
            forge,
            mutations,
            config,
            registry,
            retry: RetryConfig::DEFAULT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Repository-relative path of a cookbook.
    pub fn cookbook_path(&self, cookbook: &str) -> String {
        format!("{}/{cookbook}", self.config.cookbooks_dir.trim_end_matches('/'))
    }

    /// The open PR whose head is `branch`.
    pub async fn open_pr_for(&self, branch: &str) -> Result<Option<PullRequest>, ForgeError> {
        retry_with_backoff(self.retry, "find_pr_by_head", || {
            self.forge.find_pr_by_head(branch)
        })
        .await
    }

    /// Every open issue carrying the bot label.
    pub async fn open_issues(&self) -> Result<Vec<Issue>, ForgeError> {
        let label = self.config.bot_label.as_str();
        retry_with_backoff(self.retry, "find_open_issues", || {
            self.forge.find_open_issues(label)
        })
        .await
    }

    /// Configured labels that the repository does not define.
    pub async fn missing_labels(&self) -> Result<Vec<String>, ForgeError> {
        let mut missing = Vec::new();
        for label in [&self.config.bot_label, &self.config.split_label] {
            let exists = retry_with_backoff(self.retry, "label_exists", || {
                self.forge.label_exists(label)
            })
            .await?;
            if !exists {
                missing.push(label.clone());
            }
        }
        Ok(missing)
    }
}
