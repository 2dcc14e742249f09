//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens a [`Session`]: repository, config, upstreams, forge
//! 2. Builds the engine's [`Bot`] with `Live` or `DryRun` mutations
//! 3. Runs the engine on a tokio runtime and prints the result
//!
//! # Async Commands
//!
//! The forge client is async. Handlers create a runtime and `block_on`
//! the engine; calls are awaited one at a time.

mod command;
mod completion;
mod event;
mod sync;

pub use command::command;
pub use completion::completion;
pub use event::{classify, event, EventAction, WebhookEvent};
pub use sync::sync;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::core::upstream::UpstreamRegistry;
use crate::engine::{Bot, Context, DryRun, Live, Mutations, ORIGIN};
use crate::forge::github::GitHubForge;
use crate::forge::Forge;
use crate::git::Git;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Sync {
            upstreams,
            force_bootstrap,
        } => sync::sync(ctx, upstreams, force_bootstrap),
        Command::Command { pr, body } => command::command(ctx, pr, &body),
        Command::Event { path } => event::event(ctx, &path),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Everything a command needs, opened once.
pub struct Session {
    pub git: Git,
    pub config: Config,
    pub registry: UpstreamRegistry,
    pub forge: Box<dyn Forge>,
}

impl Session {
    /// Open the repository at the working directory and connect to GitHub.
    pub fn open(ctx: &Context) -> Result<Self> {
        let cwd = match &ctx.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("cannot determine working directory")?,
        };
        let git = Git::open(&cwd).with_context(|| format!("opening repository at {}", cwd.display()))?;
        let origin = git.remote_url(ORIGIN)?;
        let forge = GitHubForge::from_env(origin.as_deref()).context("connecting to GitHub")?;
        Self::with_forge(ctx, git, Box::new(forge))
    }

    /// Open config and upstreams for `git`, using `forge` as given.
    pub fn with_forge(ctx: &Context, git: Git, forge: Box<dyn Forge>) -> Result<Self> {
        let loaded = Config::load(ctx.config_path.as_deref(), git.workdir())
            .context("loading configuration")?;
        match &loaded.path {
            Some(path) => debug!(path = %path.display(), "loaded config"),
            None => debug!("no config file, using defaults"),
        }
        let registry =
            UpstreamRegistry::from_config(&loaded.config).context("resolving upstreams")?;
        Ok(Self {
            git,
            config: loaded.config,
            registry,
            forge,
        })
    }

    /// The mutation capability selected by `--dry-run`.
    pub fn mutations(&self, ctx: &Context) -> Box<dyn Mutations + '_> {
        if ctx.dry_run {
            Box::new(DryRun)
        } else {
            Box::new(Live::new(self.forge.as_ref(), ORIGIN))
        }
    }

    pub fn bot<'a>(&'a self, mutations: &'a dyn Mutations) -> Bot<'a> {
        Bot::new(
            &self.git,
            self.forge.as_ref(),
            mutations,
            &self.config,
            &self.registry,
        )
    }
}

/// Warn about configured labels the repository lacks.
pub(crate) async fn check_labels(bot: &Bot<'_>) {
    match bot.missing_labels().await {
        Ok(missing) => {
            for label in missing {
                warn!(%label, "label does not exist in the repository; create it so bot PRs and issues can be labeled");
            }
        }
        Err(e) => warn!(error = %e, "could not check labels"),
    }
}

/// Read a file named on the command line.
pub(crate) fn read_input(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
