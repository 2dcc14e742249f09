//! engine::command
//!
//! Bot commands posted as PR comments.
//!
//! # Grammar
//!
//! ```text
//! <bot_command_prefix> <command> [args...]
//! ```
//!
//! The first line of the comment whose trimmed text starts with the prefix
//! is the command line; everything else in the comment is ignored. A
//! comment without such a line is not a command.
//!
//! # Dispatch
//!
//! Every command invocation ends in exactly one feedback comment on the PR,
//! whatever happened. Validation problems become [`CommandOutcome::Rejected`],
//! execution problems [`CommandOutcome::Failed`]; neither is raised past
//! [`handle_comment`].

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{rebase, split, Bot, ORIGIN};
use crate::core::naming::prefix_candidates;
use crate::core::trailer::Trailer;
use crate::core::types::{Oid, TypeError};
use crate::core::upstream::{UpstreamConfig, UpstreamRegistry};
use crate::forge::{ForgeError, PullRequest};
use crate::git::GitError;
use crate::ui::feedback;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Split { args: Vec<String> },
    Rebase,
    Unknown { name: String },
}

impl BotCommand {
    pub fn name(&self) -> &str {
        match self {
            BotCommand::Split { .. } => "split",
            BotCommand::Rebase => "rebase",
            BotCommand::Unknown { name } => name,
        }
    }
}

/// Errors from running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The request itself is wrong; nothing was attempted.
    #[error("{0}")]
    Validation(String),

    /// The request was valid but could not be carried out.
    #[error("{0}")]
    Execution(String),

    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl CommandError {
    fn into_outcome(self) -> CommandOutcome {
        match self {
            CommandError::Validation(reason) => CommandOutcome::Rejected(reason),
            other => CommandOutcome::Failed(other.to_string()),
        }
    }
}

/// How a command ended. Each renders to one feedback comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Done; carries the success text.
    Applied(String),
    /// Not attempted; carries the reason.
    Rejected(String),
    /// Attempted and abandoned; carries the error.
    Failed(String),
}

impl CommandOutcome {
    /// Text of the feedback comment.
    pub fn render(&self, command: &BotCommand) -> String {
        match (command, self) {
            (BotCommand::Unknown { .. }, CommandOutcome::Rejected(text)) => text.clone(),
            (_, CommandOutcome::Applied(text)) => text.clone(),
            (_, CommandOutcome::Rejected(reason)) => feedback::rejected(command.name(), reason),
            (_, CommandOutcome::Failed(error)) => feedback::failed(command.name(), error),
        }
    }
}

/// Extract the command from a comment body.
///
/// ```
/// use linecook::engine::{parse_command, BotCommand};
///
/// let cmd = parse_command("#linecook", "Thanks!\n#linecook split abc1234-def5678\n");
/// assert_eq!(cmd, Some(BotCommand::Split { args: vec!["abc1234-def5678".into()] }));
/// assert_eq!(parse_command("#linecook", "random comment"), None);
/// ```
pub fn parse_command(prefix: &str, body: &str) -> Option<BotCommand> {
    let rest = body.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(prefix)?;
        (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
    })?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    let args: Vec<String> = tokens.map(String::from).collect();
    Some(match name.to_ascii_lowercase().as_str() {
        "split" => BotCommand::Split { args },
        "rebase" => BotCommand::Rebase,
        _ => BotCommand::Unknown {
            name: name.to_string(),
        },
    })
}

/// Run the command in `body`, if any, and post its feedback on PR `number`.
///
/// Returns `None` when the comment is not a command. Errors are returned
/// only when the feedback comment itself could not be posted.
pub async fn handle_comment(
    bot: &Bot<'_>,
    number: u64,
    body: &str,
) -> Result<Option<CommandOutcome>, CommandError> {
    let Some(command) = parse_command(&bot.config.bot_command_prefix, body) else {
        debug!(pr = number, "comment is not a command");
        return Ok(None);
    };

    let span = info_span!("command", pr = number, command = %command.name());
    async {
        let outcome = match run(bot, number, &command).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "command did not complete");
                e.into_outcome()
            }
        };
        info!(outcome = ?outcome, "command finished");
        bot.mutations
            .comment(number, &outcome.render(&command))
            .await?;
        Ok(Some(outcome))
    }
    .instrument(span)
    .await
}

/// A PR a command acts on, with its branches fetched.
pub struct PrContext<'r> {
    pub pr: PullRequest,
    /// Fetched tip of the PR branch; the lease for any rewrite.
    pub head: Oid,
    /// Fetched tip of the base branch.
    pub base: Oid,
    pub upstream: &'r UpstreamConfig,
}

async fn run(
    bot: &Bot<'_>,
    number: u64,
    command: &BotCommand,
) -> Result<CommandOutcome, CommandError> {
    match command {
        BotCommand::Unknown { name } => Ok(CommandOutcome::Rejected(feedback::unknown_command(
            &bot.config.bot_command_prefix,
            name,
        ))),
        BotCommand::Split { args } => {
            let ctx = load_pr(bot, number).await?;
            split::run(bot, &ctx, args).await
        }
        BotCommand::Rebase => {
            let ctx = load_pr(bot, number).await?;
            rebase::run(bot, &ctx).await
        }
    }
}

async fn load_pr<'r>(bot: &Bot<'r>, number: u64) -> Result<PrContext<'r>, CommandError> {
    let pr = bot.forge.get_pr(number).await?;
    bot.git.fetch(ORIGIN, &[])?;
    let head = remote_tip(bot, &pr.head)?;
    let base = remote_tip(bot, &pr.base)?;
    let upstream = resolve_upstream(bot, &pr, &head, &base)?.ok_or_else(|| {
        CommandError::Validation(format!(
            "Could not determine the upstream for `{}`",
            pr.head
        ))
    })?;
    debug!(upstream = %upstream.prefix, head = %head.short(8), base = %base.short(8), "resolved PR");
    Ok(PrContext {
        pr,
        head,
        base,
        upstream,
    })
}

fn remote_tip(bot: &Bot<'_>, branch: &str) -> Result<Oid, CommandError> {
    bot.git
        .remote_branch(ORIGIN, branch)?
        .ok_or_else(|| CommandError::Execution(format!("branch `{branch}` not found on {ORIGIN}")))
}

/// The upstream a PR syncs from.
///
/// Tries, in order: the bot branch-name pattern (longest configured prefix
/// wins), trailer keys in the PR's commits, trailer keys in the PR body.
pub fn resolve_upstream<'r>(
    bot: &Bot<'r>,
    pr: &PullRequest,
    head: &Oid,
    base: &Oid,
) -> Result<Option<&'r UpstreamConfig>, GitError> {
    let registry = bot.registry;
    let by_branch = prefix_candidates(&bot.config.pr_branch_prefix, &pr.head)
        .filter_map(|p| registry.by_prefix(p))
        .max_by_key(|u| u.prefix.len());
    if by_branch.is_some() {
        return Ok(by_branch);
    }

    for commit in bot.git.log(head, std::slice::from_ref(base), None)? {
        let message = bot.git.commit_info(&commit)?.message;
        if let Some(upstream) = by_trailer(registry, &message) {
            return Ok(Some(upstream));
        }
    }
    Ok(by_trailer(registry, &pr.body))
}

fn by_trailer<'r>(
    registry: &'r UpstreamRegistry,
    text: &str,
) -> Option<&'r UpstreamConfig> {
    text.lines()
        .filter_map(Trailer::parse_line)
        .find_map(|t| registry.by_trailer_key(&t.key))
}
