//! engine::rebase
//!
//! `rebase`: replay a PR's commits onto the current base branch.
//!
//! The rebase happens on a local scratch branch. The PR branch is moved
//! only by a push leased on the SHA fetched at the start, so a conflict or
//! a concurrent push leaves the remote branch exactly as it was.

use tracing::info;

use super::command::{CommandError, CommandOutcome, PrContext};
use super::{Bot, ORIGIN};
use crate::git::{Lease, PushResult, ReplayOutcome};
use crate::ui::feedback;

const SCRATCH: &str = "linecook-rebase";

pub async fn run(bot: &Bot<'_>, ctx: &PrContext<'_>) -> Result<CommandOutcome, CommandError> {
    bot.git.checkout_fresh(SCRATCH, &ctx.head)?;
    let rebased = match bot.git.rebase_onto(&ctx.base)? {
        ReplayOutcome::Replayed(tip) => tip,
        ReplayOutcome::Conflict(files) => {
            info!(files = ?files, "rebase conflicts");
            return Ok(CommandOutcome::Failed(feedback::rebase_conflict(
                ORIGIN,
                &ctx.pr.head,
                &ctx.pr.base,
            )));
        }
    };

    if rebased != ctx.head {
        let lease = Lease::At(ctx.head.clone());
        if let PushResult::Rejected(reason) =
            bot.mutations.push(bot.git, &rebased, &ctx.pr.head, &lease)?
        {
            return Err(CommandError::Execution(format!(
                "`{}` moved during the rebase; nothing was pushed ({reason})",
                ctx.pr.head
            )));
        }
    }

    let commits = bot.git.log(&rebased, std::slice::from_ref(&ctx.base), None)?.len();
    info!(branch = %ctx.pr.head, sha = %rebased.short(8), commits, "rebased");
    Ok(CommandOutcome::Applied(feedback::rebased(
        &ctx.pr.head,
        &ctx.pr.base,
        commits,
    )))
}
