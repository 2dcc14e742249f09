//! command - Run a bot command from a PR comment

use anyhow::{bail, Result};

use super::{check_labels, Session};
use crate::engine::{handle_comment, CommandOutcome, Context};

/// Handle `body` as a comment on PR `pr`.
pub fn command(ctx: &Context, pr: u64, body: &str) -> Result<()> {
    let session = Session::open(ctx)?;
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(run(ctx, &session, pr, body))?;
    finish(ctx, pr, outcome.as_ref())
}

/// Run the command against an opened session.
pub async fn run(
    ctx: &Context,
    session: &Session,
    pr: u64,
    body: &str,
) -> Result<Option<CommandOutcome>> {
    let mutations = session.mutations(ctx);
    let bot = session.bot(mutations.as_ref());
    check_labels(&bot).await;
    Ok(handle_comment(&bot, pr, body).await?)
}

/// Print the outcome. A command that was attempted and abandoned fails
/// the process.
pub fn finish(ctx: &Context, pr: u64, outcome: Option<&CommandOutcome>) -> Result<()> {
    match outcome {
        None => {
            if !ctx.quiet {
                println!("PR #{pr}: no command in comment");
            }
        }
        Some(CommandOutcome::Applied(text)) | Some(CommandOutcome::Rejected(text)) => {
            if !ctx.quiet {
                println!("PR #{pr}: {text}");
            }
        }
        Some(CommandOutcome::Failed(text)) => {
            eprintln!("PR #{pr}: {text}");
            bail!("command on PR #{pr} failed");
        }
    }
    Ok(())
}
