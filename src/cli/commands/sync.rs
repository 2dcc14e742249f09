//! sync command - Cherry-pick upstream commits into downstream cookbooks

use anyhow::{bail, Result};

use super::{check_labels, Session};
use crate::engine::baseline::BootstrapOutcome;
use crate::engine::report::IssueAction;
use crate::engine::{sync_all, Context, PrAction, RunSummary, SyncOptions, SyncReport};

/// Sync the selected upstreams (all of them if `upstreams` is empty).
pub fn sync(ctx: &Context, upstreams: Vec<String>, force_bootstrap: bool) -> Result<()> {
    let session = Session::open(ctx)?;
    let options = SyncOptions {
        upstreams,
        force_bootstrap,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(run(ctx, &session, &options))?;
    finish(ctx, &summary)
}

/// Run the sync against an opened session.
pub async fn run(ctx: &Context, session: &Session, options: &SyncOptions) -> Result<RunSummary> {
    let mutations = session.mutations(ctx);
    let bot = session.bot(mutations.as_ref());
    check_labels(&bot).await;
    Ok(sync_all(&bot, options).await?)
}

/// Print the summary and fail if any upstream did.
pub fn finish(ctx: &Context, summary: &RunSummary) -> Result<()> {
    if !ctx.quiet {
        for report in &summary.reports {
            for line in describe(report) {
                println!("{line}");
            }
        }
    }
    for (prefix, error) in &summary.failures {
        eprintln!("{prefix}: sync failed: {error}");
    }
    if !summary.is_success() {
        bail!(
            "{} of {} upstream(s) failed",
            summary.failures.len(),
            summary.failures.len() + summary.reports.len()
        );
    }
    Ok(())
}

/// Human-readable lines for one upstream.
pub fn describe(report: &SyncReport) -> Vec<String> {
    let prefix = &report.prefix;
    let mut lines = Vec::new();

    match &report.bootstrap {
        Some(BootstrapOutcome::Suspended { fixup_pr }) => {
            lines.push(format!(
                "{prefix}: waiting for fixup PR #{fixup_pr} to merge"
            ));
        }
        Some(BootstrapOutcome::Bootstrap { baseline, pr }) => {
            lines.push(format!(
                "{prefix}: bootstrap at {}{}",
                baseline.short(8),
                pr_suffix(pr)
            ));
        }
        Some(BootstrapOutcome::Fixup {
            target,
            unresolved,
            pr,
        }) => {
            lines.push(format!(
                "{prefix}: {} cookbook(s) have no matching upstream revision; fixup to {}{}",
                unresolved.len(),
                target.short(8),
                pr_suffix(pr)
            ));
        }
        Some(BootstrapOutcome::NothingToDo) => {
            lines.push(format!("{prefix}: no cookbooks to sync"));
        }
        None if report.applied.is_empty() && report.findings.is_empty() => {
            lines.push(format!("{prefix}: up to date"));
        }
        None => {
            lines.push(format!(
                "{prefix}: {} commit(s) applied, {} finding(s){}",
                report.applied.len(),
                report.findings.len(),
                pr_suffix(&report.pr)
            ));
        }
    }

    for action in &report.issues {
        let line = match action {
            IssueAction::Created(n) => format!("{prefix}: opened issue #{n}"),
            IssueAction::Updated(n) => format!("{prefix}: updated issue #{n}"),
            IssueAction::Closed(n) => format!("{prefix}: closed issue #{n}"),
        };
        lines.push(line);
    }
    lines
}

fn pr_suffix(pr: &PrAction) -> String {
    match pr {
        PrAction::Created(n) => format!(", opened PR #{n}"),
        PrAction::Updated(n) => format!(", updated PR #{n}"),
        PrAction::Unchanged(n) => format!(", PR #{n} unchanged"),
        PrAction::None => String::new(),
    }
}
