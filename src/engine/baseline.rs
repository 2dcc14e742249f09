//! engine::baseline
//!
//! Bootstrap: finding where each downstream cookbook came from upstream.
//!
//! A cookbook's baseline is the upstream commit whose tree at the cookbook
//! path is identical to the downstream copy. Candidates are the upstream
//! commits touching the path, newest first, so the match closest to
//! upstream HEAD wins.
//!
//! When every cookbook has a baseline, a Bootstrap PR records their common
//! ancestor as a trailer on an empty marker commit. When some do not, a
//! Fixup PR first moves the unmatched cookbooks to upstream content, and
//! bootstrap waits until that PR is closed.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::sync::{push_branch, upsert_pr, PrAction, SyncError};
use super::{Bot, ORIGIN};
use crate::core::naming;
use crate::core::trailer::{append_trailer, values_for};
use crate::core::types::Oid;
use crate::core::upstream::UpstreamConfig;
use crate::git::{Git, GitError};
use crate::ui::body;

/// Result of a bootstrap pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// An open Fixup PR blocks bootstrap.
    Suspended { fixup_pr: u64 },
    /// Every cookbook matched; the Bootstrap PR records `baseline`.
    Bootstrap { baseline: Oid, pr: PrAction },
    /// Some cookbooks matched nothing; a Fixup PR moves them to `target`.
    Fixup {
        target: Oid,
        unresolved: Vec<String>,
        pr: PrAction,
    },
    /// The upstream owns no cookbooks here.
    NothingToDo,
}

/// The first commit of `history` (newest first) whose content at `path`
/// is `content`.
pub fn find_matching_commit(
    git: &Git,
    history: &[Oid],
    path: &str,
    content: &Oid,
) -> Result<Option<Oid>, GitError> {
    for commit in history {
        if git.content_id(commit, path)?.as_ref() == Some(content) {
            return Ok(Some(commit.clone()));
        }
    }
    Ok(None)
}

/// Baselines for `cookbooks`, and the cookbooks without one.
pub fn find_baselines(
    bot: &Bot<'_>,
    tip: &Oid,
    base_tip: &Oid,
    cookbooks: &[String],
) -> Result<(BTreeMap<String, Oid>, Vec<String>), GitError> {
    let mut resolved = BTreeMap::new();
    let mut unresolved = Vec::new();
    for cookbook in cookbooks {
        let path = bot.cookbook_path(cookbook);
        let found = match bot.git.content_id(base_tip, &path)? {
            Some(content) => {
                let history = bot.git.log(tip, &[], Some(&path))?;
                find_matching_commit(bot.git, &history, &path, &content)?
            }
            None => None,
        };
        match found {
            Some(baseline) => {
                debug!(%cookbook, baseline = %baseline.short(8), "baseline found");
                resolved.insert(cookbook.clone(), baseline);
            }
            None => {
                info!(%cookbook, "no upstream revision matches");
                unresolved.push(cookbook.clone());
            }
        }
    }
    Ok((resolved, unresolved))
}

/// Open or refresh the Bootstrap or Fixup PR for `upstream`.
pub async fn bootstrap(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    tip: &Oid,
    base_tip: &Oid,
    cookbooks: &[String],
) -> Result<BootstrapOutcome, SyncError> {
    let fixup_branch = naming::fixup_branch(&bot.config.pr_branch_prefix, upstream)?;
    if let Some(pr) = bot.open_pr_for(fixup_branch.as_str()).await? {
        info!(pr = pr.number, "fixup PR still open, bootstrap suspended");
        return Ok(BootstrapOutcome::Suspended { fixup_pr: pr.number });
    }
    if cookbooks.is_empty() {
        info!("no cookbooks owned, nothing to bootstrap");
        return Ok(BootstrapOutcome::NothingToDo);
    }

    let (resolved, unresolved) = find_baselines(bot, tip, base_tip, cookbooks)?;
    let baselines: Vec<Oid> = resolved.values().cloned().collect();
    let common = if baselines.is_empty() {
        None
    } else {
        let base = bot.git.merge_base_many(&baselines)?;
        if base.is_none() {
            return Err(SyncError::NoCommonAncestor {
                prefix: upstream.prefix.clone(),
            });
        }
        base
    };

    if unresolved.is_empty() {
        let baseline = common.ok_or_else(|| SyncError::NoCommonAncestor {
            prefix: upstream.prefix.clone(),
        })?;
        let pr = open_bootstrap_pr(bot, upstream, base_tip, &baseline, cookbooks).await?;
        return Ok(BootstrapOutcome::Bootstrap { baseline, pr });
    }

    let target = common.unwrap_or_else(|| tip.clone());
    let pr = open_fixup_pr(bot, upstream, base_tip, &target, &unresolved).await?;
    Ok(BootstrapOutcome::Fixup {
        target,
        unresolved,
        pr,
    })
}

async fn open_bootstrap_pr(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    base_tip: &Oid,
    baseline: &Oid,
    cookbooks: &[String],
) -> Result<PrAction, SyncError> {
    let branch = naming::bootstrap_branch(&bot.config.pr_branch_prefix, upstream)?;
    let remote = bot.git.remote_branch(ORIGIN, branch.as_str())?;
    let open = bot.open_pr_for(branch.as_str()).await?;

    if let (Some(pr), Some(remote_tip)) = (&open, &remote) {
        let message = bot.git.commit_info(remote_tip)?.message;
        if values_for(&message, &upstream.trailer_key).contains(&baseline.to_string()) {
            info!(pr = pr.number, baseline = %baseline.short(8), "bootstrap PR already up to date");
            return Ok(PrAction::Unchanged(pr.number));
        }
    }

    bot.git.checkout_fresh(branch.as_str(), base_tip)?;
    let message = append_trailer(
        &format!(
            "Bootstrap {} upstream sync\n\nAll {} cookbooks match upstream at or before this commit.",
            upstream.prefix, upstream.prefix
        ),
        &upstream.trailer_key,
        baseline.as_str(),
    );
    let marker = bot.git.commit_staged(&message, true)?;
    push_branch(bot, branch.as_str(), &marker, remote)?;
    info!(baseline = %baseline.short(8), "bootstrap marker pushed");

    upsert_pr(
        bot,
        branch.as_str(),
        body::bootstrap_pr_title(upstream, baseline),
        body::bootstrap_pr_body(upstream, baseline, cookbooks),
        open,
    )
    .await
}

async fn open_fixup_pr(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    base_tip: &Oid,
    target: &Oid,
    unresolved: &[String],
) -> Result<PrAction, SyncError> {
    let branch = naming::fixup_branch(&bot.config.pr_branch_prefix, upstream)?;
    bot.git.checkout_fresh(branch.as_str(), base_tip)?;

    let mut replaced = Vec::new();
    for cookbook in unresolved {
        if bot.git.replace_path_from(target, &bot.cookbook_path(cookbook))? {
            replaced.push(cookbook.clone());
        } else {
            warn!(%cookbook, target = %target.short(8), "absent upstream, left alone");
        }
    }
    if !bot.git.has_staged_changes()? {
        info!("fixup would change nothing, no PR opened");
        return Ok(PrAction::None);
    }

    let message = format!(
        "Sync {} cookbooks without a baseline to {}\n\n{}",
        upstream.prefix,
        target.short(8),
        replaced
            .iter()
            .map(|c| format!("* {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    );
    let head = bot.git.commit_staged(&message, false)?;
    let remote = bot.git.remote_branch(ORIGIN, branch.as_str())?;
    push_branch(bot, branch.as_str(), &head, remote)?;
    info!(target = %target.short(8), cookbooks = ?replaced, "fixup pushed");

    upsert_pr(
        bot,
        branch.as_str(),
        body::fixup_pr_title(upstream, target),
        body::fixup_pr_body(upstream, target, &replaced),
        None,
    )
    .await
}
