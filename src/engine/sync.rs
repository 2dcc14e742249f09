//! engine::sync
//!
//! The per-upstream sync loop.
//!
//! For each upstream the engine works out a floor per owned cookbook: the
//! newest upstream commit whose content the downstream copy already has.
//! Every later upstream commit touching the cookbook is cherry-picked onto
//! a fresh sync branch, restricted to the cookbooks that still need it,
//! and recorded with a trailer. The branch is pushed with a lease and
//! offered as one PR per upstream.
//!
//! A cookbook is blocked for the rest of a run when its downstream copy has
//! drifted from upstream (local change) or when one of its commits does not
//! apply (conflict). Blocking one cookbook never stops the others.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::baseline::{self, BootstrapOutcome};
use super::ledger::{ReadModel, UpstreamLedger};
use super::report::{self, Finding, FindingKind, IssueAction};
use super::{Bot, ORIGIN};
use crate::core::config::ConfigError;
use crate::core::naming;
use crate::core::trailer::{append_trailer, values_for};
use crate::core::types::{CookbookName, Oid, TypeError};
use crate::core::upstream::UpstreamConfig;
use crate::forge::retry::retry_with_backoff;
use crate::forge::{CreatePrRequest, ForgeError, PullRequest, UpdatePrRequest};
use crate::git::{same_remote_url, under_any, ApplyOutcome, Git, GitError, Lease, PushResult};
use crate::ui::body::{self, BodyEntry};

/// Errors that stop one upstream's sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("forge error: {0}")]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("push to '{branch}' rejected: {reason}")]
    PushRejected { branch: String, reason: String },

    #[error("ref not found: {refname}")]
    MissingRef { refname: String },

    #[error("baselines for '{prefix}' share no common ancestor")]
    NoCommonAncestor { prefix: String },
}

/// What to sync.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Upstream prefixes; empty means all.
    pub upstreams: Vec<String>,
    /// Enter bootstrap even when a sync pointer exists.
    pub force_bootstrap: bool,
}

/// What happened to a bot PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrAction {
    Created(u64),
    Updated(u64),
    /// An open PR already carries this content.
    Unchanged(u64),
    None,
}

impl PrAction {
    pub fn number(&self) -> Option<u64> {
        match self {
            PrAction::Created(n) | PrAction::Updated(n) | PrAction::Unchanged(n) => Some(*n),
            PrAction::None => None,
        }
    }
}

/// Classification of a pending upstream commit for a set of cookbooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Conflict,
    LocalChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub commit: Oid,
    pub cookbooks: Vec<String>,
    pub outcome: Outcome,
}

/// An upstream commit committed onto the sync branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCommit {
    pub upstream: Oid,
    pub local: Oid,
    pub summary: String,
    pub cookbooks: Vec<String>,
}

/// Result of syncing one upstream.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub prefix: String,
    pub pending: Vec<PendingEntry>,
    pub applied: Vec<AppliedCommit>,
    pub findings: Vec<Finding>,
    pub pr: PrAction,
    pub bootstrap: Option<BootstrapOutcome>,
    pub issues: Vec<IssueAction>,
}

impl SyncReport {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            pending: Vec::new(),
            applied: Vec::new(),
            findings: Vec::new(),
            pr: PrAction::None,
            bootstrap: None,
            issues: Vec::new(),
        }
    }
}

/// Reports for every upstream that completed, and errors for those that
/// did not.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SyncReport>,
    pub failures: Vec<(String, SyncError)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn report(&self, prefix: &str) -> Option<&SyncReport> {
        self.reports.iter().find(|r| r.prefix == prefix)
    }
}

/// Sync every selected upstream, one after another.
///
/// Config errors abort before anything is written. Any other error is
/// confined to its upstream and collected in the summary.
pub async fn sync_all(bot: &Bot<'_>, options: &SyncOptions) -> Result<RunSummary, SyncError> {
    let selected = bot.registry.select(&options.upstreams)?;

    bot.git.fetch(ORIGIN, &[])?;
    let base_tip = bot
        .git
        .remote_branch(ORIGIN, &bot.config.base_branch)?
        .ok_or_else(|| SyncError::MissingRef {
            refname: format!("{ORIGIN}/{}", bot.config.base_branch),
        })?;
    info!(base = %bot.config.base_branch, sha = %base_tip.short(8), "fetched base branch");

    let mut summary = RunSummary::default();
    let mut prepared = Vec::new();
    for upstream in selected {
        match prepare_upstream(bot.git, upstream) {
            Ok(tip) => prepared.push((upstream, tip)),
            Err(SyncError::Config(e)) => return Err(e.into()),
            Err(e) => {
                error!(upstream = %upstream.prefix, error = %e, "failed to fetch upstream");
                summary.failures.push((upstream.prefix.clone(), e));
            }
        }
    }

    let model = ReadModel::build(
        bot.git,
        &base_tip,
        &bot.config.cookbooks_dir,
        bot.registry,
        &prepared,
    )?;

    for (upstream, tip) in &prepared {
        let ledger = model.upstream(&upstream.prefix);
        let span = info_span!("sync", upstream = %upstream.prefix);
        let result = sync_upstream(bot, upstream, tip, &base_tip, &ledger, options.force_bootstrap)
            .instrument(span)
            .await;
        match result {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                error!(upstream = %upstream.prefix, error = %e, "sync failed");
                summary.failures.push((upstream.prefix.clone(), e));
            }
        }
    }

    Ok(summary)
}

/// Make sure the upstream's remote exists and is current; returns its tip.
fn prepare_upstream(git: &Git, upstream: &UpstreamConfig) -> Result<Oid, SyncError> {
    match git.remote_url(&upstream.remote_name)? {
        Some(actual) if !same_remote_url(&actual, &upstream.repo_url) => {
            return Err(ConfigError::RemoteUrlMismatch {
                remote: upstream.remote_name.clone(),
                expected: upstream.repo_url.clone(),
                actual,
            }
            .into());
        }
        Some(_) => {}
        None => {
            git.add_remote(&upstream.remote_name, &upstream.repo_url)?;
            info!(remote = %upstream.remote_name, url = %upstream.repo_url, "added upstream remote");
        }
    }
    git.fetch_branch(&upstream.remote_name, &upstream.branch)?;
    let refname = upstream.tracking_ref();
    git.try_resolve_ref(&refname)?
        .ok_or(SyncError::MissingRef { refname })
}

/// Cookbooks at `base_tip` that belong to `upstream` and are not ignored.
pub(super) fn owned_cookbooks(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    base_tip: &Oid,
) -> Result<Vec<String>, SyncError> {
    let names = bot.git.list_dirs(base_tip, &bot.config.cookbooks_dir)?;
    Ok(names
        .into_iter()
        .filter(|name| {
            let Ok(cookbook) = CookbookName::new(name.as_str()) else {
                return false;
            };
            upstream.owns(&cookbook)
                && bot
                    .registry
                    .for_cookbook(name)
                    .is_some_and(|owner| owner.prefix == upstream.prefix)
        })
        .collect())
}

/// Why a cookbook stopped taking commits this run.
#[derive(Debug, Clone, Copy)]
enum Block {
    LocalChange,
    Conflict,
}

/// Sync one upstream whose remote has been fetched to `tip`.
pub async fn sync_upstream(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    tip: &Oid,
    base_tip: &Oid,
    ledger: &UpstreamLedger,
    force_bootstrap: bool,
) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::new(&upstream.prefix);
    let cookbooks = owned_cookbooks(bot, upstream, base_tip)?;

    if ledger.pointer.is_none() || force_bootstrap {
        info!(forced = force_bootstrap, cookbooks = cookbooks.len(), "entering bootstrap");
        report.bootstrap = Some(baseline::bootstrap(bot, upstream, tip, base_tip, &cookbooks).await?);
        return Ok(report);
    }

    let mut floors: BTreeMap<String, Oid> = BTreeMap::new();
    let mut blocked: BTreeMap<String, Block> = BTreeMap::new();
    for cookbook in &cookbooks {
        let path = bot.cookbook_path(cookbook);
        let Some(local) = bot.git.content_id(base_tip, &path)? else {
            continue;
        };
        let recorded = ledger.floor(cookbook).cloned();
        let floor = match &recorded {
            Some(f) if !bot.git.path_differs(f, base_tip, &path)? => Some(f.clone()),
            _ => {
                let history = bot.git.log(tip, &[], Some(&path))?;
                if history.is_empty() {
                    debug!(%cookbook, "never existed upstream, skipping");
                    continue;
                }
                baseline::find_matching_commit(bot.git, &history, &path, &local)?
            }
        };
        match floor {
            Some(floor) => {
                if recorded.as_ref() != Some(&floor) {
                    debug!(%cookbook, floor = %floor.short(8), "floor found by content");
                }
                floors.insert(cookbook.clone(), floor);
            }
            None => {
                let sha = recorded.unwrap_or_else(|| tip.clone());
                info!(%cookbook, sha = %sha.short(8), "local changes detected");
                report.findings.push(Finding {
                    kind: FindingKind::LocalChange,
                    cookbook: cookbook.clone(),
                    summary: bot.git.commit_info(&sha)?.summary,
                    sha,
                    files: Vec::new(),
                });
                blocked.insert(cookbook.clone(), Block::LocalChange);
            }
        }
    }
    let clean: BTreeSet<String> = floors.keys().cloned().collect();

    let sync_branch = naming::sync_branch(&bot.config.pr_branch_prefix, upstream)?;
    if !floors.is_empty() {
        let floor_list: Vec<Oid> = floors.values().cloned().collect();
        let hide: Vec<Oid> = bot.git.merge_base_many(&floor_list)?.into_iter().collect();
        let candidates = bot.git.log_ascending(tip, &hide, None)?;
        debug!(candidates = candidates.len(), "walking upstream commits");

        let carried = split_off(bot, upstream, sync_branch.as_str(), base_tip).await?;

        bot.git.checkout_fresh(sync_branch.as_str(), base_tip)?;
        for commit in candidates {
            let info = bot.git.commit_info(&commit)?;
            if info.is_merge() {
                continue;
            }
            if carried.contains(commit.as_str()) {
                debug!(sha = %commit.short(8), "carried by a split PR");
                continue;
            }
            let touched = bot.git.touched_dirs(&commit, &bot.config.cookbooks_dir)?;

            let mut keep = Vec::new();
            for cookbook in touched {
                if let Some(block) = blocked.get(&cookbook) {
                    report.pending.push(PendingEntry {
                        commit: commit.clone(),
                        cookbooks: vec![cookbook.clone()],
                        outcome: match block {
                            Block::LocalChange => Outcome::LocalChange,
                            Block::Conflict => Outcome::Conflict,
                        },
                    });
                    continue;
                }
                let Some(floor) = floors.get(&cookbook) else {
                    continue;
                };
                if bot.git.is_ancestor(&commit, floor)? {
                    continue;
                }
                keep.push(cookbook);
            }

            let message = append_trailer(&info.message, &upstream.trailer_key, commit.as_str());
            while !keep.is_empty() {
                let paths: Vec<String> = keep.iter().map(|c| bot.cookbook_path(c)).collect();
                match bot.git.apply_commit(&info, &paths, &message)? {
                    ApplyOutcome::Committed(local) => {
                        info!(sha = %commit.short(8), cookbooks = ?keep, "applied");
                        report.pending.push(PendingEntry {
                            commit: commit.clone(),
                            cookbooks: keep.clone(),
                            outcome: Outcome::Applied,
                        });
                        report.applied.push(AppliedCommit {
                            upstream: commit.clone(),
                            local,
                            summary: info.summary.clone(),
                            cookbooks: keep.clone(),
                        });
                        break;
                    }
                    ApplyOutcome::NothingToApply => {
                        debug!(sha = %commit.short(8), "already applied");
                        break;
                    }
                    ApplyOutcome::Conflict(files) => {
                        let hit: Vec<String> = keep
                            .iter()
                            .filter(|c| {
                                let root = [bot.cookbook_path(c)];
                                files.iter().any(|f| under_any(&f.path, &root))
                            })
                            .cloned()
                            .collect();
                        if hit.is_empty() {
                            warn!(sha = %commit.short(8), "conflict outside owned cookbooks");
                            break;
                        }
                        for cookbook in &hit {
                            info!(sha = %commit.short(8), %cookbook, "conflict");
                            let root = [bot.cookbook_path(cookbook)];
                            report.findings.push(Finding {
                                kind: FindingKind::Conflict,
                                cookbook: cookbook.clone(),
                                sha: commit.clone(),
                                summary: info.summary.clone(),
                                files: files
                                    .iter()
                                    .filter(|f| under_any(&f.path, &root))
                                    .cloned()
                                    .collect(),
                            });
                            blocked.insert(cookbook.clone(), Block::Conflict);
                        }
                        report.pending.push(PendingEntry {
                            commit: commit.clone(),
                            cookbooks: hit.clone(),
                            outcome: Outcome::Conflict,
                        });
                        keep.retain(|c| !hit.contains(c));
                    }
                }
            }
        }
    }

    if !report.applied.is_empty() {
        let head = bot.git.head_oid()?;
        report.pr = publish_sync_pr(bot, upstream, sync_branch.as_str(), base_tip, &head, &report.applied).await?;
    } else {
        info!("nothing to sync");
    }

    report.issues = report::report_findings(bot, upstream, &report.findings).await?;
    report
        .issues
        .extend(report::close_resolved(bot, upstream, &floors, &clean).await?);
    Ok(report)
}

/// Upstream commits carried by open PRs split off the sync PR.
async fn split_off(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    sync_branch: &str,
    base_tip: &Oid,
) -> Result<BTreeSet<String>, SyncError> {
    let label = bot.config.split_label.as_str();
    let prs = retry_with_backoff(bot.retry, "find_open_prs", || bot.forge.find_open_prs(label)).await?;
    let split_prefix = format!("{sync_branch}-split-");

    let mut carried = BTreeSet::new();
    for pr in prs.iter().filter(|p| p.head.starts_with(&split_prefix)) {
        let Some(tip) = bot.git.remote_branch(ORIGIN, &pr.head)? else {
            continue;
        };
        for commit in bot.git.log(&tip, std::slice::from_ref(base_tip), None)? {
            carried.extend(values_for(
                &bot.git.commit_info(&commit)?.message,
                &upstream.trailer_key,
            ));
        }
    }
    Ok(carried)
}

async fn publish_sync_pr(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    branch: &str,
    base_tip: &Oid,
    head: &Oid,
    applied: &[AppliedCommit],
) -> Result<PrAction, SyncError> {
    let entries: Vec<BodyEntry> = applied
        .iter()
        .map(|a| BodyEntry {
            cookbooks: a.cookbooks.clone(),
            summary: a.summary.clone(),
            upstream: a.upstream.clone(),
        })
        .collect();
    let title = body::sync_pr_title(upstream);
    let text = body::sync_pr_body(upstream, &entries);

    let remote = bot.git.remote_branch(ORIGIN, branch)?;
    let open = bot.open_pr_for(branch).await?;

    let current = match &remote {
        Some(remote_tip) => same_content(bot.git, &upstream.trailer_key, base_tip, remote_tip, head)?,
        None => false,
    };
    if current {
        if let Some(pr) = &open {
            info!(pr = pr.number, "sync PR already up to date");
            return Ok(PrAction::Unchanged(pr.number));
        }
    } else {
        push_branch(bot, branch, head, remote)?;
    }

    upsert_pr(bot, branch, title, text, open).await
}

/// Whether two branches off the base record the same upstream commits and
/// end in the same tree.
fn same_content(git: &Git, key: &str, base: &Oid, a: &Oid, b: &Oid) -> Result<bool, GitError> {
    if git.tree_id(a)? != git.tree_id(b)? {
        return Ok(false);
    }
    let trailers = |tip: &Oid| -> Result<Vec<String>, GitError> {
        let mut out = Vec::new();
        for commit in git.log_ascending(tip, std::slice::from_ref(base), None)? {
            out.extend(values_for(&git.commit_info(&commit)?.message, key));
        }
        Ok(out)
    };
    Ok(trailers(a)? == trailers(b)?)
}

/// Point remote `branch` at `oid`, leased on what was fetched.
pub(super) fn push_branch(
    bot: &Bot<'_>,
    branch: &str,
    oid: &Oid,
    fetched: Option<Oid>,
) -> Result<(), SyncError> {
    match bot.mutations.push(bot.git, oid, branch, &Lease::from_current(fetched))? {
        PushResult::Rejected(reason) => Err(SyncError::PushRejected {
            branch: branch.to_string(),
            reason,
        }),
        PushResult::Pushed | PushResult::UpToDate => Ok(()),
    }
}

/// Update the open PR for `branch`, or open one.
pub(super) async fn upsert_pr(
    bot: &Bot<'_>,
    branch: &str,
    title: String,
    text: String,
    open: Option<PullRequest>,
) -> Result<PrAction, SyncError> {
    match open {
        Some(pr) => {
            bot.mutations
                .update_pr(UpdatePrRequest {
                    number: pr.number,
                    title: Some(title),
                    body: Some(text),
                })
                .await?;
            Ok(PrAction::Updated(pr.number))
        }
        None => {
            let pr = bot
                .mutations
                .create_pr(CreatePrRequest {
                    head: branch.to_string(),
                    base: bot.config.base_branch.clone(),
                    title,
                    body: text,
                    labels: vec![bot.config.bot_label.clone()],
                })
                .await?;
            Ok(PrAction::Created(pr.number))
        }
    }
}
