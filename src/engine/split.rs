//! engine::split
//!
//! `split <sha1>-<sha2>`: move part of a sync PR into a new PR.
//!
//! The PR's commits, oldest first, are addressed by the upstream SHAs in
//! their trailers. The requested range must be contiguous and include the
//! first or the last commit, but not both. It stays on the original PR;
//! the remainder moves to `{head}-split-{n}`.
//!
//! # State machine
//!
//! ```text
//! Validate -> BuildLocal(A, B) -> PushNew(B) -> LeaseOriginal(A) -> OpenPr(B) -> Labels
//!                                                   |
//!                                     rejected: DeleteNew(B) -> Failed
//! ```
//!
//! Nothing remote changes until both branches have been built locally, and
//! the original branch is only ever moved by a leased push.

use tracing::{info, warn};

use super::command::{CommandError, CommandOutcome, PrContext};
use super::Bot;
use crate::core::naming;
use crate::core::trailer::values_for;
use crate::core::types::{BranchName, Oid, ShaPrefix};
use crate::forge::{CreatePrRequest, UpdatePrRequest};
use crate::git::{Lease, PushResult, ReplayOutcome};
use crate::ui::body::{self, BodyEntry};
use crate::ui::feedback;

const SCRATCH_KEEP: &str = "linecook-split-keep";
const SCRATCH_MOVE: &str = "linecook-split-move";

/// A PR commit and the trailer values it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrCommit {
    pub oid: Oid,
    pub values: Vec<String>,
}

/// Which end of the commit list the kept range includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The oldest commit.
    Head,
    /// The newest commit.
    Tail,
}

/// A validated partition of a PR's commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    /// Stays on the original PR.
    pub keep: Vec<Oid>,
    /// Moves to the new PR.
    pub moved: Vec<Oid>,
    pub boundary: Boundary,
}

/// Parse `<sha1>-<sha2>`.
pub fn parse_range(arg: &str) -> Result<(ShaPrefix, ShaPrefix), String> {
    let (start, end) = arg
        .split_once('-')
        .ok_or_else(|| format!("expected `<sha1>-<sha2>`, got `{arg}`"))?;
    let start = ShaPrefix::new(start).map_err(|e| format!("Invalid commit SHAs: {e}"))?;
    let end = ShaPrefix::new(end).map_err(|e| format!("Invalid commit SHAs: {e}"))?;
    Ok((start, end))
}

/// Partition `commits` (oldest first) around the range `start..=end`.
///
/// ```
/// use linecook::core::types::{Oid, ShaPrefix};
/// use linecook::engine::split::{plan_split, PrCommit};
///
/// let commits: Vec<PrCommit> = ['a', 'b', 'c']
///     .iter()
///     .map(|c| PrCommit {
///         oid: Oid::new(c.to_string().repeat(40)).unwrap(),
///         values: vec![format!("{c}{}", "1".repeat(39))],
///     })
///     .collect();
/// let plan = plan_split(
///     &commits,
///     &ShaPrefix::new("a111111").unwrap(),
///     &ShaPrefix::new("b111111").unwrap(),
/// )
/// .unwrap();
/// assert_eq!(plan.keep.len(), 2);
/// assert_eq!(plan.moved.len(), 1);
/// ```
pub fn plan_split(
    commits: &[PrCommit],
    start: &ShaPrefix,
    end: &ShaPrefix,
) -> Result<SplitPlan, String> {
    let index_of = |sha: &ShaPrefix| -> Result<usize, String> {
        let hits: Vec<usize> = commits
            .iter()
            .enumerate()
            .filter(|(_, c)| c.values.iter().any(|v| sha.matches(v)))
            .map(|(i, _)| i)
            .collect();
        match hits.as_slice() {
            [one] => Ok(*one),
            [] => Err(format!("Invalid commit SHAs: `{sha}` matches no commit in this PR")),
            _ => Err(format!("Invalid commit SHAs: `{sha}` matches more than one commit")),
        }
    };
    let s = index_of(start)?;
    let e = index_of(end)?;
    if s > e {
        return Err(format!("range `{start}-{end}` is reversed; list the older commit first"));
    }

    let last = commits.len() - 1;
    let boundary = match (s == 0, e == last) {
        (true, true) => {
            return Err("range covers every commit in this PR; nothing would be split off".into())
        }
        (false, false) => {
            return Err(format!(
                "range must be contiguous from one end: it has to start at the first commit or end at the last ({} commits)",
                commits.len()
            ))
        }
        (true, false) => Boundary::Head,
        (false, true) => Boundary::Tail,
    };

    let oids = |range: &[PrCommit]| range.iter().map(|c| c.oid.clone()).collect::<Vec<_>>();
    let keep = oids(&commits[s..=e]);
    let moved = match boundary {
        Boundary::Head => oids(&commits[e + 1..]),
        Boundary::Tail => oids(&commits[..s]),
    };
    Ok(SplitPlan {
        keep,
        moved,
        boundary,
    })
}

pub async fn run(
    bot: &Bot<'_>,
    ctx: &PrContext<'_>,
    args: &[String],
) -> Result<CommandOutcome, CommandError> {
    let [arg] = args else {
        return Err(CommandError::Validation(
            "expected exactly one range, `split <sha1>-<sha2>`".into(),
        ));
    };
    let (start, end) = parse_range(arg).map_err(CommandError::Validation)?;

    let mut commits = Vec::new();
    for oid in bot.git.log_ascending(&ctx.head, std::slice::from_ref(&ctx.base), None)? {
        let message = bot.git.commit_info(&oid)?.message;
        commits.push(PrCommit {
            values: values_for(&message, &ctx.upstream.trailer_key),
            oid,
        });
    }
    if commits.is_empty() {
        return Err(CommandError::Validation("this PR has no commits to split".into()));
    }
    let plan = plan_split(&commits, &start, &end).map_err(CommandError::Validation)?;
    info!(keep = plan.keep.len(), moved = plan.moved.len(), boundary = ?plan.boundary, "split planned");

    let keep_tip = replay(bot, SCRATCH_KEEP, &ctx.base, &plan.keep)?;
    let move_tip = replay(bot, SCRATCH_MOVE, &ctx.base, &plan.moved)?;

    let original = BranchName::new(ctx.pr.head.as_str())?;
    let new_branch = naming::split_branch(&original, |candidate| {
        bot.git
            .remote_branch(super::ORIGIN, candidate)
            .map(|b| b.is_some())
            .unwrap_or(true)
    })?;

    if let PushResult::Rejected(reason) =
        bot.mutations
            .push(bot.git, &move_tip, new_branch.as_str(), &Lease::Absent)?
    {
        return Err(CommandError::Execution(format!(
            "could not create `{new_branch}`: {reason}"
        )));
    }
    if let PushResult::Rejected(reason) =
        bot.mutations
            .push(bot.git, &keep_tip, &ctx.pr.head, &Lease::At(ctx.head.clone()))?
    {
        warn!(branch = %ctx.pr.head, "lease rejected, removing new branch");
        bot.mutations
            .delete_branch(bot.git, new_branch.as_str(), &move_tip)?;
        return Err(CommandError::Execution(format!(
            "`{}` changed during the split; nothing was modified ({reason})",
            ctx.pr.head
        )));
    }

    let split_label = bot.config.split_label.clone();
    let mut labels = ctx.pr.labels.clone();
    if !labels.contains(&split_label) {
        labels.push(split_label.clone());
    }
    let request = CreatePrRequest {
        head: new_branch.to_string(),
        base: ctx.pr.base.clone(),
        title: format!("{} (split)", ctx.pr.title),
        body: body::sync_pr_body(ctx.upstream, &entries(bot, ctx, &plan.moved)?),
        labels,
    };
    let new_pr = match bot.mutations.create_pr(request).await {
        Ok(pr) => pr,
        Err(err) => {
            warn!(branch = %new_branch, error = %err, "split pushed but its PR was not opened");
            return Err(CommandError::Execution(format!(
                "this PR now has {} commit(s); the other {} commit(s) were pushed to `{new_branch}` \
                 but opening a PR for it failed ({err}). Open a PR from `{new_branch}` into `{}` by hand.",
                plan.keep.len(),
                plan.moved.len(),
                ctx.pr.base
            )));
        }
    };

    bot.mutations
        .update_pr(UpdatePrRequest {
            number: ctx.pr.number,
            title: None,
            body: Some(body::sync_pr_body(ctx.upstream, &entries(bot, ctx, &plan.keep)?)),
        })
        .await?;
    bot.mutations
        .add_labels(ctx.pr.number, std::slice::from_ref(&split_label))
        .await?;

    info!(new_pr = new_pr.number, branch = %new_branch, "split complete");
    Ok(CommandOutcome::Applied(feedback::split_complete(
        plan.keep.len(),
        plan.moved.len(),
        new_pr.number,
    )))
}

fn replay(bot: &Bot<'_>, branch: &str, base: &Oid, commits: &[Oid]) -> Result<Oid, CommandError> {
    match bot.git.cherry_pick_onto(branch, base, commits)? {
        ReplayOutcome::Replayed(tip) => Ok(tip),
        ReplayOutcome::Conflict(files) => Err(CommandError::Execution(format!(
            "commits do not apply on their own onto the base branch (conflicts in {})",
            files.join(", ")
        ))),
    }
}

/// Body entries for the PR commits in `oids`.
fn entries(bot: &Bot<'_>, ctx: &PrContext<'_>, oids: &[Oid]) -> Result<Vec<BodyEntry>, CommandError> {
    let mut out = Vec::new();
    for oid in oids {
        let info = bot.git.commit_info(oid)?;
        let cookbooks: Vec<String> = bot
            .git
            .touched_dirs(oid, &bot.config.cookbooks_dir)?
            .into_iter()
            .collect();
        for value in values_for(&info.message, &ctx.upstream.trailer_key) {
            let Ok(upstream) = Oid::new(value) else {
                continue;
            };
            out.push(BodyEntry {
                cookbooks: cookbooks.clone(),
                summary: info.summary.clone(),
                upstream,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn commits(n: usize) -> Vec<PrCommit> {
        (0..n)
            .map(|i| PrCommit {
                oid: Oid::new(format!("{i:040x}")).unwrap(),
                values: vec![format!("{:x}{}", i + 1, "0".repeat(39))],
            })
            .collect()
    }

    fn sha(i: usize) -> ShaPrefix {
        ShaPrefix::new(format!("{:x}{}", i + 1, "0".repeat(6))).unwrap()
    }

    #[test]
    fn head_range_stays_rest_moves() {
        let list = commits(5);
        let plan = plan_split(&list, &sha(0), &sha(1)).unwrap();
        assert_eq!(plan.boundary, Boundary::Head);
        assert_eq!(plan.keep, vec![list[0].oid.clone(), list[1].oid.clone()]);
        assert_eq!(plan.moved.len(), 3);
    }

    #[test]
    fn tail_range() {
        let list = commits(5);
        let plan = plan_split(&list, &sha(3), &sha(4)).unwrap();
        assert_eq!(plan.boundary, Boundary::Tail);
        assert_eq!(plan.moved, vec![list[0].oid.clone(), list[1].oid.clone(), list[2].oid.clone()]);
    }

    #[test]
    fn interior_range_rejected() {
        let err = plan_split(&commits(5), &sha(1), &sha(3)).unwrap_err();
        assert!(err.contains("must be contiguous from one end"), "{err}");
    }

    #[test]
    fn whole_list_rejected() {
        assert!(plan_split(&commits(3), &sha(0), &sha(2)).is_err());
    }

    #[test]
    fn unknown_sha_rejected() {
        let err = plan_split(&commits(3), &ShaPrefix::new("fffffff").unwrap(), &sha(1)).unwrap_err();
        assert!(err.contains("Invalid commit SHAs"));
    }

    #[test]
    fn parse_range_requires_two_shas() {
        assert!(parse_range("abc1234-def5678").is_ok());
        assert!(parse_range("abc1234").is_err());
        assert!(parse_range("abc-def5678").unwrap_err().contains("Invalid commit SHAs"));
    }

    proptest! {
        #[test]
        fn accepted_plans_partition_the_list(n in 2usize..12, a in 0usize..12, b in 0usize..12) {
            let list = commits(n);
            let (s, e) = (a % n, b % n);
            match plan_split(&list, &sha(s), &sha(e)) {
                Ok(plan) => {
                    prop_assert!(s <= e);
                    prop_assert!(s == 0 || e == n - 1);
                    prop_assert!(!(s == 0 && e == n - 1));
                    let mut all: Vec<Oid> = plan.keep.iter().chain(plan.moved.iter()).cloned().collect();
                    all.sort();
                    let mut expected: Vec<Oid> = list.iter().map(|c| c.oid.clone()).collect();
                    expected.sort();
                    prop_assert_eq!(all, expected);
                    prop_assert_eq!(plan.keep.len(), e - s + 1);
                }
                Err(_) => prop_assert!(s > e || (s != 0 && e != n - 1) || (s == 0 && e == n - 1)),
            }
        }
    }
}
