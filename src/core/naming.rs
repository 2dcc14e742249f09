//! core::naming
//!
//! Names of the branches the bot owns.
//!
//! | Purpose   | Branch                                              |
//! |-----------|-----------------------------------------------------|
//! | sync      | `{pr_branch_prefix}/{prefix}_/update`               |
//! | bootstrap | `{pr_branch_prefix}/{prefix}_onboard`               |
//! | fixup     | `{pr_branch_prefix}/{prefix}_fix_missing_baselines` |
//! | split     | `{original}-split-{n}`                              |

use crate::core::types::{BranchName, TypeError};
use crate::core::upstream::UpstreamConfig;

/// Branch carrying the recurring sync PR.
pub fn sync_branch(pr_branch_prefix: &str, upstream: &UpstreamConfig) -> Result<BranchName, TypeError> {
    BranchName::new(format!("{pr_branch_prefix}/{}_/update", upstream.prefix))
}

/// Branch carrying the Bootstrap PR.
pub fn bootstrap_branch(
    pr_branch_prefix: &str,
    upstream: &UpstreamConfig,
) -> Result<BranchName, TypeError> {
    BranchName::new(format!("{pr_branch_prefix}/{}_onboard", upstream.prefix))
}

/// Branch carrying the Fixup PR.
pub fn fixup_branch(pr_branch_prefix: &str, upstream: &UpstreamConfig) -> Result<BranchName, TypeError> {
    BranchName::new(format!(
        "{pr_branch_prefix}/{}_fix_missing_baselines",
        upstream.prefix
    ))
}

/// The upstream prefix encoded in a bot branch name, if any.
///
/// Returns the text between `{pr_branch_prefix}/` and the first `_`. Callers
/// match it against configured prefixes, longest first.
///
/// ```
/// use linecook::core::naming::prefix_candidates;
///
/// let found: Vec<_> = prefix_candidates("line-cook", "line-cook/pd_/update").collect();
/// assert_eq!(found, vec!["pd"]);
/// assert_eq!(prefix_candidates("line-cook", "feature/x").count(), 0);
/// ```
pub fn prefix_candidates<'a>(
    pr_branch_prefix: &str,
    branch: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    let rest = branch
        .strip_prefix(pr_branch_prefix)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or("");
    // Every `_` is a possible prefix boundary, so `pd_ext_/update` yields `pd` and `pd_ext`.
    rest.match_indices('_')
        .map(move |(idx, _)| &rest[..idx])
        .filter(|p| !p.is_empty())
}

/// First `{original}-split-{n}` name for which `taken` returns false.
pub fn split_branch(
    original: &BranchName,
    mut taken: impl FnMut(&str) -> bool,
) -> Result<BranchName, TypeError> {
    let mut n = 1;
    loop {
        let candidate = format!("{original}-split-{n}");
        if !taken(&candidate) {
            return BranchName::new(candidate);
        }
        n += 1;
    }
}
