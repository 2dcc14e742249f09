//! ui::body
//!
//! Pure functions producing PR and issue titles and bodies.
//!
//! # Sync PR body
//!
//! ```markdown
//! Sync of `fb` cookbooks from https://github.com/facebook/chef-cookbooks.git (`main`).
//!
//! * fb_apache: Bump apache to 2.4.58
//!     Upstream-Commit: abc1234def5678...
//! * fb_apache, fb_mysql: Shared helper
//!     Upstream-Commit: 0123456789abcd...
//! ```
//!
//! One bullet per upstream commit, in application order. The indented
//! trailer line means a squash merge of the PR still records provenance.

use crate::core::types::Oid;
use crate::core::upstream::UpstreamConfig;
use crate::git::ConflictedFile;

/// One applied upstream commit as listed in a PR body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyEntry {
    pub cookbooks: Vec<String>,
    pub summary: String,
    pub upstream: Oid,
}

pub fn sync_pr_title(upstream: &UpstreamConfig) -> String {
    format!("Sync {} cookbooks from upstream", upstream.prefix)
}

pub fn sync_pr_body(upstream: &UpstreamConfig, entries: &[BodyEntry]) -> String {
    let mut out = format!(
        "Sync of `{}` cookbooks from {} (`{}`).\n\n",
        upstream.prefix, upstream.repo_url, upstream.branch
    );
    for entry in entries {
        out.push_str(&format!(
            "* {}: {}\n    {}: {}\n",
            entry.cookbooks.join(", "),
            entry.summary,
            upstream.trailer_key,
            entry.upstream
        ));
    }
    out
}

pub fn bootstrap_pr_title(upstream: &UpstreamConfig, baseline: &Oid) -> String {
    format!(
        "Bootstrap {} upstream sync at {}",
        upstream.prefix,
        baseline.short(8)
    )
}

pub fn bootstrap_pr_body(upstream: &UpstreamConfig, baseline: &Oid, cookbooks: &[String]) -> String {
    let mut out = format!(
        "Start syncing `{}` cookbooks from {} (`{}`).\n\n\
         Every cookbook below matches upstream content at or before `{}`. \
         Merging this PR records that commit as the sync baseline; later runs \
         cherry-pick everything after it.\n\n",
        upstream.prefix, upstream.repo_url, upstream.branch, baseline
    );
    for cookbook in cookbooks {
        out.push_str(&format!("* {cookbook}\n"));
    }
    out.push_str(&format!("\n{}: {}\n", upstream.trailer_key, baseline));
    out
}

pub fn fixup_pr_title(upstream: &UpstreamConfig, target: &Oid) -> String {
    format!(
        "Sync missing {} baselines to {}",
        upstream.prefix,
        target.short(8)
    )
}

pub fn fixup_pr_body(upstream: &UpstreamConfig, target: &Oid, cookbooks: &[String]) -> String {
    let mut out = format!(
        "These `{}` cookbooks do not match any upstream revision, so no sync \
         baseline can be found for them. This PR replaces each one with the \
         upstream content at `{}`.\n\n",
        upstream.prefix, target
    );
    for cookbook in cookbooks {
        out.push_str(&format!("* {cookbook}\n"));
    }
    out.push_str("\nOnce this is merged or closed, the next run retries bootstrap.\n");
    out
}

pub fn conflict_issue_title(upstream: &UpstreamConfig, sha: &Oid) -> String {
    format!(
        "Sync conflict applying {} upstream commit {}",
        upstream.prefix,
        sha.short(8)
    )
}

pub fn conflict_issue_body(
    marker: &str,
    upstream: &UpstreamConfig,
    cookbook: &str,
    sha: &Oid,
    summary: &str,
    files: &[ConflictedFile],
) -> String {
    format!(
        "{marker}\n\
         Upstream commit `{sha}` ({summary}) from `{}` conflicts with local \
         changes in `{cookbook}`.\n\n\
         Later `{}` commits touching `{cookbook}` are held back until this is \
         resolved. To resolve, apply the commit by hand and keep the trailer:\n\n\
         ```\n\
         git cherry-pick -x {sha}\n\
         # resolve, then amend the message to end with\n\
         {}: {sha}\n\
         ```\n\n\
         ## Conflicted files\n\n{}",
        upstream.repo_url,
        upstream.prefix,
        upstream.trailer_key,
        conflict_details(files)
    )
}

/// `### path` followed by the conflicted content of each file.
pub fn conflict_details(files: &[ConflictedFile]) -> String {
    let mut out = String::new();
    for file in files {
        out.push_str(&format!("### {}\n\n", file.path));
        match &file.content {
            Some(content) => out.push_str(&format!("```\n{}\n```\n\n", content.trim_end())),
            None => out.push_str("Could not read file\n\n"),
        }
    }
    out
}

pub fn local_change_issue_title(cookbook: &str) -> String {
    format!("Local changes detected in {cookbook}")
}

pub fn local_change_issue_body(
    marker: &str,
    upstream: &UpstreamConfig,
    cookbook: &str,
    sha: &Oid,
) -> String {
    format!(
        "{marker}\n\
         `{cookbook}` differs from upstream `{}` at `{sha}` and matches no later \
         upstream revision, so it has been modified downstream.\n\n\
         Upstream changes to `{cookbook}` are not synced while this is open. \
         Either upstream the local change, or revert `{cookbook}` to upstream \
         content, or rename it so it leaves the `{}_` namespace.\n",
        upstream.repo_url, upstream.prefix
    )
}

/// Comment posted when a conflict issue closes itself.
pub fn resolved_comment(pointer: &Oid) -> String {
    format!(
        "Resolved: the sync pointer is now `{}`, which includes this commit.",
        pointer.short(8)
    )
}
