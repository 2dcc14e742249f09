//! engine::report
//!
//! Conflict and local-change issues.
//!
//! Each finding maps to one issue, keyed by (bot label, upstream prefix,
//! cookbook, upstream sha). The key is written into the issue body as an
//! HTML comment:
//!
//! ```text
//! <!-- linecook:conflict:fb:fb_apache:abc1234def... -->
//! ```
//!
//! An open issue carrying the same marker is updated in place, so repeated
//! runs never pile up duplicates. Issues close themselves once the sync
//! state shows the finding is gone.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::sync::SyncError;
use super::Bot;
use crate::core::types::Oid;
use crate::core::upstream::UpstreamConfig;
use crate::forge::{CreateIssueRequest, UpdateIssueRequest};
use crate::git::ConflictedFile;
use crate::ui::body;

const MARKER_OPEN: &str = "<!-- linecook:";
const MARKER_CLOSE: &str = " -->";

/// What went wrong for a cookbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingKind {
    Conflict,
    LocalChange,
}

impl FindingKind {
    fn tag(self) -> &'static str {
        match self {
            FindingKind::Conflict => "conflict",
            FindingKind::LocalChange => "local-change",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "conflict" => Some(FindingKind::Conflict),
            "local-change" => Some(FindingKind::LocalChange),
            _ => None,
        }
    }
}

/// One reportable outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: FindingKind,
    pub cookbook: String,
    /// The upstream commit that conflicted, or the one the local copy
    /// diverges from.
    pub sha: Oid,
    pub summary: String,
    pub files: Vec<ConflictedFile>,
}

/// Deduplication key embedded in an issue body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerKey {
    pub kind: FindingKind,
    pub prefix: String,
    pub cookbook: String,
    pub sha: String,
}

impl MarkerKey {
    pub fn render(&self) -> String {
        format!(
            "{MARKER_OPEN}{}:{}:{}:{}{MARKER_CLOSE}",
            self.kind.tag(),
            self.prefix,
            self.cookbook,
            self.sha
        )
    }

    /// The first marker in `body`.
    pub fn parse(body: &str) -> Option<Self> {
        let start = body.find(MARKER_OPEN)? + MARKER_OPEN.len();
        let rest = &body[start..];
        let inner = &rest[..rest.find(MARKER_CLOSE)?];
        let mut parts = inner.split(':');
        let key = MarkerKey {
            kind: FindingKind::from_tag(parts.next()?)?,
            prefix: parts.next()?.to_string(),
            cookbook: parts.next()?.to_string(),
            sha: parts.next()?.to_string(),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(key)
    }
}

/// What happened to an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Created(u64),
    Updated(u64),
    Closed(u64),
}

/// Open or refresh one issue per finding.
pub async fn report_findings(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    findings: &[Finding],
) -> Result<Vec<IssueAction>, SyncError> {
    if findings.is_empty() {
        return Ok(Vec::new());
    }
    let existing = bot.open_issues().await?;
    let mut actions = Vec::new();

    for finding in findings {
        let key = MarkerKey {
            kind: finding.kind,
            prefix: upstream.prefix.clone(),
            cookbook: finding.cookbook.clone(),
            sha: finding.sha.to_string(),
        };
        let marker = key.render();
        let (title, text) = match finding.kind {
            FindingKind::Conflict => (
                body::conflict_issue_title(upstream, &finding.sha),
                body::conflict_issue_body(
                    &marker,
                    upstream,
                    &finding.cookbook,
                    &finding.sha,
                    &finding.summary,
                    &finding.files,
                ),
            ),
            FindingKind::LocalChange => (
                body::local_change_issue_title(&finding.cookbook),
                body::local_change_issue_body(&marker, upstream, &finding.cookbook, &finding.sha),
            ),
        };

        let duplicate = existing
            .iter()
            .find(|issue| MarkerKey::parse(&issue.body).as_ref() == Some(&key));
        match duplicate {
            Some(issue) => {
                if issue.body == text && issue.title == title {
                    debug!(issue = issue.number, cookbook = %finding.cookbook, "issue already current");
                    continue;
                }
                bot.mutations
                    .update_issue(UpdateIssueRequest {
                        number: issue.number,
                        title: Some(title),
                        body: Some(text),
                    })
                    .await?;
                actions.push(IssueAction::Updated(issue.number));
            }
            None => {
                let issue = bot
                    .mutations
                    .create_issue(CreateIssueRequest {
                        title,
                        body: text,
                        labels: vec![bot.config.bot_label.clone()],
                    })
                    .await?;
                info!(issue = issue.number, cookbook = %finding.cookbook, sha = %finding.sha.short(8), kind = ?finding.kind, "reported");
                actions.push(IssueAction::Created(issue.number));
            }
        }
    }
    Ok(actions)
}

/// Close this upstream's issues whose finding no longer holds.
///
/// A conflict is resolved once the conflicting commit is a strict ancestor
/// of the cookbook's sync floor. A local change is resolved once the cookbook was
/// checked this run and found to match upstream.
pub async fn close_resolved(
    bot: &Bot<'_>,
    upstream: &UpstreamConfig,
    floors: &BTreeMap<String, Oid>,
    clean: &BTreeSet<String>,
) -> Result<Vec<IssueAction>, SyncError> {
    let mut actions = Vec::new();
    for issue in bot.open_issues().await? {
        let Some(key) = MarkerKey::parse(&issue.body) else {
            continue;
        };
        if key.prefix != upstream.prefix {
            continue;
        }
        let resolved_at = match key.kind {
            FindingKind::Conflict => {
                let Some(floor) = floors.get(&key.cookbook) else {
                    continue;
                };
                let Ok(sha) = Oid::new(key.sha.as_str()) else {
                    continue;
                };
                if sha == *floor
                    || !bot.git.commit_exists(&sha)
                    || !bot.git.is_ancestor(&sha, floor)?
                {
                    continue;
                }
                floor.clone()
            }
            FindingKind::LocalChange => {
                if !clean.contains(&key.cookbook) {
                    continue;
                }
                match floors.get(&key.cookbook) {
                    Some(floor) => floor.clone(),
                    None => continue,
                }
            }
        };

        bot.mutations
            .comment(issue.number, &body::resolved_comment(&resolved_at))
            .await?;
        bot.mutations.close_issue(issue.number).await?;
        info!(issue = issue.number, cookbook = %key.cookbook, "closed resolved issue");
        actions.push(IssueAction::Closed(issue.number));
    }
    Ok(actions)
}
