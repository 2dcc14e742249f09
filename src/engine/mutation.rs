//! engine::mutation
//!
//! The mutation capability: every write the bot makes outside the local
//! working tree.
//!
//! Engine code never calls a push or a forge write directly. It holds a
//! `&dyn Mutations`, which is either [`Live`] (writes happen) or [`DryRun`]
//! (each write is logged and skipped). Local scratch branches are still
//! built in a dry run, so the logged decisions are the ones a live run
//! would make.
//!
//! Pushes take `&Git` and are synchronous; `git2::Repository` is not `Sync`.

use async_trait::async_trait;
use tracing::info;

use crate::core::types::Oid;
use crate::forge::{
    CreateIssueRequest, CreatePrRequest, Forge, ForgeError, Issue, PrState, PullRequest,
    UpdateIssueRequest, UpdatePrRequest,
};
use crate::git::{Git, GitError, Lease, PushResult};

/// Writes to the remote repository and the forge.
#[async_trait]
pub trait Mutations: Send + Sync {
    /// Whether writes are skipped.
    fn is_dry_run(&self) -> bool;

    /// Point remote `branch` at `oid`, guarded by `lease`.
    fn push(&self, git: &Git, oid: &Oid, branch: &str, lease: &Lease) -> Result<PushResult, GitError>;

    /// Delete remote `branch` if it still points at `expected`.
    fn delete_branch(&self, git: &Git, branch: &str, expected: &Oid) -> Result<PushResult, GitError>;

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<(), ForgeError>;

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ForgeError>;

    async fn comment(&self, number: u64, body: &str) -> Result<(), ForgeError>;

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<Issue, ForgeError>;

    async fn update_issue(&self, request: UpdateIssueRequest) -> Result<(), ForgeError>;

    async fn close_issue(&self, number: u64) -> Result<(), ForgeError>;
}

/// Performs every write.
pub struct Live<'a> {
    forge: &'a dyn Forge,
    remote: String,
}

impl<'a> Live<'a> {
    pub fn new(forge: &'a dyn Forge, remote: impl Into<String>) -> Self {
        Self {
            forge,
            remote: remote.into(),
        }
    }
}

#[async_trait]
impl Mutations for Live<'_> {
    fn is_dry_run(&self) -> bool {
        false
    }

    fn push(&self, git: &Git, oid: &Oid, branch: &str, lease: &Lease) -> Result<PushResult, GitError> {
        let result = git.push_with_lease(&self.remote, oid, branch, lease)?;
        info!(%branch, sha = %oid.short(8), ?result, "pushed");
        Ok(result)
    }

    fn delete_branch(&self, git: &Git, branch: &str, expected: &Oid) -> Result<PushResult, GitError> {
        let result = git.delete_remote_branch(&self.remote, branch, expected)?;
        info!(%branch, ?result, "deleted remote branch");
        Ok(result)
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let pr = self.forge.create_pr(request).await?;
        info!(pr = pr.number, head = %pr.head, "created pull request");
        Ok(pr)
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<(), ForgeError> {
        let number = request.number;
        self.forge.update_pr(request).await?;
        info!(pr = number, "updated pull request");
        Ok(())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ForgeError> {
        self.forge.add_labels(number, labels).await
    }

    async fn comment(&self, number: u64, body: &str) -> Result<(), ForgeError> {
        self.forge.comment(number, body).await?;
        info!(number, "commented");
        Ok(())
    }

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<Issue, ForgeError> {
        let issue = self.forge.create_issue(request).await?;
        info!(issue = issue.number, title = %issue.title, "opened issue");
        Ok(issue)
    }

    async fn update_issue(&self, request: UpdateIssueRequest) -> Result<(), ForgeError> {
        let number = request.number;
        self.forge.update_issue(request).await?;
        info!(issue = number, "updated issue");
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<(), ForgeError> {
        self.forge.close_issue(number).await?;
        info!(issue = number, "closed issue");
        Ok(())
    }
}

/// Logs every write and performs none.
///
/// Creations return placeholder objects numbered 0.
#[derive(Debug, Default)]
pub struct DryRun;

#[async_trait]
impl Mutations for DryRun {
    fn is_dry_run(&self) -> bool {
        true
    }

    fn push(&self, _git: &Git, oid: &Oid, branch: &str, lease: &Lease) -> Result<PushResult, GitError> {
        info!(dry_run = true, %branch, sha = %oid.short(8), ?lease, "would push");
        Ok(PushResult::Pushed)
    }

    fn delete_branch(&self, _git: &Git, branch: &str, _expected: &Oid) -> Result<PushResult, GitError> {
        info!(dry_run = true, %branch, "would delete remote branch");
        Ok(PushResult::Pushed)
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        info!(dry_run = true, head = %request.head, title = %request.title, "would create pull request");
        Ok(PullRequest {
            number: 0,
            url: String::new(),
            state: PrState::Open,
            head: request.head,
            base: request.base,
            title: request.title,
            body: request.body,
            labels: request.labels,
        })
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<(), ForgeError> {
        info!(dry_run = true, pr = request.number, "would update pull request");
        Ok(())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ForgeError> {
        info!(dry_run = true, number, labels = ?labels, "would add labels");
        Ok(())
    }

    async fn comment(&self, number: u64, body: &str) -> Result<(), ForgeError> {
        info!(dry_run = true, number, %body, "would comment");
        Ok(())
    }

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<Issue, ForgeError> {
        info!(dry_run = true, title = %request.title, "would open issue");
        Ok(Issue {
            number: 0,
            url: String::new(),
            title: request.title,
            body: request.body,
            labels: request.labels,
            open: true,
        })
    }

    async fn update_issue(&self, request: UpdateIssueRequest) -> Result<(), ForgeError> {
        info!(dry_run = true, issue = request.number, "would update issue");
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<(), ForgeError> {
        info!(dry_run = true, issue = number, "would close issue");
        Ok(())
    }
}
