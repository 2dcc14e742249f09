//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge stores PRs, issues, comments, and repository labels in
//! memory, records every call, and can be configured to fail a specific
//! operation. PRs and issues share one number sequence, as on GitHub.
//!
//! # Example
//!
//! ```
//! use linecook::forge::mock::MockForge;
//! use linecook::forge::{Forge, CreatePrRequest, PrState};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//!
//! let pr = forge.create_pr(CreatePrRequest {
//!     head: "line-cook/fb_/update".to_string(),
//!     base: "main".to_string(),
//!     title: "Sync fb upstream".to_string(),
//!     body: String::new(),
//!     labels: vec!["line-cook".to_string()],
//! }).await.unwrap();
//!
//! assert_eq!(pr.number, 1);
//! assert_eq!(pr.state, PrState::Open);
//! assert_eq!(forge.find_open_prs("line-cook").await.unwrap().len(), 1);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use super::traits::{
    CreateIssueRequest, CreatePrRequest, Forge, ForgeError, Issue, PrState, PullRequest,
    UpdateIssueRequest, UpdatePrRequest,
};

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping. Clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

#[derive(Debug, Default)]
struct MockForgeInner {
    prs: BTreeMap<u64, PullRequest>,
    issues: BTreeMap<u64, Issue>,
    comments: Vec<(u64, String)>,
    labels: BTreeSet<String>,
    next_number: u64,
    fail_on: Option<FailOn>,
    /// Remaining failures; `None` fails forever.
    fail_remaining: Option<u32>,
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    CreatePr(ForgeError),
    UpdatePr(ForgeError),
    GetPr(ForgeError),
    FindPrByHead(ForgeError),
    FindOpenPrs(ForgeError),
    AddLabels(ForgeError),
    Comment(ForgeError),
    FindOpenIssues(ForgeError),
    CreateIssue(ForgeError),
    UpdateIssue(ForgeError),
    CloseIssue(ForgeError),
    LabelExists(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CreatePr { head: String, base: String, title: String },
    UpdatePr { number: u64 },
    GetPr { number: u64 },
    FindPrByHead { head: String },
    FindOpenPrs { label: String },
    AddLabels { number: u64, labels: Vec<String> },
    Comment { number: u64 },
    FindOpenIssues { label: String },
    CreateIssue { title: String },
    UpdateIssue { number: u64 },
    CloseIssue { number: u64 },
    LabelExists { name: String },
}

impl MockOperation {
    /// Whether this call changes forge state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            MockOperation::GetPr { .. }
                | MockOperation::FindPrByHead { .. }
                | MockOperation::FindOpenPrs { .. }
                | MockOperation::FindOpenIssues { .. }
                | MockOperation::LabelExists { .. }
        )
    }
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                next_number: 1,
                ..Default::default()
            })),
        }
    }

    /// Create a mock forge with pre-existing PRs.
    pub fn with_prs(prs: Vec<PullRequest>) -> Self {
        let forge = Self::new();
        {
            let mut inner = forge.inner.lock().unwrap();
            for pr in prs {
                inner.next_number = inner.next_number.max(pr.number + 1);
                inner.prs.insert(pr.number, pr);
            }
        }
        forge
    }

    /// Add pre-existing issues.
    pub fn with_issues(self, issues: Vec<Issue>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            for issue in issues {
                inner.next_number = inner.next_number.max(issue.number + 1);
                inner.issues.insert(issue.number, issue);
            }
        }
        self
    }

    /// Define repository labels (for `label_exists`).
    pub fn with_labels<I, S>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.labels.extend(labels.into_iter().map(Into::into));
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use linecook::forge::mock::{MockForge, FailOn};
    /// use linecook::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::CreatePr(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(fail_on);
        self
    }

    /// Start failing an operation on a forge that is already in use.
    pub fn set_fail_on(&self, fail_on: FailOn) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(fail_on);
        inner.fail_remaining = None;
    }

    /// Fail the operation `times` times, then succeed.
    pub fn fail_times(self, fail_on: FailOn, times: u32) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
            inner.fail_remaining = Some(times);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Recorded operations that change state.
    pub fn mutations(&self) -> Vec<MockOperation> {
        self.operations()
            .into_iter()
            .filter(MockOperation::is_mutation)
            .collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }

    /// Get a PR by number (for test verification).
    pub fn pr(&self, number: u64) -> Option<PullRequest> {
        self.inner.lock().unwrap().prs.get(&number).cloned()
    }

    /// All PRs, ordered by number.
    pub fn all_prs(&self) -> Vec<PullRequest> {
        self.inner.lock().unwrap().prs.values().cloned().collect()
    }

    /// All issues, ordered by number.
    pub fn all_issues(&self) -> Vec<Issue> {
        self.inner.lock().unwrap().issues.values().cloned().collect()
    }

    /// Comments posted on `number`, oldest first.
    pub fn comments_on(&self, number: u64) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|(n, _)| *n == number)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Mark a PR closed or merged, as a human would.
    pub fn set_pr_state(&self, number: u64, state: PrState) {
        if let Some(pr) = self.inner.lock().unwrap().prs.get_mut(&number) {
            pr.state = state;
        }
    }

    fn record(&self, op: MockOperation) {
        self.inner.lock().unwrap().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, expected: &str) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        let err = match &inner.fail_on {
            Some(FailOn::CreatePr(e)) if expected == "create_pr" => e.clone(),
            Some(FailOn::UpdatePr(e)) if expected == "update_pr" => e.clone(),
            Some(FailOn::GetPr(e)) if expected == "get_pr" => e.clone(),
            Some(FailOn::FindPrByHead(e)) if expected == "find_pr_by_head" => e.clone(),
            Some(FailOn::FindOpenPrs(e)) if expected == "find_open_prs" => e.clone(),
            Some(FailOn::AddLabels(e)) if expected == "add_labels" => e.clone(),
            Some(FailOn::Comment(e)) if expected == "comment" => e.clone(),
            Some(FailOn::FindOpenIssues(e)) if expected == "find_open_issues" => e.clone(),
            Some(FailOn::CreateIssue(e)) if expected == "create_issue" => e.clone(),
            Some(FailOn::UpdateIssue(e)) if expected == "update_issue" => e.clone(),
            Some(FailOn::CloseIssue(e)) if expected == "close_issue" => e.clone(),
            Some(FailOn::LabelExists(e)) if expected == "label_exists" => e.clone(),
            _ => return Ok(()),
        };
        match inner.fail_remaining {
            Some(0) => return Ok(()),
            Some(n) => inner.fail_remaining = Some(n - 1),
            None => {}
        }
        Err(err)
    }

    fn next_number(inner: &mut MockForgeInner) -> u64 {
        let number = inner.next_number;
        inner.next_number += 1;
        number
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

fn add_unique(into: &mut Vec<String>, labels: &[String]) {
    for label in labels {
        if !into.contains(label) {
            into.push(label.clone());
        }
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::CreatePr {
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
        });
        self.check_fail("create_pr")?;

        let mut inner = self.inner.lock().unwrap();
        if inner
            .prs
            .values()
            .any(|p| p.state == PrState::Open && p.head == request.head)
        {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("A pull request already exists for {}", request.head),
            });
        }
        let number = Self::next_number(&mut inner);
        let pr = PullRequest {
            number,
            url: format!("https://github.com/mock/repo/pull/{}", number),
            state: PrState::Open,
            head: request.head,
            base: request.base,
            title: request.title,
            body: request.body,
            labels: request.labels,
        };
        inner.prs.insert(number, pr.clone());
        Ok(pr)
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::UpdatePr {
            number: request.number,
        });
        self.check_fail("update_pr")?;

        let mut inner = self.inner.lock().unwrap();
        let pr = inner
            .prs
            .get_mut(&request.number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", request.number)))?;
        if let Some(title) = request.title {
            pr.title = title;
        }
        if let Some(body) = request.body {
            pr.body = body;
        }
        Ok(pr.clone())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError> {
        self.record(MockOperation::GetPr { number });
        self.check_fail("get_pr")?;
        self.pr(number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", number)))
    }

    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        self.record(MockOperation::FindPrByHead {
            head: head.to_string(),
        });
        self.check_fail("find_pr_by_head")?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .prs
            .values()
            .find(|p| p.head == head && p.state == PrState::Open)
            .cloned())
    }

    async fn find_open_prs(&self, label: &str) -> Result<Vec<PullRequest>, ForgeError> {
        self.record(MockOperation::FindOpenPrs {
            label: label.to_string(),
        });
        self.check_fail("find_open_prs")?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .prs
            .values()
            .filter(|p| p.state == PrState::Open && p.has_label(label))
            .cloned()
            .collect())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ForgeError> {
        self.record(MockOperation::AddLabels {
            number,
            labels: labels.to_vec(),
        });
        self.check_fail("add_labels")?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(pr) = inner.prs.get_mut(&number) {
            add_unique(&mut pr.labels, labels);
            return Ok(());
        }
        if let Some(issue) = inner.issues.get_mut(&number) {
            add_unique(&mut issue.labels, labels);
            return Ok(());
        }
        Err(ForgeError::NotFound(format!("#{}", number)))
    }

    async fn comment(&self, number: u64, body: &str) -> Result<(), ForgeError> {
        self.record(MockOperation::Comment { number });
        self.check_fail("comment")?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.prs.contains_key(&number) && !inner.issues.contains_key(&number) {
            return Err(ForgeError::NotFound(format!("#{}", number)));
        }
        inner.comments.push((number, body.to_string()));
        Ok(())
    }

    async fn find_open_issues(&self, label: &str) -> Result<Vec<Issue>, ForgeError> {
        self.record(MockOperation::FindOpenIssues {
            label: label.to_string(),
        });
        self.check_fail("find_open_issues")?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .issues
            .values()
            .filter(|i| i.open && i.labels.iter().any(|l| l == label))
            .cloned()
            .collect())
    }

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<Issue, ForgeError> {
        self.record(MockOperation::CreateIssue {
            title: request.title.clone(),
        });
        self.check_fail("create_issue")?;
        let mut inner = self.inner.lock().unwrap();
        let number = Self::next_number(&mut inner);
        let issue = Issue {
            number,
            url: format!("https://github.com/mock/repo/issues/{}", number),
            title: request.title,
            body: request.body,
            labels: request.labels,
            open: true,
        };
        inner.issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn update_issue(&self, request: UpdateIssueRequest) -> Result<Issue, ForgeError> {
        self.record(MockOperation::UpdateIssue {
            number: request.number,
        });
        self.check_fail("update_issue")?;
        let mut inner = self.inner.lock().unwrap();
        let issue = inner
            .issues
            .get_mut(&request.number)
            .ok_or_else(|| ForgeError::NotFound(format!("issue #{}", request.number)))?;
        if let Some(title) = request.title {
            issue.title = title;
        }
        if let Some(body) = request.body {
            issue.body = body;
        }
        Ok(issue.clone())
    }

    async fn close_issue(&self, number: u64) -> Result<(), ForgeError> {
        self.record(MockOperation::CloseIssue { number });
        self.check_fail("close_issue")?;
        let mut inner = self.inner.lock().unwrap();
        let issue = inner
            .issues
            .get_mut(&number)
            .ok_or_else(|| ForgeError::NotFound(format!("issue #{}", number)))?;
        issue.open = false;
        Ok(())
    }

    async fn label_exists(&self, name: &str) -> Result<bool, ForgeError> {
        self.record(MockOperation::LabelExists {
            name: name.to_string(),
        });
        self.check_fail("label_exists")?;
        Ok(self.inner.lock().unwrap().labels.contains(name))
    }
}
