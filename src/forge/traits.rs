//! forge::traits
//!
//! Forge trait definition for pull requests, issues, comments, and labels.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` so API failures surface as typed errors.
//!
//! Read-only lookups (`find_open_prs`, `find_open_issues`, `label_exists`,
//! `find_pr_by_head`) are safe to retry; see [`super::retry`]. Mutating
//! calls are issued once.
//!
//! # Example
//!
//! ```ignore
//! use linecook::forge::{Forge, CreatePrRequest};
//!
//! async fn open_sync_pr(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     let pr = forge.create_pr(CreatePrRequest {
//!         head: "line-cook/fb_/update".to_string(),
//!         base: "main".to_string(),
//!         title: "Sync fb upstream".to_string(),
//!         body: "* fb_apache: Bump".to_string(),
//!         labels: vec!["line-cook".to_string()],
//!     }).await?;
//!     println!("Created PR #{}: {}", pr.number, pr.url);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// No token is configured.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ForgeError {
    /// Whether repeating the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ForgeError::RateLimited | ForgeError::NetworkError(_) => true,
            ForgeError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body
    pub body: String,
    /// Labels applied after creation
    pub labels: Vec<String>,
}

/// Request to update a pull request.
#[derive(Debug, Clone, Default)]
pub struct UpdatePrRequest {
    /// PR number
    pub number: u64,
    /// New title (if changing)
    pub title: Option<String>,
    /// New body (if changing)
    pub body: Option<String>,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR URL (web URL for viewing)
    pub url: String,
    /// PR state (open, closed, merged)
    pub state: PrState,
    /// Head branch name
    pub head: String,
    /// Base branch name
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body (empty when unset)
    pub body: String,
    /// Label names
    pub labels: Vec<String>,
}

impl PullRequest {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// PR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    /// PR is open and awaiting review/merge
    Open,
    /// PR is closed without being merged
    Closed,
    /// PR has been merged
    Merged,
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Request to open an issue.
#[derive(Debug, Clone)]
pub struct CreateIssueRequest {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Request to edit an issue.
#[derive(Debug, Clone, Default)]
pub struct UpdateIssueRequest {
    /// Issue number
    pub number: u64,
    /// New title (if changing)
    pub title: Option<String>,
    /// New body (if changing)
    pub body: Option<String>,
}

/// Issue information returned from the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub url: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Whether the issue is open
    pub open: bool,
}

/// The Forge trait: the PR/issue gateway used by the bot.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: token missing or insufficient
/// - `NotFound`: resource doesn't exist
/// - `RateLimited` / `NetworkError`: transient, safe to retry for reads
/// - `ApiError`: request rejected by the host
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github", "mock").
    fn name(&self) -> &'static str;

    /// Create a new pull request and apply `request.labels`.
    ///
    /// # Errors
    ///
    /// - `ApiError` with status 422 if validation fails (e.g., head doesn't exist)
    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Update an existing pull request's title or body.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the PR doesn't exist
    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Get a pull request by number.
    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError>;

    /// Find the open pull request whose head is `head`, if any.
    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError>;

    /// All open pull requests carrying `label`.
    async fn find_open_prs(&self, label: &str) -> Result<Vec<PullRequest>, ForgeError>;

    /// Add labels to a PR or issue.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ForgeError>;

    /// Post a comment on a PR or issue.
    async fn comment(&self, number: u64, body: &str) -> Result<(), ForgeError>;

    /// All open issues carrying `label`. Pull requests are excluded.
    async fn find_open_issues(&self, label: &str) -> Result<Vec<Issue>, ForgeError>;

    /// Open an issue.
    async fn create_issue(&self, request: CreateIssueRequest) -> Result<Issue, ForgeError>;

    /// Edit an issue's title or body.
    async fn update_issue(&self, request: UpdateIssueRequest) -> Result<Issue, ForgeError>;

    /// Close an issue.
    async fn close_issue(&self, number: u64) -> Result<(), ForgeError>;

    /// Whether the repository defines `name` as a label.
    async fn label_exists(&self, name: &str) -> Result<bool, ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_state_display() {
        assert_eq!(format!("{}", PrState::Open), "open");
        assert_eq!(format!("{}", PrState::Closed), "closed");
        assert_eq!(format!("{}", PrState::Merged), "merged");
    }

    #[test]
    fn transient_errors() {
        assert!(ForgeError::RateLimited.is_transient());
        assert!(ForgeError::NetworkError("reset".into()).is_transient());
        assert!(ForgeError::ApiError {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());
        assert!(!ForgeError::ApiError {
            status: 422,
            message: "invalid".into()
        }
        .is_transient());
        assert!(!ForgeError::NotFound("x".into()).is_transient());
        assert!(!ForgeError::AuthRequired.is_transient());
    }

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::AuthFailed("expired token".into())),
            "authentication failed: expired token"
        );
        assert_eq!(
            format!(
                "{}",
                ForgeError::ApiError {
                    status: 422,
                    message: "Validation failed".into()
                }
            ),
            "API error: 422 - Validation failed"
        );
    }

    #[test]
    fn has_label() {
        let pr = PullRequest {
            number: 1,
            url: String::new(),
            state: PrState::Open,
            head: "h".into(),
            base: "main".into(),
            title: "t".into(),
            body: String::new(),
            labels: vec!["line-cook".into()],
        };
        assert!(pr.has_label("line-cook"));
        assert!(!pr.has_label("other"));
    }
}
