//! forge::github
//!
//! GitHub forge implementation over the REST API.
//!
//! # Authentication
//!
//! A static bearer token, normally the workflow's `GITHUB_TOKEN`. The
//! repository is taken from `GITHUB_REPOSITORY` (`owner/repo`) or parsed
//! from the `origin` remote URL.
//!
//! # Rate Limiting
//!
//! Returns `ForgeError::RateLimited` when limits are hit. Read-only lookups
//! are retried by callers through [`super::retry`]; writes are not.
//!
//! # Example
//!
//! ```ignore
//! use linecook::forge::github::GitHubForge;
//! use linecook::forge::Forge;
//!
//! let forge = GitHubForge::from_env(Some("git@github.com:acme/chef.git"))?;
//! let open = forge.find_open_prs("line-cook").await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    CreateIssueRequest, CreatePrRequest, Forge, ForgeError, Issue, PrState, PullRequest,
    UpdateIssueRequest, UpdatePrRequest,
};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "linecook";

/// Page size for list endpoints (GitHub's maximum).
const PER_PAGE: usize = 100;

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable holding `owner/repo`.
pub const REPOSITORY_ENV: &str = "GITHUB_REPOSITORY";

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubForge {
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_api_base(token, owner, repo, DEFAULT_API_BASE)
    }

    /// Create a GitHub forge with a custom API base URL.
    pub fn with_api_base(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a forge from `GITHUB_TOKEN` and `GITHUB_REPOSITORY`, falling
    /// back to `origin_url` for the repository.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` if `GITHUB_TOKEN` is unset or empty
    /// - `NotFound` if no repository can be determined
    pub fn from_env(origin_url: Option<&str>) -> Result<Self, ForgeError> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ForgeError::AuthRequired)?;

        let slug = std::env::var(REPOSITORY_ENV)
            .ok()
            .and_then(|s| {
                s.split_once('/')
                    .map(|(o, r)| (o.to_string(), r.to_string()))
            })
            .or_else(|| origin_url.and_then(parse_github_url));

        let (owner, repo) = slug.ok_or_else(|| {
            ForgeError::NotFound(format!(
                "GitHub repository (set {REPOSITORY_ENV} or use a github.com origin)"
            ))
        })?;
        Ok(Self::new(token, owner, repo))
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ForgeError> {
        let url = self.repo_url(path);
        debug!(%method, %url, "github request");
        Ok(self.client.request(method, url).headers(self.headers()?))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ForgeError> {
        builder
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    /// Send and decode a JSON response.
    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ForgeError> {
        let response = self.send(builder).await?;
        self.handle_response(response).await
    }

    /// Send, discarding any response body.
    async fn send_unit(&self, builder: RequestBuilder) -> Result<(), ForgeError> {
        let response = self.send(builder).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        let required_permissions = response
            .headers()
            .get("X-Accepted-GitHub-Permissions")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let rate_exhausted = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            == Some("0");

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if rate_exhausted => ForgeError::RateLimited,
            StatusCode::FORBIDDEN => {
                let mut err_msg = format!("Permission denied: {}", message);
                if let Some(perms) = required_permissions.filter(|p| !p.is_empty()) {
                    err_msg.push_str(&format!(" [required: {}]", perms));
                }
                ForgeError::AuthFailed(err_msg)
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Fetch every page of a list endpoint.
    async fn list_all<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ForgeError> {
        let mut out = Vec::new();
        let per_page = PER_PAGE.to_string();
        let mut page = 1usize;
        loop {
            let page_str = page.to_string();
            let builder = self
                .request(Method::GET, path)?
                .query(query)
                .query(&[("per_page", per_page.as_str()), ("page", page_str.as_str())]);
            let items: Vec<T> = self.send_json(builder).await?;
            let count = items.len();
            out.extend(items);
            if count < PER_PAGE {
                return Ok(out);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let body = CreatePrBody {
            head: &request.head,
            base: &request.base,
            title: &request.title,
            body: &request.body,
        };
        let gh: GitHubPullRequest = self
            .send_json(self.request(Method::POST, "pulls")?.json(&body))
            .await?;
        let mut pr: PullRequest = gh.into();

        if !request.labels.is_empty() {
            self.add_labels(pr.number, &request.labels).await?;
            for label in request.labels {
                if !pr.labels.contains(&label) {
                    pr.labels.push(label);
                }
            }
        }
        Ok(pr)
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError> {
        let body = UpdateBody {
            title: request.title.as_deref(),
            body: request.body.as_deref(),
            state: None,
        };
        let gh: GitHubPullRequest = self
            .send_json(
                self.request(Method::PATCH, &format!("pulls/{}", request.number))?
                    .json(&body),
            )
            .await?;
        Ok(gh.into())
    }

    async fn get_pr(&self, number: u64) -> Result<PullRequest, ForgeError> {
        let gh: GitHubPullRequest = self
            .send_json(self.request(Method::GET, &format!("pulls/{}", number))?)
            .await?;
        Ok(gh.into())
    }

    async fn find_pr_by_head(&self, head: &str) -> Result<Option<PullRequest>, ForgeError> {
        // GitHub requires owner:branch; same-repo PRs use our owner
        let head_param = if head.contains(':') {
            head.to_string()
        } else {
            format!("{}:{}", self.owner, head)
        };
        let builder = self
            .request(Method::GET, "pulls")?
            .query(&[("head", head_param.as_str()), ("state", "open")]);
        let prs: Vec<GitHubPullRequest> = self.send_json(builder).await?;
        Ok(prs.into_iter().next().map(Into::into))
    }

    async fn find_open_prs(&self, label: &str) -> Result<Vec<PullRequest>, ForgeError> {
        let prs: Vec<GitHubPullRequest> = self.list_all("pulls", &[("state", "open")]).await?;
        Ok(prs
            .into_iter()
            .map(PullRequest::from)
            .filter(|pr| pr.has_label(label))
            .collect())
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), ForgeError> {
        if labels.is_empty() {
            return Ok(());
        }
        let body = LabelsBody { labels };
        self.send_unit(
            self.request(Method::POST, &format!("issues/{}/labels", number))?
                .json(&body),
        )
        .await
    }

    async fn comment(&self, number: u64, body: &str) -> Result<(), ForgeError> {
        self.send_unit(
            self.request(Method::POST, &format!("issues/{}/comments", number))?
                .json(&CommentBody { body }),
        )
        .await
    }

    async fn find_open_issues(&self, label: &str) -> Result<Vec<Issue>, ForgeError> {
        let issues: Vec<GitHubIssue> = self
            .list_all("issues", &[("state", "open"), ("labels", label)])
            .await?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(Into::into)
            .collect())
    }

    async fn create_issue(&self, request: CreateIssueRequest) -> Result<Issue, ForgeError> {
        let body = CreateIssueBody {
            title: &request.title,
            body: &request.body,
            labels: &request.labels,
        };
        let gh: GitHubIssue = self
            .send_json(self.request(Method::POST, "issues")?.json(&body))
            .await?;
        Ok(gh.into())
    }

    async fn update_issue(&self, request: UpdateIssueRequest) -> Result<Issue, ForgeError> {
        let body = UpdateBody {
            title: request.title.as_deref(),
            body: request.body.as_deref(),
            state: None,
        };
        let gh: GitHubIssue = self
            .send_json(
                self.request(Method::PATCH, &format!("issues/{}", request.number))?
                    .json(&body),
            )
            .await?;
        Ok(gh.into())
    }

    async fn close_issue(&self, number: u64) -> Result<(), ForgeError> {
        let body = UpdateBody {
            title: None,
            body: None,
            state: Some("closed"),
        };
        self.send_unit(
            self.request(Method::PATCH, &format!("issues/{}", number))?
                .json(&body),
        )
        .await
    }

    async fn label_exists(&self, name: &str) -> Result<bool, ForgeError> {
        let response = self
            .send(self.request(Method::GET, &format!("labels/{}", encode_segment(name)))?)
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.handle_error_response(response, status).await
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

#[derive(Serialize)]
struct CreatePrBody<'a> {
    head: &'a str,
    base: &'a str,
    title: &'a str,
    body: &'a str,
}

/// PATCH body shared by pulls and issues.
#[derive(Serialize)]
struct UpdateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
}

#[derive(Serialize)]
struct LabelsBody<'a> {
    labels: &'a [String],
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct CreateIssueBody<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct GitHubLabel {
    name: String,
}

/// GitHub PR response format.
#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    state: String,
    head: GitHubRef,
    base: GitHubRef,
    title: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    merged: Option<bool>,
    merged_at: Option<String>,
}

/// GitHub ref (head/base) format.
#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

/// GitHub issue response format. PRs appear here with `pull_request` set.
#[derive(Deserialize)]
struct GitHubIssue {
    number: u64,
    html_url: String,
    state: String,
    title: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
    pull_request: Option<serde_json::Value>,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        let state = if pr.merged.unwrap_or(false) || pr.merged_at.is_some() {
            PrState::Merged
        } else if pr.state == "closed" {
            PrState::Closed
        } else {
            PrState::Open
        };

        PullRequest {
            number: pr.number,
            url: pr.html_url,
            state,
            head: pr.head.ref_name,
            base: pr.base.ref_name,
            title: pr.title,
            body: pr.body.unwrap_or_default(),
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

impl From<GitHubIssue> for Issue {
    fn from(issue: GitHubIssue) -> Self {
        Issue {
            number: issue.number,
            url: issue.html_url,
            open: issue.state == "open",
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

// --------------------------------------------------------------------------
// URL Parsing
// --------------------------------------------------------------------------

/// Parse a GitHub remote URL to extract owner and repo.
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://www.github.com/owner/repo`
///
/// # Example
///
/// ```
/// use linecook::forge::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let rest = url.strip_prefix("git@github.com:").or_else(|| {
        ["https://", "http://", "ssh://git@"]
            .iter()
            .find_map(|scheme| url.strip_prefix(scheme))
            .and_then(|r| r.strip_prefix("www.").or(Some(r)))
            .and_then(|r| r.strip_prefix("github.com/"))
    })?;

    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
