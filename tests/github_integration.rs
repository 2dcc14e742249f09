//! HTTP mapping tests for the GitHub forge.
//!
//! A wiremock server stands in for api.github.com; each test checks the
//! request the forge sends and how it maps the response.

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linecook::forge::github::GitHubForge;
use linecook::forge::{
    CreateIssueRequest, CreatePrRequest, Forge, ForgeError, PrState, UpdatePrRequest,
};

const OWNER: &str = "acme";
const REPO: &str = "chef";

async fn forge() -> (MockServer, GitHubForge) {
    let server = MockServer::start().await;
    let forge = GitHubForge::with_api_base("t0ken", OWNER, REPO, server.uri());
    (server, forge)
}

fn repo_path(rest: &str) -> String {
    format!("/repos/{OWNER}/{REPO}/{rest}")
}

fn pr_json(number: u64, head: &str, labels: &[&str]) -> Value {
    json!({
        "number": number,
        "html_url": format!("https://github.com/{OWNER}/{REPO}/pull/{number}"),
        "state": "open",
        "head": {"ref": head},
        "base": {"ref": "main"},
        "title": "Sync fb cookbooks from upstream",
        "body": null,
        "labels": labels.iter().map(|l| json!({"name": l})).collect::<Vec<_>>(),
        "merged": false,
        "merged_at": null
    })
}

fn issue_json(number: u64, title: &str, is_pr: bool) -> Value {
    let mut issue = json!({
        "number": number,
        "html_url": format!("https://github.com/{OWNER}/{REPO}/issues/{number}"),
        "state": "open",
        "title": title,
        "body": "<!-- linecook:conflict:fb:fb_apache:abc -->",
        "labels": [{"name": "line-cook"}]
    });
    if is_pr {
        issue["pull_request"] = json!({"url": "x"});
    }
    issue
}

mod pulls {
    use super::*;

    #[tokio::test]
    async fn create_pr_posts_then_labels() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path(repo_path("pulls")))
            .and(header("authorization", "Bearer t0ken"))
            .and(body_partial_json(json!({
                "head": "line-cook/fb_/update",
                "base": "main"
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(pr_json(7, "line-cook/fb_/update", &[])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(repo_path("issues/7/labels")))
            .and(body_partial_json(json!({"labels": ["line-cook"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let pr = forge
            .create_pr(CreatePrRequest {
                head: "line-cook/fb_/update".into(),
                base: "main".into(),
                title: "Sync fb cookbooks from upstream".into(),
                body: "body".into(),
                labels: vec!["line-cook".into()],
            })
            .await
            .unwrap();

        assert_eq!(pr.number, 7);
        assert_eq!(pr.state, PrState::Open);
        assert_eq!(pr.body, "");
        assert!(pr.has_label("line-cook"));
    }

    #[tokio::test]
    async fn find_pr_by_head_qualifies_owner() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path(repo_path("pulls")))
            .and(query_param("head", "acme:line-cook/fb_/update"))
            .and(query_param("state", "open"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([pr_json(3, "line-cook/fb_/update", &["line-cook"])])),
            )
            .mount(&server)
            .await;

        let found = forge.find_pr_by_head("line-cook/fb_/update").await.unwrap();
        assert_eq!(found.map(|p| p.number), Some(3));
    }

    #[tokio::test]
    async fn find_open_prs_filters_by_label() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path(repo_path("pulls")))
            .and(query_param("state", "open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                pr_json(1, "line-cook/fb_/update-split-1", &["line-cook", "line-cook-pr-split"]),
                pr_json(2, "feature", &[]),
            ])))
            .mount(&server)
            .await;

        let prs = forge.find_open_prs("line-cook-pr-split").await.unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].head, "line-cook/fb_/update-split-1");
    }

    #[tokio::test]
    async fn merged_pr_maps_to_merged() {
        let (server, forge) = forge().await;
        let mut merged = pr_json(9, "line-cook/fb_onboard", &[]);
        merged["state"] = json!("closed");
        merged["merged_at"] = json!("2024-01-01T00:00:00Z");
        Mock::given(method("GET"))
            .and(path(repo_path("pulls/9")))
            .respond_with(ResponseTemplate::new(200).set_body_json(merged))
            .mount(&server)
            .await;

        assert_eq!(forge.get_pr(9).await.unwrap().state, PrState::Merged);
    }

    #[tokio::test]
    async fn update_pr_sends_only_changed_fields() {
        let (server, forge) = forge().await;
        Mock::given(method("PATCH"))
            .and(path(repo_path("pulls/4")))
            .and(body_partial_json(json!({"body": "new body"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(pr_json(4, "line-cook/fb_/update", &[])),
            )
            .expect(1)
            .mount(&server)
            .await;

        forge
            .update_pr(UpdatePrRequest {
                number: 4,
                title: None,
                body: Some("new body".into()),
            })
            .await
            .unwrap();
    }
}

mod issues {
    use super::*;

    #[tokio::test]
    async fn open_issues_exclude_pull_requests() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path(repo_path("issues")))
            .and(query_param("labels", "line-cook"))
            .and(query_param("state", "open"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                issue_json(5, "Sync conflict applying fb upstream commit abcdef12", false),
                issue_json(6, "Sync fb cookbooks from upstream", true),
            ])))
            .mount(&server)
            .await;

        let issues = forge.find_open_issues("line-cook").await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].number, 5);
        assert!(issues[0].open);
    }

    #[tokio::test]
    async fn create_issue_carries_labels() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path(repo_path("issues")))
            .and(body_partial_json(json!({"labels": ["line-cook"]})))
            .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(
                11,
                "Local changes detected in fb_apache",
                false,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let issue = forge
            .create_issue(CreateIssueRequest {
                title: "Local changes detected in fb_apache".into(),
                body: "details".into(),
                labels: vec!["line-cook".into()],
            })
            .await
            .unwrap();
        assert_eq!(issue.number, 11);
    }

    #[tokio::test]
    async fn close_issue_patches_state() {
        let (server, forge) = forge().await;
        Mock::given(method("PATCH"))
            .and(path(repo_path("issues/5")))
            .and(body_partial_json(json!({"state": "closed"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        forge.close_issue(5).await.unwrap();
    }

    #[tokio::test]
    async fn comment_posts_body() {
        let (server, forge) = forge().await;
        Mock::given(method("POST"))
            .and(path(repo_path("issues/12/comments")))
            .and(body_partial_json(json!({"body": "Rebased"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        forge.comment(12, "Rebased").await.unwrap();
    }
}

mod labels {
    use super::*;

    #[tokio::test]
    async fn missing_label_is_false() {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path(repo_path("labels/line-cook")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "line-cook"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(repo_path("labels/line-cook-pr-split")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        assert!(forge.label_exists("line-cook").await.unwrap());
        assert!(!forge.label_exists("line-cook-pr-split").await.unwrap());
    }
}

mod errors {
    use super::*;

    async fn get_pr_with(response: ResponseTemplate) -> ForgeError {
        let (server, forge) = forge().await;
        Mock::given(method("GET"))
            .and(path(repo_path("pulls/1")))
            .respond_with(response)
            .mount(&server)
            .await;
        forge.get_pr(1).await.unwrap_err()
    }

    #[tokio::test]
    async fn unauthorized_is_auth_failed() {
        let err = get_pr_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
        )
        .await;
        assert!(matches!(err, ForgeError::AuthFailed(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn exhausted_quota_is_rate_limited() {
        let err = get_pr_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "0")
                .set_body_json(json!({"message": "API rate limit exceeded"})),
        )
        .await;
        assert!(matches!(err, ForgeError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn forbidden_reports_required_permissions() {
        let err = get_pr_with(
            ResponseTemplate::new(403)
                .insert_header("X-Accepted-GitHub-Permissions", "pull_requests=write")
                .set_body_json(json!({"message": "Resource not accessible"})),
        )
        .await;
        match err {
            ForgeError::AuthFailed(msg) => assert!(msg.contains("pull_requests=write")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let err = get_pr_with(ResponseTemplate::new(502)).await;
        assert!(matches!(err, ForgeError::ApiError { status: 502, .. }));
        assert!(err.is_transient());
    }
}

#[cfg(feature = "live_github_tests")]
mod live_tests {
    use super::*;

    fn live_forge() -> Option<GitHubForge> {
        let token = std::env::var("GITHUB_TOKEN").ok()?;
        let owner = std::env::var("LINECOOK_TEST_OWNER").ok()?;
        let repo = std::env::var("LINECOOK_TEST_REPO").ok()?;
        Some(GitHubForge::new(token, owner, repo))
    }

    #[tokio::test]
    async fn live_label_lookup() {
        let Some(forge) = live_forge() else {
            eprintln!("skipping: GITHUB_TOKEN / LINECOOK_TEST_OWNER / LINECOOK_TEST_REPO not set");
            return;
        };
        forge.label_exists("line-cook").await.unwrap();
    }

    #[tokio::test]
    async fn live_open_prs() {
        let Some(forge) = live_forge() else {
            eprintln!("skipping: GITHUB_TOKEN / LINECOOK_TEST_OWNER / LINECOOK_TEST_REPO not set");
            return;
        };
        forge.find_open_prs("line-cook").await.unwrap();
    }
}
