//! Shared fixtures for integration tests.
//!
//! A [`World`] is a set of real repositories in one temp dir: one upstream
//! repository per prefix, a bare `origin`, and a downstream clone that
//! vendors the upstream cookbooks. Tests drive them with the `git` CLI and
//! run the bot against the downstream clone with a [`MockForge`].

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use linecook::core::config::Config;
use linecook::core::upstream::UpstreamRegistry;
use linecook::engine::{
    handle_comment, sync_all, Bot, CommandOutcome, DryRun, Live, RunSummary, SyncOptions, ORIGIN,
};
use linecook::forge::mock::MockForge;
use linecook::forge::retry::RetryConfig;
use linecook::git::Git;

/// Run git in `dir`, panicking on failure. Returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    try_git(dir, args).unwrap_or_else(|err| panic!("git {args:?} failed: {err}"))
}

/// Run git in `dir`. Returns trimmed stdout, or stderr on failure.
pub fn try_git(dir: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to spawn git");
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q", "-b", "main"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "core.editor", "true"]);
}

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
}

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Files of a freshly generated cookbook.
pub fn cookbook_files(name: &str) -> Vec<(String, String)> {
    vec![
        (
            format!("cookbooks/{name}/metadata.rb"),
            format!("name '{name}'\nversion '1.0.0'\n"),
        ),
        (
            format!("cookbooks/{name}/recipes/default.rb"),
            format!("# {name}\npackage '{name}'\n"),
        ),
    ]
}

/// One upstream repository.
pub struct UpstreamRepo {
    pub prefix: String,
    pub path: PathBuf,
}

impl UpstreamRepo {
    pub fn trailer_key(&self) -> String {
        if self.prefix == "fb" {
            "Upstream-Commit".to_string()
        } else {
            format!("{}_Upstream-Commit", self.prefix)
        }
    }

    pub fn head(&self) -> String {
        git(&self.path, &["rev-parse", "HEAD"])
    }

    /// Write `files` and commit them; returns the new sha.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> String {
        write_files(&self.path, files);
        git(&self.path, &["add", "-A"]);
        git(&self.path, &["commit", "-q", "-m", message]);
        self.head()
    }
}

pub struct World {
    _root: TempDir,
    pub origin: PathBuf,
    pub downstream: PathBuf,
    pub upstreams: Vec<UpstreamRepo>,
}

impl World {
    /// `fb` upstream with `fb_apache` and `fb_nginx`, vendored downstream
    /// with no sync history.
    pub fn new() -> Self {
        Self::with_cookbooks(&[("fb", "fb_apache fb_nginx")])
    }

    /// Like [`World::new`], with the vendoring commit already marked as
    /// synced to the upstream head.
    pub fn synced() -> Self {
        let world = Self::new();
        world.mark_synced("fb");
        world
    }

    /// One upstream per `(prefix, "cookbook cookbook ...")`, the first
    /// one primary.
    pub fn with_cookbooks(layout: &[(&str, &str)]) -> Self {
        let root = TempDir::new().expect("failed to create temp dir");

        let mut upstreams = Vec::new();
        for (prefix, cookbooks) in layout {
            let path = root.path().join(format!("upstream-{prefix}"));
            init_repo(&path);
            let files: Vec<(String, String)> =
                cookbooks.split_whitespace().flat_map(cookbook_files).collect();
            let refs: Vec<(&str, &str)> =
                files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
            write_files(&path, &refs);
            write_files(&path, &[("README.md", &format!("# {prefix} cookbooks\n"))]);
            git(&path, &["add", "-A"]);
            git(&path, &["commit", "-q", "-m", &format!("Initial {prefix} cookbooks")]);
            upstreams.push(UpstreamRepo {
                prefix: prefix.to_string(),
                path,
            });
        }

        let origin = root.path().join("origin.git");
        std::fs::create_dir_all(&origin).unwrap();
        git(&origin, &["init", "-q", "--bare", "-b", "main"]);

        let downstream = root.path().join("downstream");
        init_repo(&downstream);
        write_files(&downstream, &[("README.md", "# Our chef repo\n")]);
        for upstream in &upstreams {
            copy_dir(&upstream.path.join("cookbooks"), &downstream.join("cookbooks"));
        }
        git(&downstream, &["add", "-A"]);
        git(&downstream, &["commit", "-q", "-m", "Vendor cookbooks"]);
        git(&downstream, &["remote", "add", ORIGIN, origin.to_str().unwrap()]);
        git(&downstream, &["push", "-q", ORIGIN, "main"]);

        Self {
            _root: root,
            origin,
            downstream,
            upstreams,
        }
    }

    pub fn upstream(&self, prefix: &str) -> &UpstreamRepo {
        self.upstreams
            .iter()
            .find(|u| u.prefix == prefix)
            .unwrap_or_else(|| panic!("no upstream {prefix}"))
    }

    /// Record the upstream head on `main` with an empty trailer commit,
    /// as a merged Bootstrap PR would.
    pub fn mark_synced(&self, prefix: &str) -> String {
        let upstream = self.upstream(prefix);
        let message = format!(
            "Bootstrap {prefix} upstream sync\n\n{}: {}",
            upstream.trailer_key(),
            upstream.head()
        );
        self.on_main(|dir| {
            git(dir, &["commit", "-q", "--allow-empty", "-m", &message]);
        })
    }

    /// Commit `files` on the downstream `main` and push it.
    pub fn downstream_commit(&self, files: &[(&str, &str)], message: &str) -> String {
        self.on_main(|dir| {
            write_files(dir, files);
            git(dir, &["add", "-A"]);
            git(dir, &["commit", "-q", "-m", message]);
        })
    }

    /// Merge `branch` from origin into `main`, as merging its PR would.
    pub fn merge(&self, branch: &str) -> String {
        let remote = format!("{ORIGIN}/{branch}");
        self.on_main(|dir| {
            git(dir, &["merge", "-q", "--no-edit", &remote]);
        })
    }

    /// Run `f` on a fresh checkout of `origin/main`, then push `main`.
    fn on_main(&self, f: impl FnOnce(&Path)) -> String {
        let dir = self.downstream.as_path();
        git(dir, &["fetch", "-q", ORIGIN]);
        git(dir, &["checkout", "-q", "-f", "-B", "main", "origin/main"]);
        f(dir);
        git(dir, &["push", "-q", ORIGIN, "main"]);
        git(dir, &["rev-parse", "HEAD"])
    }

    /// Make origin refuse every non-fast-forward update, so any lease
    /// push that rewrites a branch is rejected.
    pub fn refuse_rewrites(&self) {
        git(&self.origin, &["config", "receive.denyNonFastForwards", "true"]);
    }

    /// Tip of `branch` on origin.
    pub fn remote_tip(&self, branch: &str) -> Option<String> {
        let refname = format!("refs/heads/{branch}");
        try_git(&self.origin, &["rev-parse", "--verify", "-q", &refname]).ok()
    }

    /// Content of `path` on origin's `branch`.
    pub fn remote_file(&self, branch: &str, path: &str) -> Option<String> {
        try_git(&self.origin, &["show", &format!("refs/heads/{branch}:{path}")]).ok()
    }

    /// Commit messages on origin's `branch` that `main` lacks, oldest first.
    pub fn remote_messages(&self, branch: &str) -> Vec<String> {
        let range = format!("refs/heads/main..refs/heads/{branch}");
        let out = git(&self.origin, &["log", "--reverse", "--format=%B%x00", &range]);
        out.split('\0')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
    }

    pub fn config_yaml(&self) -> String {
        let entry = |upstream: &UpstreamRepo, indent: &str| {
            format!(
                "{indent}prefix: {}\n{indent}repo_url: {}\n{indent}branch: main\n",
                upstream.prefix,
                upstream.path.display()
            )
        };
        let mut yaml = String::from("upstream_overrides:\n");
        yaml.push_str(&entry(&self.upstreams[0], "  "));
        if self.upstreams.len() > 1 {
            yaml.push_str("universe_upstreams:\n");
            for upstream in &self.upstreams[1..] {
                yaml.push_str(&format!("  {}cookbooks:\n", upstream.prefix));
                yaml.push_str(&entry(upstream, "    "));
            }
        }
        yaml
    }

    pub fn config(&self) -> Config {
        let config = Config::parse(&self.config_yaml()).expect("fixture config parses");
        config.validate().expect("fixture config is valid");
        config
    }

    pub fn git(&self) -> Git {
        Git::open(&self.downstream).expect("failed to open downstream")
    }

    /// Run a live sync of every upstream.
    pub async fn sync(&self, forge: &MockForge) -> RunSummary {
        self.sync_with(forge, &SyncOptions::default(), false).await
    }

    pub async fn sync_with(
        &self,
        forge: &MockForge,
        options: &SyncOptions,
        dry_run: bool,
    ) -> RunSummary {
        let git = self.git();
        let config = self.config();
        let registry = UpstreamRegistry::from_config(&config).unwrap();
        let live = Live::new(forge, ORIGIN);
        let bot = if dry_run {
            Bot::new(&git, forge, &DryRun, &config, &registry)
        } else {
            Bot::new(&git, forge, &live, &config, &registry)
        }
        .with_retry(RetryConfig::IMMEDIATE);
        sync_all(&bot, options).await.expect("sync run")
    }

    /// Handle a PR comment live.
    pub async fn comment(&self, forge: &MockForge, pr: u64, body: &str) -> Option<CommandOutcome> {
        self.comment_with(forge, pr, body, false).await
    }

    pub async fn comment_with(
        &self,
        forge: &MockForge,
        pr: u64,
        body: &str,
        dry_run: bool,
    ) -> Option<CommandOutcome> {
        let git = self.git();
        let config = self.config();
        let registry = UpstreamRegistry::from_config(&config).unwrap();
        let live = Live::new(forge, ORIGIN);
        let bot = if dry_run {
            Bot::new(&git, forge, &DryRun, &config, &registry)
        } else {
            Bot::new(&git, forge, &live, &config, &registry)
        }
        .with_retry(RetryConfig::IMMEDIATE);
        handle_comment(&bot, pr, body).await.expect("command run")
    }
}

/// A forge that knows both bot labels.
pub fn forge() -> MockForge {
    MockForge::new().with_labels(["line-cook", "line-cook-pr-split"])
}
