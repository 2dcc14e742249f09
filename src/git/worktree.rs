//! git::worktree
//!
//! Working-tree operations: fetch, cherry-pick, rebase, and lease-guarded
//! pushes.
//!
//! These shell out to the `git` CLI inside the repository's working
//! directory. Every operation that can stop halfway (cherry-pick, rebase)
//! cleans up after itself before returning, so the working tree is never
//! left mid-operation.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use super::interface::{CommitInfo, Git, GitError};
use crate::core::types::Oid;

/// A file left unmerged by a cherry-pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictedFile {
    /// Path relative to the repository root
    pub path: String,
    /// Working-tree content with conflict markers, if readable
    pub content: Option<String>,
}

/// Result of applying one upstream commit restricted to a set of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new commit was created.
    Committed(Oid),
    /// The commit changes nothing under the kept paths.
    NothingToApply,
    /// Unmerged entries under a kept path; the pick was aborted.
    Conflict(Vec<ConflictedFile>),
}

/// Result of replaying a sequence of commits (rebase or cherry-pick range).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Replay completed; the branch now points at this commit.
    Replayed(Oid),
    /// Replay stopped on a conflict and was aborted.
    Conflict(Vec<String>),
}

/// Expected state of a remote branch for `--force-with-lease`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lease {
    /// The branch must not exist yet.
    Absent,
    /// The branch must still point at this commit.
    At(Oid),
}

impl Lease {
    pub fn from_current(current: Option<Oid>) -> Self {
        match current {
            Some(oid) => Lease::At(oid),
            None => Lease::Absent,
        }
    }

    fn expected(&self) -> &str {
        match self {
            Lease::Absent => "",
            Lease::At(oid) => oid.as_str(),
        }
    }
}

/// Result of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    /// The remote ref was updated.
    Pushed,
    /// The remote already had this commit.
    UpToDate,
    /// The lease did not hold or the update was refused.
    Rejected(String),
}

impl PushResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, PushResult::Rejected(_))
    }
}

impl Git {
    fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_EDITOR", "true");
        cmd
    }

    /// Run git, returning the output whatever the exit status.
    fn run_unchecked(&self, args: &[&str]) -> Result<Output, GitError> {
        debug!(args = %args.join(" "), "git");
        Ok(self.git_command().args(args).output()?)
    }

    /// Run git and fail on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run_unchecked(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(command_failed(args, &output))
        }
    }

    fn run_with_input(&self, args: &[&str], input: &str) -> Result<Output, GitError> {
        debug!(args = %args.join(" "), "git");
        let mut child = self
            .git_command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(command_failed(args, &output))
        }
    }

    // =========================================================================
    // Fetch and checkout
    // =========================================================================

    /// Fetch from `remote`. With no refspecs the remote's configured ones
    /// are used.
    pub fn fetch(&self, remote: &str, refspecs: &[String]) -> Result<(), GitError> {
        let mut args = vec!["fetch", "--quiet", "--prune", remote];
        args.extend(refspecs.iter().map(String::as_str));
        self.run(&args)?;
        Ok(())
    }

    /// Fetch `branch` from `remote` into `refs/remotes/{remote}/{branch}`.
    pub fn fetch_branch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.fetch(
            remote,
            &[format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}")],
        )
    }

    /// Tip of `refs/remotes/{remote}/{branch}` as of the last fetch.
    pub fn remote_branch(&self, remote: &str, branch: &str) -> Result<Option<Oid>, GitError> {
        self.try_resolve_ref(&format!("refs/remotes/{remote}/{branch}"))
    }

    /// Create or reset local `branch` at `start`, check it out, and discard
    /// any working-tree leftovers.
    pub fn checkout_fresh(&self, branch: &str, start: &Oid) -> Result<(), GitError> {
        self.run(&["checkout", "-q", "-f", "-B", branch, start.as_str()])?;
        self.run(&["clean", "-q", "-fd"])?;
        Ok(())
    }

    // =========================================================================
    // Cherry-pick
    // =========================================================================

    /// Apply `commit` on top of HEAD, keeping only changes under `keep_paths`.
    ///
    /// Conflicts outside the kept paths are discarded. On success the new
    /// commit carries `message` and the original author and date.
    pub fn apply_commit(
        &self,
        commit: &CommitInfo,
        keep_paths: &[String],
        message: &str,
    ) -> Result<ApplyOutcome, GitError> {
        let pick = self.run_unchecked(&["cherry-pick", "--no-commit", commit.oid.as_str()])?;

        if !pick.status.success() {
            let unmerged = self.unmerged_paths()?;
            if unmerged.is_empty() {
                self.abort_pick();
                return Err(command_failed(
                    &["cherry-pick", "--no-commit", commit.oid.as_str()],
                    &pick,
                ));
            }
            let relevant: Vec<ConflictedFile> = unmerged
                .into_iter()
                .filter(|p| under_any(p, keep_paths))
                .map(|path| ConflictedFile {
                    content: std::fs::read_to_string(self.workdir.join(&path)).ok(),
                    path,
                })
                .collect();
            if !relevant.is_empty() {
                self.abort_pick();
                return Ok(ApplyOutcome::Conflict(relevant));
            }
        }

        let head = self.head_oid()?;
        let mut present = Vec::new();
        for path in keep_paths {
            if self.workdir.join(path).exists() || self.content_id(&head, path)?.is_some() {
                present.push(path.as_str());
            }
        }

        self.run(&["reset", "-q"])?;
        if !present.is_empty() {
            let mut add = vec!["add", "-A", "--"];
            add.extend(present);
            self.run(&add)?;
        }
        self.run(&["checkout", "-q", "--", "."])?;
        self.run(&["clean", "-q", "-fd"])?;
        let _ = self.run_unchecked(&["cherry-pick", "--quit"]);

        if !self.has_staged_changes()? {
            return Ok(ApplyOutcome::NothingToApply);
        }

        let author = commit.author_ident();
        let date = commit.author_time.to_rfc3339();
        self.run_with_input(
            &[
                "commit",
                "-q",
                "--no-verify",
                "--allow-empty-message",
                "-F",
                "-",
                "--author",
                &author,
                "--date",
                &date,
            ],
            message,
        )?;
        Ok(ApplyOutcome::Committed(self.head_oid()?))
    }

    /// Restore HEAD after an interrupted cherry-pick.
    fn abort_pick(&self) {
        let _ = self.run_unchecked(&["cherry-pick", "--abort"]);
        let _ = self.run_unchecked(&["reset", "-q", "--hard", "HEAD"]);
        let _ = self.run_unchecked(&["clean", "-q", "-fd"]);
    }

    /// Reset local `branch` to `base` and cherry-pick `commits` in order,
    /// preserving their messages and authors.
    pub fn cherry_pick_onto(
        &self,
        branch: &str,
        base: &Oid,
        commits: &[Oid],
    ) -> Result<ReplayOutcome, GitError> {
        self.checkout_fresh(branch, base)?;
        if commits.is_empty() {
            return Ok(ReplayOutcome::Replayed(base.clone()));
        }
        let mut args = vec![
            "cherry-pick",
            "--allow-empty",
            "--keep-redundant-commits",
        ];
        args.extend(commits.iter().map(Oid::as_str));
        let output = self.run_unchecked(&args)?;
        if output.status.success() {
            return Ok(ReplayOutcome::Replayed(self.head_oid()?));
        }
        let unmerged = self.unmerged_paths()?;
        self.abort_pick();
        if unmerged.is_empty() {
            return Err(command_failed(&args, &output));
        }
        Ok(ReplayOutcome::Conflict(unmerged))
    }

    // =========================================================================
    // Rebase
    // =========================================================================

    /// Rebase the checked-out branch onto `onto`.
    ///
    /// On conflict the rebase is aborted and the branch is left where it was.
    pub fn rebase_onto(&self, onto: &Oid) -> Result<ReplayOutcome, GitError> {
        let args = ["rebase", "--keep-empty", "--empty=keep", onto.as_str()];
        let output = self.run_unchecked(&args)?;
        if output.status.success() {
            return Ok(ReplayOutcome::Replayed(self.head_oid()?));
        }
        let unmerged = self.unmerged_paths()?;
        let _ = self.run_unchecked(&["rebase", "--abort"]);
        if unmerged.is_empty() {
            return Err(command_failed(&args, &output));
        }
        Ok(ReplayOutcome::Conflict(unmerged))
    }

    // =========================================================================
    // Index
    // =========================================================================

    /// Replace `path` in the index and working tree with its content at
    /// `commit`. Returns false (and changes nothing) if `commit` lacks it.
    pub fn replace_path_from(&self, commit: &Oid, path: &str) -> Result<bool, GitError> {
        if self.content_id(commit, path)?.is_none() {
            return Ok(false);
        }
        self.run(&["rm", "-r", "-q", "--ignore-unmatch", "--", path])?;
        let _ = std::fs::remove_dir_all(self.workdir.join(path));
        self.run(&["checkout", commit.as_str(), "--", path])?;
        Ok(true)
    }

    /// Whether the index differs from HEAD.
    pub fn has_staged_changes(&self) -> Result<bool, GitError> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self.run_unchecked(&args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_failed(&args, &output)),
        }
    }

    /// Commit the index with the configured identity.
    pub fn commit_staged(&self, message: &str, allow_empty: bool) -> Result<Oid, GitError> {
        let mut args = vec!["commit", "-q", "--no-verify", "-F", "-"];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.run_with_input(&args, message)?;
        self.head_oid()
    }

    fn unmerged_paths(&self) -> Result<Vec<String>, GitError> {
        let output = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Point remote `branch` at `oid` if the remote still matches `lease`.
    pub fn push_with_lease(
        &self,
        remote: &str,
        oid: &Oid,
        branch: &str,
        lease: &Lease,
    ) -> Result<PushResult, GitError> {
        let lease_arg = format!("--force-with-lease=refs/heads/{branch}:{}", lease.expected());
        let refspec = format!("{}:refs/heads/{branch}", oid.as_str());
        self.push(&["push", "--porcelain", &lease_arg, remote, &refspec])
    }

    /// Delete remote `branch` if it still points at `expected`.
    pub fn delete_remote_branch(
        &self,
        remote: &str,
        branch: &str,
        expected: &Oid,
    ) -> Result<PushResult, GitError> {
        let lease_arg = format!("--force-with-lease=refs/heads/{branch}:{}", expected.as_str());
        let refspec = format!(":refs/heads/{branch}");
        self.push(&["push", "--porcelain", &lease_arg, remote, &refspec])
    }

    fn push(&self, args: &[&str]) -> Result<PushResult, GitError> {
        let output = self.run_unchecked(args)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            if stdout.contains("[up to date]") || stderr.contains("Everything up-to-date") {
                return Ok(PushResult::UpToDate);
            }
            return Ok(PushResult::Pushed);
        }
        let combined = format!("{stdout}{stderr}");
        if combined.contains("rejected")
            || combined.contains("stale info")
            || combined.contains("non-fast-forward")
        {
            return Ok(PushResult::Rejected(stderr.trim().to_string()));
        }
        Err(command_failed(args, &output))
    }
}

fn command_failed(args: &[&str], output: &Output) -> GitError {
    GitError::CommandFailed {
        command: args.join(" "),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

/// Whether `path` is one of `roots` or lies beneath one.
pub fn under_any(path: &str, roots: &[String]) -> bool {
    roots.iter().any(|root| {
        let root = root.trim_end_matches('/');
        path == root || Path::new(path).starts_with(root)
    })
}
