//! git::interface
//!
//! Read-side Git access using git2.
//!
//! Everything the bot learns about history (commits, ancestry, and the
//! content of a cookbook at a given commit) is read here. Content comparison
//! is done on tree-entry ids: two commits hold byte-identical content for a
//! path exactly when the path resolves to the same object id in both.
//!
//! Working-tree operations (cherry-pick, rebase, push) live in
//! [`super::worktree`] and shell out to the `git` CLI.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Commit or tree is missing
//! - [`GitError::CommandFailed`]: A `git` subprocess failed unexpectedly
//!
//! # Example
//!
//! ```ignore
//! use linecook::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let tip = git.resolve_ref("refs/remotes/fb_upstream/main")?;
//! let history = git.log(&tip, &[], Some("cookbooks/fb_apache"))?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// A `git` subprocess exited unsuccessfully.
    #[error("`git {command}` failed: {stderr}")]
    CommandFailed {
        /// Arguments passed to git
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// The `git` executable could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// Internal git2 error.
    #[error("internal git error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound if context.starts_with("refs/") => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidOid {
            oid: err.to_string(),
        }
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
    /// Number of parents (more than one for merges)
    pub parent_count: usize,
}

impl CommitInfo {
    /// `Name <email>`, as accepted by `git commit --author`.
    pub fn author_ident(&self) -> String {
        format!("{} <{}>", self.author_name, self.author_email)
    }

    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

/// The Git interface.
///
/// Reads use git2; [`super::worktree`] adds working-tree operations to the
/// same type.
pub struct Git {
    /// The underlying git2 repository
    pub(super) repo: git2::Repository,
    /// Working directory root
    pub(super) workdir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git").field("workdir", &self.workdir).finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let workdir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();
        Ok(Self { repo, workdir })
    }

    /// Root of the working tree.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?;
        Ok(Oid::new(commit.id().to_string())?)
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get HEAD commit OID.
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "refs/HEAD"))?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        Ok(Oid::new(commit.id().to_string())?)
    }

    /// Whether `oid` names a commit present in the object database.
    pub fn commit_exists(&self, oid: &Oid) -> bool {
        git2::Oid::from_str(oid.as_str())
            .ok()
            .and_then(|id| self.repo.find_commit(id).ok())
            .is_some()
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Find the merge base of two commits, if they share history.
    pub fn merge_base(&self, oid1: &Oid, oid2: &Oid) -> Result<Option<Oid>, GitError> {
        let a = to_git2(oid1)?;
        let b = to_git2(oid2)?;
        match self.repo.merge_base(a, b) {
            Ok(oid) => Ok(Some(Oid::new(oid.to_string())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "merge-base")),
        }
    }

    /// Common ancestor of every commit in `oids`, folded pairwise.
    ///
    /// Returns `None` for an empty slice or when some pair shares no history.
    pub fn merge_base_many(&self, oids: &[Oid]) -> Result<Option<Oid>, GitError> {
        let mut iter = oids.iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut acc = first.clone();
        for oid in iter {
            match self.merge_base(&acc, oid)? {
                Some(base) => acc = base,
                None => return Ok(None),
            }
        }
        Ok(Some(acc))
    }

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// Returns true if ancestor == descendant (a commit is its own ancestor).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        self.repo
            .graph_descendant_of(to_git2(descendant)?, to_git2(ancestor)?)
            .map_err(|e| GitError::from_git2(e, "graph_descendant_of"))
    }

    /// Commits reachable from `tip` but from none of `hide`, newest first.
    ///
    /// With `path`, only commits whose content at `path` differs from their
    /// first parent are kept. Order is topological, ties broken by time.
    pub fn log(&self, tip: &Oid, hide: &[Oid], path: Option<&str>) -> Result<Vec<Oid>, GitError> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        revwalk
            .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        revwalk
            .push(to_git2(tip)?)
            .map_err(|e| GitError::from_git2(e, tip.as_str()))?;
        for h in hide {
            revwalk
                .hide(to_git2(h)?)
                .map_err(|e| GitError::from_git2(e, h.as_str()))?;
        }

        let mut out = Vec::new();
        for id in revwalk {
            let id = id.map_err(|e| GitError::from_git2(e, "revwalk"))?;
            let oid = Oid::new(id.to_string())?;
            if let Some(path) = path {
                if !self.touches(&oid, path)? {
                    continue;
                }
            }
            out.push(oid);
        }
        Ok(out)
    }

    /// Like [`Git::log`] but ancestor-to-descendant.
    pub fn log_ascending(
        &self,
        tip: &Oid,
        hide: &[Oid],
        path: Option<&str>,
    ) -> Result<Vec<Oid>, GitError> {
        let mut commits = self.log(tip, hide, path)?;
        commits.reverse();
        Ok(commits)
    }

    // =========================================================================
    // Commit Information
    // =========================================================================

    /// Get information about a commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(oid)?;
        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            oid: oid.clone(),
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time,
            parent_count: commit.parent_count(),
        })
    }

    /// Tree id of a commit's root.
    pub fn tree_id(&self, oid: &Oid) -> Result<Oid, GitError> {
        let commit = self.find_commit(oid)?;
        Ok(Oid::new(commit.tree_id().to_string())?)
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Object id of `path` (a blob or tree) at `commit`, or None if absent.
    pub fn content_id(&self, commit: &Oid, path: &str) -> Result<Option<Oid>, GitError> {
        let tree = self
            .find_commit(commit)?
            .tree()
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        entry_id(&tree, path)
    }

    /// Whether `path` has different content at `a` and `b`.
    pub fn path_differs(&self, a: &Oid, b: &Oid, path: &str) -> Result<bool, GitError> {
        Ok(self.content_id(a, path)? != self.content_id(b, path)?)
    }

    /// Whether `commit` changes `path` relative to its first parent.
    ///
    /// A root commit touches every path it contains.
    pub fn touches(&self, commit: &Oid, path: &str) -> Result<bool, GitError> {
        let c = self.find_commit(commit)?;
        let here = entry_id(&c.tree().map_err(|e| GitError::from_git2(e, "tree"))?, path)?;
        let parent = match c.parent(0) {
            Ok(p) => entry_id(&p.tree().map_err(|e| GitError::from_git2(e, "tree"))?, path)?,
            Err(_) => None,
        };
        Ok(here != parent)
    }

    /// Names of the subdirectories of `dir` at `commit`.
    pub fn list_dirs(&self, commit: &Oid, dir: &str) -> Result<Vec<String>, GitError> {
        Ok(self.dir_entries(commit, dir)?.into_keys().collect())
    }

    /// Subdirectories of `dir` whose content differs between `commit` and its
    /// first parent.
    pub fn touched_dirs(&self, commit: &Oid, dir: &str) -> Result<BTreeSet<String>, GitError> {
        let here = self.dir_entries(commit, dir)?;
        let parent = match self.find_commit(commit)?.parent_id(0) {
            Ok(p) => self.dir_entries(&Oid::new(p.to_string())?, dir)?,
            Err(_) => BTreeMap::new(),
        };
        let names: BTreeSet<&String> = here.keys().chain(parent.keys()).collect();
        Ok(names
            .into_iter()
            .filter(|name| here.get(*name) != parent.get(*name))
            .cloned()
            .collect())
    }

    fn dir_entries(&self, commit: &Oid, dir: &str) -> Result<BTreeMap<String, git2::Oid>, GitError> {
        let tree = self
            .find_commit(commit)?
            .tree()
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let subtree = match tree.get_path(Path::new(dir)) {
            Ok(entry) if entry.kind() == Some(git2::ObjectType::Tree) => self
                .repo
                .find_tree(entry.id())
                .map_err(|e| GitError::from_git2(e, dir))?,
            _ => return Ok(BTreeMap::new()),
        };
        Ok(subtree
            .iter()
            .filter(|e| e.kind() == Some(git2::ObjectType::Tree))
            .filter_map(|e| e.name().map(|n| (n.to_string(), e.id())))
            .collect())
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    // =========================================================================
    // Remote Operations
    // =========================================================================

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, name)),
        }
    }

    /// Add a remote.
    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo
            .remote(name, url)
            .map(|_| ())
            .map_err(|e| GitError::from_git2(e, name))
    }
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

fn entry_id(tree: &git2::Tree<'_>, path: &str) -> Result<Option<Oid>, GitError> {
    match tree.get_path(Path::new(path)) {
        Ok(entry) => Ok(Some(Oid::new(entry.id().to_string())?)),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(GitError::from_git2(e, path)),
    }
}

/// Compare two remote URLs, ignoring a trailing `/` or `.git`.
pub fn same_remote_url(a: &str, b: &str) -> bool {
    fn norm(u: &str) -> &str {
        let u = u.trim().trim_end_matches('/');
        u.strip_suffix(".git").unwrap_or(u)
    }
    norm(a) == norm(b)
}
