//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the only doorway to Git. No other module imports `git2`
//! or spawns `git`.
//!
//! - [`interface`] reads history through `git2`: refs, ancestry, commit
//!   metadata, and the content id of a path at a commit.
//! - [`worktree`] drives the working tree through the `git` CLI:
//!   fetch, cherry-pick, rebase, and pushes guarded by `--force-with-lease`.
//!
//! # Invariants
//!
//! - Every remote branch rewrite carries a lease.
//! - Interrupted cherry-picks and rebases are aborted before returning.
//! - All operations return strong types (`Oid`, outcome enums).
//!
//! # Example
//!
//! ```ignore
//! use linecook::git::{Git, Lease};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! git.fetch_branch("fb_upstream", "main")?;
//! let tip = git.resolve_ref("refs/remotes/fb_upstream/main")?;
//! git.push_with_lease("origin", &tip, "line-cook/fb_/update", &Lease::Absent)?;
//! ```

mod interface;
mod worktree;

pub use interface::{same_remote_url, CommitInfo, Git, GitError};
pub use worktree::{under_any, ApplyOutcome, ConflictedFile, Lease, PushResult, ReplayOutcome};
