//! forge
//!
//! The PR/issue gateway.
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface for pull requests, issues,
//! comments, and labels on the hosting service. The engine only ever holds
//! a `&dyn Forge`; writes go through [`crate::engine::mutation`] so dry runs
//! can skip them.
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and request/response types
//! - [`github`]: GitHub implementation over REST
//! - [`mock`]: In-memory implementation for deterministic testing
//! - [`retry`]: Backoff for read-only lookups
//!
//! # Example
//!
//! ```ignore
//! use linecook::forge::{Forge, github::GitHubForge};
//!
//! let forge = GitHubForge::from_env(origin_url.as_deref())?;
//! let labeled = forge.find_open_issues("line-cook").await?;
//! ```

pub mod github;
pub mod mock;
pub mod retry;
mod traits;

pub use traits::*;
