//! core
//!
//! Core domain types and pure logic for linecook.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, ShaPrefix, CookbookName
//! - [`config`] - Configuration schema and loading
//! - [`upstream`] - Resolved per-upstream settings and the registry
//! - [`trailer`] - Provenance trailer wire format
//! - [`naming`] - Names of bot-owned branches
//!
//! Nothing here touches the network or a repository.

pub mod config;
pub mod naming;
pub mod trailer;
pub mod types;
pub mod upstream;
