//! core::upstream
//!
//! The upstream registry: resolved, immutable per-upstream settings.
//!
//! Every upstream is resolved once into an [`UpstreamConfig`] and that value
//! is handed to the sync engine, baseline detector, reporter, and command
//! handlers. Nothing downstream of the registry re-derives settings from a
//! bare prefix string.
//!
//! # Trailer keys
//!
//! The primary upstream records provenance under `Upstream-Commit`. Every
//! other upstream uses `{prefix}_Upstream-Commit`, with the prefix spelled
//! exactly as configured, so two upstreams can never write the same key.

use std::collections::BTreeSet;

use crate::core::config::schema::{
    Config, UpstreamEntry, DEFAULT_PRIMARY_IGNORES, DEFAULT_PRIMARY_PREFIX,
    DEFAULT_PRIMARY_REPO_URL,
};
use crate::core::config::ConfigError;
use crate::core::types::CookbookName;

/// Trailer key used by the primary upstream.
pub const PRIMARY_TRAILER_KEY: &str = "Upstream-Commit";

/// Default upstream branch when none is configured.
pub const DEFAULT_UPSTREAM_BRANCH: &str = "main";

/// Name used for the primary upstream in logs.
pub const PRIMARY_NAME: &str = "primary";

/// A fully resolved upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Config name (`primary` for the primary upstream)
    pub name: String,
    /// Cookbook namespace
    pub prefix: String,
    /// Fetch URL
    pub repo_url: String,
    /// Local remote name, `{prefix}_upstream`
    pub remote_name: String,
    /// Upstream branch followed
    pub branch: String,
    /// Cookbooks never synced
    pub ignore_cookbooks: BTreeSet<String>,
    /// Whether this is the primary upstream
    pub is_primary: bool,
    /// Trailer key recording provenance for this upstream
    pub trailer_key: String,
}

impl UpstreamConfig {
    /// Build a resolved upstream. `remote_name` and `trailer_key` are derived.
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        repo_url: impl Into<String>,
        branch: impl Into<String>,
        ignore_cookbooks: impl IntoIterator<Item = String>,
        is_primary: bool,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            name: name.into(),
            remote_name: format!("{prefix}_upstream"),
            trailer_key: Self::trailer_key_for(&prefix, is_primary),
            prefix,
            repo_url: repo_url.into(),
            branch: branch.into(),
            ignore_cookbooks: ignore_cookbooks.into_iter().collect(),
            is_primary,
        }
    }

    /// The trailer key for an upstream.
    ///
    /// ```
    /// use linecook::core::upstream::UpstreamConfig;
    ///
    /// assert_eq!(UpstreamConfig::trailer_key_for("fb", true), "Upstream-Commit");
    /// assert_eq!(UpstreamConfig::trailer_key_for("pd", false), "pd_Upstream-Commit");
    /// ```
    pub fn trailer_key_for(prefix: &str, is_primary: bool) -> String {
        if is_primary {
            PRIMARY_TRAILER_KEY.to_string()
        } else {
            format!("{prefix}_{PRIMARY_TRAILER_KEY}")
        }
    }

    /// Whether the cookbook is namespaced under this upstream's prefix.
    pub fn namespaces(&self, cookbook: &CookbookName) -> bool {
        cookbook.has_prefix(&self.prefix)
    }

    /// Whether the cookbook is namespaced here and not ignored.
    pub fn owns(&self, cookbook: &CookbookName) -> bool {
        self.namespaces(cookbook) && !self.ignore_cookbooks.contains(cookbook.as_str())
    }

    /// Remote-tracking ref for the followed branch.
    pub fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote_name, self.branch)
    }

    /// Whether `key` is this upstream's trailer key.
    pub fn is_trailer_key(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case(&self.trailer_key)
    }
}

/// All configured upstreams, primary first.
#[derive(Debug, Clone)]
pub struct UpstreamRegistry {
    upstreams: Vec<UpstreamConfig>,
}

impl UpstreamRegistry {
    /// Resolve every upstream from config.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if two upstreams share a prefix or
    /// an entry is missing `prefix` or `repo_url`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut upstreams = vec![Self::resolve_primary(&config.upstream_overrides)];

        for (name, entry) in &config.universe_upstreams {
            let prefix = required(name, "prefix", entry.prefix.as_deref())?;
            let repo_url = required(name, "repo_url", entry.repo_url.as_deref())?;
            upstreams.push(UpstreamConfig::new(
                name.as_str(),
                prefix,
                repo_url,
                entry
                    .branch
                    .clone()
                    .unwrap_or_else(|| DEFAULT_UPSTREAM_BRANCH.to_string()),
                entry.ignore_cookbooks.clone().unwrap_or_default(),
                false,
            ));
        }

        Self::new(upstreams)
    }

    /// Build a registry from already-resolved upstreams.
    pub fn new(upstreams: Vec<UpstreamConfig>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for upstream in &upstreams {
            if !seen.insert(upstream.prefix.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "Duplicate upstream prefix '{}'",
                    upstream.prefix
                )));
            }
        }
        if upstreams.iter().filter(|u| u.is_primary).count() > 1 {
            return Err(ConfigError::InvalidValue(
                "only one upstream may be primary".into(),
            ));
        }
        Ok(Self { upstreams })
    }

    fn resolve_primary(overrides: &UpstreamEntry) -> UpstreamConfig {
        UpstreamConfig::new(
            PRIMARY_NAME,
            overrides
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_PREFIX.to_string()),
            overrides
                .repo_url
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_REPO_URL.to_string()),
            overrides
                .branch
                .clone()
                .unwrap_or_else(|| DEFAULT_UPSTREAM_BRANCH.to_string()),
            overrides.ignore_cookbooks.clone().unwrap_or_else(|| {
                DEFAULT_PRIMARY_IGNORES.iter().map(|s| s.to_string()).collect()
            }),
            true,
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpstreamConfig> {
        self.upstreams.iter()
    }

    pub fn len(&self) -> usize {
        self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty()
    }

    pub fn primary(&self) -> Option<&UpstreamConfig> {
        self.upstreams.iter().find(|u| u.is_primary)
    }

    pub fn by_prefix(&self, prefix: &str) -> Option<&UpstreamConfig> {
        self.upstreams.iter().find(|u| u.prefix == prefix)
    }

    /// The upstream whose prefix namespaces `cookbook`.
    ///
    /// When prefixes nest (`pd` and `pd_ext`), the longest match wins.
    pub fn for_cookbook(&self, cookbook: &str) -> Option<&UpstreamConfig> {
        let cookbook = CookbookName::new(cookbook).ok()?;
        self.upstreams
            .iter()
            .filter(|u| u.namespaces(&cookbook))
            .max_by_key(|u| u.prefix.len())
    }

    pub fn by_trailer_key(&self, key: &str) -> Option<&UpstreamConfig> {
        self.upstreams.iter().find(|u| u.is_trailer_key(key))
    }

    /// Restrict to the named prefixes; an empty filter selects everything.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a prefix that is not configured.
    pub fn select(&self, prefixes: &[String]) -> Result<Vec<&UpstreamConfig>, ConfigError> {
        if prefixes.is_empty() {
            return Ok(self.upstreams.iter().collect());
        }
        prefixes
            .iter()
            .map(|p| {
                self.by_prefix(p).ok_or_else(|| {
                    ConfigError::InvalidValue(format!("no upstream with prefix '{p}'"))
                })
            })
            .collect()
    }
}

fn required<'a>(name: &str, field: &str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        ConfigError::InvalidValue(format!("upstream '{name}' missing required '{field}'"))
    })
}
