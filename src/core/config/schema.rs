//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```yaml
//! bot_label: line-cook
//! split_label: line-cook-pr-split
//! bot_command_prefix: "#linecook"
//! base_branch: main
//! pr_branch_prefix: line-cook
//! cookbooks_dir: cookbooks
//! upstream_overrides:
//!   prefix: fb
//!   repo_url: https://www.github.com/facebook/chef-cookbooks.git
//!   ignore_cookbooks: [fb_init, fb_init_sample]
//! universe_upstreams:
//!   pdcookbooks:
//!     prefix: pd
//!     repo_url: https://github.com/pd/cookbooks.git
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing. Prefix uniqueness is checked when the
//! [`UpstreamRegistry`](crate::core::upstream::UpstreamRegistry) is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Default primary upstream prefix.
pub const DEFAULT_PRIMARY_PREFIX: &str = "fb";

/// Default primary upstream repository.
pub const DEFAULT_PRIMARY_REPO_URL: &str = "https://www.github.com/facebook/chef-cookbooks.git";

/// Cookbooks the primary upstream ships that downstream repos never track.
pub const DEFAULT_PRIMARY_IGNORES: [&str; 2] = ["fb_init", "fb_init_sample"];

/// Bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Label applied to every PR and issue the bot opens
    pub bot_label: String,

    /// Label applied to both halves of a split PR
    pub split_label: String,

    /// Comment prefix that addresses the bot (e.g. `#linecook`)
    pub bot_command_prefix: String,

    /// Downstream branch that sync PRs target
    pub base_branch: String,

    /// Namespace for bot-owned branches
    pub pr_branch_prefix: String,

    /// Directory holding cookbooks, both downstream and upstream
    pub cookbooks_dir: String,

    /// Overrides for the primary upstream; unset fields keep their defaults
    pub upstream_overrides: UpstreamEntry,

    /// Secondary upstreams keyed by a human-readable name
    pub universe_upstreams: BTreeMap<String, UpstreamEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_label: "line-cook".to_string(),
            split_label: "line-cook-pr-split".to_string(),
            bot_command_prefix: "#linecook".to_string(),
            base_branch: "main".to_string(),
            pr_branch_prefix: "line-cook".to_string(),
            cookbooks_dir: "cookbooks".to_string(),
            upstream_overrides: UpstreamEntry::default(),
            universe_upstreams: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("bot_label", &self.bot_label),
            ("split_label", &self.split_label),
            ("bot_command_prefix", &self.bot_command_prefix),
            ("cookbooks_dir", &self.cookbooks_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!("'{field}' cannot be empty")));
            }
        }
        if self.bot_command_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(format!(
                "bot_command_prefix '{}' cannot contain whitespace",
                self.bot_command_prefix
            )));
        }

        BranchName::new(self.base_branch.as_str()).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid base_branch: {e}"))
        })?;
        BranchName::new(self.pr_branch_prefix.as_str()).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid pr_branch_prefix: {e}"))
        })?;

        for (name, entry) in &self.universe_upstreams {
            if entry.prefix.as_deref().map_or(true, |p| p.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(format!(
                    "upstream '{name}' missing required 'prefix'"
                )));
            }
            if entry.repo_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(format!(
                    "upstream '{name}' missing required 'repo_url'"
                )));
            }
        }

        Ok(())
    }
}

/// One upstream as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamEntry {
    /// Cookbook namespace, e.g. `pd` for `pd_nginx`
    pub prefix: Option<String>,

    /// Fetch URL for the upstream repository
    pub repo_url: Option<String>,

    /// Upstream branch to follow (default: "main")
    pub branch: Option<String>,

    /// Cookbooks under this prefix that are never synced
    pub ignore_cookbooks: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn parses_full_example() {
        let yaml = r##"
bot_label: line-cook
split_label: line-cook-pr-split
bot_command_prefix: "#linecook"
base_branch: main
pr_branch_prefix: line-cook
upstream_overrides:
  prefix: fb
  ignore_cookbooks: [fb_init]
universe_upstreams:
  pdcookbooks:
    prefix: pd
    repo_url: https://github.com/pd/cookbooks.git
    branch: trunk
"##;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        let pd = &config.universe_upstreams["pdcookbooks"];
        assert_eq!(pd.prefix.as_deref(), Some("pd"));
        assert_eq!(pd.branch.as_deref(), Some("trunk"));
        assert_eq!(
            config.upstream_overrides.ignore_cookbooks,
            Some(vec!["fb_init".to_string()])
        );
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("bot_labl: oops\n");
        assert!(result.is_err());
    }

    #[test]
    fn missing_prefix_rejected() {
        let mut config = Config::default();
        config.universe_upstreams.insert(
            "broken".into(),
            UpstreamEntry {
                repo_url: Some("https://example.com/x.git".into()),
                ..Default::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing required 'prefix'"));
    }

    #[test]
    fn missing_repo_url_rejected() {
        let mut config = Config::default();
        config.universe_upstreams.insert(
            "broken".into(),
            UpstreamEntry {
                prefix: Some("pd".into()),
                ..Default::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing required 'repo_url'"));
    }

    #[test]
    fn command_prefix_with_space_rejected() {
        let config = Config {
            bot_command_prefix: "# linecook".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_base_branch_rejected() {
        let config = Config {
            base_branch: "bad..branch".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
