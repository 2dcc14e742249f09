//! engine::ledger
//!
//! The sync read model, rebuilt from downstream history on every run.
//!
//! Nothing about sync progress is stored anywhere except in commit trailers
//! on the base branch. One walk over the base branch, newest first, yields
//! for each upstream:
//!
//! - the **pointer**: the newest upstream commit any trailer references
//!   (newest by upstream ancestry, so re-applying an older commit later
//!   never moves it backwards);
//! - the **last-synced** upstream commit per cookbook, taken from the newest
//!   trailer-bearing commit that touches the cookbook;
//! - the newest **marker**: a trailer-bearing commit touching none of the
//!   upstream's cookbooks (the merged Bootstrap PR). A marker is a floor for
//!   every cookbook of that upstream.
//!
//! Trailer values that do not name a commit reachable from the upstream's
//! tracking ref are ignored.

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::trailer::values_for;
use crate::core::types::Oid;
use crate::core::upstream::{UpstreamConfig, UpstreamRegistry};
use crate::git::{Git, GitError};

/// An upstream commit recorded by a downstream commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced {
    /// Upstream commit named by the trailer
    pub upstream: Oid,
    /// Downstream commit carrying the trailer
    pub downstream: Oid,
    /// Position in the newest-first walk (0 is the base tip)
    pub age: usize,
}

/// Sync state for one upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamLedger {
    pub pointer: Option<Oid>,
    pub last_synced: BTreeMap<String, Synced>,
    pub marker: Option<Synced>,
}

impl UpstreamLedger {
    /// The recorded floor for `cookbook`: its last-synced commit or the
    /// marker, whichever the base branch recorded more recently.
    pub fn floor(&self, cookbook: &str) -> Option<&Oid> {
        let own = self.last_synced.get(cookbook);
        let marker = self.marker.as_ref();
        match (own, marker) {
            (Some(a), Some(b)) => Some(if a.age <= b.age { &a.upstream } else { &b.upstream }),
            (Some(a), None) => Some(&a.upstream),
            (None, Some(b)) => Some(&b.upstream),
            (None, None) => None,
        }
    }
}

/// Sync state for every upstream, keyed by prefix.
#[derive(Debug, Clone, Default)]
pub struct ReadModel {
    upstreams: BTreeMap<String, UpstreamLedger>,
}

impl ReadModel {
    /// Walk the base branch once and collect every upstream's state.
    ///
    /// `upstreams` pairs each upstream with the tip of its tracking ref.
    pub fn build(
        git: &Git,
        base_tip: &Oid,
        cookbooks_dir: &str,
        registry: &UpstreamRegistry,
        upstreams: &[(&UpstreamConfig, Oid)],
    ) -> Result<Self, GitError> {
        let mut model = ReadModel::default();
        for (upstream, _) in upstreams {
            model
                .upstreams
                .insert(upstream.prefix.clone(), UpstreamLedger::default());
        }

        for (age, commit) in git.log(base_tip, &[], None)?.into_iter().enumerate() {
            let message = git.commit_info(&commit)?.message;

            for (upstream, tip) in upstreams {
                let values = values_for(&message, &upstream.trailer_key);
                if values.is_empty() {
                    continue;
                }
                let Some(best) = newest_valid(git, &values, tip)? else {
                    debug!(upstream = %upstream.prefix, commit = %commit.short(8), "trailer values not in upstream history");
                    continue;
                };
                let Some(ledger) = model.upstreams.get_mut(&upstream.prefix) else {
                    continue;
                };

                ledger.pointer = match ledger.pointer.take() {
                    Some(current) if !git.is_ancestor(&current, &best)? => Some(current),
                    _ => Some(best.clone()),
                };

                let synced = Synced {
                    upstream: best,
                    downstream: commit.clone(),
                    age,
                };
                let touched: Vec<String> = git
                    .touched_dirs(&commit, cookbooks_dir)?
                    .into_iter()
                    .filter(|name| {
                        registry
                            .for_cookbook(name)
                            .is_some_and(|owner| owner.prefix == upstream.prefix)
                    })
                    .collect();

                if touched.is_empty() {
                    if ledger.marker.is_none() {
                        ledger.marker = Some(synced);
                    }
                } else {
                    for cookbook in touched {
                        ledger
                            .last_synced
                            .entry(cookbook)
                            .or_insert_with(|| synced.clone());
                    }
                }
            }
        }

        Ok(model)
    }

    /// State for `prefix`; empty if the upstream was not part of the walk.
    pub fn upstream(&self, prefix: &str) -> UpstreamLedger {
        self.upstreams.get(prefix).cloned().unwrap_or_default()
    }
}

/// The value that all others are ancestors of, among those reachable from
/// `tip`. Ties between unrelated values go to the first listed.
fn newest_valid(git: &Git, values: &[String], tip: &Oid) -> Result<Option<Oid>, GitError> {
    let mut best: Option<Oid> = None;
    for value in values {
        let Ok(oid) = Oid::new(value.as_str()) else {
            continue;
        };
        if !git.commit_exists(&oid) || !git.is_ancestor(&oid, tip)? {
            continue;
        }
        best = match best {
            Some(current) if !git.is_ancestor(&current, &oid)? => Some(current),
            _ => Some(oid),
        };
    }
    Ok(best)
}
