//! event command - Handle a GitHub webhook payload
//!
//! Only the fields the bot routes on are deserialized; everything else in
//! the payload is ignored.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use tracing::info;

use super::{command, read_input, sync, Session};
use crate::engine::{Context, SyncOptions};

/// The parts of a webhook payload the bot looks at.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub issue: Option<EventIssue>,
    #[serde(default)]
    pub pull_request: Option<EventItem>,
    #[serde(default)]
    pub comment: Option<EventComment>,
}

/// An issue, or a PR seen through the issues API.
#[derive(Debug, Deserialize)]
pub struct EventIssue {
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<EventLabel>,
    /// Present only when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct EventItem {
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<EventLabel>,
}

#[derive(Debug, Deserialize)]
pub struct EventLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EventComment {
    #[serde(default)]
    pub body: String,
    pub user: EventUser,
}

#[derive(Debug, Deserialize)]
pub struct EventUser {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// What an event asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAction {
    Command { pr: u64, body: String },
    Sync,
    Ignore(String),
}

/// Route a webhook payload.
pub fn classify(event: &WebhookEvent, bot_label: &str) -> EventAction {
    let action = event.action.as_deref().unwrap_or_default();

    if let Some(comment) = &event.comment {
        let on_pr = event
            .issue
            .as_ref()
            .filter(|issue| issue.pull_request.is_some());
        return match on_pr {
            Some(issue) if action == "created" && comment.user.kind != "Bot" => {
                EventAction::Command {
                    pr: issue.number,
                    body: comment.body.clone(),
                }
            }
            Some(_) if action != "created" => {
                EventAction::Ignore(format!("comment {action}"))
            }
            Some(_) => EventAction::Ignore(format!("comment by bot {}", comment.user.login)),
            None => EventAction::Ignore("comment is not on a pull request".to_string()),
        };
    }

    if action == "closed" {
        let labeled = |labels: &[EventLabel]| labels.iter().any(|l| l.name == bot_label);
        let closed_ours = event
            .pull_request
            .as_ref()
            .is_some_and(|pr| labeled(&pr.labels))
            || event
                .issue
                .as_ref()
                .is_some_and(|issue| labeled(&issue.labels));
        if closed_ours {
            return EventAction::Sync;
        }
        return EventAction::Ignore(format!("closed item without '{bot_label}'"));
    }

    EventAction::Ignore(format!("unhandled action '{action}'"))
}

/// Read the payload at `path` and act on it.
pub fn event(ctx: &Context, path: &PathBuf) -> Result<()> {
    let text = read_input(path)?;
    let payload: WebhookEvent =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    let session = Session::open(ctx)?;
    let action = classify(&payload, &session.config.bot_label);
    let rt = tokio::runtime::Runtime::new()?;

    match action {
        EventAction::Command { pr, body } => {
            let outcome = rt.block_on(command::run(ctx, &session, pr, &body))?;
            command::finish(ctx, pr, outcome.as_ref())
        }
        EventAction::Sync => {
            let summary = rt.block_on(sync::run(ctx, &session, &SyncOptions::default()))?;
            sync::finish(ctx, &summary)
        }
        EventAction::Ignore(reason) => {
            info!(%reason, "ignoring event");
            Ok(())
        }
    }
}
