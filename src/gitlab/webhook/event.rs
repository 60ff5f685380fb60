use crate::gitlab::MergeRequestIid;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The `project` object embedded in every GitLab webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookProject {
    pub id: i64,
    pub web_url: String,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequestEvent {
    pub object_kind: String,
    pub project: WebhookProject,
    pub object_attributes: MergeRequestAttributes,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequestAttributes {
    pub iid: MergeRequestIid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub object_kind: String,
    pub project: WebhookProject,
    #[serde(default)]
    pub commits: Vec<PushCommitPayload>,
}

#[derive(Debug, Deserialize)]
pub struct PushCommitPayload {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// What the reference processing needs to know about a merge request update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestWebhookData {
    pub event_kind: String,
    pub repository_external_id: i64,
    pub repository_url: String,
    pub merge_request_iid: MergeRequestIid,
    pub title: String,
    pub description: String,
    pub state: String,
}

impl From<MergeRequestEvent> for MergeRequestWebhookData {
    fn from(event: MergeRequestEvent) -> Self {
        MergeRequestWebhookData {
            event_kind: event.object_kind,
            repository_external_id: event.project.id,
            repository_url: event.project.web_url,
            merge_request_iid: event.object_attributes.iid,
            title: event.object_attributes.title,
            description: event.object_attributes.description.unwrap_or_default(),
            state: event.object_attributes.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushWebhookData {
    pub event_kind: String,
    pub repository_external_id: i64,
    pub repository_url: String,
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCommit {
    pub sha1: String,
    pub title: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committed_date: DateTime<Utc>,
}

impl From<PushEvent> for PushWebhookData {
    fn from(event: PushEvent) -> Self {
        PushWebhookData {
            event_kind: event.object_kind,
            repository_external_id: event.project.id,
            repository_url: event.project.web_url,
            commits: event
                .commits
                .into_iter()
                .map(|commit| PushCommit {
                    title: commit.title.unwrap_or_else(|| {
                        commit.message.lines().next().unwrap_or_default().to_string()
                    }),
                    sha1: commit.id,
                    message: commit.message,
                    author_name: commit.author.name,
                    author_email: commit.author.email,
                    committed_date: commit.timestamp,
                })
                .collect(),
        }
    }
}

/// An event triggered by a webhook.
#[derive(Debug)]
pub enum Event {
    /// A merge request was opened, updated, merged or closed.
    MergeRequest(MergeRequestWebhookData),
    /// One or more commits are pushed to a repository branch.
    Push(PushWebhookData),
}

impl Event {
    /// The GitLab id and web url identifying the repository the event comes from.
    pub fn repository_key(&self) -> (i64, &str) {
        match self {
            Event::MergeRequest(data) => (data.repository_external_id, &data.repository_url),
            Event::Push(data) => (data.repository_external_id, &data.repository_url),
        }
    }
}
