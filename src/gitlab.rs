pub(crate) mod client;
pub(crate) mod project;
mod webhook;

pub use client::{Credentials, GitlabApi, GitlabApiError, GitlabClient, NewWebhook};
pub use project::GitlabProject;
pub use webhook::event::*;
pub use webhook::{check_webhook_token, deserialize_payload, webhook, EventName};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub type MergeRequestIid = u64;

/// A GitLab repository integrated in at least one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitlabRepository {
    /// Internal id, used as the key of everything stored about the repository.
    pub id: i64,
    /// Id of the project on the GitLab server.
    pub gitlab_repository_id: i64,
    /// Path with namespace, e.g. `root/repo01`.
    pub name: String,
    pub description: String,
    pub url: String,
    pub last_push_date: DateTime<Utc>,
}

impl GitlabRepository {
    pub fn from_project(id: i64, project: &GitlabProject) -> GitlabRepository {
        GitlabRepository {
            id,
            gitlab_repository_id: project.id,
            name: project.path_with_namespace.clone(),
            description: project.description.clone(),
            url: project.web_url.clone(),
            last_push_date: project.last_activity_at,
        }
    }

    /// Base URL of the GitLab server hosting this repository.
    pub fn server_url(&self) -> anyhow::Result<String> {
        let url = url::Url::parse(&self.url)?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("repository url {} has no host", self.url))?;
        Ok(match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        })
    }
}
