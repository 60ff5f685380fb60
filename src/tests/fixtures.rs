use super::fakes::{FakeGitlab, FakeStore, RecordingCommenter};
use crate::config::Config;
use crate::gitlab::{GitlabProject, GitlabRepository, MergeRequestWebhookData, PushCommit};
use crate::handlers::Context;
use bon::builder;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

pub const WEBHOOK_URL: &str = "https://refbot.example.com/gitlab-hook";

#[builder]
pub fn repository(
    id: Option<i64>,
    gitlab_repository_id: Option<i64>,
    name: Option<&str>,
    url: Option<&str>,
) -> GitlabRepository {
    GitlabRepository {
        id: id.unwrap_or(1),
        gitlab_repository_id: gitlab_repository_id.unwrap_or(123654),
        name: name.unwrap_or("root/repo01").to_string(),
        description: String::new(),
        url: url.unwrap_or("https://example.com/root/repo01").to_string(),
        last_push_date: Utc.with_ymd_and_hms(2020, 11, 12, 0, 0, 0).unwrap(),
    }
}

#[builder]
pub fn merge_request_data(
    iid: Option<u64>,
    title: Option<&str>,
    description: Option<&str>,
    state: Option<&str>,
) -> MergeRequestWebhookData {
    MergeRequestWebhookData {
        event_kind: "merge_request".to_string(),
        repository_external_id: 123654,
        repository_url: "https://example.com/root/repo01".to_string(),
        merge_request_iid: iid.unwrap_or(2),
        title: title.unwrap_or("").to_string(),
        description: description.unwrap_or("").to_string(),
        state: state.unwrap_or("opened").to_string(),
    }
}

#[builder]
pub fn push_commit(sha1: Option<&str>, message: Option<&str>) -> PushCommit {
    let message = message.unwrap_or("Initial commit").to_string();
    PushCommit {
        sha1: sha1
            .unwrap_or("feff4ced04b237abb8b4a50b4160099313152c3c")
            .to_string(),
        title: message.lines().next().unwrap_or_default().to_string(),
        message,
        author_name: "John Snow".to_string(),
        author_email: "john-snow@example.com".to_string(),
        committed_date: Utc.with_ymd_and_hms(2020, 12, 3, 10, 0, 0).unwrap(),
    }
}

#[builder]
pub fn gitlab_project(id: Option<i64>, path_with_namespace: Option<&str>) -> GitlabProject {
    let path = path_with_namespace.unwrap_or("root/repo01");
    GitlabProject {
        id: id.unwrap_or(123654),
        description: "My GitLab project".to_string(),
        web_url: format!("https://example.com/{path}"),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path_with_namespace: path.to_string(),
        last_activity_at: Utc.with_ymd_and_hms(2020, 11, 12, 0, 0, 0).unwrap(),
    }
}

/// A context backed by `store`, a GitLab answering nothing, and a commenter that records.
pub fn test_context(store: &FakeStore) -> Context {
    context_with(
        store,
        Arc::new(FakeGitlab::default()),
        Arc::new(RecordingCommenter::default()),
    )
}

pub fn context_with(
    store: &FakeStore,
    gitlab: Arc<FakeGitlab>,
    commenter: Arc<RecordingCommenter>,
) -> Context {
    let config = Config::default();
    Context {
        parser: config.reference_parser().unwrap(),
        config: Arc::new(config),
        repositories: Arc::new(store.clone()),
        merge_requests: Arc::new(store.clone()),
        commits: Arc::new(store.clone()),
        cross_references: Arc::new(store.clone()),
        artifacts: Arc::new(store.clone()),
        users: Arc::new(store.clone()),
        gitlab,
        commenter,
        webhook_url: WEBHOOK_URL.to_string(),
    }
}
