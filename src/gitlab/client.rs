use super::project::GitlabProject;
use crate::gitlab::MergeRequestIid;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use tracing as log;

/// Where to reach a GitLab server and with which bot token.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub server_url: String,
    pub token: SecretString,
}

impl Credentials {
    pub fn new(server_url: impl Into<String>, token: SecretString) -> Credentials {
        Credentials {
            server_url: server_url.into(),
            token,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{path}", self.server_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitlabApiError {
    /// The server could not be reached or answered with an error status.
    Request {
        status: Option<StatusCode>,
        message: String,
    },
    /// The server answered successfully but with a body we cannot use.
    Response(String),
}

impl fmt::Display for GitlabApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GitlabApiError::Request {
                status: Some(status),
                message,
            } => write!(f, "GitLab request failed with status {status}: {message}"),
            GitlabApiError::Request {
                status: None,
                message,
            } => write!(f, "GitLab request failed: {message}"),
            GitlabApiError::Response(msg) => write!(f, "unexpected GitLab response: {msg}"),
        }
    }
}

impl std::error::Error for GitlabApiError {}

pub struct NewWebhook<'a> {
    pub url: &'a str,
    pub secret: &'a str,
}

/// The subset of the GitLab REST API (v4) used by the bot.
#[async_trait]
pub trait GitlabApi: Send + Sync {
    async fn get_project(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
    ) -> Result<GitlabProject, GitlabApiError>;

    /// Returns the id of the created hook.
    async fn create_webhook(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
        hook: &NewWebhook<'_>,
    ) -> Result<i64, GitlabApiError>;

    async fn delete_webhook(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
        hook_id: i64,
    ) -> Result<(), GitlabApiError>;

    async fn post_merge_request_note(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
        iid: MergeRequestIid,
        body: &str,
    ) -> Result<(), GitlabApiError>;
}

#[derive(Clone)]
pub struct GitlabClient {
    client: Client,
}

impl GitlabClient {
    pub fn new() -> Self {
        GitlabClient {
            client: Client::new(),
        }
    }

    async fn send_req(&self, req: RequestBuilder) -> Result<Bytes, GitlabApiError> {
        log::debug!("send_req with {:?}", req);
        let resp = req.send().await.map_err(|e| GitlabApiError::Request {
            status: e.status(),
            message: e.to_string(),
        })?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| GitlabApiError::Request {
            status: Some(status),
            message: format!("failed to read response body: {e}"),
        })?;
        if !status.is_success() {
            return Err(GitlabApiError::Request {
                status: Some(status),
                message: server_message(&body),
            });
        }
        Ok(body)
    }

    async fn json(&self, req: RequestBuilder) -> Result<Value, GitlabApiError> {
        let body = self.send_req(req).await?;
        serde_json::from_slice(&body)
            .map_err(|e| GitlabApiError::Response(format!("invalid JSON body: {e}")))
    }

    fn get(&self, credentials: &Credentials, path: &str) -> RequestBuilder {
        let url = credentials.api_url(path);
        log::trace!("get {:?}", url);
        self.client.get(url).configure(credentials)
    }

    fn post(&self, credentials: &Credentials, path: &str) -> RequestBuilder {
        let url = credentials.api_url(path);
        log::trace!("post {:?}", url);
        self.client.post(url).configure(credentials)
    }

    fn delete(&self, credentials: &Credentials, path: &str) -> RequestBuilder {
        let url = credentials.api_url(path);
        log::trace!("delete {:?}", url);
        self.client.delete(url).configure(credentials)
    }
}

#[async_trait]
impl GitlabApi for GitlabClient {
    async fn get_project(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
    ) -> Result<GitlabProject, GitlabApiError> {
        let body = self
            .json(self.get(credentials, &format!("/projects/{gitlab_repository_id}")))
            .await?;
        GitlabProject::from_api_response(body)
    }

    async fn create_webhook(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
        hook: &NewWebhook<'_>,
    ) -> Result<i64, GitlabApiError> {
        let body = self
            .json(
                self.post(credentials, &format!("/projects/{gitlab_repository_id}/hooks"))
                    .json(&serde_json::json!({
                        "url": hook.url,
                        "token": hook.secret,
                        "push_events": true,
                        "merge_requests_events": true,
                        "enable_ssl_verification": true,
                    })),
            )
            .await?;
        body["id"].as_i64().ok_or_else(|| {
            GitlabApiError::Response("created webhook has no numeric `id`".to_string())
        })
    }

    async fn delete_webhook(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
        hook_id: i64,
    ) -> Result<(), GitlabApiError> {
        let req = self.delete(
            credentials,
            &format!("/projects/{gitlab_repository_id}/hooks/{hook_id}"),
        );
        self.send_req(req).await?;
        Ok(())
    }

    async fn post_merge_request_note(
        &self,
        credentials: &Credentials,
        gitlab_repository_id: i64,
        iid: MergeRequestIid,
        body: &str,
    ) -> Result<(), GitlabApiError> {
        #[derive(serde::Serialize)]
        struct PostNote<'a> {
            body: &'a str,
        }
        self.send_req(
            self.post(
                credentials,
                &format!("/projects/{gitlab_repository_id}/merge_requests/{iid}/notes"),
            )
            .json(&PostNote { body }),
        )
        .await?;
        Ok(())
    }
}

/// GitLab reports errors as `{"message": ...}` or `{"error": ...}`.
fn server_message(body: &[u8]) -> String {
    let raw = || String::from_utf8_lossy(body).into_owned();
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return raw();
    };
    match value.get("message").or_else(|| value.get("error")) {
        Some(Value::String(msg)) => msg.clone(),
        Some(other) => other.to_string(),
        None => raw(),
    }
}

trait RequestSend: Sized {
    fn configure(self, credentials: &Credentials) -> Self;
}

impl RequestSend for RequestBuilder {
    fn configure(self, credentials: &Credentials) -> RequestBuilder {
        let req = self.header(USER_AGENT, "refbot");
        match HeaderValue::from_str(credentials.token.expose_secret()) {
            Ok(mut token) => {
                token.set_sensitive(true);
                req.header("PRIVATE-TOKEN", token)
            }
            Err(_) => {
                // GitLab answers 401, which is reported like any other refusal.
                log::warn!("bot api token is not a valid header value, sending without it");
                req
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_server_message() {
        assert_eq!(server_message(br#"{"message":"401 Unauthorized"}"#), "401 Unauthorized");
        assert_eq!(server_message(br#"{"error":"insufficient_scope"}"#), "insufficient_scope");
        assert_eq!(
            server_message(br#"{"message":{"url":["is blocked"]}}"#),
            r#"{"url":["is blocked"]}"#
        );
        assert_eq!(server_message(b"Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn api_url() {
        let credentials = Credentials::new("https://gitlab.example.com/", "t".to_string().into());
        assert_eq!(
            credentials.api_url("/projects/1"),
            "https://gitlab.example.com/api/v4/projects/1"
        );
    }

    #[test]
    fn error_messages() {
        let err = GitlabApiError::Request {
            status: Some(StatusCode::UNAUTHORIZED),
            message: "401 Unauthorized".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "GitLab request failed with status 401 Unauthorized: 401 Unauthorized"
        );
        assert_eq!(
            GitlabApiError::Response("x".to_string()).to_string(),
            "unexpected GitLab response: x"
        );
    }
}
