use std::{fmt, sync::Arc};

use anyhow::Context as _;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use hyper::HeaderMap;
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::{Instrument, debug};
use tracing as log;
use uuid::Uuid;

use crate::gitlab::GitlabRepository;
use crate::handlers::Context;

pub mod event;

use event::{Event, MergeRequestEvent, PushEvent};

/// The name of a webhook event, as sent in the `X-Gitlab-Event` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    /// Merge request activity.
    ///
    /// This gets translated to [`Event::MergeRequest`] when sent to a handler.
    MergeRequest,
    /// One or more commits are pushed to a repository branch.
    ///
    /// This gets translated to [`Event::Push`] when sent to a handler.
    Push,
    /// All other unhandled webhooks.
    Other,
}

impl std::str::FromStr for EventName {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<EventName, Self::Err> {
        Ok(match s {
            "Merge Request Hook" => EventName::MergeRequest,
            "Push Hook" => EventName::Push,
            _ => EventName::Other,
        })
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                EventName::MergeRequest => "Merge Request Hook",
                EventName::Push => "Push Hook",
                EventName::Other => "other",
            }
        )
    }
}

pub fn deserialize_payload<T: serde::de::DeserializeOwned>(v: &str) -> anyhow::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(v);
    let res: Result<T, _> = serde_path_to_error::deserialize(&mut deserializer);
    match res {
        Ok(r) => Ok(r),
        Err(e) => Err(anyhow::anyhow!("webhook payload: {v}").context(e)),
    }
}

pub async fn webhook(
    headers: HeaderMap,
    State(ctx): State<Arc<Context>>,
    body: Bytes,
) -> axum::response::Response {
    let Some(ev) = headers.get("X-Gitlab-Event") else {
        tracing::error!("X-Gitlab-Event header must be set");
        return (StatusCode::BAD_REQUEST, "X-Gitlab-Event header must be set").into_response();
    };
    let Ok(ev) = ev.to_str() else {
        tracing::error!("X-Gitlab-Event header must be UTF-8 encoded");
        return (
            StatusCode::BAD_REQUEST,
            "X-Gitlab-Event header must be UTF-8 encoded",
        )
            .into_response();
    };
    let Ok(event) = ev.parse::<EventName>();

    debug!("event={event}");

    let Some(token) = headers.get("X-Gitlab-Token") else {
        tracing::error!("X-Gitlab-Token header must be set");
        return (StatusCode::BAD_REQUEST, "X-Gitlab-Token header must be set").into_response();
    };
    let Ok(token) = token.to_str() else {
        tracing::error!("X-Gitlab-Token header must be UTF-8 encoded");
        return (
            StatusCode::BAD_REQUEST,
            "X-Gitlab-Token header must be UTF-8 encoded",
        )
            .into_response();
    };

    let Ok(payload) = std::str::from_utf8(&body) else {
        tracing::error!("payload not utf-8");
        return (StatusCode::BAD_REQUEST, "Payload must be UTF-8").into_response();
    };

    let span = tracing::info_span!("webhook", request_id = %Uuid::new_v4(), %event);
    match process_payload(event, token, payload, &ctx)
        .instrument(span)
        .await
    {
        Ok(true) => ("processed request",).into_response(),
        Ok(false) => ("ignored request",).into_response(),
        Err(WebhookError::UnknownRepository) => {
            (StatusCode::NOT_FOUND, "Unknown repository").into_response()
        }
        Err(WebhookError::InvalidToken) => (StatusCode::FORBIDDEN, "Wrong token").into_response(),
        Err(WebhookError::Other(err)) => {
            tracing::error!("{err:?}");
            let body = format!("request failed: {err:?}");
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

#[derive(Debug)]
pub(crate) enum WebhookError {
    /// No integrated repository matches the payload's project.
    UnknownRepository,
    /// The `X-Gitlab-Token` header does not match the repository's webhook secret.
    InvalidToken,
    Other(anyhow::Error),
}

impl From<anyhow::Error> for WebhookError {
    fn from(e: anyhow::Error) -> WebhookError {
        WebhookError::Other(e)
    }
}

pub(crate) async fn process_payload(
    event: EventName,
    token: &str,
    payload: &str,
    ctx: &Context,
) -> Result<bool, WebhookError> {
    let event = match event {
        EventName::MergeRequest => {
            let payload = deserialize_payload::<MergeRequestEvent>(payload)
                .context("failed to deserialize MergeRequestEvent")?;
            Event::MergeRequest(payload.into())
        }
        EventName::Push => {
            let payload = deserialize_payload::<PushEvent>(payload)
                .context("failed to deserialize PushEvent")?;
            Event::Push(payload.into())
        }
        // Other events need not be handled
        EventName::Other => {
            return Ok(false);
        }
    };

    let (gitlab_repository_id, url) = event.repository_key();
    let Some(repository) = ctx
        .repositories
        .find_by_gitlab_id_and_url(gitlab_repository_id, url)
        .await?
    else {
        log::warn!("no integrated repository for GitLab project {gitlab_repository_id} ({url})");
        return Err(WebhookError::UnknownRepository);
    };

    let Some(webhook) = ctx.repositories.webhook(repository.id).await? else {
        log::warn!("no webhook secret stored for repository {}", repository.id);
        return Err(WebhookError::InvalidToken);
    };
    if let Err(err) = check_webhook_token(webhook.secret.expose_secret(), token) {
        log::error!("check_webhook_token: {err}");
        return Err(WebhookError::InvalidToken);
    }

    log::info!("{}", event_summary(&event, &repository));
    log::debug!("authenticated event {event:?}");

    crate::handlers::handle(ctx, &repository, &event).await?;
    Ok(true)
}

/// One line about an authenticated event, without any of its free text.
fn event_summary(event: &Event, repository: &GitlabRepository) -> String {
    match event {
        Event::MergeRequest(data) => format!(
            "handling merge request {} of {}",
            data.merge_request_iid, repository.name
        ),
        Event::Push(data) => format!(
            "handling push event on {} with {} commits",
            repository.name,
            data.commits.len()
        ),
    }
}

#[derive(Debug)]
pub struct InvalidWebhookToken;

impl fmt::Display for InvalidWebhookToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "webhook token does not match the repository secret")
    }
}

impl std::error::Error for InvalidWebhookToken {}

/// Constant time comparison of the secret GitLab sends back with the stored one.
pub fn check_webhook_token(expected: &str, given: &str) -> Result<(), InvalidWebhookToken> {
    if expected.is_empty() {
        return Err(InvalidWebhookToken);
    }
    if bool::from(expected.as_bytes().ct_eq(given.as_bytes())) {
        Ok(())
    } else {
        Err(InvalidWebhookToken)
    }
}
