//! Replacement of the token the bot uses to talk to a GitLab repository.
//!
//! The new token is only stored once it proved usable: the project must be readable
//! with it, and the repository webhook is recreated with it (with a new secret).

use super::Context;
use crate::db::{User, WebhookRecord};
use crate::errors::RepositoryError;
use crate::gitlab::{Credentials, GitlabApiError, GitlabRepository, NewWebhook};
use axum::http::StatusCode;
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use tracing as log;

const WEBHOOK_SECRET_LEN: usize = 32;

#[derive(Debug, serde::Deserialize)]
pub struct BotApiTokenRequest {
    pub gitlab_repository_id: i64,
    pub gitlab_repository_url: String,
    #[serde(deserialize_with = "secret")]
    pub gitlab_bot_api_token: SecretString,
}

pub(super) fn secret<'de, D: serde::Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    <String as serde::Deserialize>::deserialize(d).map(SecretString::from)
}

pub async fn update_bot_api_token(
    ctx: &Context,
    user: &User,
    request: &BotApiTokenRequest,
) -> Result<(), RepositoryError> {
    let Some(repository) = ctx
        .repositories
        .find_by_gitlab_id_and_url(request.gitlab_repository_id, &request.gitlab_repository_url)
        .await?
    else {
        return Err(RepositoryError::NotFound);
    };

    if !is_admin_of_an_integration(ctx, user, &repository).await? {
        log::info!(
            "user {} is not git administrator of a project {} is integrated in",
            user.name,
            repository.name
        );
        return Err(RepositoryError::NotFound);
    }

    let credentials = Credentials::new(
        repository.server_url()?,
        request.gitlab_bot_api_token.clone(),
    );
    let gitlab_project = ctx
        .gitlab
        .get_project(&credentials, repository.gitlab_repository_id)
        .await?;
    log::debug!(
        "new token of {} can read {} ({})",
        repository.name,
        gitlab_project.path_with_namespace,
        gitlab_project.name
    );

    regenerate_webhook(ctx, &credentials, &repository).await?;

    ctx.repositories
        .save_bot_api_token(repository.id, &request.gitlab_bot_api_token)
        .await?;
    log::info!(
        "bot api token of {} updated by {}",
        repository.name,
        user.name
    );
    Ok(())
}

async fn is_admin_of_an_integration(
    ctx: &Context,
    user: &User,
    repository: &GitlabRepository,
) -> anyhow::Result<bool> {
    for project in ctx.repositories.projects_integrated_in(repository).await? {
        if ctx.users.is_git_admin(user.id, project.id).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn regenerate_webhook(
    ctx: &Context,
    credentials: &Credentials,
    repository: &GitlabRepository,
) -> Result<(), RepositoryError> {
    if let Some(WebhookRecord {
        gitlab_webhook_id: Some(hook_id),
        ..
    }) = ctx.repositories.webhook(repository.id).await?
    {
        match ctx
            .gitlab
            .delete_webhook(credentials, repository.gitlab_repository_id, hook_id)
            .await
        {
            Ok(()) => {}
            Err(GitlabApiError::Request {
                status: Some(StatusCode::NOT_FOUND),
                ..
            }) => {
                log::info!("webhook {hook_id} of {} is already gone", repository.name);
            }
            Err(e) => return Err(e.into()),
        }
        ctx.repositories.clear_webhook_id(repository.id).await?;
    }

    let (hook_id, secret) = create_webhook(ctx, credentials, repository.gitlab_repository_id).await?;
    ctx.repositories
        .save_webhook(repository.id, hook_id, &secret)
        .await?;
    log::debug!("webhook {hook_id} created for {}", repository.name);
    Ok(())
}

/// Creates a webhook pointing at us with a fresh secret.
pub(super) async fn create_webhook(
    ctx: &Context,
    credentials: &Credentials,
    gitlab_repository_id: i64,
) -> Result<(i64, SecretString), GitlabApiError> {
    let secret = generate_webhook_secret();
    let hook_id = ctx
        .gitlab
        .create_webhook(
            credentials,
            gitlab_repository_id,
            &NewWebhook {
                url: &ctx.webhook_url,
                secret: secret.expose_secret(),
            },
        )
        .await?;
    Ok((hook_id, secret))
}

fn generate_webhook_secret() -> SecretString {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(WEBHOOK_SECRET_LEN)
        .map(char::from)
        .collect();
    SecretString::from(secret)
}
