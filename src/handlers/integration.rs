//! Integration of a GitLab repository in a project.
//!
//! A repository already known (same GitLab id and web url) is only linked to the new
//! project. Otherwise a webhook is created on GitLab, then the repository, its link,
//! the webhook and the bot token are stored together.

use super::Context;
use super::bot_token::{create_webhook, secret};
use crate::db::{NewIntegration, User};
use crate::errors::RepositoryError;
use crate::gitlab::{Credentials, GitlabRepository};
use secrecy::SecretString;
use tracing as log;

#[derive(Debug, serde::Deserialize)]
pub struct IntegrationRequest {
    pub project_id: i64,
    /// e.g. `https://gitlab.example.com`
    pub gitlab_server_url: String,
    pub gitlab_repository_id: i64,
    #[serde(deserialize_with = "secret")]
    pub gitlab_bot_api_token: SecretString,
}

pub async fn integrate_repository(
    ctx: &Context,
    user: &User,
    request: &IntegrationRequest,
) -> Result<GitlabRepository, RepositoryError> {
    let Some(project) = ctx.repositories.find_project(request.project_id).await? else {
        return Err(RepositoryError::NotFound);
    };
    if !ctx.users.is_git_admin(user.id, project.id).await? {
        log::info!(
            "user {} is not git administrator of {}",
            user.name,
            project.unix_name
        );
        return Err(RepositoryError::NotFound);
    }

    let credentials = Credentials::new(
        request.gitlab_server_url.trim_end_matches('/'),
        request.gitlab_bot_api_token.clone(),
    );
    let gitlab_project = ctx
        .gitlab
        .get_project(&credentials, request.gitlab_repository_id)
        .await?;

    if let Some(homonym) = ctx
        .repositories
        .find_by_name_in_project(project.id, &gitlab_project.path_with_namespace)
        .await?
    {
        if homonym.url != gitlab_project.web_url {
            return Err(RepositoryError::SameNameAlreadyIntegrated(
                gitlab_project.path_with_namespace,
            ));
        }
    }

    if let Some(existing) = ctx
        .repositories
        .find_by_gitlab_id_and_url(gitlab_project.id, &gitlab_project.web_url)
        .await?
    {
        if !ctx
            .repositories
            .link_to_project(existing.id, project.id)
            .await?
        {
            return Err(RepositoryError::AlreadyIntegrated {
                repository_id: existing.id,
                project_id: project.id,
            });
        }
        log::info!(
            "GitLab repository {} is now also integrated in {}",
            existing.name,
            project.unix_name
        );
        return Ok(existing);
    }

    let (hook_id, webhook_secret) = create_webhook(ctx, &credentials, gitlab_project.id).await?;
    let integration = NewIntegration {
        project_id: project.id,
        gitlab_project: &gitlab_project,
        gitlab_webhook_id: hook_id,
        webhook_secret: &webhook_secret,
        bot_api_token: &request.gitlab_bot_api_token,
    };
    match ctx.repositories.create_integration(&integration).await {
        Ok(repository) => {
            log::info!(
                "GitLab repository {} ({}) integrated in {} by {}",
                repository.name,
                gitlab_project.name,
                project.unix_name,
                user.name
            );
            Ok(repository)
        }
        Err(e) => {
            // Nothing stored refers to the hook.
            if let Err(err) = ctx
                .gitlab
                .delete_webhook(&credentials, gitlab_project.id, hook_id)
                .await
            {
                log::warn!(
                    "webhook {hook_id} of {} left behind: {err}",
                    gitlab_project.path_with_namespace
                );
            }
            Err(e.into())
        }
    }
}
