//! Integrated GitLab repositories, the projects they are integrated in, and the
//! secrets attached to them.

use super::PgStore;
use crate::gitlab::{GitlabProject, GitlabRepository};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio_postgres::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: i64,
    pub unix_name: String,
    pub public_name: String,
}

impl Project {
    pub fn unix_name_lower_case(&self) -> String {
        self.unix_name.to_lowercase()
    }
}

/// The webhook GitLab calls for a repository.
#[derive(Debug, Clone)]
pub struct WebhookRecord {
    /// Unknown until the webhook is created on the GitLab side.
    pub gitlab_webhook_id: Option<i64>,
    pub secret: SecretString,
}

/// Everything stored when a GitLab project is integrated for the first time.
pub struct NewIntegration<'a> {
    pub project_id: i64,
    pub gitlab_project: &'a GitlabProject,
    pub gitlab_webhook_id: i64,
    pub webhook_secret: &'a SecretString,
    pub bot_api_token: &'a SecretString,
}

#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn find_by_gitlab_id_and_url(
        &self,
        gitlab_repository_id: i64,
        url: &str,
    ) -> Result<Option<GitlabRepository>>;

    /// The repository named `name` (path with namespace) integrated in `project_id`.
    async fn find_by_name_in_project(
        &self,
        project_id: i64,
        name: &str,
    ) -> Result<Option<GitlabRepository>>;

    async fn projects_integrated_in(&self, repository: &GitlabRepository) -> Result<Vec<Project>>;

    async fn find_project(&self, project_id: i64) -> Result<Option<Project>>;

    /// Creates the repository, its integration in the project, its webhook and its
    /// bot token, all or nothing.
    async fn create_integration(
        &self,
        integration: &NewIntegration<'_>,
    ) -> Result<GitlabRepository>;

    /// Returns `false` if the repository was already integrated in the project.
    async fn link_to_project(&self, repository_id: i64, project_id: i64) -> Result<bool>;

    async fn webhook(&self, repository_id: i64) -> Result<Option<WebhookRecord>>;

    async fn save_webhook(
        &self,
        repository_id: i64,
        gitlab_webhook_id: i64,
        secret: &SecretString,
    ) -> Result<()>;

    /// Forgets the GitLab id of the webhook, keeping its secret.
    async fn clear_webhook_id(&self, repository_id: i64) -> Result<()>;

    async fn bot_api_token(&self, repository_id: i64) -> Result<Option<SecretString>>;

    async fn save_bot_api_token(&self, repository_id: i64, token: &SecretString) -> Result<()>;
}

const REPOSITORY_COLUMNS: &str = "r.id, r.gitlab_repository_id, r.name, r.description, \
    r.gitlab_repository_url, r.last_push_date";

fn deserialize_repository(row: &Row) -> GitlabRepository {
    GitlabRepository {
        id: row.get(0),
        gitlab_repository_id: row.get(1),
        name: row.get(2),
        description: row.get(3),
        url: row.get(4),
        last_push_date: row.get(5),
    }
}

fn deserialize_project(row: &Row) -> Project {
    Project {
        id: row.get(0),
        unix_name: row.get(1),
        public_name: row.get(2),
    }
}

#[async_trait]
impl RepositoryStore for PgStore {
    async fn find_by_gitlab_id_and_url(
        &self,
        gitlab_repository_id: i64,
        url: &str,
    ) -> Result<Option<GitlabRepository>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {REPOSITORY_COLUMNS} FROM gitlab_repositories r \
                     WHERE r.gitlab_repository_id = $1 AND r.gitlab_repository_url = $2"
                ),
                &[&gitlab_repository_id, &url],
            )
            .await
            .context("selecting repository by gitlab id")?;
        Ok(row.as_ref().map(deserialize_repository))
    }

    async fn find_by_name_in_project(
        &self,
        project_id: i64,
        name: &str,
    ) -> Result<Option<GitlabRepository>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {REPOSITORY_COLUMNS} FROM gitlab_repositories r \
                     JOIN gitlab_repository_projects rp ON rp.repository_id = r.id \
                     WHERE rp.project_id = $1 AND r.name = $2"
                ),
                &[&project_id, &name],
            )
            .await
            .context("selecting repository by name")?;
        Ok(row.as_ref().map(deserialize_repository))
    }

    async fn projects_integrated_in(&self, repository: &GitlabRepository) -> Result<Vec<Project>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT p.project_id, p.unix_name, p.public_name FROM projects p \
                 JOIN gitlab_repository_projects rp ON rp.project_id = p.project_id \
                 WHERE rp.repository_id = $1 \
                 ORDER BY p.project_id",
                &[&repository.id],
            )
            .await
            .context("selecting integration projects")?;
        Ok(rows.iter().map(deserialize_project).collect())
    }

    async fn find_project(&self, project_id: i64) -> Result<Option<Project>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT project_id, unix_name, public_name FROM projects WHERE project_id = $1",
                &[&project_id],
            )
            .await
            .context("selecting project")?;
        Ok(row.as_ref().map(deserialize_project))
    }

    async fn create_integration(
        &self,
        integration: &NewIntegration<'_>,
    ) -> Result<GitlabRepository> {
        let gitlab_project = integration.gitlab_project;
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .context("Cannot create integration transaction")?;
        let id: i64 = tx
            .query_one(
                "INSERT INTO gitlab_repositories \
                    (gitlab_repository_id, name, description, gitlab_repository_url, last_push_date) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id",
                &[
                    &gitlab_project.id,
                    &gitlab_project.path_with_namespace,
                    &gitlab_project.description,
                    &gitlab_project.web_url,
                    &gitlab_project.last_activity_at,
                ],
            )
            .await
            .context("inserting repository")?
            .get(0);
        tx.execute(
            "INSERT INTO gitlab_repository_projects (repository_id, project_id) VALUES ($1, $2)",
            &[&id, &integration.project_id],
        )
        .await
        .context("inserting integration")?;
        tx.execute(
            "INSERT INTO gitlab_webhooks (repository_id, gitlab_webhook_id, webhook_secret) \
             VALUES ($1, $2, $3)",
            &[
                &id,
                &integration.gitlab_webhook_id,
                &integration.webhook_secret.expose_secret(),
            ],
        )
        .await
        .context("inserting webhook")?;
        tx.execute(
            "INSERT INTO gitlab_bot_api_tokens (repository_id, token) VALUES ($1, $2)",
            &[&id, &integration.bot_api_token.expose_secret()],
        )
        .await
        .context("inserting bot api token")?;
        tx.commit()
            .await
            .context("Cannot commit integration transaction")?;
        Ok(GitlabRepository::from_project(id, gitlab_project))
    }

    async fn link_to_project(&self, repository_id: i64, project_id: i64) -> Result<bool> {
        let client = self.client().await?;
        let inserted = client
            .execute(
                "INSERT INTO gitlab_repository_projects (repository_id, project_id) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
                &[&repository_id, &project_id],
            )
            .await
            .context("linking repository to project")?;
        Ok(inserted == 1)
    }

    async fn webhook(&self, repository_id: i64) -> Result<Option<WebhookRecord>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT gitlab_webhook_id, webhook_secret FROM gitlab_webhooks \
                 WHERE repository_id = $1",
                &[&repository_id],
            )
            .await
            .context("selecting webhook")?;
        Ok(row.map(|row| WebhookRecord {
            gitlab_webhook_id: row.get(0),
            secret: SecretString::from(row.get::<_, String>(1)),
        }))
    }

    async fn save_webhook(
        &self,
        repository_id: i64,
        gitlab_webhook_id: i64,
        secret: &SecretString,
    ) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO gitlab_webhooks (repository_id, gitlab_webhook_id, webhook_secret) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (repository_id) DO UPDATE SET \
                    gitlab_webhook_id = EXCLUDED.gitlab_webhook_id, \
                    webhook_secret = EXCLUDED.webhook_secret",
                &[&repository_id, &gitlab_webhook_id, &secret.expose_secret()],
            )
            .await
            .context("saving webhook")?;
        Ok(())
    }

    async fn clear_webhook_id(&self, repository_id: i64) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "UPDATE gitlab_webhooks SET gitlab_webhook_id = NULL WHERE repository_id = $1",
                &[&repository_id],
            )
            .await
            .context("clearing webhook id")?;
        Ok(())
    }

    async fn bot_api_token(&self, repository_id: i64) -> Result<Option<SecretString>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT token FROM gitlab_bot_api_tokens WHERE repository_id = $1",
                &[&repository_id],
            )
            .await
            .context("selecting bot api token")?;
        Ok(row.map(|row| SecretString::from(row.get::<_, String>(0))))
    }

    async fn save_bot_api_token(&self, repository_id: i64, token: &SecretString) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO gitlab_bot_api_tokens (repository_id, token) VALUES ($1, $2) \
                 ON CONFLICT (repository_id) DO UPDATE SET token = EXCLUDED.token",
                &[&repository_id, &token.expose_secret()],
            )
            .await
            .context("saving bot api token")?;
        Ok(())
    }
}
