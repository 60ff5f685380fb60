use super::PgStore;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub repository_id: i64,
    pub sha1: String,
    pub title: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committed_date: DateTime<Utc>,
}

#[async_trait]
pub trait CommitStore: Send + Sync {
    async fn save_commit(&self, commit: &CommitInfo) -> Result<()>;
    async fn find_commit(&self, repository_id: i64, sha1: &str) -> Result<Option<CommitInfo>>;
}

#[async_trait]
impl CommitStore for PgStore {
    async fn save_commit(&self, commit: &CommitInfo) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO commit_info (repository_id, commit_sha1, commit_date, \
                    commit_title, commit_message, author_name, author_email) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (repository_id, commit_sha1) DO UPDATE SET \
                    commit_date = EXCLUDED.commit_date, \
                    commit_title = EXCLUDED.commit_title, \
                    commit_message = EXCLUDED.commit_message, \
                    author_name = EXCLUDED.author_name, \
                    author_email = EXCLUDED.author_email",
                &[
                    &commit.repository_id,
                    &commit.sha1,
                    &commit.committed_date,
                    &commit.title,
                    &commit.message,
                    &commit.author_name,
                    &commit.author_email,
                ],
            )
            .await
            .context("saving commit info")?;
        Ok(())
    }

    async fn find_commit(&self, repository_id: i64, sha1: &str) -> Result<Option<CommitInfo>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT commit_sha1, commit_title, commit_message, author_name, \
                    author_email, commit_date \
                 FROM commit_info WHERE repository_id = $1 AND commit_sha1 = $2",
                &[&repository_id, &sha1],
            )
            .await
            .context("selecting commit info")?;
        Ok(row.map(|row| CommitInfo {
            repository_id,
            sha1: row.get(0),
            title: row.get(1),
            message: row.get(2),
            author_name: row.get(3),
            author_email: row.get(4),
            committed_date: row.get(5),
        }))
    }
}
