//! Durable links between GitLab items and the artifacts they reference.

use super::PgStore;
use super::artifacts::{ARTIFACT_NATURE, Artifact};
use super::repositories::Project;
use crate::gitlab::{GitlabRepository, MergeRequestIid};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parser::ReferenceId;
use serde::Serialize;
use tokio_postgres::Row;

pub const MERGE_REQUEST_NATURE: &str = "plugin_gitlab_mr";
pub const COMMIT_NATURE: &str = "plugin_gitlab_commit";

/// A link from a GitLab item (`source`) to an artifact (`target`).
///
/// The `*_gid` fields are the ids of the projects each side lives in. GitLab values are
/// `{repository name}/{iid or sha1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReference {
    pub source_type: String,
    pub source_value: String,
    pub source_gid: i64,
    pub target_type: String,
    pub target_value: String,
    pub target_gid: i64,
}

impl CrossReference {
    pub fn merge_request(
        repository: &GitlabRepository,
        iid: MergeRequestIid,
        project: &Project,
        artifact: &Artifact,
    ) -> CrossReference {
        CrossReference::to_artifact(
            MERGE_REQUEST_NATURE,
            format!("{}/{iid}", repository.name),
            project,
            artifact,
        )
    }

    pub fn commit(
        repository: &GitlabRepository,
        sha1: &str,
        project: &Project,
        artifact: &Artifact,
    ) -> CrossReference {
        CrossReference::to_artifact(
            COMMIT_NATURE,
            format!("{}/{sha1}", repository.name),
            project,
            artifact,
        )
    }

    fn to_artifact(
        source_type: &str,
        source_value: String,
        project: &Project,
        artifact: &Artifact,
    ) -> CrossReference {
        CrossReference {
            source_type: source_type.to_string(),
            source_value,
            source_gid: project.id,
            target_type: ARTIFACT_NATURE.to_string(),
            target_value: artifact.id.get().to_string(),
            target_gid: artifact.project_id,
        }
    }
}

/// A cross-reference as stored, with its row id and creation date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredCrossReference {
    pub id: i64,
    #[serde(flatten)]
    pub reference: CrossReference,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CrossReferenceStore: Send + Sync {
    /// Returns `false` when the exact same link already exists.
    async fn insert(&self, reference: &CrossReference) -> Result<bool>;

    /// Every link pointing to the artifact, oldest first.
    async fn for_artifact(&self, artifact_id: ReferenceId) -> Result<Vec<StoredCrossReference>>;
}

#[async_trait]
impl CrossReferenceStore for PgStore {
    async fn insert(&self, reference: &CrossReference) -> Result<bool> {
        let client = self.client().await?;
        let inserted = client
            .execute(
                "INSERT INTO cross_references (source_type, source_value, source_gid, \
                    target_type, target_value, target_gid) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT DO NOTHING",
                &[
                    &reference.source_type,
                    &reference.source_value,
                    &reference.source_gid,
                    &reference.target_type,
                    &reference.target_value,
                    &reference.target_gid,
                ],
            )
            .await
            .context("inserting cross reference")?;
        Ok(inserted == 1)
    }

    async fn for_artifact(&self, artifact_id: ReferenceId) -> Result<Vec<StoredCrossReference>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, source_type, source_value, source_gid, target_type, \
                    target_value, target_gid, created_at \
                 FROM cross_references \
                 WHERE target_type = $1 AND target_value = $2 \
                 ORDER BY created_at, id",
                &[&ARTIFACT_NATURE, &artifact_id.get().to_string()],
            )
            .await
            .context("selecting cross references")?;
        Ok(rows.into_iter().map(deserialize_cross_reference).collect())
    }
}

fn deserialize_cross_reference(row: Row) -> StoredCrossReference {
    StoredCrossReference {
        id: row.get(0),
        reference: CrossReference {
            source_type: row.get(1),
            source_value: row.get(2),
            source_gid: row.get(3),
            target_type: row.get(4),
            target_value: row.get(5),
            target_gid: row.get(6),
        },
        created_at: row.get(7),
    }
}
