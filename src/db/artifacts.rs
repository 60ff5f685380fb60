//! Lookup of the artifacts that references point to.
//!
//! A reference `KEYWORD-123` found in GitLab is looked up through the reference
//! keyword registered for tracker artifacts (`art` by default). The keyword must be
//! registered with the artifact nature; anything else is a broken deployment.

use super::PgStore;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use parser::ReferenceId;

pub const ARTIFACT_NATURE: &str = "plugin_tracker_artifact";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Artifact {
    pub id: ReferenceId,
    pub project_id: i64,
}

/// Outcome of looking up one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(Artifact),
    /// The id is well formed but no artifact has it.
    NotFound,
    /// The artifact keyword does not denote artifacts on this site.
    NotAReferenceKeyword,
}

impl Resolution {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Resolution::Found(artifact) => Some(artifact),
            Resolution::NotFound | Resolution::NotAReferenceKeyword => None,
        }
    }
}

#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn resolve(&self, keyword: &str, id: ReferenceId) -> Result<Resolution>;
}

#[async_trait]
impl ArtifactResolver for PgStore {
    async fn resolve(&self, keyword: &str, id: ReferenceId) -> Result<Resolution> {
        let client = self.client().await?;
        let nature: Option<String> = client
            .query_opt(
                "SELECT nature FROM reference_keywords WHERE keyword = $1",
                &[&keyword],
            )
            .await
            .context("selecting reference keyword")?
            .map(|row| row.get(0));
        if nature.as_deref() != Some(ARTIFACT_NATURE) {
            return Ok(Resolution::NotAReferenceKeyword);
        }

        let Ok(artifact_id) = i64::try_from(id.get()) else {
            return Ok(Resolution::NotFound);
        };
        let project_id: Option<i64> = client
            .query_opt(
                "SELECT project_id FROM artifacts WHERE artifact_id = $1",
                &[&artifact_id],
            )
            .await
            .context("selecting artifact")?
            .map(|row| row.get(0));
        Ok(match project_id {
            Some(project_id) => Resolution::Found(Artifact { id, project_id }),
            None => Resolution::NotFound,
        })
    }
}
