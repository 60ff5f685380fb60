//! The last known title, description and state of each merge request.

use super::PgStore;
use crate::gitlab::MergeRequestIid;
use anyhow::{Context as _, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeRequestSnapshot {
    pub title: String,
    pub description: String,
    pub state: String,
}

#[async_trait]
pub trait MergeRequestStore: Send + Sync {
    async fn snapshot(
        &self,
        repository_id: i64,
        iid: MergeRequestIid,
    ) -> Result<Option<MergeRequestSnapshot>>;

    /// Creates or replaces the snapshot; concurrent writers race and the last one wins.
    async fn save_snapshot(
        &self,
        repository_id: i64,
        iid: MergeRequestIid,
        snapshot: &MergeRequestSnapshot,
    ) -> Result<()>;
}

fn db_iid(iid: MergeRequestIid) -> Result<i64> {
    i64::try_from(iid).with_context(|| format!("merge request iid {iid} out of range"))
}

#[async_trait]
impl MergeRequestStore for PgStore {
    async fn snapshot(
        &self,
        repository_id: i64,
        iid: MergeRequestIid,
    ) -> Result<Option<MergeRequestSnapshot>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT title, description, state FROM merge_request_info \
                 WHERE repository_id = $1 AND merge_request_iid = $2",
                &[&repository_id, &db_iid(iid)?],
            )
            .await
            .context("selecting merge request info")?;
        Ok(row.map(|row| MergeRequestSnapshot {
            title: row.get(0),
            description: row.get(1),
            state: row.get(2),
        }))
    }

    async fn save_snapshot(
        &self,
        repository_id: i64,
        iid: MergeRequestIid,
        snapshot: &MergeRequestSnapshot,
    ) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO merge_request_info \
                    (repository_id, merge_request_iid, title, description, state) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (repository_id, merge_request_iid) DO UPDATE SET \
                    title = EXCLUDED.title, \
                    description = EXCLUDED.description, \
                    state = EXCLUDED.state",
                &[
                    &repository_id,
                    &db_iid(iid)?,
                    &snapshot.title,
                    &snapshot.description,
                    &snapshot.state,
                ],
            )
            .await
            .context("saving merge request info")?;
        Ok(())
    }
}
