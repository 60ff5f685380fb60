//! Classification of extracted references against the artifact store.

use crate::db::ArtifactResolver;
use parser::{ReferenceId, ReferenceSet};
use std::collections::HashMap;
use tracing as log;

pub use crate::db::artifacts::{Artifact, Resolution};

/// Resolves references through an [`ArtifactResolver`], at most once per id.
///
/// One instance lives for the processing of one event.
pub struct ReferenceResolver<'a> {
    store: &'a dyn ArtifactResolver,
    artifact_keyword: &'a str,
    resolved: HashMap<ReferenceId, Resolution>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a dyn ArtifactResolver, artifact_keyword: &'a str) -> Self {
        ReferenceResolver {
            store,
            artifact_keyword,
            resolved: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, id: ReferenceId) -> anyhow::Result<Resolution> {
        if let Some(resolution) = self.resolved.get(&id) {
            return Ok(*resolution);
        }
        let resolution = self.store.resolve(self.artifact_keyword, id).await?;
        self.resolved.insert(id, resolution);
        Ok(resolution)
    }

    /// Resolves `id` and logs the outcome.
    pub async fn resolve_logged(&mut self, id: ReferenceId) -> anyhow::Result<Resolution> {
        log::info!(%id, "{}", reference_message(id));
        let resolution = self.resolve(id).await?;
        let message = resolution_message(self.artifact_keyword, id, &resolution);
        match resolution {
            Resolution::Found(_) => log::info!(%id, "{message}"),
            Resolution::NotFound | Resolution::NotAReferenceKeyword => {
                log::error!(%id, "{message}")
            }
        }
        Ok(resolution)
    }

    /// The ids of `ids` that denote an existing artifact, without logging.
    pub async fn found(&mut self, ids: &ReferenceSet) -> anyhow::Result<ReferenceSet> {
        let mut found = ReferenceSet::new();
        for id in ids {
            if let Resolution::Found(_) = self.resolve(id).await? {
                found.insert(id);
            }
        }
        Ok(found)
    }

    /// The artifact behind an id that was already resolved as found.
    pub fn artifact(&self, id: ReferenceId) -> Option<Artifact> {
        self.resolved.get(&id).and_then(Resolution::artifact).copied()
    }
}

fn reference_message(id: ReferenceId) -> String {
    format!(
        "|_ Reference to artifact {id} found, cross-reference will be added for each project \
         the GitLab repository is integrated in."
    )
}

fn resolution_message(artifact_keyword: &str, id: ReferenceId, resolution: &Resolution) -> String {
    match resolution {
        Resolution::Found(_) => format!("|  |_ Artifact {id} found"),
        Resolution::NotFound => {
            format!("Artifact {id} not found, no cross-reference will be added.")
        }
        Resolution::NotAReferenceKeyword => format!(
            "No reference found with the keyword '{artifact_keyword}', and this must not \
             happen. If you read this, this is really bad."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::FakeStore;

    fn id(n: u64) -> ReferenceId {
        ReferenceId::new(n).unwrap()
    }

    #[test]
    fn log_messages() {
        assert_eq!(
            reference_message(id(45)),
            "|_ Reference to artifact #45 found, cross-reference will be added for each \
             project the GitLab repository is integrated in."
        );
        let artifact = Artifact {
            id: id(45),
            project_id: 101,
        };
        assert_eq!(
            resolution_message("art", id(45), &Resolution::Found(artifact)),
            "|  |_ Artifact #45 found"
        );
        assert_eq!(
            resolution_message("art", id(58), &Resolution::NotFound),
            "Artifact #58 not found, no cross-reference will be added."
        );
        assert_eq!(
            resolution_message("art", id(666), &Resolution::NotAReferenceKeyword),
            "No reference found with the keyword 'art', and this must not happen. If you \
             read this, this is really bad."
        );
    }

    #[tokio::test]
    async fn classifies_each_outcome() {
        let store = FakeStore::new();
        store.add_artifact(45, 101);
        let mut resolver = ReferenceResolver::new(&store, "art");
        assert_eq!(
            resolver.resolve(id(45)).await.unwrap(),
            Resolution::Found(Artifact {
                id: id(45),
                project_id: 101
            })
        );
        assert_eq!(resolver.resolve(id(58)).await.unwrap(), Resolution::NotFound);

        let mut resolver = ReferenceResolver::new(&store, "story");
        assert_eq!(
            resolver.resolve(id(45)).await.unwrap(),
            Resolution::NotAReferenceKeyword
        );
    }

    #[tokio::test]
    async fn resolves_each_id_once() {
        let store = FakeStore::new();
        store.add_artifact(45, 101);
        let mut resolver = ReferenceResolver::new(&store, "art");
        resolver.resolve_logged(id(45)).await.unwrap();
        resolver.resolve(id(45)).await.unwrap();
        let found = resolver
            .found(&[id(45), id(58)].into_iter().collect())
            .await
            .unwrap();
        assert_eq!(found, [id(45)].into_iter().collect());
        assert_eq!(store.resolve_calls(), 2);
        assert_eq!(resolver.artifact(id(45)).map(|a| a.project_id), Some(101));
        assert_eq!(resolver.artifact(id(58)), None);
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let store = FakeStore::new();
        store.fail_resolution("artifact store is down");
        let mut resolver = ReferenceResolver::new(&store, "art");
        let err = resolver.resolve(id(45)).await.unwrap_err();
        assert_eq!(err.to_string(), "artifact store is down");
    }
}
