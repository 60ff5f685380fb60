use super::run_test;
use parser::ReferenceId;
use refbot::db::{CrossReference, CrossReferenceStore};

fn link(source_value: &str, target_type: &str, target_value: &str) -> CrossReference {
    CrossReference {
        source_type: "plugin_gitlab_mr".to_string(),
        source_value: source_value.to_string(),
        source_gid: 101,
        target_type: target_type.to_string(),
        target_value: target_value.to_string(),
        target_gid: 7,
    }
}

fn artifact(id: u64) -> ReferenceId {
    ReferenceId::new(id).unwrap()
}

#[tokio::test]
async fn insert_is_idempotent() {
    run_test(|ctx| async move {
        let mr = link("root/repo01/2", "plugin_tracker_artifact", "45");
        assert!(ctx.store.insert(&mr).await?);
        assert!(!ctx.store.insert(&mr).await?);

        // Any other source, target or project makes another link.
        let mut other_project = mr.clone();
        other_project.source_gid = 102;
        assert!(ctx.store.insert(&other_project).await?);
        assert!(!ctx.store.insert(&other_project).await?);

        let stored = ctx.store.for_artifact(artifact(45)).await?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].reference, mr);
        assert_eq!(stored[1].reference, other_project);
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn only_links_to_the_artifact_oldest_first() {
    run_test(|ctx| async move {
        let second = link("root/repo01/3", "plugin_tracker_artifact", "45");
        let first = link("root/repo01/2", "plugin_tracker_artifact", "45");
        ctx.store.insert(&first).await?;
        ctx.store.insert(&second).await?;
        // Same value, other nature.
        ctx.store
            .insert(&link("root/repo01/4", "plugin_docman_document", "45"))
            .await?;
        ctx.store
            .insert(&link("root/repo01/5", "plugin_tracker_artifact", "46"))
            .await?;
        ctx.store
            .insert(&link("root/repo01/6", "plugin_tracker_artifact", "450"))
            .await?;

        let stored = ctx.store.for_artifact(artifact(45)).await?;
        let references: Vec<_> = stored.iter().map(|s| s.reference.clone()).collect();
        assert_eq!(references, vec![first, second]);
        assert!(stored[0].id < stored[1].id);
        assert!(stored[0].created_at <= stored[1].created_at);

        assert!(ctx.store.for_artifact(artifact(47)).await?.is_empty());
        Ok(ctx)
    })
    .await;
}
