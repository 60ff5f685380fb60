use super::run_test;
use refbot::db::{MergeRequestSnapshot, MergeRequestStore};

fn snapshot(title: &str, state: &str) -> MergeRequestSnapshot {
    MergeRequestSnapshot {
        title: title.to_string(),
        description: "TULEAP-45".to_string(),
        state: state.to_string(),
    }
}

#[tokio::test]
async fn snapshot_upsert() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;
        assert_eq!(ctx.store.snapshot(repository_id, 2).await?, None);

        ctx.store
            .save_snapshot(repository_id, 2, &snapshot("First", "opened"))
            .await?;
        ctx.store
            .save_snapshot(repository_id, 2, &snapshot("Second", "merged"))
            .await?;
        assert_eq!(
            ctx.store.snapshot(repository_id, 2).await?,
            Some(snapshot("Second", "merged"))
        );
        assert_eq!(ctx.store.snapshot(repository_id, 3).await?, None);
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn concurrent_snapshot_writes() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;
        let first = snapshot("First", "opened");
        let second = snapshot("Second", "merged");
        let (a, b) = tokio::join!(
            ctx.store.save_snapshot(repository_id, 2, &first),
            ctx.store.save_snapshot(repository_id, 2, &second),
        );
        a?;
        b?;
        let saved = ctx.store.snapshot(repository_id, 2).await?.unwrap();
        assert!(saved == first || saved == second, "{saved:?}");
        Ok(ctx)
    })
    .await;
}
