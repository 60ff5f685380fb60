use super::run_test;
use chrono::{TimeZone, Utc};
use refbot::db::{CommitInfo, CommitStore};

fn commit(repository_id: i64) -> CommitInfo {
    CommitInfo {
        repository_id,
        sha1: "feff4ced04b237abb8b4a50b4160099313152c3c".to_string(),
        title: "Fix build".to_string(),
        message: "Fix build\n\nTULEAP-45".to_string(),
        author_name: "John Snow".to_string(),
        author_email: "john-snow@example.com".to_string(),
        committed_date: Utc.with_ymd_and_hms(2020, 12, 3, 10, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn save_and_find() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;
        let commit = commit(repository_id);
        assert_eq!(ctx.store.find_commit(repository_id, &commit.sha1).await?, None);

        ctx.store.save_commit(&commit).await?;
        assert_eq!(
            ctx.store.find_commit(repository_id, &commit.sha1).await?,
            Some(commit.clone())
        );
        assert_eq!(ctx.store.find_commit(repository_id, "0000").await?, None);
        assert_eq!(
            ctx.store.find_commit(repository_id + 1, &commit.sha1).await?,
            None
        );
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn saving_again_updates() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;
        let mut commit = commit(repository_id);
        ctx.store.save_commit(&commit).await?;

        commit.author_name = "Jon Snow".to_string();
        commit.message = "Fix build\n\nTULEAP-46".to_string();
        ctx.store.save_commit(&commit).await?;

        assert_eq!(
            ctx.store.find_commit(repository_id, &commit.sha1).await?,
            Some(commit)
        );
        Ok(ctx)
    })
    .await;
}
