use super::run_test;
use refbot::db::UserStore;
use refbot::db::users::api_key_digest;

async fn seed(ctx: &super::TestContext) {
    ctx.execute(&format!(
        "INSERT INTO projects (project_id, unix_name, public_name) VALUES
            (101, 'acme', 'Acme'), (102, 'other', 'Other');
         INSERT INTO users (user_id, username) VALUES (42, 'alice'), (7, 'mallory');
         INSERT INTO user_api_keys (key_sha256, user_id) VALUES ('{}', 42), ('{}', 7);
         INSERT INTO project_git_admins (project_id, user_id) VALUES (101, 42);",
        api_key_digest("alice-key"),
        api_key_digest("mallory-key"),
    ))
    .await;
}

#[tokio::test]
async fn user_by_api_key() {
    run_test(|ctx| async move {
        seed(&ctx).await;
        let alice = ctx.store.user_by_api_key("alice-key").await?.unwrap();
        assert_eq!(alice.id, 42);
        assert_eq!(alice.name, "alice");
        assert_eq!(
            ctx.store.user_by_api_key("mallory-key").await?.map(|u| u.id),
            Some(7)
        );
        assert!(ctx.store.user_by_api_key("unknown").await?.is_none());
        // The digest itself is not a key.
        assert!(ctx
            .store
            .user_by_api_key(&api_key_digest("alice-key"))
            .await?
            .is_none());
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn git_administrators() {
    run_test(|ctx| async move {
        seed(&ctx).await;
        assert!(ctx.store.is_git_admin(42, 101).await?);
        assert!(!ctx.store.is_git_admin(42, 102).await?);
        assert!(!ctx.store.is_git_admin(7, 101).await?);
        assert!(!ctx.store.is_git_admin(42, 103).await?);
        Ok(ctx)
    })
    .await;
}
