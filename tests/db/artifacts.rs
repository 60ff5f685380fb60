use super::run_test;
use parser::ReferenceId;
use refbot::db::ArtifactResolver;
use refbot::db::artifacts::{Artifact, Resolution};

#[tokio::test]
async fn resolves_artifacts() {
    run_test(|ctx| async move {
        ctx.execute("INSERT INTO artifacts (artifact_id, project_id) VALUES (45, 101);")
            .await;
        let id = ReferenceId::new(45).unwrap();
        assert_eq!(
            ctx.store.resolve("art", id).await?,
            Resolution::Found(Artifact {
                id,
                project_id: 101
            })
        );
        assert_eq!(
            ctx.store.resolve("art", ReferenceId::new(58).unwrap()).await?,
            Resolution::NotFound
        );
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn keyword_of_another_nature() {
    run_test(|ctx| async move {
        ctx.execute(
            "INSERT INTO artifacts (artifact_id, project_id) VALUES (45, 101);
             INSERT INTO reference_keywords (keyword, nature) VALUES ('doc', 'docman_document');",
        )
        .await;
        let id = ReferenceId::new(45).unwrap();
        assert_eq!(
            ctx.store.resolve("doc", id).await?,
            Resolution::NotAReferenceKeyword
        );
        assert_eq!(
            ctx.store.resolve("unknown", id).await?,
            Resolution::NotAReferenceKeyword
        );
        Ok(ctx)
    })
    .await;
}
