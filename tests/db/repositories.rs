use super::run_test;
use chrono::{TimeZone, Utc};
use refbot::db::{NewIntegration, RepositoryStore};
use refbot::gitlab::GitlabProject;
use secrecy::{ExposeSecret, SecretString};

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn gitlab_project(path: &str) -> GitlabProject {
    GitlabProject {
        id: 98765,
        description: "My GitLab project".to_string(),
        web_url: format!("https://example.com/{path}"),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path_with_namespace: path.to_string(),
        last_activity_at: Utc.with_ymd_and_hms(2020, 11, 12, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn repository_lookups() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;

        let repository = ctx
            .store
            .find_by_gitlab_id_and_url(123654, "https://example.com/root/repo01")
            .await?
            .unwrap();
        assert_eq!(repository.id, repository_id);
        assert_eq!(repository.name, "root/repo01");
        assert!(ctx
            .store
            .find_by_gitlab_id_and_url(123654, "https://example.com/root/other")
            .await?
            .is_none());

        let projects = ctx.store.projects_integrated_in(&repository).await?;
        let ids: Vec<_> = projects.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![101, 102]);
        assert_eq!(projects[0].unix_name_lower_case(), "acme");

        assert!(ctx
            .store
            .find_by_name_in_project(101, "root/repo01")
            .await?
            .is_some());
        assert!(ctx
            .store
            .find_by_name_in_project(103, "root/repo01")
            .await?
            .is_none());
        assert_eq!(
            ctx.store.find_project(102).await?.map(|p| p.public_name),
            Some("Other".to_string())
        );
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn secrets() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;
        assert!(ctx.store.webhook(repository_id).await?.is_none());
        assert!(ctx.store.bot_api_token(repository_id).await?.is_none());

        ctx.store
            .save_webhook(repository_id, 12, &secret("first"))
            .await?;
        ctx.store
            .save_webhook(repository_id, 13, &secret("second"))
            .await?;
        let webhook = ctx.store.webhook(repository_id).await?.unwrap();
        assert_eq!(webhook.gitlab_webhook_id, Some(13));
        assert_eq!(webhook.secret.expose_secret(), "second");

        ctx.store.clear_webhook_id(repository_id).await?;
        let webhook = ctx.store.webhook(repository_id).await?.unwrap();
        assert_eq!(webhook.gitlab_webhook_id, None);
        assert_eq!(webhook.secret.expose_secret(), "second");

        ctx.store
            .save_bot_api_token(repository_id, &secret("glpat-1"))
            .await?;
        ctx.store
            .save_bot_api_token(repository_id, &secret("glpat-2"))
            .await?;
        let token = ctx.store.bot_api_token(repository_id).await?.unwrap();
        assert_eq!(token.expose_secret(), "glpat-2");
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn link_to_project() {
    run_test(|ctx| async move {
        let repository_id = ctx.seed_repository().await;
        ctx.execute(
            "INSERT INTO projects (project_id, unix_name, public_name) VALUES (103, 'third', 'Third');",
        )
        .await;

        assert!(!ctx.store.link_to_project(repository_id, 101).await?);
        assert!(ctx.store.link_to_project(repository_id, 103).await?);
        assert!(!ctx.store.link_to_project(repository_id, 103).await?);

        let repository = ctx
            .store
            .find_by_name_in_project(103, "root/repo01")
            .await?
            .unwrap();
        let ids: Vec<_> = ctx
            .store
            .projects_integrated_in(&repository)
            .await?
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![101, 102, 103]);
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn create_integration() {
    run_test(|ctx| async move {
        ctx.seed_repository().await;
        let gitlab_project = gitlab_project("root/repo02");
        let repository = ctx
            .store
            .create_integration(&NewIntegration {
                project_id: 102,
                gitlab_project: &gitlab_project,
                gitlab_webhook_id: 21,
                webhook_secret: &secret("hook secret"),
                bot_api_token: &secret("glpat-bot"),
            })
            .await?;

        assert_eq!(repository.name, "root/repo02");
        assert_eq!(repository.url, "https://example.com/root/repo02");
        assert_eq!(repository.last_push_date, gitlab_project.last_activity_at);
        assert_eq!(
            ctx.store
                .find_by_gitlab_id_and_url(98765, "https://example.com/root/repo02")
                .await?,
            Some(repository.clone())
        );
        let ids: Vec<_> = ctx
            .store
            .projects_integrated_in(&repository)
            .await?
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![102]);
        let webhook = ctx.store.webhook(repository.id).await?.unwrap();
        assert_eq!(webhook.gitlab_webhook_id, Some(21));
        assert_eq!(webhook.secret.expose_secret(), "hook secret");
        assert_eq!(
            ctx.store
                .bot_api_token(repository.id)
                .await?
                .unwrap()
                .expose_secret(),
            "glpat-bot"
        );
        Ok(ctx)
    })
    .await;
}

#[tokio::test]
async fn failed_integration_stores_nothing() {
    run_test(|ctx| async move {
        ctx.seed_repository().await;
        let gitlab_project = gitlab_project("root/repo02");
        // No such project: the link violates its foreign key.
        let res = ctx
            .store
            .create_integration(&NewIntegration {
                project_id: 999,
                gitlab_project: &gitlab_project,
                gitlab_webhook_id: 21,
                webhook_secret: &secret("hook secret"),
                bot_api_token: &secret("glpat-bot"),
            })
            .await;
        assert!(res.is_err());
        assert!(ctx
            .store
            .find_by_gitlab_id_and_url(98765, "https://example.com/root/repo02")
            .await?
            .is_none());
        Ok(ctx)
    })
    .await;
}
