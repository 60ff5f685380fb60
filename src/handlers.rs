use crate::config::{Config, ConfigurationError};
use crate::db::{
    ArtifactResolver, CommitStore, CrossReferenceStore, MergeRequestStore, PgStore,
    RepositoryStore, UserStore,
};
use crate::gitlab::{Event, GitlabApi, GitlabClient, GitlabRepository};
use crate::interactions::{BotCommenter, MergeRequestCommenter};
use parser::ReferenceParser;
use std::sync::Arc;

pub mod bot_token;
pub mod integration;
pub mod post_merge_request;
pub mod push;
pub mod references;

/// Everything a handler needs, built once at startup and shared by all requests.
pub struct Context {
    pub config: Arc<Config>,
    pub parser: ReferenceParser,
    pub repositories: Arc<dyn RepositoryStore>,
    pub merge_requests: Arc<dyn MergeRequestStore>,
    pub commits: Arc<dyn CommitStore>,
    pub cross_references: Arc<dyn CrossReferenceStore>,
    pub artifacts: Arc<dyn ArtifactResolver>,
    pub users: Arc<dyn UserStore>,
    pub gitlab: Arc<dyn GitlabApi>,
    pub commenter: Arc<dyn MergeRequestCommenter>,
    /// URL GitLab webhooks are pointed at when they are (re)created.
    pub webhook_url: String,
}

impl Context {
    pub fn new(
        config: Config,
        store: PgStore,
        gitlab: GitlabClient,
        webhook_url: String,
    ) -> Result<Context, ConfigurationError> {
        let parser = config.reference_parser()?;
        let config = Arc::new(config);
        let gitlab: Arc<dyn GitlabApi> = Arc::new(gitlab);
        let repositories: Arc<dyn RepositoryStore> = Arc::new(store.clone());
        let commenter = Arc::new(BotCommenter::new(
            config.clone(),
            repositories.clone(),
            gitlab.clone(),
        ));
        Ok(Context {
            config,
            parser,
            repositories,
            merge_requests: Arc::new(store.clone()),
            commits: Arc::new(store.clone()),
            cross_references: Arc::new(store.clone()),
            artifacts: Arc::new(store.clone()),
            users: Arc::new(store),
            gitlab,
            commenter,
            webhook_url,
        })
    }
}

/// Dispatches an authenticated webhook event to its handler.
pub async fn handle(
    ctx: &Context,
    repository: &GitlabRepository,
    event: &Event,
) -> anyhow::Result<()> {
    match event {
        Event::MergeRequest(data) => {
            post_merge_request::process(ctx, repository, data).await?;
        }
        Event::Push(data) => {
            push::process(ctx, repository, data).await?;
        }
    }
    Ok(())
}
