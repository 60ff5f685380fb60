use crate::config::Config;
use crate::db::{Project, RepositoryStore};
use crate::gitlab::{Credentials, GitlabApi, GitlabRepository, MergeRequestWebhookData};
use crate::handlers::post_merge_request::{Announcement, AnnouncementKind};
use async_trait::async_trait;
use itertools::Itertools;
use std::fmt;
use std::fmt::Write;
use std::sync::Arc;
use tracing as log;

/// Tells a merge request which artifacts it now (or no longer) references.
#[async_trait]
pub trait MergeRequestCommenter: Send + Sync {
    async fn announce(
        &self,
        repository: &GitlabRepository,
        merge_request: &MergeRequestWebhookData,
        announcement: &Announcement,
        projects: &[Project],
    ) -> anyhow::Result<()>;
}

/// Posts the announcement as a note, authenticated with the repository bot token.
pub struct BotCommenter {
    config: Arc<Config>,
    repositories: Arc<dyn RepositoryStore>,
    gitlab: Arc<dyn GitlabApi>,
}

impl BotCommenter {
    pub fn new(
        config: Arc<Config>,
        repositories: Arc<dyn RepositoryStore>,
        gitlab: Arc<dyn GitlabApi>,
    ) -> BotCommenter {
        BotCommenter {
            config,
            repositories,
            gitlab,
        }
    }
}

#[async_trait]
impl MergeRequestCommenter for BotCommenter {
    async fn announce(
        &self,
        repository: &GitlabRepository,
        merge_request: &MergeRequestWebhookData,
        announcement: &Announcement,
        projects: &[Project],
    ) -> anyhow::Result<()> {
        let Some(token) = self.repositories.bot_api_token(repository.id).await? else {
            log::warn!(
                "no bot api token for {}, merge request {} is not commented",
                repository.name,
                merge_request.merge_request_iid
            );
            return Ok(());
        };
        let credentials = Credentials::new(repository.server_url()?, token);
        let body = render_announcement(&self.config, announcement, projects)?;
        self.gitlab
            .post_merge_request_note(
                &credentials,
                repository.gitlab_repository_id,
                merge_request.merge_request_iid,
                &body,
            )
            .await?;
        log::info!(
            "merge request {} of {} commented",
            merge_request.merge_request_iid,
            repository.name
        );
        Ok(())
    }
}

pub fn render_announcement(
    config: &Config,
    announcement: &Announcement,
    projects: &[Project],
) -> anyhow::Result<String> {
    let mut body = String::new();
    match announcement.kind {
        AnnouncementKind::Added => writeln!(body, "This merge request references:")?,
        AnnouncementKind::Removed => writeln!(body, "This merge request no longer references:")?,
    }
    writeln!(body)?;
    for id in &announcement.references {
        let text = escaped(&format!("{} {id}", config.references.artifact_keyword))?;
        writeln!(body, "- [{text}]({})", config.artifact_url(id))?;
    }
    if !projects.is_empty() {
        let names = itertools::process_results(
            projects.iter().map(|project| escaped(&project.public_name)),
            |mut names| names.join(", "),
        )?;
        writeln!(body)?;
        writeln!(body, "Cross-references are kept in: {names}")?;
    }
    Ok(body)
}

/// Characters that would let a name open a link or emphasis in the note.
const MARKDOWN_PUNCTUATION: &[char] = &['\\', '`', '*', '_', '[', ']', '(', ')', '!', '#', '|', '~'];

/// Escapes `text` for both the HTML and the markdown GitLab renders notes with.
fn escaped(text: &str) -> Result<String, fmt::Error> {
    let mut html = String::new();
    pulldown_cmark_escape::escape_html(&mut html, text)?;
    let mut out = String::with_capacity(html.len());
    for c in html.chars() {
        if MARKDOWN_PUNCTUATION.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    Ok(out)
}
