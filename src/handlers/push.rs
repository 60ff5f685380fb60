//! Links pushed commits to the artifacts their messages reference.

use super::Context;
use super::references::{ReferenceResolver, Resolution};
use crate::db::{CommitInfo, CrossReference, Project};
use crate::gitlab::{GitlabRepository, PushCommit, PushWebhookData};
use tracing as log;
use tracing::Instrument;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub commits_saved: usize,
    pub links_recorded: usize,
}

pub async fn process(
    ctx: &Context,
    repository: &GitlabRepository,
    data: &PushWebhookData,
) -> anyhow::Result<PushOutcome> {
    let mut resolver =
        ReferenceResolver::new(ctx.artifacts.as_ref(), &ctx.config.references.artifact_keyword);
    let mut projects: Option<Vec<Project>> = None;
    let mut outcome = PushOutcome::default();

    for commit in &data.commits {
        let span = log::info_span!("commit", sha1 = short_sha(&commit.sha1));
        process_commit(ctx, repository, commit, &mut resolver, &mut projects, &mut outcome)
            .instrument(span)
            .await?;
    }
    Ok(outcome)
}

async fn process_commit(
    ctx: &Context,
    repository: &GitlabRepository,
    commit: &PushCommit,
    resolver: &mut ReferenceResolver<'_>,
    projects: &mut Option<Vec<Project>>,
    outcome: &mut PushOutcome,
) -> anyhow::Result<()> {
    let extracted: parser::ReferenceSet = ctx.parser.extract(&commit.message).collect();
    if extracted.is_empty() {
        return Ok(());
    }
    log::info!(
        "{} references found in commit {}",
        extracted.len(),
        short_sha(&commit.sha1)
    );

    let mut artifacts = Vec::new();
    for id in &extracted {
        if let Resolution::Found(artifact) = resolver.resolve_logged(id).await? {
            artifacts.push(artifact);
        }
    }

    ctx.commits
        .save_commit(&CommitInfo {
            repository_id: repository.id,
            sha1: commit.sha1.clone(),
            title: commit.title.clone(),
            message: commit.message.clone(),
            author_name: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            committed_date: commit.committed_date,
        })
        .await?;
    outcome.commits_saved += 1;

    if artifacts.is_empty() {
        return Ok(());
    }
    if projects.is_none() {
        *projects = Some(ctx.repositories.projects_integrated_in(repository).await?);
    }
    for project in projects.iter().flatten() {
        for artifact in &artifacts {
            let link = CrossReference::commit(repository, &commit.sha1, project, artifact);
            if ctx.cross_references.insert(&link).await? {
                outcome.links_recorded += 1;
            }
        }
    }
    Ok(())
}

/// The abbreviated form GitLab shows commits with.
pub fn short_sha(sha1: &str) -> &str {
    sha1.get(..10).unwrap_or(sha1)
}
