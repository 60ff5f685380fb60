//! Presentation of the cross-references of an artifact.
//!
//! Links coming from GitLab are grouped in one section per repository (named after the
//! project and the repository), and decorated with what is known about the commit or
//! the merge request. Links to items that no longer exist are dropped.

use crate::db::cross_references::{COMMIT_NATURE, MERGE_REQUEST_NATURE, StoredCrossReference};
use crate::db::{CommitStore, MergeRequestStore, RepositoryStore};
use crate::handlers::push::short_sha;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing as log;
use unicode_segmentation::UnicodeSegmentation;

const COMMIT_TITLE_MAX_GRAPHEMES: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationMetadata {
    pub author: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdditionalBadge {
    pub label: String,
}

/// One cross-reference as shown on the artifact: `target_*` is the other end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReferencePresenter {
    pub id: i64,
    #[serde(rename = "type")]
    pub type_: String,
    pub target_value: String,
    pub target_gid: i64,
    pub title: String,
    pub creation_metadata: Option<CreationMetadata>,
    pub additional_badges: Vec<AdditionalBadge>,
}

impl CrossReferencePresenter {
    pub fn from_stored(stored: &StoredCrossReference) -> CrossReferencePresenter {
        CrossReferencePresenter {
            id: stored.id,
            type_: stored.reference.source_type.clone(),
            target_value: stored.reference.source_value.clone(),
            target_gid: stored.reference.source_gid,
            title: stored.reference.source_value.clone(),
            creation_metadata: None,
            additional_badges: Vec::new(),
        }
    }

    fn with_title(self, title: String) -> Self {
        CrossReferencePresenter { title, ..self }
    }

    fn with_creation_metadata(self, author: String, date: DateTime<Utc>) -> Self {
        CrossReferencePresenter {
            creation_metadata: Some(CreationMetadata { author, date }),
            ..self
        }
    }

    fn with_badge(mut self, label: &str) -> Self {
        self.additional_badges.push(AdditionalBadge {
            label: label.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossReferenceSection {
    pub label: String,
    pub cross_references: Vec<CrossReferencePresenter>,
}

/// Presenters waiting to be sorted, and the sections they were sorted into.
#[derive(Debug, Default)]
pub struct CrossReferenceByNatureOrganizer {
    unsorted: Vec<CrossReferencePresenter>,
    sections: Vec<CrossReferenceSection>,
}

impl CrossReferenceByNatureOrganizer {
    pub fn new(presenters: Vec<CrossReferencePresenter>) -> Self {
        CrossReferenceByNatureOrganizer {
            unsorted: presenters,
            sections: Vec::new(),
        }
    }

    pub fn cross_references_to_organize(&self) -> &[CrossReferencePresenter] {
        &self.unsorted
    }

    /// Takes `original` out of the unsorted ones, and files `presenter` under `label`.
    pub fn move_to_section(
        &mut self,
        original: &CrossReferencePresenter,
        presenter: CrossReferencePresenter,
        label: &str,
    ) {
        self.unsorted.retain(|p| p.id != original.id);
        match self.sections.iter_mut().find(|s| s.label == label) {
            Some(section) => section.cross_references.push(presenter),
            None => self.sections.push(CrossReferenceSection {
                label: label.to_string(),
                cross_references: vec![presenter],
            }),
        }
    }

    pub fn remove_unreadable(&mut self, presenter: &CrossReferencePresenter) {
        self.unsorted.retain(|p| p.id != presenter.id);
    }

    /// The sections, followed by whatever was not sorted under an empty label.
    pub fn into_sections(self) -> Vec<CrossReferenceSection> {
        let mut sections = self.sections;
        if !self.unsorted.is_empty() {
            sections.push(CrossReferenceSection {
                label: String::new(),
                cross_references: self.unsorted,
            });
        }
        sections
    }
}

/// Splits `root/repo01/2` into `("root/repo01", "2")`.
pub fn split_repository_name_and_item_id(value: &str) -> Option<(&str, &str)> {
    let (name, item) = value.rsplit_once('/')?;
    if name.is_empty() || item.is_empty() {
        return None;
    }
    Some((name, item))
}

pub struct Lookups<'a> {
    pub repositories: &'a dyn RepositoryStore,
    pub commits: &'a dyn CommitStore,
    pub merge_requests: &'a dyn MergeRequestStore,
}

pub async fn organize(
    lookups: &Lookups<'_>,
    organizer: &mut CrossReferenceByNatureOrganizer,
) -> anyhow::Result<()> {
    let presenters = organizer.cross_references_to_organize().to_vec();
    for presenter in &presenters {
        let nature = presenter.type_.as_str();
        if nature != COMMIT_NATURE && nature != MERGE_REQUEST_NATURE {
            continue;
        }
        let Some((repository_name, item_id)) =
            split_repository_name_and_item_id(&presenter.target_value)
        else {
            continue;
        };

        let Some(project) = lookups.repositories.find_project(presenter.target_gid).await? else {
            organizer.remove_unreadable(presenter);
            continue;
        };
        let Some(repository) = lookups
            .repositories
            .find_by_name_in_project(project.id, repository_name)
            .await?
        else {
            log::debug!(
                "repository {repository_name} is not integrated in project {} anymore",
                project.id
            );
            organizer.remove_unreadable(presenter);
            continue;
        };
        let label = format!("{}/{}", project.unix_name_lower_case(), repository.name);

        if nature == COMMIT_NATURE {
            let Some(commit) = lookups.commits.find_commit(repository.id, item_id).await? else {
                organizer.remove_unreadable(presenter);
                continue;
            };
            let enriched = presenter
                .clone()
                .with_title(commit_title(&commit.message))
                .with_creation_metadata(commit.author_name, commit.committed_date)
                .with_badge(short_sha(&commit.sha1));
            organizer.move_to_section(presenter, enriched, &label);
        } else {
            let snapshot = match item_id.parse::<u64>() {
                Ok(iid) => lookups.merge_requests.snapshot(repository.id, iid).await?,
                Err(_) => None,
            };
            let Some(snapshot) = snapshot else {
                organizer.remove_unreadable(presenter);
                continue;
            };
            let mut enriched = presenter.clone().with_title(snapshot.title);
            if let Some(badge) = merge_request_badge(&snapshot.state) {
                enriched = enriched.with_badge(badge);
            }
            organizer.move_to_section(presenter, enriched, &label);
        }
    }
    Ok(())
}

fn commit_title(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    first_line
        .graphemes(true)
        .take(COMMIT_TITLE_MAX_GRAPHEMES)
        .collect()
}

fn merge_request_badge(state: &str) -> Option<&'static str> {
    match state {
        "opened" => Some("Open"),
        "merged" => Some("Merged"),
        "closed" => Some("Closed"),
        _ => None,
    }
}
