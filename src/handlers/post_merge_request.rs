//! Purpose: Track the references a merge request makes to artifacts.
//!
//! Each merge request webhook carries the current title and description. References
//! found in them are compared with the ones found in the last saved version of the
//! merge request; newly referenced artifacts are announced on the merge request, and
//! every referenced artifact gets a cross-reference for each project the repository is
//! integrated in.

use super::Context;
use super::references::{ReferenceResolver, Resolution};
use crate::db::{CrossReference, MergeRequestSnapshot};
use crate::gitlab::{GitlabRepository, MergeRequestWebhookData};
use parser::{ReferenceId, ReferenceSet};
use tracing as log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementKind {
    Added,
    Removed,
}

/// References to announce on the merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: AnnouncementKind,
    pub references: ReferenceSet,
}

/// What to do with a merge request update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestPlan {
    pub save_snapshot: bool,
    pub announcement: Option<Announcement>,
    /// Resolved ids to link to the merge request.
    pub cross_references: ReferenceSet,
}

/// What processing a merge request update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestOutcome {
    pub extracted: ReferenceSet,
    pub resolutions: Vec<(ReferenceId, Resolution)>,
    pub snapshot_saved: bool,
    pub announcement: Option<Announcement>,
    /// Cross-references that did not exist before.
    pub links_recorded: usize,
}

/// Decides what an update implies.
///
/// `previous` holds the resolved references of the saved snapshot, `None` when there is
/// no snapshot. `extracted` holds every reference found in the update and `current` the
/// ones that resolved.
pub fn plan(
    previous: Option<&ReferenceSet>,
    extracted: &ReferenceSet,
    current: &ReferenceSet,
) -> MergeRequestPlan {
    let save_snapshot = !extracted.is_empty() || previous.is_some();

    let no_references = ReferenceSet::new();
    let previous = previous.unwrap_or(&no_references);
    let added = current.difference(previous);
    let removed = previous.difference(current);

    let cross_references = current.union(&removed);
    let announcement = if !added.is_empty() {
        Some(Announcement {
            kind: AnnouncementKind::Added,
            references: added,
        })
    } else if !removed.is_empty() {
        Some(Announcement {
            kind: AnnouncementKind::Removed,
            references: removed,
        })
    } else {
        None
    };

    MergeRequestPlan {
        save_snapshot,
        announcement,
        cross_references,
    }
}

pub async fn process(
    ctx: &Context,
    repository: &GitlabRepository,
    data: &MergeRequestWebhookData,
) -> anyhow::Result<MergeRequestOutcome> {
    let iid = data.merge_request_iid;
    let extracted = ctx
        .parser
        .extract_all(&[data.title.as_str(), data.description.as_str()]);
    log::info!(
        iid,
        "{} references found in merge request {iid}",
        extracted.len()
    );

    let mut resolver =
        ReferenceResolver::new(ctx.artifacts.as_ref(), &ctx.config.references.artifact_keyword);
    let mut resolutions = Vec::with_capacity(extracted.len());
    let mut current = ReferenceSet::new();
    for id in &extracted {
        let resolution = resolver.resolve_logged(id).await?;
        if let Resolution::Found(_) = resolution {
            current.insert(id);
        }
        resolutions.push((id, resolution));
    }

    let previous = match ctx.merge_requests.snapshot(repository.id, iid).await? {
        Some(snapshot) => {
            let ids = ctx
                .parser
                .extract_all(&[snapshot.title.as_str(), snapshot.description.as_str()]);
            Some(resolver.found(&ids).await?)
        }
        None => None,
    };

    let plan = plan(previous.as_ref(), &extracted, &current);

    if plan.save_snapshot {
        let snapshot = MergeRequestSnapshot {
            title: data.title.clone(),
            description: data.description.clone(),
            state: data.state.clone(),
        };
        ctx.merge_requests
            .save_snapshot(repository.id, iid, &snapshot)
            .await?;
        log::info!(iid, "Merge request data for {iid} saved in database");
    }

    let projects = if plan.cross_references.is_empty() && plan.announcement.is_none() {
        Vec::new()
    } else {
        ctx.repositories.projects_integrated_in(repository).await?
    };

    let mut links_recorded = 0;
    for id in &plan.cross_references {
        let Some(artifact) = resolver.artifact(id) else {
            continue;
        };
        for project in &projects {
            let link = CrossReference::merge_request(repository, iid, project, &artifact);
            if ctx.cross_references.insert(&link).await? {
                links_recorded += 1;
            }
        }
    }

    if let Some(announcement) = &plan.announcement {
        match announcement.kind {
            AnnouncementKind::Added => {
                log::debug!("Some references are added, a comment should be added")
            }
            AnnouncementKind::Removed => {
                log::debug!("Some references are removed, a comment should be added")
            }
        }
        if !ctx.config.comments.enabled {
            log::debug!("comments are disabled, merge request {iid} is left untouched");
        } else if let Err(e) = ctx
            .commenter
            .announce(repository, data, announcement, &projects)
            .await
        {
            log::error!("failed to comment merge request {iid}: {e:?}");
        }
    }

    Ok(MergeRequestOutcome {
        extracted,
        resolutions,
        snapshot_saved: plan.save_snapshot,
        announcement: plan.announcement,
        links_recorded,
    })
}
