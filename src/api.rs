//! The REST endpoints used by the instance and its users.

use crate::cross_reference::{
    CrossReferenceByNatureOrganizer, CrossReferencePresenter, CrossReferenceSection, Lookups,
    organize,
};
use crate::db::User;
use crate::errors::{ApiError, AppError, RepositoryError};
use crate::gitlab::GitlabRepository;
use crate::handlers::Context;
use crate::handlers::bot_token::{self, BotApiTokenRequest};
use crate::handlers::integration::{self, IntegrationRequest};
use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parser::ReferenceId;
use std::sync::Arc;

/// A user authenticated by an `Authorization: Bearer <api key>` header.
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<Arc<Context>> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<Context>,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            return Err(ApiError::unauthorized().into_response());
        };
        match ctx.users.user_by_api_key(key).await {
            Ok(Some(user)) => Ok(AuthenticatedUser(user)),
            Ok(None) => Err(ApiError::unauthorized().into_response()),
            Err(e) => Err(AppError::from(e).into_response()),
        }
    }
}

pub async fn update_bot_api_token(
    State(ctx): State<Arc<Context>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<BotApiTokenRequest>,
) -> Result<StatusCode, RepositoryError> {
    bot_token::update_bot_api_token(&ctx, &user, &request).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn integrate_repository(
    State(ctx): State<Arc<Context>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<IntegrationRequest>,
) -> Result<(StatusCode, Json<GitlabRepository>), RepositoryError> {
    let repository = integration::integrate_repository(&ctx, &user, &request).await?;
    Ok((StatusCode::CREATED, Json(repository)))
}

pub async fn artifact_cross_references(
    State(ctx): State<Arc<Context>>,
    AuthenticatedUser(_): AuthenticatedUser,
    Path(artifact_id): Path<u64>,
) -> Result<Json<Vec<CrossReferenceSection>>, Response> {
    let Some(artifact_id) = ReferenceId::new(artifact_id) else {
        return Err(ApiError::not_found().into_response());
    };
    let stored = ctx
        .cross_references
        .for_artifact(artifact_id)
        .await
        .map_err(|e| AppError::from(e).into_response())?;

    let mut organizer = CrossReferenceByNatureOrganizer::new(
        stored.iter().map(CrossReferencePresenter::from_stored).collect(),
    );
    let lookups = Lookups {
        repositories: ctx.repositories.as_ref(),
        commits: ctx.commits.as_ref(),
        merge_requests: ctx.merge_requests.as_ref(),
    };
    organize(&lookups, &mut organizer)
        .await
        .map_err(|e| AppError::from(e).into_response())?;
    Ok(Json(organizer.into_sections()))
}
