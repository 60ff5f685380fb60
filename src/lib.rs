#![allow(clippy::new_without_default)]

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, patch, post};
use handlers::Context;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod cross_reference;
pub mod db;
pub mod errors;
pub mod gitlab;
pub mod handlers;
pub mod interactions;

#[cfg(test)]
mod tests;

const MAX_CONCURRENT_REQUESTS: usize = 100;

pub fn router(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/", get(|| async { "refbot is listening to GitLab." }))
        .route("/gitlab-hook", post(gitlab::webhook))
        .route(
            "/api/v1/gitlab_repositories",
            post(api::integrate_repository),
        )
        .route(
            "/api/v1/gitlab_repositories/bot_api_token",
            patch(api::update_bot_api_token),
        )
        .route(
            "/api/v1/artifacts/{id}/cross_references",
            get(api::artifact_cross_references),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|id| id.to_str().ok())
                            .unwrap_or_default();
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id,
                        )
                    }),
                )
                .layer(CatchPanicLayer::new())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS)),
        )
        .with_state(ctx)
}
