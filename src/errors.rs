//! Errors handling

use std::fmt;

use crate::gitlab::GitlabApiError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// An error meant for the API client, with the status it should be answered with.
///
/// The message is shown as is, so it must not leak anything the caller is not
/// allowed to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> ApiError {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> ApiError {
        ApiError::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn unauthorized() -> ApiError {
        ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl std::error::Error for ApiError {}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.status.as_u16(),
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

/// Represent a application error.
///
/// Useful for returning a error via the API
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("{:?}", &self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

/// Why an operation on an integrated GitLab repository was refused.
#[derive(Debug)]
pub enum RepositoryError {
    /// Unknown repository or project, or the user administrates none of the projects.
    NotFound,
    /// Another repository with this path is already integrated in the project.
    SameNameAlreadyIntegrated(String),
    AlreadyIntegrated {
        repository_id: i64,
        project_id: i64,
    },
    /// GitLab refused the token or could not be reached.
    Request(String),
    /// GitLab answered something we do not understand.
    Response,
    Other(anyhow::Error),
}

impl From<anyhow::Error> for RepositoryError {
    fn from(e: anyhow::Error) -> RepositoryError {
        RepositoryError::Other(e)
    }
}

impl From<GitlabApiError> for RepositoryError {
    fn from(e: GitlabApiError) -> RepositoryError {
        tracing::error!("{e}");
        match e {
            GitlabApiError::Request { message, .. } => RepositoryError::Request(message),
            GitlabApiError::Response(_) => RepositoryError::Response,
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RepositoryError::NotFound => write!(f, "Not Found"),
            RepositoryError::SameNameAlreadyIntegrated(name) => write!(
                f,
                "A GitLab repository named {name} is already integrated in this project."
            ),
            RepositoryError::AlreadyIntegrated {
                repository_id,
                project_id,
            } => write!(
                f,
                "The GitLab repository #{repository_id} is already integrated in project \
                 #{project_id}."
            ),
            RepositoryError::Request(message) => write!(
                f,
                "Unable to contact the server with the provided token. Please ensure that \
                 token has \"api\" scope. GitLab server error: {message}"
            ),
            RepositoryError::Response => write!(
                f,
                "We managed to contact the server, but couldn't parse the response. We are \
                 not confident enough to update the token."
            ),
            RepositoryError::Other(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl IntoResponse for RepositoryError {
    fn into_response(self) -> Response {
        match self {
            RepositoryError::NotFound => ApiError::not_found().into_response(),
            RepositoryError::SameNameAlreadyIntegrated(_)
            | RepositoryError::AlreadyIntegrated { .. }
            | RepositoryError::Request(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            RepositoryError::Response => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            RepositoryError::Other(e) => AppError::from(e).into_response(),
        }
    }
}
