//! The project description returned by `GET /projects/:id`.

use super::client::GitlabApiError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitlabProject {
    pub id: i64,
    /// Present but possibly `null` on the GitLab side.
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    pub web_url: String,
    pub name: String,
    pub path_with_namespace: String,
    #[serde(deserialize_with = "activity_date")]
    pub last_activity_at: DateTime<Utc>,
}

impl GitlabProject {
    /// Every key is required; a missing one means we do not understand the server.
    pub fn from_api_response(body: Value) -> Result<GitlabProject, GitlabApiError> {
        if !body.is_object() || body.as_object().is_some_and(|o| o.is_empty()) {
            return Err(GitlabApiError::Response(
                "project body is empty".to_string(),
            ));
        }
        serde_path_to_error::deserialize(body).map_err(|e| {
            GitlabApiError::Response(format!("project body at {}: {}", e.path(), e.inner()))
        })
    }
}

fn nullable_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn activity_date<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    if let Ok(date) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date `{raw}`")))
}
