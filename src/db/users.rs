use super::PgStore;
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// Hex encoded SHA-256 of an API key, the form keys are stored in.
pub fn api_key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_api_key(&self, key: &str) -> Result<Option<User>>;

    async fn is_git_admin(&self, user_id: i64, project_id: i64) -> Result<bool>;
}

#[async_trait]
impl UserStore for PgStore {
    async fn user_by_api_key(&self, key: &str) -> Result<Option<User>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT u.user_id, u.username FROM users u \
                 JOIN user_api_keys k ON k.user_id = u.user_id \
                 WHERE k.key_sha256 = $1",
                &[&api_key_digest(key)],
            )
            .await
            .context("selecting user by api key")?;
        Ok(row.map(|row| User {
            id: row.get(0),
            name: row.get(1),
        }))
    }

    async fn is_git_admin(&self, user_id: i64, project_id: i64) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM project_git_admins WHERE user_id = $1 AND project_id = $2",
                &[&user_id, &project_id],
            )
            .await
            .context("selecting git administrators")?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            api_key_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
