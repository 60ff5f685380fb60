use anyhow::Context as _;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_postgres::Client as DbClient;

pub mod artifacts;
pub mod commits;
pub mod cross_references;
pub mod merge_requests;
pub mod repositories;
pub mod users;

pub use artifacts::ArtifactResolver;
pub use commits::{CommitInfo, CommitStore};
pub use cross_references::{CrossReference, CrossReferenceStore};
pub use merge_requests::{MergeRequestSnapshot, MergeRequestStore};
pub use repositories::{NewIntegration, Project, RepositoryStore, WebhookRecord};
pub use users::{User, UserStore};

const POOL_SIZE: usize = 16;

pub struct ClientPool {
    connections: Arc<Mutex<Vec<DbClient>>>,
    permits: Arc<Semaphore>,
    db_url: String,
}

pub struct PooledClient {
    client: Option<DbClient>,
    #[allow(unused)] // only used for drop impl
    permit: OwnedSemaphorePermit,
    pool: Arc<Mutex<Vec<DbClient>>>,
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(client);
        }
    }
}

impl std::ops::Deref for PooledClient {
    type Target = DbClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref().expect("client is only taken on drop")
    }
}

impl std::ops::DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client.as_mut().expect("client is only taken on drop")
    }
}

impl ClientPool {
    pub fn new(db_url: String) -> ClientPool {
        ClientPool {
            connections: Arc::new(Mutex::new(Vec::with_capacity(POOL_SIZE))),
            permits: Arc::new(Semaphore::new(POOL_SIZE)),
            db_url,
        }
    }

    pub async fn get(&self) -> anyhow::Result<PooledClient> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .context("connection pool closed")?;
        let client = {
            let mut slots = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            // Pop connections until we hit a non-closed connection (or there are no
            // "possibly open" connections left).
            let mut client = None;
            while let Some(c) = slots.pop() {
                if !c.is_closed() {
                    client = Some(c);
                    break;
                }
            }
            client
        };

        let client = match client {
            Some(client) => client,
            None => make_client(&self.db_url).await?,
        };
        Ok(PooledClient {
            client: Some(client),
            permit,
            pool: self.connections.clone(),
        })
    }
}

pub async fn make_client(db_url: &str) -> anyhow::Result<DbClient> {
    if db_url.contains("sslmode=require") {
        let connector = TlsConnector::builder()
            .build()
            .context("built TlsConnector")?;
        let connector = MakeTlsConnector::new(connector);

        let (db_client, connection) = match tokio_postgres::connect(db_url, connector).await {
            Ok(v) => v,
            Err(e) => {
                anyhow::bail!("failed to connect to DB: {}", e);
            }
        };
        tokio::task::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(db_client)
    } else {
        tracing::warn!("Non-TLS connection to DB");
        let (db_client, connection) =
            match tokio_postgres::connect(db_url, tokio_postgres::NoTls).await {
                Ok(v) => v,
                Err(e) => {
                    anyhow::bail!("failed to connect to DB: {}", e);
                }
            };
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("database connection error: {}", e);
            }
        });

        Ok(db_client)
    }
}

pub async fn run_migrations(client: &mut DbClient) -> anyhow::Result<()> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS database_versions (
                zero INTEGER PRIMARY KEY,
                migration_counter INTEGER
            );",
            &[],
        )
        .await
        .context("creating database versioning table")?;

    client
        .execute(
            "INSERT INTO database_versions (zero, migration_counter)
                VALUES (0, 0)
                ON CONFLICT DO NOTHING",
            &[],
        )
        .await
        .context("inserting initial database_versions")?;

    let migration_idx: i32 = client
        .query_one("SELECT migration_counter FROM database_versions", &[])
        .await
        .context("getting migration counter")?
        .get(0);
    let migration_idx = migration_idx as usize;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        if idx >= migration_idx {
            let tx = client
                .transaction()
                .await
                .context("Cannot create migration transaction")?;
            tx.execute(*migration, &[])
                .await
                .with_context(|| format!("executing {idx}th migration"))?;
            tx.execute(
                "UPDATE database_versions SET migration_counter = $1",
                &[&(idx as i32 + 1)],
            )
            .await
            .with_context(|| format!("updating migration counter to {idx}"))?;
            tx.commit()
                .await
                .context("Cannot commit migration transaction")?;
        }
    }

    Ok(())
}

/// The Postgres implementation of every store used by the handlers.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<ClientPool>,
}

impl PgStore {
    pub fn new(pool: ClientPool) -> PgStore {
        PgStore {
            pool: Arc::new(pool),
        }
    }

    pub async fn client(&self) -> anyhow::Result<PooledClient> {
        self.pool.get().await
    }
}

static MIGRATIONS: &[&str] = &[
    "
CREATE TABLE projects (
    project_id BIGINT PRIMARY KEY,
    unix_name TEXT NOT NULL,
    public_name TEXT NOT NULL
);
",
    "
CREATE TABLE gitlab_repositories (
    id BIGSERIAL PRIMARY KEY,
    gitlab_repository_id BIGINT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    gitlab_repository_url TEXT NOT NULL,
    last_push_date TIMESTAMP WITH TIME ZONE NOT NULL,
    UNIQUE (gitlab_repository_id, gitlab_repository_url)
);
",
    "
CREATE TABLE gitlab_repository_projects (
    repository_id BIGINT NOT NULL REFERENCES gitlab_repositories (id) ON DELETE CASCADE,
    project_id BIGINT NOT NULL REFERENCES projects (project_id) ON DELETE CASCADE,
    PRIMARY KEY (repository_id, project_id)
);
",
    "
CREATE TABLE merge_request_info (
    repository_id BIGINT NOT NULL REFERENCES gitlab_repositories (id) ON DELETE CASCADE,
    merge_request_iid BIGINT NOT NULL,
    title TEXT NOT NULL,
    PRIMARY KEY (repository_id, merge_request_iid)
);
",
    "ALTER TABLE merge_request_info ADD COLUMN description TEXT NOT NULL DEFAULT '';",
    "ALTER TABLE merge_request_info ADD COLUMN state TEXT NOT NULL DEFAULT '';",
    "
CREATE TABLE commit_info (
    repository_id BIGINT NOT NULL REFERENCES gitlab_repositories (id) ON DELETE CASCADE,
    commit_sha1 TEXT NOT NULL,
    commit_date TIMESTAMP WITH TIME ZONE NOT NULL,
    commit_title TEXT NOT NULL,
    commit_message TEXT NOT NULL,
    author_name TEXT NOT NULL,
    author_email TEXT NOT NULL,
    PRIMARY KEY (repository_id, commit_sha1)
);
",
    "
CREATE TABLE reference_keywords (
    keyword TEXT PRIMARY KEY,
    nature TEXT NOT NULL
);
",
    "INSERT INTO reference_keywords (keyword, nature) VALUES ('art', 'plugin_tracker_artifact');",
    "
CREATE TABLE artifacts (
    artifact_id BIGINT PRIMARY KEY,
    project_id BIGINT NOT NULL
);
",
    "
CREATE TABLE cross_references (
    id BIGSERIAL PRIMARY KEY,
    source_type TEXT NOT NULL,
    source_value TEXT NOT NULL,
    source_gid BIGINT NOT NULL,
    target_type TEXT NOT NULL,
    target_value TEXT NOT NULL,
    target_gid BIGINT NOT NULL,
    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT now(),
    UNIQUE (source_type, source_value, source_gid, target_type, target_value, target_gid)
);
",
    "
CREATE TABLE gitlab_bot_api_tokens (
    repository_id BIGINT PRIMARY KEY REFERENCES gitlab_repositories (id) ON DELETE CASCADE,
    token TEXT NOT NULL
);
",
    "
CREATE TABLE gitlab_webhooks (
    repository_id BIGINT PRIMARY KEY REFERENCES gitlab_repositories (id) ON DELETE CASCADE,
    gitlab_webhook_id BIGINT,
    webhook_secret TEXT NOT NULL
);
",
    "
CREATE TABLE users (
    user_id BIGINT PRIMARY KEY,
    username TEXT NOT NULL
);
",
    "
CREATE TABLE user_api_keys (
    key_sha256 TEXT PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users (user_id) ON DELETE CASCADE
);
",
    "
CREATE TABLE project_git_admins (
    project_id BIGINT NOT NULL REFERENCES projects (project_id) ON DELETE CASCADE,
    user_id BIGINT NOT NULL REFERENCES users (user_id) ON DELETE CASCADE,
    PRIMARY KEY (project_id, user_id)
);
",
];
