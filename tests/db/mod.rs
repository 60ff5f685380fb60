//! Tests for the database API.
//!
//! Each test gets a freshly migrated database through [`run_test`]:
//!
//! ```rust
//! #[tokio::test]
//! async fn example() {
//!     run_test(|ctx| async move {
//!         // Call store methods on `ctx.store` and verify their behavior.
//!         Ok(ctx)
//!     })
//!     .await;
//! }
//! ```

use refbot::db::{self, ClientPool, PgStore, make_client};
use std::future::Future;
use tokio_postgres::config::Host;
use tokio_postgres::Config;

mod artifacts;
mod commits;
mod cross_references;
mod merge_requests;
mod repositories;
mod users;

pub struct TestContext {
    pub store: PgStore,
    db_name: String,
    original_db_url: String,
}

impl TestContext {
    async fn new(db_url: &str) -> Self {
        let config: Config = db_url.parse().expect("Cannot parse connection string");

        let client = make_client(db_url)
            .await
            .expect("Cannot connect to database");
        let db_name = format!("db{}", uuid::Uuid::new_v4().to_string().replace('-', ""));
        client
            .execute(&format!("CREATE DATABASE {db_name}"), &[])
            .await
            .expect("Cannot create database");
        drop(client);

        // Postgres does not allow changing the database of a connection, so build the
        // URL of the new one.
        let test_db_url = format!(
            "postgresql://{}:{}@{}/{}",
            config.get_user().unwrap(),
            String::from_utf8(config.get_password().unwrap_or_default().to_vec()).unwrap(),
            match &config.get_hosts()[0] {
                Host::Tcp(host) => host,
                Host::Unix(_) =>
                    panic!("Unix sockets in Postgres connection string are not supported"),
            },
            db_name
        );
        let pool = ClientPool::new(test_db_url);
        db::run_migrations(&mut *pool.get().await.unwrap())
            .await
            .expect("Cannot run database migrations");
        Self {
            store: PgStore::new(pool),
            db_name,
            original_db_url: db_url.to_string(),
        }
    }

    /// Executes raw SQL, for data no store writes.
    pub async fn execute(&self, sql: &str) {
        self.store
            .client()
            .await
            .unwrap()
            .batch_execute(sql)
            .await
            .expect("Cannot seed database");
    }

    /// Inserts `root/repo01` (gitlab id 123654), integrated in projects 101 and 102.
    pub async fn seed_repository(&self) -> i64 {
        self.execute(
            "INSERT INTO projects (project_id, unix_name, public_name) VALUES
                (101, 'ACME', 'Acme Corp'),
                (102, 'other', 'Other');
             INSERT INTO gitlab_repositories
                (gitlab_repository_id, name, description, gitlab_repository_url, last_push_date)
                VALUES (123654, 'root/repo01', '', 'https://example.com/root/repo01', now());",
        )
        .await;
        let id: i64 = self
            .store
            .client()
            .await
            .unwrap()
            .query_one("SELECT id FROM gitlab_repositories", &[])
            .await
            .unwrap()
            .get(0);
        self.execute(&format!(
            "INSERT INTO gitlab_repository_projects (repository_id, project_id)
                VALUES ({id}, 101), ({id}, 102);"
        ))
        .await;
        id
    }

    async fn finish(self) {
        drop(self.store);

        let client = make_client(&self.original_db_url)
            .await
            .expect("Cannot connect to database");
        client
            .execute(&format!("DROP DATABASE {}", self.db_name), &[])
            .await
            .unwrap();
    }
}

pub async fn run_test<F, Fut>(f: F)
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = anyhow::Result<TestContext>>,
{
    if let Ok(db_url) = std::env::var("TEST_DB_URL") {
        let ctx = TestContext::new(&db_url).await;
        let ctx = f(ctx).await.expect("Test failed");
        ctx.finish().await;
    } else {
        eprintln!("Skipping test because TEST_DB_URL was not passed");
    }
}
