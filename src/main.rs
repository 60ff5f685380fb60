use anyhow::Context as _;
use refbot::config::{self, CONFIG_FILE_NAME};
use refbot::db::{self, ClientPool, PgStore};
use refbot::gitlab::GitlabClient;
use refbot::handlers::Context;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, process};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 8000;

async fn run_server(addr: SocketAddr) -> anyhow::Result<()> {
    let db_url = env::var("DATABASE_URL").context("needs DATABASE_URL")?;
    let pool = ClientPool::new(db_url);
    db::run_migrations(&mut *pool.get().await?)
        .await
        .context("database migrations")?;

    let config_path = env::var("REFBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME));
    let config = config::load(&config_path)?;
    let webhook_url = env::var("REFBOT_WEBHOOK_URL").context("needs REFBOT_WEBHOOK_URL")?;

    let ctx = Context::new(config, PgStore::new(pool), GitlabClient::new(), webhook_url)?;
    let app = refbot::router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(env::var_os("DISABLE_COLOR").is_none())
        .init();

    let port = match env::var("PORT") {
        Ok(port) => match port.parse() {
            Ok(port) => port,
            Err(e) => {
                eprintln!("Invalid PORT {port:?}: {e}");
                process::exit(1);
            }
        },
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    if let Err(e) = run_server(addr).await {
        eprintln!("Failed to run server: {e:?}");
        process::exit(1);
    }
}
