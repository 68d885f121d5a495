use anyhow::Context;
use roostdb::{
    auth::{Argon2Passwords, SessionRegistry},
    web, Config, Database, Social,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// How often expired sessions are swept
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).context("invalid log filter")?)
        .init();

    info!("RoostDB starting...");

    let db = Arc::new(Database::open(&config.store).context("failed to open store")?);
    let social = Social::new(db.clone());
    let sessions = Arc::new(SessionRegistry::new(config.session_ttl()?));

    let shutdown = CancellationToken::new();
    let state = web::AppState {
        social,
        sessions: sessions.clone(),
        passwords: Arc::new(Argon2Passwords::default()),
        shutdown: shutdown.clone(),
    };

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutting down");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let stop_purge = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = stop_purge.cancelled() => break,
                _ = interval.tick() => {
                    let purged = sessions.purge_expired();
                    if purged > 0 {
                        debug!("Purged {} expired sessions", purged);
                    }
                }
            }
        }
    });

    let served = web::run_web_server(&config.server_address, state).await;

    // Flush whatever the sync policy left buffered
    db.sync().context("failed to sync commit log")?;
    info!("Commit log synced");

    served
}
