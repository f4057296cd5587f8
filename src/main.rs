use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use codeblue::backoff::Backoff;
use codeblue::blob::{BlobStore, MemoryBlobStore};
use codeblue::documents;
use codeblue::severity::KeywordScorer;
use codeblue::store::{PgStore, Store};
use codeblue::{app, AppState};

/// Period of the background pass that deletes expired documents. Expiry is
/// also enforced lazily on every access, so this only bounds how long dead
/// bytes linger.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = match std::env::var("DATABASE_URL") {
        Ok(url) if url != "memory" => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            PgStore::migrate(&pool).await?;
            tracing::info!("database connected");
            Store::postgres(pool)
        }
        _ => {
            tracing::info!("no DATABASE_URL, using in-memory store");
            Store::memory()
        }
    };

    let token_secret = std::env::var("TOKEN_SECRET").unwrap_or_else(|_| {
        tracing::warn!("TOKEN_SECRET not set, using development secret");
        "development-secret".to_string()
    });

    let state = AppState::new(
        store,
        Arc::new(MemoryBlobStore::new()),
        Arc::new(KeywordScorer),
        token_secret,
    );

    tokio::spawn(sweep_loop(state.store.clone(), state.blobs.clone()));

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {bind_addr}");

    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn sweep_loop(store: Arc<Store>, blobs: Arc<dyn BlobStore>) {
    // Failed sweeps retry sooner than the normal cadence, backing off
    // toward it while the store stays unhealthy.
    let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(60));
    loop {
        let delay = match documents::sweep_expired(&store, blobs.as_ref()).await {
            Ok(_) => {
                backoff.record_success();
                SWEEP_INTERVAL
            }
            Err(err) => {
                tracing::warn!("document sweep failed: {err}");
                backoff.record_failure()
            }
        };
        tokio::time::sleep(delay).await;
    }
}
