//! Coffee Commerce - cart and checkout service

use std::sync::Arc;

use anyhow::Result;
use coffee_commerce::config::Config;
use coffee_commerce::publisher::EventPublisher;
use coffee_commerce::routes::{self, AppState};
use coffee_commerce::store::{CommerceStore, InMemoryStore, PgStore};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = Config::from_env()?;
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, config.max_connections).await?;
            store.migrate().await?;
            serve(store, &config, events).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(InMemoryStore::new(), &config, events).await
        }
    }
}

async fn serve<S: CommerceStore + 'static>(store: S, config: &Config, events: EventPublisher) -> Result<()> {
    let app = routes::router(AppState::new(Arc::new(store), config, events));
    let addr = config.addr();
    tracing::info!(%addr, min = config.cart.bounds.min(), max = config.cart.bounds.max(), finalized = %config.cart.finalized, "☕ Coffee Commerce listening");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
