use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use feed_client::FeedClient;
use newswatch_common::{Config, NewsWatchError};
use newswatch_engine::{DocumentStore, Engine, EngineHealth, FeedSource, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("newswatch=info".parse()?)
                .add_directive("feed_client=info".parse()?),
        )
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let feed: Arc<dyn FeedSource> = Arc::new(
        FeedClient::with_base_url(config.feed_base_url.clone(), config.feed_api_key.clone())
            .min_spacing(config.feed_min_request_spacing),
    );
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

    let engine = Engine::start(&config, feed, store).await;
    let mut health = engine.health();

    let fatal = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            None
        }
        state = async { health.wait_for(|h| !h.is_running()).await.map(|h| h.clone()) } => {
            state.ok()
        }
    };

    engine.stop().await;

    match fatal {
        Some(EngineHealth::IngestionDisabled {
            consecutive_failures,
            last_error,
        }) => {
            error!(consecutive_failures, last_error = last_error.as_str(), "Engine halted");
            Err(NewsWatchError::RepeatedFetchFailure {
                cycles: consecutive_failures,
            }
            .into())
        }
        Some(EngineHealth::IngestionCrashed { reason }) => {
            error!(reason = reason.as_str(), "Engine halted");
            Err(anyhow::anyhow!("ingestion task crashed: {reason}"))
        }
        _ => {
            info!("Engine stopped");
            Ok(())
        }
    }
}
