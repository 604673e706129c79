use anyhow::Result;
use sensor_series_ingest::config::Config;
use sensor_series_ingest::http::{self, HttpState};
use sensor_series_ingest::ingest::Ingestor;
use sensor_series_ingest::scheduler::RefreshScheduler;
use sensor_series_ingest::store::{DocumentStore, HttpDocStore, MemoryStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sensor_series_ingest=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    let store: Arc<dyn DocumentStore> = match &config.store_url {
        Some(url) => {
            tracing::info!(store = %url, "using HTTP document store");
            Arc::new(HttpDocStore::new(url.clone()))
        }
        None => {
            tracing::warn!("INGEST_STORE_URL not set; using in-process memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let ingestor = Ingestor::new(store.clone(), config.required_fields.clone());
    let cancel = CancellationToken::new();
    let series = RefreshScheduler::new(store, &config).start(cancel.clone());

    let app = http::router(HttpState { ingestor, series });
    let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
    tracing::info!(bind = %config.http_bind, "sensor-series-ingest HTTP listening");
    let http_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        _ = http_handle => {}
    }

    cancel.cancel();
    Ok(())
}
