use crate::error::PipelineError;
use crate::ingest::{IngestReport, Ingestor};
use crate::reshape::SeriesBundle;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::watch;

#[derive(Clone)]
pub struct HttpState {
    pub ingestor: Ingestor,
    pub series: watch::Receiver<SeriesBundle>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn post_readings(
    State(state): State<HttpState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<IngestReport>), (StatusCode, String)> {
    let report = state.ingestor.ingest(&payload).await.map_err(|err| match err {
        PipelineError::MalformedBatch => (StatusCode::BAD_REQUEST, err.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    let status = if report.is_total_failure() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)))
}

/// Latest bundle published by the refresh scheduler; the empty placeholder
/// before its first tick.
async fn get_series(State(state): State<HttpState>) -> Json<SeriesBundle> {
    Json(state.series.borrow().clone())
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/readings", post(post_readings))
        .route("/v1/series", get(get_series))
        .with_state(state)
}
