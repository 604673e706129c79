use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use serde::Serialize;
use std::env;
use std::time::Duration;
use url::Url;

/// Unit the `timestamp` attribute of incoming readings is expressed in.
/// The pipeline carries timestamps as raw integers; the unit is only
/// surfaced alongside published series so consumers can label the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    Seconds,
    Millis,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_bind: String,

    /// Base URL of the document store; `None` runs against the in-process
    /// memory store (useful for demos and tests).
    pub store_url: Option<Url>,

    pub required_fields: Vec<String>,
    pub metric_keys: Vec<String>,
    pub refresh_interval: Duration,
    pub strict_alignment: bool,
    pub timestamp_unit: TimestampUnit,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let http_bind = env_string("INGEST_HTTP_BIND", Some("127.0.0.1:9200".to_string()))?;

        let store_url = match env_optional("INGEST_STORE_URL") {
            Some(raw) => Some(Url::parse(&raw).context("invalid INGEST_STORE_URL")?),
            None => None,
        };

        let required_fields = env_list(
            "INGEST_REQUIRED_FIELDS",
            &["partitionKey".to_string(), "name".to_string()],
        );
        let metric_keys = env_list(
            "INGEST_METRIC_KEYS",
            &[
                "space_nursery.temperature".to_string(),
                "space_nursery.humidity".to_string(),
                "space_nursery.lux".to_string(),
            ],
        );

        let refresh_interval =
            Duration::from_millis(env_u64("INGEST_REFRESH_INTERVAL_MS", Some(30_000))?);
        if refresh_interval.is_zero() {
            return Err(anyhow!("INGEST_REFRESH_INTERVAL_MS must be positive"));
        }

        let strict_alignment = env::var("INGEST_STRICT_ALIGNMENT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let timestamp_unit = match env_optional("INGEST_TIMESTAMP_UNIT").as_deref() {
            None | Some("seconds") => TimestampUnit::Seconds,
            Some("millis") | Some("milliseconds") => TimestampUnit::Millis,
            Some(other) => return Err(anyhow!("invalid INGEST_TIMESTAMP_UNIT: {other}")),
        };

        Ok(Self {
            http_bind,
            store_url,
            required_fields,
            metric_keys,
            refresh_interval,
            strict_alignment,
            timestamp_unit,
        })
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_list(key: &str, default: &[String]) -> Vec<String> {
    match env_optional(key) {
        Some(raw) => raw
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        None => default.to_vec(),
    }
}
