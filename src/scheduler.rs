use crate::config::{Config, TimestampUnit};
use crate::reshape::{reshape, SeriesBundle};
use crate::store::DocumentStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Re-runs the reshape pass on a fixed delay and republishes the bundle to
/// consumers over a watch channel. Each pass re-reads the full collection;
/// there is no incremental computation.
pub struct RefreshScheduler {
    store: Arc<dyn DocumentStore>,
    metric_keys: Vec<String>,
    strict_alignment: bool,
    timestamp_unit: TimestampUnit,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            store,
            metric_keys: config.metric_keys.clone(),
            strict_alignment: config.strict_alignment,
            timestamp_unit: config.timestamp_unit,
            period: config.refresh_interval,
        }
    }

    /// Spawns the refresh loop. The first pass fires one full period after
    /// start, and passes never overlap: they run inline in the loop, and a
    /// tick that comes due mid-pass fires immediately after it completes.
    /// Cancelling the token stops future ticks without interrupting an
    /// in-flight pass, so one final publish may still land after cancel.
    pub fn start(self, cancel: CancellationToken) -> watch::Receiver<SeriesBundle> {
        let (tx, rx) = watch::channel(SeriesBundle::empty(Utc::now(), self.timestamp_unit));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let bundle = self.pass().await;
                        if tx.send(bundle).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("refresh scheduler stopped");
        });
        rx
    }

    /// One reshape pass. A store read failure degrades to an empty bundle
    /// for this tick; the schedule itself keeps going.
    async fn pass(&self) -> SeriesBundle {
        let generated_at = Utc::now();
        match self.store.read_all().await {
            Ok(docs) => {
                let bundle = reshape(
                    &docs,
                    &self.metric_keys,
                    self.strict_alignment,
                    self.timestamp_unit,
                    generated_at,
                );
                tracing::debug!(
                    documents = docs.len(),
                    points = bundle.timestamps.len(),
                    "refresh pass complete"
                );
                bundle
            }
            Err(err) => {
                tracing::warn!(error = %err, "refresh pass failed; publishing empty bundle");
                SeriesBundle::empty(generated_at, self.timestamp_unit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoredDocument};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    fn test_config(period_ms: u64) -> Config {
        Config {
            http_bind: "127.0.0.1:0".to_string(),
            store_url: None,
            required_fields: vec!["partitionKey".to_string(), "name".to_string()],
            metric_keys: vec!["temperature".to_string()],
            refresh_interval: Duration::from_millis(period_ms),
            strict_alignment: false,
            timestamp_unit: TimestampUnit::Seconds,
        }
    }

    fn doc(id: &str, ts: i64, temperature: f64) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            partition_key: "p".to_string(),
            name: "a".to_string(),
            timestamp: Some(ts),
            groups: BTreeMap::new(),
            metrics: BTreeMap::from([("temperature".to_string(), temperature)]),
        }
    }

    struct DownStore;

    #[async_trait]
    impl DocumentStore for DownStore {
        async fn upsert(&self, _doc: StoredDocument) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn read_all(&self) -> Result<Vec<StoredDocument>, StoreError> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn publishes_after_one_period() {
        let store = Arc::new(MemoryStore::new());
        store.upsert(doc("1", 5, 19.0)).await.unwrap();
        store.upsert(doc("2", 10, 20.0)).await.unwrap();

        let cancel = CancellationToken::new();
        let scheduler = RefreshScheduler::new(store, &test_config(10));
        let mut rx = scheduler.start(cancel.clone());

        // Initial value is the empty placeholder, not a pass result.
        assert!(rx.borrow().timestamps.is_empty());

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("scheduler never published")
            .unwrap();
        let bundle = rx.borrow_and_update().clone();
        assert_eq!(bundle.timestamps, vec![5, 10]);
        assert_eq!(bundle.series[0].points[0].value, Some(19.0));

        cancel.cancel();
    }

    #[tokio::test]
    async fn read_failure_publishes_empty_bundle_and_keeps_ticking() {
        let cancel = CancellationToken::new();
        let scheduler = RefreshScheduler::new(Arc::new(DownStore), &test_config(10));
        let mut rx = scheduler.start(cancel.clone());

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("scheduler never published")
            .unwrap();
        assert!(rx.borrow_and_update().timestamps.is_empty());

        // Still ticking after the failure.
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("scheduler stopped after a transient failure")
            .unwrap();

        cancel.cancel();
    }

    #[tokio::test]
    async fn cancel_stops_future_ticks() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let scheduler = RefreshScheduler::new(store, &test_config(20));
        let mut rx = scheduler.start(cancel.clone());

        cancel.cancel();
        // Allow a possible in-flight pass to finish, then expect silence.
        tokio::time::sleep(Duration::from_millis(60)).await;
        rx.borrow_and_update();
        let outcome =
            tokio::time::timeout(Duration::from_millis(100), rx.changed()).await;
        match outcome {
            Err(_elapsed) => {}
            Ok(result) => assert!(result.is_err(), "scheduler kept publishing after cancel"),
        }
    }
}
