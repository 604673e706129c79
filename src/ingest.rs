use crate::error::PipelineError;
use crate::store::{DocumentStore, StoreError};
use crate::validate::validate_batch;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Applies validated batches to the document store, one upsert per item in
/// input order. Batches are not atomic: a failed item is recorded and its
/// siblings continue. Only a store outage aborts the remaining items.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    required_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemError {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub reason: String,
}

/// Aggregate outcome of one batch. Partial success is an expected,
/// reportable result; `store_unavailable` marks the abort case where the
/// trailing items were never attempted.
#[derive(Debug, Clone, Serialize, Default)]
pub struct IngestReport {
    pub accepted: usize,
    pub errors: Vec<ItemError>,
    pub store_unavailable: bool,
}

impl IngestReport {
    /// Total failure: nothing was written and the store was down.
    pub fn is_total_failure(&self) -> bool {
        self.store_unavailable && self.accepted == 0
    }
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, required_fields: Vec<String>) -> Self {
        Self {
            store,
            required_fields,
        }
    }

    pub async fn ingest(&self, batch: &Value) -> Result<IngestReport, PipelineError> {
        let items = validate_batch(batch, &self.required_fields)?;

        let mut report = IngestReport::default();
        for (index, item) in items.into_iter().enumerate() {
            if report.store_unavailable {
                report.errors.push(ItemError {
                    index,
                    id: item.ok().map(|doc| doc.id),
                    reason: "not attempted: store unavailable".to_string(),
                });
                continue;
            }

            let doc = match item {
                Ok(doc) => doc,
                Err(err) => {
                    report.errors.push(ItemError {
                        index,
                        id: None,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let id = doc.id.clone();
            match self.store.upsert(doc).await {
                Ok(()) => report.accepted += 1,
                Err(err @ StoreError::Rejected(_)) => {
                    tracing::warn!(index, id = %id, error = %err, "store rejected item");
                    report.errors.push(ItemError {
                        index,
                        id: Some(id),
                        reason: PipelineError::from(err).to_string(),
                    });
                }
                Err(err @ StoreError::Unavailable(_)) => {
                    tracing::error!(index, error = %err, "store unavailable; aborting batch");
                    report.store_unavailable = true;
                    report.errors.push(ItemError {
                        index,
                        id: Some(id),
                        reason: PipelineError::from(err).to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            accepted = report.accepted,
            failed = report.errors.len(),
            "batch ingested"
        );
        Ok(report)
    }
}
