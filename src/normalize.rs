use crate::store::StoredDocument;
use std::collections::BTreeMap;

/// Timestamp plus a flat metric map keyed `group.metric`, or bare `metric`
/// for ungrouped values. Ephemeral: rebuilt on every reshape pass.
#[derive(Clone, Debug, PartialEq)]
pub struct FlattenedRecord {
    pub ts: i64,
    pub values: BTreeMap<String, f64>,
}

/// Flattens a stored document into one record. Nested sensor groups become
/// dotted keys; top-level metrics keep their bare names. Documents without
/// a timestamp cannot be placed on a series axis and are skipped.
pub fn normalize(doc: &StoredDocument) -> Option<FlattenedRecord> {
    let Some(ts) = doc.timestamp else {
        tracing::debug!(id = %doc.id, "document has no timestamp; skipping");
        return None;
    };

    let mut values = doc.metrics.clone();
    for (group, metrics) in &doc.groups {
        for (metric, value) in metrics {
            values.insert(format!("{group}.{metric}"), *value);
        }
    }

    Some(FlattenedRecord { ts, values })
}
