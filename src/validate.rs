use crate::error::PipelineError;
use crate::store::StoredDocument;
use serde_json::Value;
use std::collections::BTreeMap;

const ID_FIELD: &str = "id";
const PARTITION_KEY_FIELD: &str = "partitionKey";
const NAME_FIELD: &str = "name";
const TIMESTAMP_FIELD: &str = "timestamp";

/// Per-item validation outcome. A failed item never blocks its siblings.
pub type ItemResult = Result<StoredDocument, PipelineError>;

/// Checks shape and required fields of an incoming batch and decodes each
/// item into the canonical stored schema. Pure: never touches the store.
///
/// A non-array payload fails the whole batch; everything else is reported
/// item by item.
pub fn validate_batch(batch: &Value, required_fields: &[String]) -> Result<Vec<ItemResult>, PipelineError> {
    let items = batch.as_array().ok_or(PipelineError::MalformedBatch)?;
    Ok(items
        .iter()
        .map(|item| decode_item(item, required_fields))
        .collect())
}

/// Decodes one raw item. Known attributes map to their schema slots, bare
/// numeric attributes become ungrouped metrics, object attributes with
/// numeric entries become sensor groups, and underscore-prefixed store
/// bookkeeping is dropped.
pub fn decode_item(item: &Value, required_fields: &[String]) -> ItemResult {
    let obj = item.as_object().ok_or(PipelineError::MalformedItem)?;

    for field in required_fields {
        let present = obj.get(field.as_str()).map(|v| !v.is_null()).unwrap_or(false);
        if !present {
            return Err(PipelineError::MissingField(field.clone()));
        }
    }

    let timestamp = obj.get(TIMESTAMP_FIELD).and_then(Value::as_i64);
    let id = match obj.get(ID_FIELD).and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => derive_id(timestamp).ok_or_else(|| PipelineError::MissingField(ID_FIELD.to_string()))?,
    };

    let partition_key = scalar_string(obj.get(PARTITION_KEY_FIELD)).unwrap_or_default();
    let name = scalar_string(obj.get(NAME_FIELD)).unwrap_or_default();

    let mut groups = BTreeMap::new();
    let mut metrics = BTreeMap::new();
    for (key, value) in obj {
        if key.starts_with('_')
            || matches!(key.as_str(), ID_FIELD | PARTITION_KEY_FIELD | NAME_FIELD | TIMESTAMP_FIELD)
        {
            continue;
        }
        match value {
            Value::Number(n) => {
                if let Some(v) = n.as_f64() {
                    metrics.insert(key.clone(), v);
                }
            }
            Value::Object(inner) => {
                let group: BTreeMap<String, f64> = inner
                    .iter()
                    .filter_map(|(metric, v)| v.as_f64().map(|v| (metric.clone(), v)))
                    .collect();
                if !group.is_empty() {
                    groups.insert(key.clone(), group);
                }
            }
            _ => {}
        }
    }

    Ok(StoredDocument {
        id,
        partition_key,
        name,
        timestamp,
        groups,
        metrics,
    })
}

/// Identifier fallback for id-less readings: the string form of the
/// timestamp. Deterministic, so an at-least-once sensor client re-sending
/// the same reading lands on the same stored record.
fn derive_id(timestamp: Option<i64>) -> Option<String> {
    timestamp.map(|ts| ts.to_string())
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn required() -> Vec<String> {
        vec!["partitionKey".to_string(), "name".to_string()]
    }

    #[test]
    fn rejects_non_array_batch() {
        let batch = json!({"id": "1", "partitionKey": "p", "name": "a"});
        assert_eq!(
            validate_batch(&batch, &required()).unwrap_err(),
            PipelineError::MalformedBatch
        );
    }

    #[test]
    fn accepts_minimal_item() {
        let batch = json!([{"id": "1", "partitionKey": "p", "name": "a"}]);
        let results = validate_batch(&batch, &required()).unwrap();
        assert_eq!(results.len(), 1);
        let doc = results[0].as_ref().unwrap();
        assert_eq!(doc.id, "1");
        assert_eq!(doc.partition_key, "p");
        assert_eq!(doc.name, "a");
    }

    #[test]
    fn missing_field_fails_only_that_item() {
        let batch = json!([
            {"partitionKey": "p"},
            {"id": "2", "partitionKey": "p", "name": "b"}
        ]);
        let results = validate_batch(&batch, &required()).unwrap();
        assert_eq!(
            results[0].as_ref().unwrap_err(),
            &PipelineError::MissingField("name".to_string())
        );
        assert!(results[1].is_ok());
    }

    #[test]
    fn derives_id_from_timestamp() {
        let item = json!({"partitionKey": "p", "name": "a", "timestamp": 1_700_000_000});
        let doc = decode_item(&item, &required()).unwrap();
        assert_eq!(doc.id, "1700000000");
        // Re-decoding the same reading must land on the same id.
        let again = decode_item(&item, &required()).unwrap();
        assert_eq!(again.id, doc.id);
    }

    #[test]
    fn item_without_id_or_timestamp_is_rejected() {
        let item = json!({"partitionKey": "p", "name": "a"});
        let required = vec!["partitionKey".to_string()];
        assert_eq!(
            decode_item(&item, &required).unwrap_err(),
            PipelineError::MissingField("id".to_string())
        );
    }

    #[test]
    fn non_object_item_is_rejected() {
        let results = validate_batch(&json!(["reading"]), &required()).unwrap();
        assert_eq!(results[0].as_ref().unwrap_err(), &PipelineError::MalformedItem);
    }

    #[test]
    fn splits_groups_metrics_and_bookkeeping() {
        let item = json!({
            "id": "1",
            "partitionKey": "p",
            "name": "a",
            "timestamp": 10,
            "battery": 3.9,
            "space_nursery": {"temperature": 24.0, "humidity": 27.1, "label": "nursery"},
            "_rid": "xyz",
            "_etag": "\"00\"",
            "note": "calibrated"
        });
        let doc = decode_item(&item, &required()).unwrap();
        assert_eq!(doc.metrics, BTreeMap::from([("battery".to_string(), 3.9)]));
        let nursery = &doc.groups["space_nursery"];
        assert_eq!(nursery["temperature"], 24.0);
        assert_eq!(nursery["humidity"], 27.1);
        assert!(!nursery.contains_key("label"));
        assert!(!doc.metrics.contains_key("_rid"));
        assert!(!doc.metrics.contains_key("note"));
    }
}
