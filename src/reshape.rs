use crate::config::TimestampUnit;
use crate::normalize::{normalize, FlattenedRecord};
use crate::store::StoredDocument;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub ts: i64,
    /// `None` is the no-value sentinel used under lenient alignment; it
    /// serializes as JSON null so chart layers can render a gap.
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeries {
    /// Dotted metric key, e.g. `space_nursery.temperature`.
    pub key: String,
    /// Metric family shared across sensor groups (`temperature` for every
    /// `<group>.temperature` series).
    pub family: String,
    pub points: Vec<SeriesPoint>,
}

/// One reshape pass's output: every requested series on a single shared
/// timestamp axis, so any two can be plotted against the same x-axis
/// without re-joining. Rebuilt from scratch each pass, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesBundle {
    pub generated_at: DateTime<Utc>,
    pub timestamp_unit: TimestampUnit,
    pub timestamps: Vec<i64>,
    pub series: Vec<TimeSeries>,
}

impl SeriesBundle {
    pub fn empty(generated_at: DateTime<Utc>, timestamp_unit: TimestampUnit) -> Self {
        Self {
            generated_at,
            timestamp_unit,
            timestamps: Vec::new(),
            series: Vec::new(),
        }
    }
}

fn family_of(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).to_string()
}

/// Projects the stored collection into aligned per-metric series.
///
/// Every document is normalized; under strict alignment, records missing
/// any requested key are dropped, otherwise the gap becomes a `None`
/// point. Survivors are stably sorted by timestamp (ties keep storage
/// order) and each requested key is projected along that shared axis.
pub fn reshape(
    docs: &[StoredDocument],
    metric_keys: &[String],
    strict_alignment: bool,
    timestamp_unit: TimestampUnit,
    generated_at: DateTime<Utc>,
) -> SeriesBundle {
    let mut records: Vec<FlattenedRecord> = docs.iter().filter_map(normalize).collect();

    if strict_alignment {
        records.retain(|record| metric_keys.iter().all(|key| record.values.contains_key(key)));
    }

    records.sort_by_key(|record| record.ts);

    let timestamps: Vec<i64> = records.iter().map(|record| record.ts).collect();
    let series = metric_keys
        .iter()
        .map(|key| TimeSeries {
            key: key.clone(),
            family: family_of(key),
            points: records
                .iter()
                .map(|record| SeriesPoint {
                    ts: record.ts,
                    value: record.values.get(key).copied(),
                })
                .collect(),
        })
        .collect();

    SeriesBundle {
        generated_at,
        timestamp_unit,
        timestamps,
        series,
    }
}
