//! Purpose: JSON serializers for dataset metadata, rows, and sync reports.
//! Exports: `metadata_json`, `rows_json`, `report_json`.
//! Role: Keep CLI output envelopes consistent across commands.
//! Invariants: Stable key names/order; rows are objects keyed by field name.
//! Invariants: Binary values are hex strings and timestamps are RFC 3339.

use dataio::api::{Metadata, Row, SyncReport};
use serde_json::{Map, Value, json};

pub(crate) fn metadata_json(meta: &Metadata) -> Value {
    let fields = meta
        .field_names
        .iter()
        .zip(&meta.field_types)
        .map(|(name, ty)| json!({ "name": name, "type": ty.name() }))
        .collect::<Vec<_>>();

    let mut map = Map::new();
    map.insert("folder".to_string(), json!(meta.folder_name));
    map.insert("file".to_string(), json!(meta.file_name));
    map.insert("item_count".to_string(), json!(meta.item_count));
    map.insert("default_field".to_string(), json!(meta.default_field));
    map.insert("page_size".to_string(), json!(meta.page_size));
    if !meta.desc.is_empty() {
        map.insert("desc".to_string(), json!(meta.desc));
    }
    map.insert("fields".to_string(), Value::Array(fields));
    Value::Object(map)
}

pub(crate) fn rows_json(meta: &Metadata, rows: &[Row]) -> Value {
    let rows = rows
        .iter()
        .map(|row| {
            let mut map = Map::new();
            for (name, value) in meta.field_names.iter().zip(row) {
                map.insert(name.clone(), value.to_json());
            }
            Value::Object(map)
        })
        .collect();
    Value::Array(rows)
}

pub(crate) fn report_json(report: &SyncReport) -> Value {
    let datasets = serde_json::to_value(&report.datasets).unwrap_or_default();
    json!({
        "rows_copied": report.rows_copied(),
        "datasets": datasets,
    })
}
