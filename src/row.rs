//! Per-row decoding of driver results for callers.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::encoding::Encoding;
use crate::key::KeyQueryOptions;
use crate::schema::TableSchema;
use crate::value::{CellValue, iso_timestamp};

pub type Row = BTreeMap<String, CellValue>;

/// Decoded rows plus the columns whose values were cut for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRows {
    pub rows: Vec<Row>,
    pub truncated_columns: BTreeSet<String>,
}

/// Render a blob as text in `encoding`. Empty and null buffers give `""`.
pub fn decode_blob(value: &CellValue, encoding: Encoding) -> CellValue {
    match value {
        CellValue::Null => CellValue::Text(String::new()),
        CellValue::Bytes(bytes) if bytes.is_empty() => CellValue::Text(String::new()),
        CellValue::Bytes(bytes) => {
            let text = encoding.encode(bytes);
            match encoding {
                Encoding::Hex => CellValue::Text(format!("0x{text}")),
                _ => CellValue::Text(text),
            }
        }
        other => other.clone(),
    }
}

/// Apply the blob rules to one row.
///
/// Blob columns are dropped unless an encoding was requested. With one,
/// primary key blobs are always decoded and the rest only when
/// `decode_values` is set. Columns unknown to the schema (`ttl(...)`
/// projections and the like) pass through.
pub fn decode_row(schema: &TableSchema, row: &Row, options: &KeyQueryOptions) -> Row {
    let mut out = Row::new();
    for (name, value) in row {
        let Some(column) = schema.column_named(name) else {
            out.insert(name.clone(), value.clone());
            continue;
        };
        if !column.is_blob() {
            out.insert(name.clone(), value.clone());
            continue;
        }
        let Some(encoding) = options.encoding else {
            continue;
        };
        if schema.is_primary_key(name) || options.decode_values {
            out.insert(name.clone(), decode_blob(value, encoding));
        } else {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

/// Cut text values longer than `threshold` characters and suffix `...`.
/// Primary key values are never cut. Returns the names of cut columns.
pub fn truncate_row(row: &mut Row, schema: Option<&TableSchema>, threshold: usize) -> BTreeSet<String> {
    let mut truncated = BTreeSet::new();
    for (name, value) in row.iter_mut() {
        if schema.is_some_and(|s| s.is_primary_key(name)) {
            continue;
        }
        let CellValue::Text(text) = value else {
            continue;
        };
        if text.chars().count() <= threshold {
            continue;
        }
        let mut cut: String = text.chars().take(threshold).collect();
        cut.push_str("...");
        *text = cut;
        truncated.insert(name.clone());
    }
    truncated
}

/// Decode and truncate a whole result set.
pub fn decode_rows(
    schema: &TableSchema,
    rows: &[Row],
    options: &KeyQueryOptions,
    threshold: usize,
) -> DecodedRows {
    let mut out = DecodedRows::default();
    for row in rows {
        let mut decoded = decode_row(schema, row, options);
        out.truncated_columns
            .extend(truncate_row(&mut decoded, Some(schema), threshold));
        out.rows.push(decoded);
    }
    out
}

/// Row form used for CQL export: timestamps as ISO strings (dates as
/// `YYYY-MM-DD`) and blobs as `0x` hex.
pub fn export_row(schema: &TableSchema, row: &Row) -> Row {
    row.iter()
        .map(|(name, value)| {
            let is_date = schema
                .column_named(name)
                .is_some_and(|c| c.native_type.eq_ignore_ascii_case("date"));
            let exported = match value {
                CellValue::Timestamp(ts) if is_date => {
                    CellValue::Text(ts.format("%Y-%m-%d").to_string())
                }
                CellValue::Timestamp(ts) => CellValue::Text(iso_timestamp(ts)),
                CellValue::Bytes(bytes) => CellValue::Text(format!("0x{}", hex::encode(bytes))),
                other => other.clone(),
            };
            (name.clone(), exported)
        })
        .collect()
}
