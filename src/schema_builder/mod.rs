//! `CREATE TABLE` construction bound to a protocol version.
//!
//! The protocol version changes a handful of option spellings (compression
//! keys, caching syntax). It is resolved once per cluster and passed into
//! [`SchemaBuilder::new`]; every rendering function branches on it.

mod compaction;
mod compression;
mod create;
mod options;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::TableProperties;

pub use compaction::{
    Compaction, CompactionCommon, LeveledCompaction, SizeTieredCompaction, TimeWindowCompaction,
    WindowUnit,
};
pub use compression::{Compression, CompressionOptions};
pub use create::{CreateTable, drop_table, truncate_table};
pub use options::{SortOrder, TableOption, TableOptions};

/// Syntax family of the connected cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V2,
    V3,
}

impl ProtocolVersion {
    /// Derive the syntax family from a release version string such as
    /// `3.11.4`. A `3.x` release uses the v3 family and so does any later
    /// major version, which extends v3 syntax to 4.x clusters. Everything
    /// else, including unparseable input, is v2.
    pub fn from_release_version(release: &str) -> Self {
        let major = release
            .trim()
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .unwrap_or(0);
        if major >= 3 {
            ProtocolVersion::V3
        } else {
            ProtocolVersion::V2
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub native_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub native_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

/// Data-driven description of a table to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableOptions {
    pub keyspace: String,
    pub table: String,
    pub partition_columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub clustering_columns: Vec<ClusteringColumnDefinition>,
    #[serde(default)]
    pub static_columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub options: TableProperties,
}

/// Entry point for schema statements of one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaBuilder {
    version: ProtocolVersion,
}

impl SchemaBuilder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    pub fn for_release_version(release: &str) -> Self {
        Self::new(ProtocolVersion::from_release_version(release))
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn create_table(&self, keyspace: &str, table: &str) -> CreateTable {
        CreateTable::new(self.version, keyspace, table)
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions::new(self.version)
    }

    /// Render a `CREATE TABLE` from a data description.
    pub fn create_table_with_options(&self, opts: &CreateTableOptions) -> Result<String> {
        let mut create = self.create_table(&opts.keyspace, &opts.table);
        for col in &opts.partition_columns {
            create = create.partition_column(&col.name, &col.native_type);
        }
        let mut order = Vec::new();
        for col in &opts.clustering_columns {
            create = create.clustering_column(&col.name, &col.native_type);
            if let Some(dir) = col.order {
                order.push((col.name.clone(), dir));
            }
        }
        for col in &opts.static_columns {
            create = create.static_column(&col.name, &col.native_type);
        }
        for col in &opts.columns {
            create = create.column(&col.name, &col.native_type);
        }

        let mut table_options = self.table_options();
        let mut dispatched = TableOption::from_properties(&opts.options);
        if !order.is_empty() {
            dispatched.push(TableOption::Order(order));
        }
        for option in dispatched {
            debug!(option = option.name(), table = %opts.table, "applying table option");
            table_options.apply(self, option)?;
        }
        create.options(table_options).build()
    }

    /// Compaction strategy by short or fully qualified class name.
    pub fn compaction(&self, name: &str) -> Result<Compaction> {
        Compaction::by_name(name)
    }

    /// Compression by algorithm name; empty or `none` disables compression.
    pub fn compression(&self, name: &str) -> Result<Compression> {
        Compression::by_name(name)
    }

    pub fn no_compression(&self) -> Compression {
        Compression::Disabled
    }
}

pub(crate) fn option_u32(key: &str, value: &Value) -> Result<u32> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid_option(key, value))
}

pub(crate) fn option_f64(key: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid_option(key, value))
}

pub(crate) fn option_bool(key: &str, value: &Value) -> Result<bool> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().to_ascii_lowercase().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid_option(key, value))
}

pub(crate) fn option_str(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(invalid_option(key, value)),
    }
}

fn invalid_option(key: &str, value: &Value) -> Error {
    Error::SchemaValidation(format!("invalid value {value} for option {key}"))
}

/// Render a float the way the server prints option values (`1.0`, `0.01`).
pub(crate) fn render_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}
