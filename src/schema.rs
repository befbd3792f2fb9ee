use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{self, CanonicalType};

/// Column metadata as reported by cluster introspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub native_type: String,
    /// Opaque driver metadata (frozen/reversed flags and the like).
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl NativeColumnMetadata {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            options: Map::new(),
        }
    }
}

/// A column of a table together with its derived type information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub name: String,
    pub native_type: String,
    pub canonical_type: CanonicalType,
    pub needs_quoting: bool,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl TableColumn {
    pub fn is_blob(&self) -> bool {
        types::is_blob(&self.native_type)
    }

    pub fn is_counter(&self) -> bool {
        types::is_counter(&self.native_type)
    }

    pub fn is_collection(&self) -> bool {
        types::is_collection(&self.native_type)
    }
}

/// Derive a [`TableColumn`] from introspected metadata.
pub fn map_column(meta: &NativeColumnMetadata) -> TableColumn {
    TableColumn {
        name: meta.name.clone(),
        native_type: meta.native_type.clone(),
        canonical_type: types::canonical_type(&meta.native_type),
        needs_quoting: types::needs_quoting(&meta.native_type),
        options: meta.options.clone(),
    }
}

/// Row cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Caching {
    pub keys: String,
    pub rows_per_partition: String,
}

impl Default for Caching {
    fn default() -> Self {
        Self {
            keys: "ALL".to_string(),
            rows_per_partition: "NONE".to_string(),
        }
    }
}

/// Table level properties.
///
/// `compaction` and `compression` keep the server's map form (`class` plus
/// strategy specific keys) so that an introspected table can be recreated
/// through the schema builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_filter_fp_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching: Option<Caching>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_time_to_live: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gc_grace_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memtable_flush_period_in_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_repair_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speculative_retry: Option<String>,
}

/// Schema information for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub keyspace: String,
    pub name: String,
    pub partition_keys: Vec<TableColumn>,
    pub clustering_keys: Vec<TableColumn>,
    pub columns: Vec<TableColumn>,
    #[serde(default)]
    pub properties: TableProperties,
}

impl TableSchema {
    /// Create an empty schema for `keyspace.name`; add columns with
    /// [`TableSchema::partition_key`], [`TableSchema::clustering_key`] and
    /// [`TableSchema::column`].
    pub fn new(keyspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
            partition_keys: Vec::new(),
            clustering_keys: Vec::new(),
            columns: Vec::new(),
            properties: TableProperties::default(),
        }
    }

    pub fn partition_key(mut self, name: &str, native_type: &str) -> Self {
        let col = map_column(&NativeColumnMetadata::new(name, native_type));
        self.partition_keys.push(col.clone());
        self.push_column(col);
        self
    }

    pub fn clustering_key(mut self, name: &str, native_type: &str) -> Self {
        let col = map_column(&NativeColumnMetadata::new(name, native_type));
        self.clustering_keys.push(col.clone());
        self.push_column(col);
        self
    }

    pub fn column(mut self, name: &str, native_type: &str) -> Self {
        self.push_column(map_column(&NativeColumnMetadata::new(name, native_type)));
        self
    }

    pub fn with_properties(mut self, properties: TableProperties) -> Self {
        self.properties = properties;
        self
    }

    fn push_column(&mut self, col: TableColumn) {
        if self.column_named(&col.name).is_none() {
            self.columns.push(col);
        }
    }

    /// Build from introspected metadata. Key columns missing from the
    /// column list are added to it so that `columns` is always a superset.
    pub fn from_metadata(
        keyspace: &str,
        name: &str,
        partition_keys: &[NativeColumnMetadata],
        clustering_keys: &[NativeColumnMetadata],
        columns: &[NativeColumnMetadata],
        properties: TableProperties,
    ) -> Result<Self> {
        let mut schema = TableSchema::new(keyspace, name).with_properties(properties);
        schema.partition_keys = partition_keys.iter().map(map_column).collect();
        schema.clustering_keys = clustering_keys.iter().map(map_column).collect();
        let keys: Vec<TableColumn> = schema.primary_key().into_iter().cloned().collect();
        for col in keys.into_iter().chain(columns.iter().map(map_column)) {
            schema.push_column(col);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// A usable schema has at least one primary key column.
    pub fn validate(&self) -> Result<()> {
        if self.partition_keys.is_empty() {
            return Err(Error::Build(format!(
                "table {}.{} has no partition key",
                self.keyspace, self.name
            )));
        }
        Ok(())
    }

    /// Ordered key columns (partition + clustering).
    pub fn primary_key(&self) -> Vec<&TableColumn> {
        self.partition_keys
            .iter()
            .chain(self.clustering_keys.iter())
            .collect()
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key()
            .into_iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key().iter().any(|c| c.name == column)
    }

    pub fn column_named(&self, column: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == column)
    }
}
