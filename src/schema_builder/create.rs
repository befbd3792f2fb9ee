use std::collections::BTreeSet;

use super::{ProtocolVersion, TableOptions};
use crate::builder::qualified_name;
use crate::error::{Error, Result};

const KEY_FORBIDDEN_PREFIXES: [&str; 4] = ["list<", "map<", "set<", "tuple<"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnKind {
    Partition,
    Clustering,
    Static,
    Regular,
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    native_type: String,
    kind: ColumnKind,
}

/// `CREATE TABLE` statement under construction.
#[derive(Debug, Clone)]
pub struct CreateTable {
    keyspace: String,
    table: String,
    columns: Vec<Column>,
    if_not_exists: bool,
    options: TableOptions,
}

impl CreateTable {
    pub fn new(version: ProtocolVersion, keyspace: &str, table: &str) -> Self {
        Self {
            keyspace: keyspace.to_string(),
            table: table.to_string(),
            columns: Vec::new(),
            if_not_exists: false,
            options: TableOptions::new(version),
        }
    }

    pub fn partition_column(self, name: &str, native_type: &str) -> Self {
        self.push(name, native_type, ColumnKind::Partition)
    }

    pub fn clustering_column(self, name: &str, native_type: &str) -> Self {
        self.push(name, native_type, ColumnKind::Clustering)
    }

    pub fn static_column(self, name: &str, native_type: &str) -> Self {
        self.push(name, native_type, ColumnKind::Static)
    }

    pub fn column(self, name: &str, native_type: &str) -> Self {
        self.push(name, native_type, ColumnKind::Regular)
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    fn push(mut self, name: &str, native_type: &str, kind: ColumnKind) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            native_type: native_type.to_string(),
            kind,
        });
        self
    }

    fn names_of(&self, kind: ColumnKind) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.as_str())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if !self.columns.iter().any(|c| c.kind == ColumnKind::Partition) {
            return Err(Error::SchemaValidation(format!(
                "table {}.{} needs at least one partition column",
                self.keyspace, self.table
            )));
        }
        let mut seen = BTreeSet::new();
        for col in &self.columns {
            if col.name.trim().is_empty() {
                return Err(Error::SchemaValidation(
                    "column name must not be blank".to_string(),
                ));
            }
            if col.native_type.trim().is_empty() {
                return Err(Error::SchemaValidation(format!(
                    "column {} has no type",
                    col.name
                )));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(Error::SchemaValidation(format!(
                    "column {} is defined twice",
                    col.name
                )));
            }
            let in_key = matches!(col.kind, ColumnKind::Partition | ColumnKind::Clustering);
            if in_key {
                let ty = col.native_type.trim().to_ascii_lowercase();
                if KEY_FORBIDDEN_PREFIXES.iter().any(|p| ty.starts_with(p)) {
                    return Err(Error::SchemaValidation(format!(
                        "column {} of type {} cannot be part of the primary key",
                        col.name, col.native_type
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<String> {
        self.validate()?;

        let partition = self.names_of(ColumnKind::Partition);
        let clustering = self.names_of(ColumnKind::Clustering);
        let partition = if partition.len() > 1 {
            format!("({})", partition.join(", "))
        } else {
            partition.join("")
        };
        let key = std::iter::once(partition)
            .chain(clustering.iter().map(|c| c.to_string()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut text = String::from("CREATE TABLE ");
        if self.if_not_exists {
            text.push_str("IF NOT EXISTS ");
        }
        text.push_str(&qualified_name(&self.keyspace, &self.table));
        text.push_str(" (\n");
        for col in &self.columns {
            text.push_str("  ");
            text.push_str(&col.name);
            text.push(' ');
            text.push_str(&col.native_type);
            if col.kind == ColumnKind::Static {
                text.push_str(" static");
            }
            text.push_str(",\n");
        }
        text.push_str(&format!("  PRIMARY KEY ({key}) )"));
        if let Some(with) = self.options.render() {
            text.push('\n');
            text.push_str(&with);
        }
        Ok(text)
    }
}

/// `DROP TABLE "ks"."t"`.
pub fn drop_table(keyspace: &str, table: &str, if_exists: bool) -> String {
    let exists = if if_exists { "IF EXISTS " } else { "" };
    format!("DROP TABLE {exists}{}", qualified_name(keyspace, table))
}

/// `TRUNCATE "ks"."t"`.
pub fn truncate_table(keyspace: &str, table: &str) -> String {
    format!("TRUNCATE {}", qualified_name(keyspace, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_builder::{CreateTableOptions, SchemaBuilder};

    #[test]
    fn renders_composite_partition_and_static() {
        let stmt = CreateTable::new(ProtocolVersion::V3, "ks", "events")
            .partition_column("tenant", "text")
            .partition_column("day", "date")
            .clustering_column("ts", "timeuuid")
            .static_column("owner", "text")
            .column("payload", "blob")
            .build()
            .unwrap();
        assert_eq!(
            stmt,
            "CREATE TABLE \"ks\".\"events\" (\n  tenant text,\n  day date,\n  ts timeuuid,\n  owner text static,\n  payload blob,\n  PRIMARY KEY ((tenant, day), ts) )"
        );
    }

    #[test]
    fn single_partition_key() {
        let stmt = CreateTable::new(ProtocolVersion::V2, "ks", "t")
            .partition_column("id", "uuid")
            .if_not_exists()
            .build()
            .unwrap();
        assert_eq!(
            stmt,
            "CREATE TABLE IF NOT EXISTS \"ks\".\"t\" (\n  id uuid,\n  PRIMARY KEY (id) )"
        );
    }

    #[test]
    fn rejects_invalid_definitions() {
        let no_pk = CreateTable::new(ProtocolVersion::V3, "ks", "t").column("a", "int");
        assert!(matches!(no_pk.build(), Err(Error::SchemaValidation(_))));

        let collection_key = CreateTable::new(ProtocolVersion::V3, "ks", "t")
            .partition_column("id", "int")
            .clustering_column("tags", "set<text>");
        assert!(matches!(collection_key.build(), Err(Error::SchemaValidation(_))));

        let blank = CreateTable::new(ProtocolVersion::V3, "ks", "t")
            .partition_column("id", " ");
        assert!(matches!(blank.build(), Err(Error::SchemaValidation(_))));

        let duplicate = CreateTable::new(ProtocolVersion::V3, "ks", "t")
            .partition_column("id", "int")
            .column("id", "text");
        assert!(matches!(duplicate.build(), Err(Error::SchemaValidation(_))));

        let collection_value = CreateTable::new(ProtocolVersion::V3, "ks", "t")
            .partition_column("id", "int")
            .column("tags", "list<text>");
        assert!(collection_value.build().is_ok());
    }

    #[test]
    fn no_compression_follows_version() {
        for (version, expected) in [
            (ProtocolVersion::V3, "{ 'enabled': false }"),
            (ProtocolVersion::V2, "{ 'sstable_compression': '' }"),
        ] {
            let builder = SchemaBuilder::new(version);
            let stmt = builder
                .create_table("ks", "t")
                .partition_column("id", "int")
                .options(builder.table_options().compression(builder.no_compression()))
                .build()
                .unwrap();
            assert!(stmt.ends_with(&format!("\nWITH compression = {expected}")));
        }
    }

    #[test]
    fn from_data_description() {
        let opts: CreateTableOptions = serde_json::from_value(serde_json::json!({
            "keyspace": "ks",
            "table": "readings",
            "partitionColumns": [{ "name": "sensor", "type": "text" }],
            "clusteringColumns": [{ "name": "at", "type": "timestamp", "order": "DESC" }],
            "columns": [{ "name": "value", "type": "double" }],
            "options": {
                "comment": "raw",
                "compression": { "class": "LZ4Compressor", "chunk_length_in_kb": 64 }
            }
        }))
        .unwrap();
        let stmt = SchemaBuilder::new(ProtocolVersion::V3)
            .create_table_with_options(&opts)
            .unwrap();
        assert_eq!(
            stmt,
            "CREATE TABLE \"ks\".\"readings\" (\n  sensor text,\n  at timestamp,\n  value double,\n  PRIMARY KEY (sensor, at) )\nWITH CLUSTERING ORDER BY (at DESC)\nAND comment = 'raw'\nAND compression = { 'class': 'LZ4Compressor', 'chunk_length_in_kb': 64 }"
        );
    }

    #[test]
    fn ddl_helpers() {
        assert_eq!(drop_table("ks", "t", true), "DROP TABLE IF EXISTS \"ks\".\"t\"");
        assert_eq!(truncate_table("ks", "t"), "TRUNCATE \"ks\".\"t\"");
    }
}
