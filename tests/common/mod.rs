#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;

use cass_stmt::{
    Binding, Connection, DriverError, ExecuteOptions, NativeColumnMetadata, ResultSet, Row,
    TableMetadata,
};

#[derive(Debug, Clone)]
pub struct Call {
    pub statement: String,
    pub bindings: Vec<Binding>,
    pub options: ExecuteOptions,
}

/// Connection double recording every statement it receives.
#[derive(Default)]
pub struct SpyConnection {
    pub calls: Mutex<Vec<Call>>,
    pub rows: Vec<Row>,
    pub table: Option<TableMetadata>,
    pub fail_with: Option<DriverError>,
}

impl SpyConnection {
    pub fn with_table(table: TableMetadata) -> Self {
        Self {
            table: Some(table),
            ..Self::default()
        }
    }

    pub fn returning(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing(mut self, err: DriverError) -> Self {
        self.fail_with = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for SpyConnection {
    async fn connect(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
        options: &ExecuteOptions,
    ) -> Result<ResultSet, DriverError> {
        self.calls.lock().unwrap().push(Call {
            statement: statement.to_string(),
            bindings: bindings.to_vec(),
            options: options.clone(),
        });
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let columns = self
            .rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Ok(ResultSet {
            columns,
            rows: self.rows.clone(),
        })
    }

    async fn get_table(
        &self,
        _keyspace: &str,
        _table: &str,
    ) -> Result<Option<TableMetadata>, DriverError> {
        Ok(self.table.clone())
    }
}

/// `files(owner text, digest blob, body blob, note text)` keyed by
/// `(owner, digest)`.
pub fn files_table() -> TableMetadata {
    TableMetadata {
        partition_keys: vec![NativeColumnMetadata::new("owner", "text")],
        clustering_keys: vec![NativeColumnMetadata::new("digest", "blob")],
        columns: vec![
            NativeColumnMetadata::new("body", "blob"),
            NativeColumnMetadata::new("note", "text"),
        ],
        ..TableMetadata::default()
    }
}
