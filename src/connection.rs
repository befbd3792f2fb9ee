//! The cluster connection seen by the engine.
//!
//! Pooling, discovery and authentication live behind [`Connection`]; the
//! engine only submits statements and asks for table metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::builder::Binding;
use crate::error::Result;
use crate::row::Row;
use crate::schema::{NativeColumnMetadata, TableProperties, TableSchema};

#[async_trait]
pub trait Connection: Send + Sync {
    async fn connect(&self) -> std::result::Result<(), DriverError>;
    async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
        options: &ExecuteOptions,
    ) -> std::result::Result<ResultSet, DriverError>;
    async fn get_table(
        &self,
        keyspace: &str,
        table: &str,
    ) -> std::result::Result<Option<TableMetadata>, DriverError>;
}

#[async_trait]
impl Connection for Box<dyn Connection> {
    async fn connect(&self) -> std::result::Result<(), DriverError> {
        (**self).connect().await
    }

    async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
        options: &ExecuteOptions,
    ) -> std::result::Result<ResultSet, DriverError> {
        (**self).execute(statement, bindings, options).await
    }

    async fn get_table(
        &self,
        keyspace: &str,
        table: &str,
    ) -> std::result::Result<Option<TableMetadata>, DriverError> {
        (**self).get_table(keyspace, table).await
    }
}

#[async_trait]
impl Connection for Arc<dyn Connection> {
    async fn connect(&self) -> std::result::Result<(), DriverError> {
        (**self).connect().await
    }

    async fn execute(
        &self,
        statement: &str,
        bindings: &[Binding],
        options: &ExecuteOptions,
    ) -> std::result::Result<ResultSet, DriverError> {
        (**self).execute(statement, bindings, options).await
    }

    async fn get_table(
        &self,
        keyspace: &str,
        table: &str,
    ) -> std::result::Result<Option<TableMetadata>, DriverError> {
        (**self).get_table(keyspace, table).await
    }
}

/// Failures reported by the driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("read timeout: {0}")]
    ReadTimeout(String),
    #[error("write timeout: {0}")]
    WriteTimeout(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Server(String),
}

/// What the driver should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Rethrow,
}

/// Driver retry policy. Only the fail-fast policy is offered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryPolicy {
    #[default]
    NoRetry,
}

impl RetryPolicy {
    pub fn on_read_timeout(self) -> RetryDecision {
        match self {
            RetryPolicy::NoRetry => RetryDecision::Rethrow,
        }
    }

    pub fn on_write_timeout(self) -> RetryDecision {
        match self {
            RetryPolicy::NoRetry => RetryDecision::Rethrow,
        }
    }

    pub fn on_unavailable(self) -> RetryDecision {
        match self {
            RetryPolicy::NoRetry => RetryDecision::Rethrow,
        }
    }

    pub fn decide(self, error: &DriverError) -> RetryDecision {
        match error {
            DriverError::ReadTimeout(_) => self.on_read_timeout(),
            DriverError::WriteTimeout(_) => self.on_write_timeout(),
            DriverError::Unavailable(_) => self.on_unavailable(),
            DriverError::Server(_) => RetryDecision::Rethrow,
        }
    }
}

/// Per-statement options handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub prepare: bool,
    pub fetch_size: u32,
    pub retry: RetryPolicy,
}

impl ExecuteOptions {
    pub fn new(fetch_size: u32) -> Self {
        Self {
            prepare: true,
            fetch_size,
            retry: RetryPolicy::NoRetry,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Introspected table metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub partition_keys: Vec<NativeColumnMetadata>,
    #[serde(default)]
    pub clustering_keys: Vec<NativeColumnMetadata>,
    #[serde(default)]
    pub columns: Vec<NativeColumnMetadata>,
    #[serde(default)]
    pub properties: TableProperties,
}

impl TableMetadata {
    pub fn into_schema(self, keyspace: &str, table: &str) -> Result<TableSchema> {
        TableSchema::from_metadata(
            keyspace,
            table,
            &self.partition_keys,
            &self.clustering_keys,
            &self.columns,
            self.properties,
        )
    }
}

/// Access information for the caller on one cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAccess {
    pub is_shared: bool,
    #[serde(default)]
    pub accessible_keyspaces: BTreeSet<String>,
}

impl ClusterAccess {
    pub fn shared(keyspaces: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            is_shared: true,
            accessible_keyspaces: keyspaces.into_iter().map(Into::into).collect(),
        }
    }

    /// Unshared clusters grant every keyspace.
    pub fn allows(&self, keyspace: &str) -> bool {
        !self.is_shared || self.accessible_keyspaces.contains(keyspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_rethrows_everything() {
        let policy = RetryPolicy::default();
        for err in [
            DriverError::ReadTimeout("r".into()),
            DriverError::WriteTimeout("w".into()),
            DriverError::Unavailable("u".into()),
        ] {
            assert_eq!(policy.decide(&err), RetryDecision::Rethrow);
        }
        assert_eq!(ExecuteOptions::new(50).retry, RetryPolicy::NoRetry);
    }

    #[test]
    fn access_rules() {
        let access = ClusterAccess::shared(["app"]);
        assert!(access.allows("app"));
        assert!(!access.allows("other"));
        assert!(ClusterAccess::default().allows("other"));
    }

    #[test]
    fn metadata_into_schema() {
        let meta: TableMetadata = serde_json::from_str(
            r#"{
                "partitionKeys": [{"name": "id", "type": "uuid"}],
                "columns": [{"name": "body", "type": "text"}]
            }"#,
        )
        .unwrap();
        let schema = meta.into_schema("ks", "t").unwrap();
        assert_eq!(schema.primary_key_names(), vec!["id"]);
        assert_eq!(schema.columns.len(), 2);
        assert!(TableMetadata::default().into_schema("ks", "t").is_err());
    }
}
