//! Statement execution against a live cluster connection.
//!
//! A free-form statement goes through restriction check, target parsing,
//! access check, optional schema fetch, submission with a row cap and row
//! decoding. Key-addressed operations build their statement through
//! [`crate::crud`] and share the submission and decode steps.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::builder::{Binding, Statement, qualified_name};
use crate::config::EngineConfig;
use crate::connection::{ClusterAccess, Connection, DriverError, ExecuteOptions, ResultSet};
use crate::crud;
use crate::error::{Error, Result};
use crate::key::{KeyQuery, KeyQueryOptions, RowDetails};
use crate::row::{self, Row};
use crate::schema::TableSchema;
use crate::schema_builder::{CreateTableOptions, SchemaBuilder};
use crate::statement::{StatementParser, StatementTarget};
use crate::validation::QueryRestrictions;
use crate::value::CellValue;

/// Caller supplied context of a free-form statement.
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    pub bindings: Vec<Binding>,
    pub access: Option<ClusterAccess>,
    /// Decode rows against the target table's schema with these options.
    pub decode: Option<KeyQueryOptions>,
}

/// Rows returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub statement: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub truncated_columns: BTreeSet<String>,
}

pub struct StatementEngine<C: Connection> {
    connection: C,
    config: EngineConfig,
    restrictions: QueryRestrictions,
    parser: StatementParser,
}

fn query_error(statement: &str, err: DriverError) -> Error {
    Error::Query {
        statement: statement.to_string(),
        message: err.to_string(),
    }
}

impl<C: Connection> StatementEngine<C> {
    pub fn new(connection: C, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let restrictions = QueryRestrictions::new(&config.restrictions.rules)?;
        Ok(Self {
            connection,
            config,
            restrictions,
            parser: StatementParser::new()?,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub async fn connect(&self) -> Result<()> {
        self.connection
            .connect()
            .await
            .map_err(|e| query_error("", e))
    }

    /// Current schema of `keyspace.table`.
    pub async fn table_schema(&self, keyspace: &str, table: &str) -> Result<TableSchema> {
        let name = qualified_name(keyspace, table);
        match self.connection.get_table(keyspace, table).await {
            Ok(Some(meta)) => meta.into_schema(keyspace, table),
            Ok(None) => Err(Error::Query {
                statement: name,
                message: format!("table {keyspace}.{table} not found"),
            }),
            Err(e) => Err(query_error(&name, e)),
        }
    }

    fn check_access(&self, access: Option<&ClusterAccess>, keyspace: &str) -> Result<()> {
        match access {
            Some(access) if !access.allows(keyspace) => {
                warn!(keyspace, "keyspace not accessible");
                Err(Error::KeyspaceNotAccessible {
                    keyspace: keyspace.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn submit(&self, text: &str, bindings: &[Binding]) -> Result<ResultSet> {
        let options = ExecuteOptions::new(self.config.fetch_size);
        debug!(statement = text, bindings = bindings.len(), "submitting statement");
        self.connection
            .execute(text, bindings, &options)
            .await
            .map_err(|e| {
                warn!(statement = text, error = %e, "statement failed");
                query_error(text, e)
            })
    }

    fn decode(
        &self,
        statement: String,
        result: ResultSet,
        schema: Option<&TableSchema>,
        options: Option<&KeyQueryOptions>,
    ) -> QueryResult {
        let threshold = self.config.truncate_threshold;
        let (rows, truncated_columns) = match (schema, options) {
            (Some(schema), Some(options)) => {
                let decoded = row::decode_rows(schema, &result.rows, options, threshold);
                (decoded.rows, decoded.truncated_columns)
            }
            (Some(schema), None) => {
                let mut truncated = BTreeSet::new();
                let mut rows = result.rows;
                for r in &mut rows {
                    truncated.extend(row::truncate_row(r, Some(schema), threshold));
                }
                (rows, truncated)
            }
            // Key membership is unknown, so nothing is safe to cut.
            (None, _) => (result.rows, BTreeSet::new()),
        };
        QueryResult {
            statement,
            columns: result.columns,
            rows,
            truncated_columns,
        }
    }

    /// Run a free-form statement.
    pub async fn execute(&self, statement: &str, request: &ExecuteRequest) -> Result<QueryResult> {
        if self.config.restrictions.enabled {
            if let Err(e) = self.restrictions.check(statement) {
                warn!(statement, error = %e, "statement rejected");
                return Err(e);
            }
        }

        let prepared = self.parser.prepare(statement, self.config.page_size);
        for target in &prepared.targets {
            self.check_access(request.access.as_ref(), &target.keyspace)?;
        }

        let mut schema = match (&request.decode, &prepared.target) {
            (None, _) => None,
            (Some(_), Some(target)) => self.target_schema(target, &prepared.text).await?,
            (Some(_), None) => {
                return Err(Error::StatementUnparseable {
                    statement: statement.to_string(),
                });
            }
        };

        let result = self.submit(&prepared.text, &request.bindings).await?;
        if request.decode.is_none() && !result.rows.is_empty() {
            // Needed only to keep key columns out of truncation.
            if let Some(target) = &prepared.target {
                schema = self.target_schema(target, &prepared.text).await?;
            }
        }
        if request.decode.is_some() && schema.is_none() && !result.rows.is_empty() {
            return Err(Error::Invariant(
                "rows returned without a schema to decode them".to_string(),
            ));
        }
        info!(
            statement = %prepared.text,
            rows = result.rows.len(),
            "statement executed"
        );
        Ok(self.decode(prepared.text, result, schema.as_ref(), request.decode.as_ref()))
    }

    async fn target_schema(
        &self,
        target: &StatementTarget,
        statement: &str,
    ) -> Result<Option<TableSchema>> {
        debug!(keyspace = %target.keyspace, table = %target.table, "fetching schema");
        match self
            .connection
            .get_table(&target.keyspace, &target.table)
            .await
        {
            Ok(Some(meta)) => Ok(Some(meta.into_schema(&target.keyspace, &target.table)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_error(statement, e)),
        }
    }

    async fn run_for_table(
        &self,
        statement: Statement,
        schema: &TableSchema,
        access: Option<&ClusterAccess>,
        options: &KeyQueryOptions,
    ) -> Result<QueryResult> {
        self.check_access(access, &schema.keyspace)?;
        let result = self.submit(&statement.text, &statement.bindings).await?;
        Ok(self.decode(statement.text, result, Some(schema), Some(options)))
    }

    pub async fn select_by_key(
        &self,
        keyspace: &str,
        table: &str,
        key: &KeyQuery,
        include_options: bool,
        access: Option<&ClusterAccess>,
    ) -> Result<QueryResult> {
        self.check_access(access, keyspace)?;
        let schema = self.table_schema(keyspace, table).await?;
        let statement =
            crud::build_select_by_key(&schema, key, include_options, self.config.page_size)?;
        self.run_for_table(statement, &schema, access, &key.options)
            .await
    }

    pub async fn insert_row(
        &self,
        keyspace: &str,
        table: &str,
        row: &RowDetails,
        ttl: Option<u32>,
        access: Option<&ClusterAccess>,
    ) -> Result<QueryResult> {
        self.check_access(access, keyspace)?;
        let schema = self.table_schema(keyspace, table).await?;
        let statement = crud::build_insert(&schema, row, ttl)?;
        self.run_for_table(statement, &schema, access, &KeyQueryOptions::default())
            .await
    }

    pub async fn update_row(
        &self,
        keyspace: &str,
        table: &str,
        key: &KeyQuery,
        fields: &RowDetails,
        access: Option<&ClusterAccess>,
    ) -> Result<QueryResult> {
        self.check_access(access, keyspace)?;
        let schema = self.table_schema(keyspace, table).await?;
        let statement = crud::build_update(&schema, key, fields)?;
        self.run_for_table(statement, &schema, access, &key.options)
            .await
    }

    pub async fn delete_row(
        &self,
        keyspace: &str,
        table: &str,
        key: &KeyQuery,
        access: Option<&ClusterAccess>,
    ) -> Result<QueryResult> {
        self.check_access(access, keyspace)?;
        let schema = self.table_schema(keyspace, table).await?;
        let statement = crud::build_delete(&schema, key)?;
        self.run_for_table(statement, &schema, access, &key.options)
            .await
    }

    /// Raw bytes of one blob cell, or `None` when the row or value is absent.
    pub async fn fetch_blob(
        &self,
        keyspace: &str,
        table: &str,
        key: &KeyQuery,
        column: &str,
        access: Option<&ClusterAccess>,
    ) -> Result<Option<Vec<u8>>> {
        self.check_access(access, keyspace)?;
        let schema = self.table_schema(keyspace, table).await?;
        let statement = crud::build_blob_fetch(&schema, key, column)?;
        let result = self.submit(&statement.text, &statement.bindings).await?;
        let cell = result.rows.into_iter().next().and_then(|mut r| r.remove(column));
        match cell {
            None | Some(CellValue::Null) => Ok(None),
            Some(CellValue::Bytes(bytes)) => Ok(Some(bytes)),
            Some(other) => Err(Error::IncorrectColumnType {
                column: column.to_string(),
                expected: "blob".to_string(),
                actual: format!("{other:?}"),
            }),
        }
    }

    /// Render and run a `CREATE TABLE`. Returns the statement text.
    pub async fn create_table(
        &self,
        builder: &SchemaBuilder,
        options: &CreateTableOptions,
        access: Option<&ClusterAccess>,
    ) -> Result<String> {
        self.check_access(access, &options.keyspace)?;
        let text = builder.create_table_with_options(options)?;
        self.run_ddl(&text).await.map_err(|reason| Error::TableCreation {
            keyspace: options.keyspace.clone(),
            table: options.table.clone(),
            reason,
        })?;
        info!(keyspace = %options.keyspace, table = %options.table, "table created");
        Ok(text)
    }

    pub async fn drop_table(
        &self,
        keyspace: &str,
        table: &str,
        access: Option<&ClusterAccess>,
    ) -> Result<()> {
        self.check_access(access, keyspace)?;
        let statement = crud::build_drop_table(keyspace, table)?;
        self.run_ddl(&statement.text)
            .await
            .map_err(|reason| Error::TableDrop {
                keyspace: keyspace.to_string(),
                table: table.to_string(),
                reason,
            })?;
        info!(keyspace, table, "table dropped");
        Ok(())
    }

    pub async fn truncate_table(
        &self,
        keyspace: &str,
        table: &str,
        access: Option<&ClusterAccess>,
    ) -> Result<()> {
        self.check_access(access, keyspace)?;
        let statement = crud::build_truncate(keyspace, table)?;
        self.run_ddl(&statement.text)
            .await
            .map_err(|reason| Error::TableTruncate {
                keyspace: keyspace.to_string(),
                table: table.to_string(),
                reason,
            })?;
        info!(keyspace, table, "table truncated");
        Ok(())
    }

    async fn run_ddl(&self, text: &str) -> std::result::Result<(), String> {
        let options = ExecuteOptions::new(self.config.fetch_size);
        debug!(statement = text, "submitting schema statement");
        self.connection
            .execute(text, &[], &options)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(statement = text, error = %e, "schema statement failed");
                e.to_string()
            })
    }
}
