//! Error types shared by the builders, codecs and the execution engine.

/// Errors raised while building, validating or executing statements.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A mutating or binary-fetch operation was attempted without a fully
    /// specified primary key.
    #[error("primary key incomplete for {keyspace}.{table}: missing {missing:?}")]
    PrimaryKeyMissing {
        keyspace: String,
        table: String,
        missing: Vec<String>,
    },
    /// INSERT or UPDATE was attempted with nothing to write.
    #[error("no fields to update for {keyspace}.{table}")]
    NoFieldsToUpdate { keyspace: String, table: String },
    /// A free-form statement matched a configured deny pattern.
    #[error("statement not allowed: {reason}")]
    StatementNotAllowed { reason: String, statement: String },
    /// Keyspace and table could not be extracted but were required.
    #[error("unable to determine keyspace and table from statement: {statement}")]
    StatementUnparseable { statement: String },
    /// The caller has no access to the keyspace on a shared cluster.
    #[error("keyspace {keyspace} is not accessible")]
    KeyspaceNotAccessible { keyspace: String },
    /// The connection rejected the statement.
    #[error("query failed: {message}")]
    Query { statement: String, message: String },
    #[error("failed to create table {keyspace}.{table}: {reason}")]
    TableCreation {
        keyspace: String,
        table: String,
        reason: String,
    },
    #[error("failed to drop table {keyspace}.{table}: {reason}")]
    TableDrop {
        keyspace: String,
        table: String,
        reason: String,
    },
    #[error("failed to truncate table {keyspace}.{table}: {reason}")]
    TableTruncate {
        keyspace: String,
        table: String,
        reason: String,
    },
    /// Invalid column definition while constructing a `CREATE TABLE`.
    #[error("schema validation: {0}")]
    SchemaValidation(String),
    #[error("column {column} not found in {keyspace}.{table}")]
    ColumnNameNotFound {
        keyspace: String,
        table: String,
        column: String,
    },
    #[error("column {column} has type {actual}, expected {expected}")]
    IncorrectColumnType {
        column: String,
        expected: String,
        actual: String,
    },
    /// Text could not be converted with the requested encoding.
    #[error("cannot {encoding}-decode value for column {column}: {message}")]
    Encoding {
        column: String,
        encoding: String,
        message: String,
    },
    /// Generic builder failure.
    #[error("build: {0}")]
    Build(String),
    #[error("config: {0}")]
    Config(String),
    /// Engine-level invariant violation.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn primary_key_missing(
        keyspace: &str,
        table: &str,
        missing: Vec<String>,
    ) -> Self {
        Error::PrimaryKeyMissing {
            keyspace: keyspace.to_string(),
            table: table.to_string(),
            missing,
        }
    }

    pub(crate) fn no_fields(keyspace: &str, table: &str) -> Self {
        Error::NoFieldsToUpdate {
            keyspace: keyspace.to_string(),
            table: table.to_string(),
        }
    }
}
