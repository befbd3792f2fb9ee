//! Schema-aware statement engine for wide-column clusters.
//!
//! Builders turn table schemas, keys and rows into statement text with
//! bindings; [`StatementEngine`] runs free-form and generated statements
//! against a [`Connection`] and decodes the rows it gets back.

pub mod builder;
pub mod config;
pub mod connection;
pub mod crud;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod key;
pub mod row;
pub mod schema;
pub mod schema_builder;
pub mod statement;
pub mod types;
pub mod validation;
pub mod value;

pub use builder::{Binding, Insert, Select, Statement};
pub use config::{EngineConfig, RestrictionConfig, RestrictionRule};
pub use connection::{
    ClusterAccess, Connection, DriverError, ExecuteOptions, ResultSet, RetryDecision, RetryPolicy,
    TableMetadata,
};
pub use encoding::Encoding;
pub use engine::{ExecuteRequest, QueryResult, StatementEngine};
pub use error::{Error, Result};
pub use key::{KeyQuery, KeyQueryColumnDetails, KeyQueryOptions, RowDetails};
pub use row::{DecodedRows, Row};
pub use schema::{NativeColumnMetadata, TableColumn, TableProperties, TableSchema, map_column};
pub use schema_builder::{ProtocolVersion, SchemaBuilder};
pub use statement::{StatementParser, StatementTarget, limit_select_query};
pub use types::{CanonicalType, CqlType};
pub use value::CellValue;
