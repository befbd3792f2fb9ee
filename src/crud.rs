//! Key-addressed statements: select, insert, update and delete by primary
//! key, plus blob fetch, export and DDL helpers.

use tracing::debug;

use crate::builder::{Binding, Insert, Select, Statement, qualified_name, quote_ident};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::key::{KeyQuery, KeyQueryColumnDetails, RowDetails};
use crate::row::{Row, export_row};
use crate::schema::{TableColumn, TableSchema};
use crate::schema_builder::{drop_table, truncate_table};
use crate::validation::{check_complete_primary_key, check_identifier};
use crate::value::CellValue;

/// Bind value for one cell. Text for an encoded cell becomes bytes; the
/// cell's own encoding wins over `default_encoding`, which only applies to
/// blob columns.
pub fn binding_for(
    column: &TableColumn,
    details: &KeyQueryColumnDetails,
    default_encoding: Option<Encoding>,
) -> Result<Binding> {
    let encoding = details
        .encoding
        .or(default_encoding.filter(|_| column.is_blob()));
    let value = match (&details.value, encoding) {
        (CellValue::Text(text), Some(encoding)) => {
            let bytes = encoding.decode(text).map_err(|message| Error::Encoding {
                column: column.name.clone(),
                encoding: encoding.to_string(),
                message,
            })?;
            CellValue::Bytes(bytes)
        }
        (value, _) => value.clone(),
    };
    Ok(Binding {
        column: column.name.clone(),
        type_hint: column.native_type.clone(),
        value,
    })
}

fn unknown_column(schema: &TableSchema, column: &str) -> Error {
    Error::Build(format!(
        "unknown column {column} in {}.{}",
        schema.keyspace, schema.name
    ))
}

/// WHERE columns and bindings for the key columns present in `key`, in
/// primary key order.
fn key_restriction<'s>(
    schema: &'s TableSchema,
    key: &KeyQuery,
) -> Result<(Vec<&'s str>, Vec<Binding>)> {
    if let Some(unknown) = key
        .primary_key
        .keys()
        .find(|name| schema.column_named(name).is_none())
    {
        return Err(unknown_column(schema, unknown));
    }
    let mut columns = Vec::new();
    let mut bindings = Vec::new();
    for column in schema.primary_key() {
        let Some(details) = key.primary_key.get(&column.name) else {
            continue;
        };
        if details.value.is_null() {
            continue;
        }
        columns.push(column.name.as_str());
        bindings.push(binding_for(column, details, key.options.encoding)?);
    }
    Ok((columns, bindings))
}

fn where_clause(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{}=?", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `SELECT` of the rows matching the key columns present in `key`.
///
/// Blob columns are projected only when an encoding was requested, and
/// then only key blobs unless `decode_values` is set. With
/// `include_options`, `TTL`/`writetime` are projected for every regular
/// scalar column. The result is always capped at `page_size` rows.
pub fn build_select_by_key(
    schema: &TableSchema,
    key: &KeyQuery,
    include_options: bool,
    page_size: u32,
) -> Result<Statement> {
    let opts = &key.options;
    let projected: Vec<&TableColumn> = schema
        .columns
        .iter()
        .filter(|c| {
            !c.is_blob()
                || (opts.encoding.is_some()
                    && (opts.decode_values || schema.is_primary_key(&c.name)))
        })
        .collect();

    let (where_columns, bindings) = key_restriction(schema, key)?;
    let mut select = Select::builder()
        .from(&schema.keyspace, &schema.name)
        .columns(projected.iter().map(|c| c.name.as_str()))
        .where_columns(where_columns)
        .bindings(bindings)
        .limit(page_size);
    if include_options {
        select = select.ttl_and_writetime(
            projected
                .iter()
                .filter(|c| {
                    !c.is_collection() && !c.is_counter() && !schema.is_primary_key(&c.name)
                })
                .map(|c| c.name.as_str()),
        );
    }
    select.build()
}

/// `INSERT` of a full row with literal values.
pub fn build_insert(schema: &TableSchema, row: &RowDetails, ttl: Option<u32>) -> Result<Statement> {
    if row.is_empty() {
        return Err(Error::no_fields(&schema.keyspace, &schema.name));
    }
    check_complete_primary_key(schema, row)?;
    if let Some(unknown) = row.keys().find(|name| schema.column_named(name).is_none()) {
        return Err(unknown_column(schema, unknown));
    }

    let mut insert = Insert::builder().schema(schema);
    for column in &schema.columns {
        if let Some(details) = row.get(&column.name) {
            insert = insert.value_with_encoding(&column.name, details.value.clone(), details.encoding);
        }
    }
    if let Some(ttl) = ttl {
        insert = insert.ttl(ttl);
    }
    insert.build()
}

/// Parameterized `UPDATE` of the row addressed by `key`.
///
/// Counter columns are only set when their value mentions the column
/// itself (`hits+1`), and are then rendered verbatim without a binding.
/// Key columns in `fields` are ignored.
pub fn build_update(schema: &TableSchema, key: &KeyQuery, fields: &RowDetails) -> Result<Statement> {
    if fields.is_empty() {
        return Err(Error::no_fields(&schema.keyspace, &schema.name));
    }
    check_complete_primary_key(schema, key)?;
    if let Some(unknown) = fields.keys().find(|name| schema.column_named(name).is_none()) {
        return Err(unknown_column(schema, unknown));
    }

    let mut assignments = Vec::new();
    let mut bindings = Vec::new();
    for column in &schema.columns {
        if schema.is_primary_key(&column.name) {
            continue;
        }
        let Some(details) = fields.get(&column.name) else {
            continue;
        };
        if column.is_counter() {
            let text = details.value.to_plain_string();
            if text.contains(column.name.as_str()) {
                assignments.push(format!("{}={text}", quote_ident(&column.name)));
            } else {
                debug!(column = %column.name, "skipping counter without increment");
            }
            continue;
        }
        assignments.push(format!("{}=?", quote_ident(&column.name)));
        bindings.push(binding_for(column, details, key.options.encoding)?);
    }
    if assignments.is_empty() {
        return Err(Error::no_fields(&schema.keyspace, &schema.name));
    }

    let (where_columns, key_bindings) = key_restriction(schema, key)?;
    bindings.extend(key_bindings);
    let text = format!(
        "UPDATE {} SET {} WHERE {}",
        qualified_name(&schema.keyspace, &schema.name),
        assignments.join(", "),
        where_clause(&where_columns)
    );
    Ok(Statement::with_bindings(text, bindings))
}

/// Parameterized `DELETE` of the row addressed by `key`.
pub fn build_delete(schema: &TableSchema, key: &KeyQuery) -> Result<Statement> {
    check_complete_primary_key(schema, key)?;
    let (where_columns, bindings) = key_restriction(schema, key)?;
    let text = format!(
        "DELETE FROM {} WHERE {}",
        qualified_name(&schema.keyspace, &schema.name),
        where_clause(&where_columns)
    );
    Ok(Statement::with_bindings(text, bindings))
}

/// `SELECT` of one blob cell of the row addressed by `key`.
pub fn build_blob_fetch(schema: &TableSchema, key: &KeyQuery, column: &str) -> Result<Statement> {
    let col = schema
        .column_named(column)
        .ok_or_else(|| Error::ColumnNameNotFound {
            keyspace: schema.keyspace.clone(),
            table: schema.name.clone(),
            column: column.to_string(),
        })?;
    if !col.is_blob() {
        return Err(Error::IncorrectColumnType {
            column: column.to_string(),
            expected: "blob".to_string(),
            actual: col.native_type.clone(),
        });
    }
    check_complete_primary_key(schema, key)?;
    let (where_columns, bindings) = key_restriction(schema, key)?;
    Select::builder()
        .from(&schema.keyspace, &schema.name)
        .column(&col.name)
        .where_columns(where_columns)
        .bindings(bindings)
        .limit(1)
        .build()
}

/// One `INSERT` per row, for CQL export. Null cells are left out.
pub fn build_export_inserts(schema: &TableSchema, rows: &[Row]) -> Result<Vec<Statement>> {
    rows.iter()
        .map(|row| {
            let exported = export_row(schema, row);
            let mut insert = Insert::builder().schema(schema).encoding(Encoding::Hex);
            for column in &schema.columns {
                match exported.get(&column.name) {
                    Some(value) if !value.is_null() => {
                        insert = insert.value(&column.name, value.clone());
                    }
                    _ => {}
                }
            }
            insert.build()
        })
        .collect()
}

pub fn build_drop_table(keyspace: &str, table: &str) -> Result<Statement> {
    check_identifier("keyspace", keyspace)?;
    check_identifier("table", table)?;
    Ok(Statement::new(drop_table(keyspace, table, false)))
}

pub fn build_truncate(keyspace: &str, table: &str) -> Result<Statement> {
    check_identifier("keyspace", keyspace)?;
    check_identifier("table", table)?;
    Ok(Statement::new(truncate_table(keyspace, table)))
}
