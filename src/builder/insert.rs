use std::collections::BTreeSet;

use crate::builder::{Statement, quote_ident, render_literal};
use crate::encoding::Encoding;
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::validation::{KeyColumns, check_complete_primary_key};
use crate::value::CellValue;

#[derive(Debug, Clone)]
struct InsertValue {
    column: String,
    value: CellValue,
    encoding: Option<Encoding>,
}

impl KeyColumns for [InsertValue] {
    fn defined_columns(&self) -> BTreeSet<&str> {
        self.iter()
            .filter(|v| !v.value.is_null())
            .map(|v| v.column.as_str())
            .collect()
    }
}

/// `INSERT` builder rendering literal values against a table schema.
#[derive(Debug, Clone, Default)]
pub struct Insert<'a> {
    schema: Option<&'a TableSchema>,
    values: Vec<InsertValue>,
    ttl: Option<u32>,
    encoding: Option<Encoding>,
}

impl<'a> Insert<'a> {
    /// Empty `INSERT`; a table schema must be set before building.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Target table and the column types used to render literals.
    pub fn schema(mut self, schema: &'a TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set a column value; setting the same column again replaces it.
    pub fn value(self, column: &str, value: impl Into<CellValue>) -> Self {
        self.push(column, value.into(), None)
    }

    /// Set a column value with its own blob encoding.
    pub fn value_with_encoding(
        self,
        column: &str,
        value: impl Into<CellValue>,
        encoding: Option<Encoding>,
    ) -> Self {
        self.push(column, value.into(), encoding)
    }

    /// Append `USING TTL seconds`.
    pub fn ttl(mut self, seconds: u32) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// Blob encoding for values without their own.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    fn push(mut self, column: &str, value: CellValue, encoding: Option<Encoding>) -> Self {
        let entry = InsertValue {
            column: column.to_string(),
            value,
            encoding,
        };
        match self.values.iter_mut().find(|v| v.column == column) {
            Some(existing) => *existing = entry,
            None => self.values.push(entry),
        }
        self
    }

    /// Render the statement. Values follow schema column order and the
    /// primary key must be complete.
    pub fn build(&self) -> Result<Statement> {
        let schema = self
            .schema
            .ok_or_else(|| Error::Build("insert requires a table schema".to_string()))?;
        if schema.columns.is_empty() {
            return Err(Error::Build(format!(
                "schema for {}.{} has no columns",
                schema.keyspace, schema.name
            )));
        }
        if self.values.is_empty() {
            return Err(Error::Build("insert requires at least one value".to_string()));
        }
        check_complete_primary_key(schema, self.values.as_slice())?;

        let mut columns = Vec::with_capacity(self.values.len());
        let mut literals = Vec::with_capacity(self.values.len());
        for entry in &self.values {
            let column = schema.column_named(&entry.column).ok_or_else(|| {
                Error::Build(format!(
                    "unknown column {} in {}.{}",
                    entry.column, schema.keyspace, schema.name
                ))
            })?;
            columns.push(quote_ident(&column.name));
            literals.push(render_literal(
                column,
                &entry.value,
                entry.encoding.or(self.encoding),
            )?);
        }

        let mut text = format!(
            "INSERT INTO {}.{} ({}) VALUES ({})",
            schema.keyspace,
            schema.name,
            columns.join(", "),
            literals.join(", ")
        );
        if let Some(ttl) = self.ttl {
            text.push_str(&format!(" USING TTL {ttl}"));
        }
        Ok(Statement::new(text))
    }
}
