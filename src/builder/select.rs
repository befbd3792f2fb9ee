use crate::builder::{Binding, Statement, qualified_name, quote_ident};
use crate::error::{Error, Result};
use crate::validation::check_identifier;

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    Column(String),
    Aliased { column: String, alias: String },
}

/// `SELECT` builder. WHERE clauses are always parameterized.
#[derive(Debug, Clone, Default)]
pub struct Select {
    keyspace: String,
    table: String,
    projections: Vec<Projection>,
    meta_columns: Vec<String>,
    where_columns: Vec<String>,
    bindings: Vec<Binding>,
    limit: Option<u32>,
}

impl Select {
    /// Empty `SELECT`; with no projected columns it renders `SELECT *`.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Table to read from.
    pub fn from(mut self, keyspace: &str, table: &str) -> Self {
        self.keyspace = keyspace.to_string();
        self.table = table.to_string();
        self
    }

    /// Project one column.
    pub fn column(mut self, name: &str) -> Self {
        self.projections.push(Projection::Column(name.to_string()));
        self
    }

    /// Project several columns in order.
    pub fn columns<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.projections
            .extend(names.into_iter().map(|n| Projection::Column(n.to_string())));
        self
    }

    /// Rendered as `"column" as "alias"`.
    pub fn column_as(mut self, name: &str, alias: &str) -> Self {
        self.projections.push(Projection::Aliased {
            column: name.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    /// Project `TTL(col)` and `writetime(col)` for each column.
    pub fn ttl_and_writetime<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.meta_columns
            .extend(names.into_iter().map(str::to_string));
        self
    }

    /// Restrict on `column = ?`; the value is supplied through [`Select::bind`].
    pub fn where_column(mut self, name: &str) -> Self {
        self.where_columns.push(name.to_string());
        self
    }

    /// Restrict on several columns, joined with `AND`.
    pub fn where_columns<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.where_columns
            .extend(names.into_iter().map(str::to_string));
        self
    }

    /// Value for the next `?` placeholder.
    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn bindings(mut self, bindings: impl IntoIterator<Item = Binding>) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Append `LIMIT n`.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the statement. Fails on blank identifiers.
    pub fn build(&self) -> Result<Statement> {
        check_identifier("keyspace", &self.keyspace)?;
        check_identifier("table", &self.table)?;
        for col in &self.where_columns {
            check_identifier("where column name", col)?;
        }

        let mut parts: Vec<String> = self
            .projections
            .iter()
            .map(|p| match p {
                Projection::Column(c) => quote_ident(c),
                Projection::Aliased { column, alias } => {
                    format!("{} as {}", quote_ident(column), quote_ident(alias))
                }
            })
            .collect();
        for col in &self.meta_columns {
            parts.push(format!("TTL({})", quote_ident(col)));
            parts.push(format!("writetime({})", quote_ident(col)));
        }
        let projection = if parts.is_empty() {
            "*".to_string()
        } else {
            parts.join(", ")
        };

        let mut text = format!(
            "SELECT {projection} FROM {}",
            qualified_name(&self.keyspace, &self.table)
        );
        if !self.where_columns.is_empty() {
            let clause: Vec<String> = self
                .where_columns
                .iter()
                .map(|c| format!("{}=?", quote_ident(c)))
                .collect();
            text.push_str(" WHERE ");
            text.push_str(&clause.join(" AND "));
        }
        if let Some(limit) = self.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }
        if self.bindings.len() > self.where_columns.len() {
            return Err(Error::Build(format!(
                "{} bindings supplied for {} placeholders",
                self.bindings.len(),
                self.where_columns.len()
            )));
        }
        Ok(Statement::with_bindings(text, self.bindings.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    #[test]
    fn select_star() {
        let stmt = Select::builder().from("ks", "t").build().unwrap();
        assert_eq!(stmt.text, "SELECT * FROM \"ks\".\"t\"");
        assert!(stmt.bindings.is_empty());
    }

    #[test]
    fn full_select() {
        let stmt = Select::builder()
            .from("ks", "users")
            .column("id")
            .column_as("name", "n")
            .ttl_and_writetime(["name"])
            .where_columns(["id", "bucket"])
            .bind(Binding {
                column: "id".into(),
                type_hint: "int".into(),
                value: CellValue::Int(1),
            })
            .bind(Binding {
                column: "bucket".into(),
                type_hint: "int".into(),
                value: CellValue::Int(2),
            })
            .limit(50)
            .build()
            .unwrap();
        assert_eq!(
            stmt.text,
            "SELECT \"id\", \"name\" as \"n\", TTL(\"name\"), writetime(\"name\") \
             FROM \"ks\".\"users\" WHERE \"id\"=? AND \"bucket\"=? LIMIT 50"
        );
        assert_eq!(stmt.bindings.len(), 2);
    }

    #[test]
    fn empty_where_column_name_fails() {
        let res = Select::builder().from("ks", "t").where_column("").build();
        assert!(matches!(res, Err(Error::Build(_))));
    }

    #[test]
    fn empty_where_list_is_legal() {
        let stmt = Select::builder()
            .from("ks", "t")
            .where_columns(Vec::<&str>::new())
            .build()
            .unwrap();
        assert!(!stmt.text.contains("WHERE"));
    }
}
