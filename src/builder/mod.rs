//! Fluent builders for `SELECT` and `INSERT` statements.
//!
//! Builders accumulate their configuration and only produce text on
//! `build()`, which returns a [`Statement`] or a build error.

mod insert;
mod literal;
mod select;

use std::fmt;

use serde::Serialize;

use crate::value::CellValue;

pub use insert::Insert;
pub use literal::render_literal;
pub use select::Select;

/// Generated statement text plus positional bind values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub bindings: Vec<Binding>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bindings: Vec::new(),
        }
    }

    pub fn with_bindings(text: impl Into<String>, bindings: Vec<Binding>) -> Self {
        Self {
            text: text.into(),
            bindings,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A value bound to a `?` placeholder, with the column type as a hint for
/// the driver's serializer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub column: String,
    pub type_hint: String,
    pub value: CellValue,
}

/// Double-quote an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"keyspace"."table"`
pub fn qualified_name(keyspace: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(keyspace), quote_ident(table))
}

/// Escape a string literal body by doubling single quotes.
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Escape and wrap in single quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", escape_literal(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("Name"), "\"Name\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(qualified_name("ks", "t"), "\"ks\".\"t\"");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_literal("plain"), "'plain'");
    }
}
