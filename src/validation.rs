//! Invariant checks applied before any statement reaches a connection.

use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RestrictionRule;
use crate::error::{Error, Result};
use crate::key::{KeyQuery, RowDetails};
use crate::schema::TableSchema;
use crate::value::CellValue;

/// Anything that names a set of columns with defined values.
pub trait KeyColumns {
    fn defined_columns(&self) -> BTreeSet<&str>;
}

impl KeyColumns for BTreeMap<String, CellValue> {
    fn defined_columns(&self) -> BTreeSet<&str> {
        self.iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl KeyColumns for RowDetails {
    fn defined_columns(&self) -> BTreeSet<&str> {
        self.iter()
            .filter(|(_, d)| !d.value.is_null())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl KeyColumns for KeyQuery {
    fn defined_columns(&self) -> BTreeSet<&str> {
        self.primary_key.defined_columns()
    }
}

/// Fail unless every primary key column of `schema` has a defined value.
pub fn check_complete_primary_key<K: KeyColumns + ?Sized>(
    schema: &TableSchema,
    key: &K,
) -> Result<()> {
    let present = key.defined_columns();
    let missing: Vec<String> = schema
        .primary_key_names()
        .into_iter()
        .filter(|name| !present.contains(name))
        .map(str::to_string)
        .collect();
    if schema.partition_keys.is_empty() || !missing.is_empty() {
        return Err(Error::primary_key_missing(
            &schema.keyspace,
            &schema.name,
            missing,
        ));
    }
    Ok(())
}

/// Reject blank identifiers and ones carrying control characters.
pub fn check_identifier(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Build(format!("{kind} must be a non-empty string")));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::Build(format!(
            "{kind} {name:?} contains control characters"
        )));
    }
    Ok(())
}

/// Compiled deny list for free-form statements.
#[derive(Debug, Clone, Default)]
pub struct QueryRestrictions {
    rules: Vec<(Regex, String)>,
}

impl QueryRestrictions {
    pub fn new(rules: &[RestrictionRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, rule.reason.clone()))
                    .map_err(|e| Error::Config(format!("bad pattern {:?}: {e}", rule.pattern)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Reasons of every rule matching `statement`, most specific first.
    ///
    /// Specificity is the length of the matched text; ties keep
    /// configuration order.
    pub fn matches(&self, statement: &str) -> Vec<&str> {
        let mut hits: Vec<(usize, usize, &str)> = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(idx, (re, reason))| {
                re.find(statement)
                    .map(|m| (m.as_str().len(), idx, reason.as_str()))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, _, reason)| reason).collect()
    }

    pub fn check(&self, statement: &str) -> Result<()> {
        match self.matches(statement).first() {
            Some(reason) => Err(Error::StatementNotAllowed {
                reason: reason.to_string(),
                statement: statement.to_string(),
            }),
            None => Ok(()),
        }
    }
}
