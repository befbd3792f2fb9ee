//! Request shapes for key-addressed row operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::encoding::Encoding;
use crate::value::CellValue;

/// One cell's value plus an optional per-cell encoding override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyQueryColumnDetails {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
}

impl KeyQueryColumnDetails {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            encoding: None,
        }
    }

    pub fn encoded(value: impl Into<CellValue>, encoding: Encoding) -> Self {
        Self {
            value: value.into(),
            encoding: Some(encoding),
        }
    }
}

/// A full or partial row keyed by column name.
pub type RowDetails = BTreeMap<String, KeyQueryColumnDetails>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyQueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    #[serde(default)]
    pub decode_values: bool,
}

/// A primary-key filter plus decode options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyQuery {
    pub primary_key: RowDetails,
    #[serde(default)]
    pub options: KeyQueryOptions,
}

impl KeyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, column: &str, details: KeyQueryColumnDetails) -> Self {
        self.primary_key.insert(column.to_string(), details);
        self
    }

    pub fn options(mut self, options: KeyQueryOptions) -> Self {
        self.options = options;
        self
    }
}
