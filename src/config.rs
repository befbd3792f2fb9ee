use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// A deny pattern applied to free-form statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionRule {
    /// Case-insensitive regular expression.
    pub pattern: String,
    /// Message reported when the pattern matches.
    pub reason: String,
}

impl RestrictionRule {
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictionConfig {
    pub enabled: bool,
    pub rules: Vec<RestrictionRule>,
}

/// Settings of the statement engine, passed explicitly at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on rows returned by a SELECT; enforced through `LIMIT`.
    pub page_size: u32,
    /// Rows requested per round trip from the driver.
    pub fetch_size: u32,
    /// Display truncation threshold in characters.
    pub truncate_threshold: usize,
    pub restrictions: RestrictionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            fetch_size: 100,
            truncate_threshold: 150,
            restrictions: RestrictionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing keys take their defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".to_string()));
        }
        if self.fetch_size == 0 {
            return Err(Error::Config("fetch_size must be positive".to_string()));
        }
        Ok(())
    }
}
