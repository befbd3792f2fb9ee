use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use serde_json::Value;

use super::{Compaction, Compression, ProtocolVersion, SchemaBuilder, render_float};
use crate::builder::quote_literal;
use crate::error::Result;
use crate::schema::{Caching, TableProperties};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One table level option, as dispatched from [`TableProperties`].
#[derive(Debug, Clone, PartialEq)]
pub enum TableOption {
    BloomFilterFpChance(f64),
    Caching(Caching),
    Comment(String),
    Compaction(BTreeMap<String, Value>),
    Compression(BTreeMap<String, Value>),
    DefaultTimeToLive(u32),
    GcGraceSeconds(u32),
    MemtableFlushPeriodInMs(u32),
    Order(Vec<(String, SortOrder)>),
    ReadRepairChance(f64),
    SpeculativeRetry(String),
}

impl TableOption {
    pub fn name(&self) -> &'static str {
        match self {
            TableOption::BloomFilterFpChance(_) => "bloom_filter_fp_chance",
            TableOption::Caching(_) => "caching",
            TableOption::Comment(_) => "comment",
            TableOption::Compaction(_) => "compaction",
            TableOption::Compression(_) => "compression",
            TableOption::DefaultTimeToLive(_) => "default_time_to_live",
            TableOption::GcGraceSeconds(_) => "gc_grace_seconds",
            TableOption::MemtableFlushPeriodInMs(_) => "memtable_flush_period_in_ms",
            TableOption::Order(_) => "order",
            TableOption::ReadRepairChance(_) => "read_repair_chance",
            TableOption::SpeculativeRetry(_) => "speculative_retry",
        }
    }

    /// Every option set in `props`.
    pub fn from_properties(props: &TableProperties) -> Vec<TableOption> {
        let mut out = Vec::new();
        if let Some(v) = props.bloom_filter_fp_chance {
            out.push(TableOption::BloomFilterFpChance(v));
        }
        if let Some(v) = &props.caching {
            out.push(TableOption::Caching(v.clone()));
        }
        if let Some(v) = &props.comment {
            out.push(TableOption::Comment(v.clone()));
        }
        if let Some(v) = &props.compaction {
            out.push(TableOption::Compaction(v.clone()));
        }
        if let Some(v) = &props.compression {
            out.push(TableOption::Compression(v.clone()));
        }
        if let Some(v) = props.default_time_to_live {
            out.push(TableOption::DefaultTimeToLive(v));
        }
        if let Some(v) = props.gc_grace_seconds {
            out.push(TableOption::GcGraceSeconds(v));
        }
        if let Some(v) = props.memtable_flush_period_in_ms {
            out.push(TableOption::MemtableFlushPeriodInMs(v));
        }
        if let Some(v) = props.read_repair_chance {
            out.push(TableOption::ReadRepairChance(v));
        }
        if let Some(v) = &props.speculative_retry {
            out.push(TableOption::SpeculativeRetry(v.clone()));
        }
        out
    }
}

/// `WITH ... AND ...` clauses of a table statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TableOptions {
    version: ProtocolVersion,
    bloom_filter_fp_chance: Option<f64>,
    caching: Option<Caching>,
    clustering_order: Vec<(String, SortOrder)>,
    comment: Option<String>,
    compaction: Option<Compaction>,
    compression: Option<Compression>,
    default_time_to_live: Option<u32>,
    gc_grace_seconds: Option<u32>,
    memtable_flush_period_in_ms: Option<u32>,
    read_repair_chance: Option<f64>,
    speculative_retry: Option<String>,
}

impl TableOptions {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            bloom_filter_fp_chance: None,
            caching: None,
            clustering_order: Vec::new(),
            comment: None,
            compaction: None,
            compression: None,
            default_time_to_live: None,
            gc_grace_seconds: None,
            memtable_flush_period_in_ms: None,
            read_repair_chance: None,
            speculative_retry: None,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn bloom_filter_fp_chance(mut self, v: f64) -> Self {
        self.bloom_filter_fp_chance = Some(v);
        self
    }

    pub fn caching(mut self, keys: &str, rows_per_partition: &str) -> Self {
        self.caching = Some(Caching {
            keys: keys.to_string(),
            rows_per_partition: rows_per_partition.to_string(),
        });
        self
    }

    pub fn clustering_order(mut self, column: &str, order: SortOrder) -> Self {
        self.clustering_order.push((column.to_string(), order));
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn compaction(mut self, compaction: impl Into<Compaction>) -> Self {
        self.compaction = Some(compaction.into());
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn default_time_to_live(mut self, seconds: u32) -> Self {
        self.default_time_to_live = Some(seconds);
        self
    }

    pub fn gc_grace_seconds(mut self, seconds: u32) -> Self {
        self.gc_grace_seconds = Some(seconds);
        self
    }

    pub fn memtable_flush_period_in_ms(mut self, ms: u32) -> Self {
        self.memtable_flush_period_in_ms = Some(ms);
        self
    }

    pub fn read_repair_chance(mut self, chance: f64) -> Self {
        self.read_repair_chance = Some(chance);
        self
    }

    pub fn speculative_retry(mut self, value: &str) -> Self {
        self.speculative_retry = Some(value.to_string());
        self
    }

    /// Apply a dispatched option; strategy maps go through the builder's
    /// factories so that unknown strategies and keys fail.
    pub fn apply(&mut self, builder: &SchemaBuilder, option: TableOption) -> Result<()> {
        let current = self.clone();
        *self = match option {
            TableOption::BloomFilterFpChance(v) => current.bloom_filter_fp_chance(v),
            TableOption::Caching(c) => current.caching(&c.keys, &c.rows_per_partition),
            TableOption::Comment(c) => current.comment(&c),
            TableOption::Compaction(map) => current.compaction(Compaction::from_map(&map)?),
            TableOption::Compression(map) if map.is_empty() => {
                current.compression(builder.no_compression())
            }
            TableOption::Compression(map) => current.compression(Compression::from_map(&map)?),
            TableOption::DefaultTimeToLive(v) => current.default_time_to_live(v),
            TableOption::GcGraceSeconds(v) => current.gc_grace_seconds(v),
            TableOption::MemtableFlushPeriodInMs(v) => current.memtable_flush_period_in_ms(v),
            TableOption::Order(order) => order
                .into_iter()
                .fold(current, |acc, (col, dir)| acc.clustering_order(&col, dir)),
            TableOption::ReadRepairChance(v) => current.read_repair_chance(v),
            TableOption::SpeculativeRetry(v) => current.speculative_retry(&v),
        };
        Ok(())
    }

    /// Rendered clauses, sorted alphabetically (case-insensitive).
    pub fn clauses(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(v) = self.bloom_filter_fp_chance {
            out.push(format!("bloom_filter_fp_chance = {}", render_float(v)));
        }
        if let Some(c) = &self.caching {
            out.push(format!("caching = {}", render_caching(c, self.version)));
        }
        if !self.clustering_order.is_empty() {
            let cols: Vec<String> = self
                .clustering_order
                .iter()
                .map(|(c, o)| format!("{c} {}", o.as_str()))
                .collect();
            out.push(format!("CLUSTERING ORDER BY ({})", cols.join(", ")));
        }
        if let Some(c) = &self.comment {
            out.push(format!("comment = {}", quote_literal(c)));
        }
        if let Some(c) = &self.compaction {
            out.push(format!("compaction = {}", c.render()));
        }
        if let Some(c) = &self.compression {
            out.push(format!("compression = {}", c.render(self.version)));
        }
        if let Some(v) = self.default_time_to_live {
            out.push(format!("default_time_to_live = {v}"));
        }
        if let Some(v) = self.gc_grace_seconds {
            out.push(format!("gc_grace_seconds = {v}"));
        }
        if let Some(v) = self.memtable_flush_period_in_ms {
            out.push(format!("memtable_flush_period_in_ms = {v}"));
        }
        if let Some(v) = self.read_repair_chance {
            out.push(format!("read_repair_chance = {}", render_float(v)));
        }
        if let Some(v) = &self.speculative_retry {
            out.push(format!("speculative_retry = {}", quote_literal(v)));
        }
        out.sort_by_key(|c| c.to_ascii_lowercase());
        out
    }

    /// `WITH a\nAND b ...`, or `None` when no option is set.
    pub fn render(&self) -> Option<String> {
        let clauses = self.clauses();
        if clauses.is_empty() {
            None
        } else {
            Some(format!("WITH {}", clauses.join("\nAND ")))
        }
    }
}

fn render_caching(caching: &Caching, version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::V3 => format!(
            "{{ 'keys': {}, 'rows_per_partition': {} }}",
            quote_literal(&caching.keys),
            quote_literal(&caching.rows_per_partition)
        ),
        ProtocolVersion::V2 => {
            let json = serde_json::json!({
                "keys": caching.keys,
                "rows_per_partition": caching.rows_per_partition,
            });
            quote_literal(&json.to_string())
        }
    }
}
