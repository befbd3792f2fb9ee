use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{option_bool, option_f64, option_str, option_u32, render_float};
use crate::error::{Error, Result};

const CLASS_PREFIX: &str = "org.apache.cassandra.db.compaction.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WindowUnit {
    Minutes,
    Hours,
    Days,
}

impl WindowUnit {
    fn as_str(self) -> &'static str {
        match self {
            WindowUnit::Minutes => "MINUTES",
            WindowUnit::Hours => "HOURS",
            WindowUnit::Days => "DAYS",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "MINUTES" => Some(WindowUnit::Minutes),
            "HOURS" => Some(WindowUnit::Hours),
            "DAYS" => Some(WindowUnit::Days),
            _ => None,
        }
    }
}

/// Options understood by every strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactionCommon {
    pub enabled: Option<bool>,
    pub min_threshold: Option<u32>,
    pub max_threshold: Option<u32>,
    pub tombstone_threshold: Option<f64>,
    pub tombstone_compaction_interval: Option<u32>,
    pub unchecked_tombstone_compaction: Option<bool>,
}

impl CompactionCommon {
    fn set(&mut self, key: &str, value: &Value) -> Result<bool> {
        match key {
            "enabled" => self.enabled = Some(option_bool(key, value)?),
            "min_threshold" => self.min_threshold = Some(option_u32(key, value)?),
            "max_threshold" => self.max_threshold = Some(option_u32(key, value)?),
            "tombstone_threshold" => self.tombstone_threshold = Some(option_f64(key, value)?),
            "tombstone_compaction_interval" => {
                self.tombstone_compaction_interval = Some(option_u32(key, value)?)
            }
            "unchecked_tombstone_compaction" => {
                self.unchecked_tombstone_compaction = Some(option_bool(key, value)?)
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn entries(&self, out: &mut Vec<(&'static str, String)>) {
        if let Some(v) = self.enabled {
            out.push(("enabled", v.to_string()));
        }
        if let Some(v) = self.max_threshold {
            out.push(("max_threshold", v.to_string()));
        }
        if let Some(v) = self.min_threshold {
            out.push(("min_threshold", v.to_string()));
        }
        if let Some(v) = self.tombstone_compaction_interval {
            out.push(("tombstone_compaction_interval", v.to_string()));
        }
        if let Some(v) = self.tombstone_threshold {
            out.push(("tombstone_threshold", render_float(v)));
        }
        if let Some(v) = self.unchecked_tombstone_compaction {
            out.push(("unchecked_tombstone_compaction", v.to_string()));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeTieredCompaction {
    pub common: CompactionCommon,
    pub bucket_high: Option<f64>,
    pub bucket_low: Option<f64>,
    pub min_sstable_size: Option<u32>,
}

impl SizeTieredCompaction {
    pub fn bucket_high(mut self, v: f64) -> Self {
        self.bucket_high = Some(v);
        self
    }

    pub fn bucket_low(mut self, v: f64) -> Self {
        self.bucket_low = Some(v);
        self
    }

    pub fn min_sstable_size(mut self, bytes: u32) -> Self {
        self.min_sstable_size = Some(bytes);
        self
    }

    pub fn min_threshold(mut self, v: u32) -> Self {
        self.common.min_threshold = Some(v);
        self
    }

    pub fn max_threshold(mut self, v: u32) -> Self {
        self.common.max_threshold = Some(v);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeveledCompaction {
    pub common: CompactionCommon,
    pub sstable_size_in_mb: Option<u32>,
}

impl LeveledCompaction {
    pub fn sstable_size_in_mb(mut self, mb: u32) -> Self {
        self.sstable_size_in_mb = Some(mb);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeWindowCompaction {
    pub common: CompactionCommon,
    pub compaction_window_unit: Option<WindowUnit>,
    pub compaction_window_size: Option<u32>,
    pub timestamp_resolution: Option<String>,
}

impl TimeWindowCompaction {
    pub fn window(mut self, size: u32, unit: WindowUnit) -> Self {
        self.compaction_window_size = Some(size);
        self.compaction_window_unit = Some(unit);
        self
    }

    pub fn timestamp_resolution(mut self, resolution: &str) -> Self {
        self.timestamp_resolution = Some(resolution.to_ascii_uppercase());
        self
    }
}

/// Compaction strategy with its strategy specific options.
#[derive(Debug, Clone, PartialEq)]
pub enum Compaction {
    SizeTiered(SizeTieredCompaction),
    Leveled(LeveledCompaction),
    TimeWindow(TimeWindowCompaction),
}

impl Compaction {
    pub fn size_tiered() -> SizeTieredCompaction {
        SizeTieredCompaction::default()
    }

    pub fn leveled() -> LeveledCompaction {
        LeveledCompaction::default()
    }

    pub fn time_window() -> TimeWindowCompaction {
        TimeWindowCompaction::default()
    }

    pub fn by_name(name: &str) -> Result<Self> {
        let short = name.trim();
        let short = short.strip_prefix(CLASS_PREFIX).unwrap_or(short);
        match short.to_ascii_lowercase().as_str() {
            "sizetiered" | "sizetieredcompactionstrategy" | "stcs" => {
                Ok(Compaction::SizeTiered(SizeTieredCompaction::default()))
            }
            "leveled" | "leveledcompactionstrategy" | "lcs" => {
                Ok(Compaction::Leveled(LeveledCompaction::default()))
            }
            "timewindow" | "timewindowcompactionstrategy" | "twcs" => {
                Ok(Compaction::TimeWindow(TimeWindowCompaction::default()))
            }
            _ => Err(Error::SchemaValidation(format!(
                "unknown compaction strategy {name}"
            ))),
        }
    }

    /// Rebuild from the server's map form (`class` plus options).
    pub fn from_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Result<Self> {
        let entries: Vec<(&String, &Value)> = entries.into_iter().collect();
        let class = entries
            .iter()
            .find(|(k, _)| k.as_str() == "class")
            .ok_or_else(|| Error::SchemaValidation("compaction requires a class".to_string()))?;
        let mut compaction = Self::by_name(&option_str("class", class.1)?)?;
        for (key, value) in &entries {
            if key.as_str() != "class" {
                compaction.set_option(key, value)?;
            }
        }
        Ok(compaction)
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Compaction::SizeTiered(_) => "SizeTieredCompactionStrategy",
            Compaction::Leveled(_) => "LeveledCompactionStrategy",
            Compaction::TimeWindow(_) => "TimeWindowCompactionStrategy",
        }
    }

    pub fn common_mut(&mut self) -> &mut CompactionCommon {
        match self {
            Compaction::SizeTiered(s) => &mut s.common,
            Compaction::Leveled(s) => &mut s.common,
            Compaction::TimeWindow(s) => &mut s.common,
        }
    }

    /// Set an option by its server-side name. Names the strategy does not
    /// know are an error.
    pub fn set_option(&mut self, key: &str, value: &Value) -> Result<()> {
        if self.common_mut().set(key, value)? {
            return Ok(());
        }
        match (self, key) {
            (Compaction::SizeTiered(s), "bucket_high") => {
                s.bucket_high = Some(option_f64(key, value)?)
            }
            (Compaction::SizeTiered(s), "bucket_low") => {
                s.bucket_low = Some(option_f64(key, value)?)
            }
            (Compaction::SizeTiered(s), "min_sstable_size") => {
                s.min_sstable_size = Some(option_u32(key, value)?)
            }
            (Compaction::Leveled(s), "sstable_size_in_mb") => {
                s.sstable_size_in_mb = Some(option_u32(key, value)?)
            }
            (Compaction::TimeWindow(s), "compaction_window_size") => {
                s.compaction_window_size = Some(option_u32(key, value)?)
            }
            (Compaction::TimeWindow(s), "compaction_window_unit") => {
                let text = option_str(key, value)?;
                s.compaction_window_unit = Some(WindowUnit::parse(&text).ok_or_else(|| {
                    Error::SchemaValidation(format!("invalid compaction window unit {text}"))
                })?)
            }
            (Compaction::TimeWindow(s), "timestamp_resolution") => {
                s.timestamp_resolution = Some(option_str(key, value)?.to_ascii_uppercase())
            }
            (strategy, _) => {
                return Err(Error::SchemaValidation(format!(
                    "unknown option {key} for {}",
                    strategy.class_name()
                )));
            }
        }
        Ok(())
    }

    /// `{ 'class': '...', 'key': value, ... }` with keys in alphabetical order.
    pub fn render(&self) -> String {
        let mut entries: Vec<(&'static str, String)> = Vec::new();
        match self {
            Compaction::SizeTiered(s) => {
                s.common.entries(&mut entries);
                if let Some(v) = s.bucket_high {
                    entries.push(("bucket_high", render_float(v)));
                }
                if let Some(v) = s.bucket_low {
                    entries.push(("bucket_low", render_float(v)));
                }
                if let Some(v) = s.min_sstable_size {
                    entries.push(("min_sstable_size", v.to_string()));
                }
            }
            Compaction::Leveled(s) => {
                s.common.entries(&mut entries);
                if let Some(v) = s.sstable_size_in_mb {
                    entries.push(("sstable_size_in_mb", v.to_string()));
                }
            }
            Compaction::TimeWindow(s) => {
                s.common.entries(&mut entries);
                if let Some(v) = s.compaction_window_size {
                    entries.push(("compaction_window_size", v.to_string()));
                }
                if let Some(v) = s.compaction_window_unit {
                    entries.push(("compaction_window_unit", format!("'{}'", v.as_str())));
                }
                if let Some(v) = &s.timestamp_resolution {
                    entries.push(("timestamp_resolution", format!("'{v}'")));
                }
            }
        }
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut parts = vec![format!("'class': '{}'", self.class_name())];
        parts.extend(entries.into_iter().map(|(k, v)| format!("'{k}': {v}")));
        format!("{{ {} }}", parts.join(", "))
    }
}

impl From<SizeTieredCompaction> for Compaction {
    fn from(value: SizeTieredCompaction) -> Self {
        Compaction::SizeTiered(value)
    }
}

impl From<LeveledCompaction> for Compaction {
    fn from(value: LeveledCompaction) -> Self {
        Compaction::Leveled(value)
    }
}

impl From<TimeWindowCompaction> for Compaction {
    fn from(value: TimeWindowCompaction) -> Self {
        Compaction::TimeWindow(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn renders_each_strategy() {
        let lcs: Compaction = Compaction::leveled().sstable_size_in_mb(160).into();
        assert_eq!(
            lcs.render(),
            "{ 'class': 'LeveledCompactionStrategy', 'sstable_size_in_mb': 160 }"
        );

        let stcs: Compaction = Compaction::size_tiered()
            .min_threshold(4)
            .max_threshold(32)
            .bucket_low(0.5)
            .into();
        assert_eq!(
            stcs.render(),
            "{ 'class': 'SizeTieredCompactionStrategy', 'bucket_low': 0.5, 'max_threshold': 32, 'min_threshold': 4 }"
        );

        let twcs: Compaction = Compaction::time_window().window(1, WindowUnit::Days).into();
        assert_eq!(
            twcs.render(),
            "{ 'class': 'TimeWindowCompactionStrategy', 'compaction_window_size': 1, 'compaction_window_unit': 'DAYS' }"
        );
    }

    #[test]
    fn unknown_option_fails_loudly() {
        let mut lcs = Compaction::by_name("LeveledCompactionStrategy").unwrap();
        let err = lcs.set_option("bucket_high", &json!(1.5)).unwrap_err();
        assert!(err.to_string().contains("bucket_high"));
        lcs.set_option("sstable_size_in_mb", &json!("256")).unwrap();
        lcs.set_option("min_threshold", &json!(4)).unwrap();
    }

    #[test]
    fn from_qualified_class_map() {
        let mut map = BTreeMap::new();
        map.insert(
            "class".to_string(),
            json!("org.apache.cassandra.db.compaction.TimeWindowCompactionStrategy"),
        );
        map.insert("compaction_window_unit".to_string(), json!("hours"));
        map.insert("compaction_window_size".to_string(), json!("6"));
        let c = Compaction::from_map(&map).unwrap();
        assert_eq!(
            c,
            Compaction::from(Compaction::time_window().window(6, WindowUnit::Hours))
        );
        assert!(Compaction::by_name("DateTieredCompactionStrategy").is_err());
    }
}
