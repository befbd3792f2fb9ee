use serde_json::Value;

use super::{ProtocolVersion, option_bool, option_f64, option_str, option_u32, render_float};
use crate::error::{Error, Result};

const CLASS_PREFIX: &str = "org.apache.cassandra.io.compress.";

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    pub algorithm: String,
    pub chunk_length_kb: Option<u32>,
    pub crc_check_chance: Option<f64>,
}

/// SSTable compression settings.
#[derive(Debug, Clone, PartialEq)]
pub enum Compression {
    Disabled,
    Enabled(CompressionOptions),
}

impl Compression {
    pub fn with_algorithm(algorithm: &str) -> Self {
        Compression::Enabled(CompressionOptions {
            algorithm: algorithm.to_string(),
            chunk_length_kb: None,
            crc_check_chance: None,
        })
    }

    pub fn lz4() -> Self {
        Self::with_algorithm("LZ4Compressor")
    }

    pub fn snappy() -> Self {
        Self::with_algorithm("SnappyCompressor")
    }

    pub fn deflate() -> Self {
        Self::with_algorithm("DeflateCompressor")
    }

    pub fn zstd() -> Self {
        Self::with_algorithm("ZstdCompressor")
    }

    pub fn by_name(name: &str) -> Result<Self> {
        let short = name.trim();
        let short = short.strip_prefix(CLASS_PREFIX).unwrap_or(short);
        match short.to_ascii_lowercase().as_str() {
            "" | "none" | "disabled" => Ok(Compression::Disabled),
            "lz4" | "lz4compressor" => Ok(Self::lz4()),
            "snappy" | "snappycompressor" => Ok(Self::snappy()),
            "deflate" | "deflatecompressor" => Ok(Self::deflate()),
            "zstd" | "zstdcompressor" => Ok(Self::zstd()),
            _ => Err(Error::SchemaValidation(format!(
                "unknown compression algorithm {name}"
            ))),
        }
    }

    /// Rebuild from the server's map form, for either protocol version.
    pub fn from_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Result<Self> {
        let entries: Vec<(&String, &Value)> = entries.into_iter().collect();
        let class = entries
            .iter()
            .find(|(k, _)| k.as_str() == "class" || k.as_str() == "sstable_compression")
            .map(|(k, v)| option_str(k, v))
            .transpose()?;
        let mut compression = match class {
            Some(class) => Self::by_name(&class)?,
            None => Compression::Disabled,
        };
        for (key, value) in entries {
            if key == "class" || key == "sstable_compression" {
                continue;
            }
            compression.set_option(key, value)?;
        }
        Ok(compression)
    }

    pub fn chunk_length_kb(mut self, kb: u32) -> Self {
        if let Compression::Enabled(opts) = &mut self {
            opts.chunk_length_kb = Some(kb);
        }
        self
    }

    pub fn crc_check_chance(mut self, chance: f64) -> Self {
        if let Compression::Enabled(opts) = &mut self {
            opts.crc_check_chance = Some(chance);
        }
        self
    }

    /// Set an option by its server-side name. Unknown names are an error.
    pub fn set_option(&mut self, key: &str, value: &Value) -> Result<()> {
        match key {
            "enabled" => {
                if !option_bool(key, value)? {
                    *self = Compression::Disabled;
                }
                Ok(())
            }
            "chunk_length_in_kb" | "chunk_length_kb" => {
                let kb = option_u32(key, value)?;
                self.enabled_mut(key)?.chunk_length_kb = Some(kb);
                Ok(())
            }
            "crc_check_chance" => {
                let chance = option_f64(key, value)?;
                self.enabled_mut(key)?.crc_check_chance = Some(chance);
                Ok(())
            }
            _ => Err(Error::SchemaValidation(format!(
                "unknown compression option {key}"
            ))),
        }
    }

    fn enabled_mut(&mut self, key: &str) -> Result<&mut CompressionOptions> {
        match self {
            Compression::Enabled(opts) => Ok(opts),
            Compression::Disabled => Err(Error::SchemaValidation(format!(
                "option {key} requires compression to be enabled"
            ))),
        }
    }

    pub fn render(&self, version: ProtocolVersion) -> String {
        match (self, version) {
            (Compression::Disabled, ProtocolVersion::V3) => "{ 'enabled': false }".to_string(),
            (Compression::Disabled, ProtocolVersion::V2) => {
                "{ 'sstable_compression': '' }".to_string()
            }
            (Compression::Enabled(opts), _) => {
                let (class_key, chunk_key) = match version {
                    ProtocolVersion::V3 => ("class", "chunk_length_in_kb"),
                    ProtocolVersion::V2 => ("sstable_compression", "chunk_length_kb"),
                };
                let mut parts = vec![format!("'{class_key}': '{}'", opts.algorithm)];
                if let Some(kb) = opts.chunk_length_kb {
                    parts.push(format!("'{chunk_key}': {kb}"));
                }
                if let Some(chance) = opts.crc_check_chance {
                    parts.push(format!("'crc_check_chance': {}", render_float(chance)));
                }
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }
}
