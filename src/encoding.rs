use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Text encoding used to carry blob values through statements and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Hex,
    Base64,
    Ascii,
    #[serde(alias = "utf-8")]
    Utf8,
}

impl Encoding {
    /// Render raw bytes as text. Hex output carries no `0x` prefix. Ascii
    /// drops the high bit of each byte; utf8 replaces invalid sequences.
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Hex => hex::encode(bytes),
            Encoding::Base64 => STANDARD.encode(bytes),
            Encoding::Ascii => bytes.iter().map(|b| char::from(b & 0x7f)).collect(),
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Convert text back into raw bytes. A leading `0x` is stripped for hex.
    pub fn decode(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            Encoding::Hex => hex::decode(strip_hex_prefix(text)).map_err(|e| e.to_string()),
            Encoding::Base64 => STANDARD.decode(text).map_err(|e| e.to_string()),
            Encoding::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err("value contains non-ascii characters".to_string())
                }
            }
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        }
    }

    /// Conversion function accepted by the server for text of this encoding.
    pub fn blob_function(self) -> Option<&'static str> {
        match self {
            Encoding::Utf8 => Some("textAsBlob"),
            Encoding::Ascii => Some("asciiAsBlob"),
            Encoding::Hex | Encoding::Base64 => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
            Encoding::Ascii => "ascii",
            Encoding::Utf8 => "utf8",
        };
        f.write_str(name)
    }
}

pub fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}
