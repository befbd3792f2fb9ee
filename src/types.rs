//! Native column type handling.
//!
//! Maps protocol type strings (`bigint`, `map<varchar, int>`, ...) to the
//! engine's canonical types and answers the questions every builder asks:
//! does a literal of this type need quoting, is it a blob, is it a
//! collection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Higher level type equivalent of a native column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalType {
    Number,
    Boolean,
    String,
    Object,
}

const NUMERIC_TYPES: &[&str] = &[
    "bigint", "counter", "decimal", "double", "float", "int", "smallint", "tinyint", "varint",
];

const QUOTED_TYPES: &[&str] = &["ascii", "inet", "text", "time", "timestamp", "varchar"];

/// Canonical type for a native type name. Pure lookup, unknown names map to
/// [`CanonicalType::String`].
pub fn canonical_type(native: &str) -> CanonicalType {
    let name = base_name(native);
    if NUMERIC_TYPES.contains(&name.as_str()) {
        CanonicalType::Number
    } else if name == "boolean" {
        CanonicalType::Boolean
    } else if name == "blob" {
        CanonicalType::Object
    } else {
        CanonicalType::String
    }
}

/// Whether literals of `native` are rendered single-quoted.
pub fn needs_quoting(native: &str) -> bool {
    QUOTED_TYPES.contains(&base_name(native).as_str())
}

pub fn is_blob(native: &str) -> bool {
    base_name(native) == "blob"
}

pub fn is_counter(native: &str) -> bool {
    base_name(native) == "counter"
}

/// `list<..>`, `set<..>` or `map<..>`, looking through `frozen<..>`.
pub fn is_collection(native: &str) -> bool {
    match CqlType::parse(native) {
        Ok(ty) => matches!(
            ty.unfrozen(),
            CqlType::List(_) | CqlType::Set(_) | CqlType::Map(_, _)
        ),
        Err(_) => false,
    }
}

fn base_name(native: &str) -> String {
    native.trim().to_ascii_lowercase()
}

/// Parsed native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlType {
    /// Scalar, user-defined or otherwise opaque type name.
    Native(String),
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Tuple(Vec<CqlType>),
    Frozen(Box<CqlType>),
}

impl CqlType {
    /// Parse a protocol type string such as `map<text, frozen<list<int>>>`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Build("empty type name".to_string()));
        }
        let Some(open) = input.find('<') else {
            return Ok(CqlType::Native(input.to_string()));
        };
        if !input.ends_with('>') {
            return Err(Error::Build(format!("unbalanced type {input}")));
        }
        let name = input[..open].trim().to_ascii_lowercase();
        let args = split_type_args(&input[open + 1..input.len() - 1])
            .ok_or_else(|| Error::Build(format!("unbalanced type {input}")))?;
        let arg = |i: usize| -> Result<Box<CqlType>> { Ok(Box::new(CqlType::parse(args[i])?)) };
        match (name.as_str(), args.len()) {
            ("list", 1) => Ok(CqlType::List(arg(0)?)),
            ("set", 1) => Ok(CqlType::Set(arg(0)?)),
            ("map", 2) => Ok(CqlType::Map(arg(0)?, arg(1)?)),
            ("frozen", 1) => Ok(CqlType::Frozen(arg(0)?)),
            ("tuple", n) if n > 0 => Ok(CqlType::Tuple(
                args.iter()
                    .map(|a| CqlType::parse(a))
                    .collect::<Result<Vec<_>>>()?,
            )),
            ("list" | "set" | "map" | "frozen" | "tuple", _) => Err(Error::Build(format!(
                "wrong number of type arguments in {input}"
            ))),
            // vector<float, 3> and friends are carried opaquely
            _ => Ok(CqlType::Native(input.to_string())),
        }
    }

    /// The type with any `frozen<..>` wrappers removed.
    pub fn unfrozen(&self) -> &CqlType {
        match self {
            CqlType::Frozen(inner) => inner.unfrozen(),
            other => other,
        }
    }

    /// Native name for scalar types, `None` for collections and tuples.
    pub fn native_name(&self) -> Option<&str> {
        match self.unfrozen() {
            CqlType::Native(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CqlType::Native(name) => write!(f, "{name}"),
            CqlType::List(e) => write!(f, "list<{e}>"),
            CqlType::Set(e) => write!(f, "set<{e}>"),
            CqlType::Map(k, v) => write!(f, "map<{k}, {v}>"),
            CqlType::Frozen(e) => write!(f, "frozen<{e}>"),
            CqlType::Tuple(items) => {
                write!(f, "tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// Split the inside of `<...>` on top level commas.
fn split_type_args(inner: &str) -> Option<Vec<&str>> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                out.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    out.push(inner[start..].trim());
    Some(out)
}
