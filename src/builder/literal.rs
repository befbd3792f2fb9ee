//! Literal rendering for statement text.

use crate::builder::quote_literal;
use crate::encoding::{Encoding, strip_hex_prefix};
use crate::error::{Error, Result};
use crate::schema::TableColumn;
use crate::types::{self, CqlType};
use crate::value::{CellValue, iso_timestamp};

/// Render `value` as a literal for `column`.
///
/// `encoding` applies to blob columns and is required when the value is
/// text; raw bytes are always written as a `0x` literal.
pub fn render_literal(
    column: &TableColumn,
    value: &CellValue,
    encoding: Option<Encoding>,
) -> Result<String> {
    if value.is_null() {
        return Ok("null".to_string());
    }
    let ty = CqlType::parse(&column.native_type)?;
    render_typed(&column.name, &ty, value, encoding)
}

fn render_typed(
    column: &str,
    ty: &CqlType,
    value: &CellValue,
    encoding: Option<Encoding>,
) -> Result<String> {
    if value.is_null() {
        return Ok("null".to_string());
    }
    match (ty.unfrozen(), value) {
        // already a literal
        (
            CqlType::List(_) | CqlType::Set(_) | CqlType::Map(_, _) | CqlType::Tuple(_),
            CellValue::Text(raw),
        ) => Ok(raw.clone()),
        (CqlType::List(elem), CellValue::List(items) | CellValue::Set(items)) => {
            render_sequence("[", "]", column, elem, items)
        }
        (CqlType::Set(elem), CellValue::List(items) | CellValue::Set(items)) => {
            render_sequence("{", "}", column, elem, items)
        }
        (CqlType::Map(key_ty, val_ty), CellValue::Map(entries)) => {
            let parts = entries
                .iter()
                .map(|(k, v)| {
                    Ok(format!(
                        "{}: {}",
                        render_typed(column, key_ty, k, None)?,
                        render_typed(column, val_ty, v, None)?
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(wrap("{", "}", parts))
        }
        (CqlType::Tuple(tys), CellValue::List(items) | CellValue::Tuple(items)) => {
            if tys.len() != items.len() {
                return Err(Error::Build(format!(
                    "tuple column {column} expects {} values, got {}",
                    tys.len(),
                    items.len()
                )));
            }
            let parts = tys
                .iter()
                .zip(items)
                .map(|(t, v)| render_typed(column, t, v, None))
                .collect::<Result<Vec<_>>>()?;
            Ok(wrap("(", ")", parts))
        }
        (CqlType::Native(name), _) => render_scalar(column, name, value, encoding),
        _ => Err(Error::Build(format!(
            "value for column {column} does not match type {ty}"
        ))),
    }
}

fn render_scalar(
    column: &str,
    native: &str,
    value: &CellValue,
    encoding: Option<Encoding>,
) -> Result<String> {
    let name = native.to_ascii_lowercase();
    match (name.as_str(), value) {
        (_, CellValue::Bytes(bytes)) => Ok(format!("0x{}", hex::encode(bytes))),
        ("timestamp", CellValue::Timestamp(ts)) => Ok(quote_literal(&iso_timestamp(ts))),
        ("date", CellValue::Timestamp(ts)) => {
            Ok(quote_literal(&ts.format("%Y-%m-%d").to_string()))
        }
        ("timestamp" | "date" | "time", CellValue::Int(_) | CellValue::Float(_)) => {
            Ok(value.to_plain_string())
        }
        ("date" | "time", _) => Ok(quote_literal(&value.to_plain_string())),
        ("blob", CellValue::Text(text)) => render_blob_text(column, text, encoding),
        (_, CellValue::List(items) | CellValue::Set(items)) => {
            let parts = items.iter().map(render_untyped).collect();
            Ok(wrap("[", "]", parts))
        }
        // user defined types: field names stay bare
        (_, CellValue::Map(entries)) => {
            let parts = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k.to_plain_string(), render_untyped(v)))
                .collect();
            Ok(wrap("{", "}", parts))
        }
        _ if types::needs_quoting(&name) => Ok(quote_literal(&value.to_plain_string())),
        _ => Ok(value.to_plain_string()),
    }
}

fn render_blob_text(column: &str, text: &str, encoding: Option<Encoding>) -> Result<String> {
    let encoding = encoding.ok_or_else(|| {
        Error::Build(format!("blob value for column {column} requires an encoding"))
    })?;
    let decode = |text: &str| {
        encoding.decode(text).map_err(|message| Error::Encoding {
            column: column.to_string(),
            encoding: encoding.to_string(),
            message,
        })
    };
    match encoding {
        Encoding::Hex => {
            decode(text)?;
            Ok(format!("0x{}", strip_hex_prefix(text)))
        }
        Encoding::Base64 => Ok(format!("0x{}", hex::encode(decode(text)?))),
        Encoding::Ascii | Encoding::Utf8 => {
            decode(text)?;
            let func = encoding.blob_function().unwrap_or("textAsBlob");
            Ok(format!("{func}({})", quote_literal(text)))
        }
    }
}

/// Elements of values whose type is not known: strings quoted, the rest as-is.
fn render_untyped(value: &CellValue) -> String {
    match value {
        CellValue::Text(s) => quote_literal(s),
        CellValue::Timestamp(ts) => quote_literal(&iso_timestamp(ts)),
        CellValue::List(items) | CellValue::Set(items) => {
            wrap("[", "]", items.iter().map(render_untyped).collect())
        }
        CellValue::Tuple(items) => wrap("(", ")", items.iter().map(render_untyped).collect()),
        CellValue::Map(entries) => wrap(
            "{",
            "}",
            entries
                .iter()
                .map(|(k, v)| format!("{}: {}", render_untyped(k), render_untyped(v)))
                .collect(),
        ),
        other => other.to_plain_string(),
    }
}

fn render_sequence(
    open: &str,
    close: &str,
    column: &str,
    elem: &CqlType,
    items: &[CellValue],
) -> Result<String> {
    let parts = items
        .iter()
        .map(|v| render_typed(column, elem, v, None))
        .collect::<Result<Vec<_>>>()?;
    Ok(wrap(open, close, parts))
}

fn wrap(open: &str, close: &str, parts: Vec<String>) -> String {
    if parts.is_empty() {
        format!("{open}{close}")
    } else {
        format!("{open} {} {close}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NativeColumnMetadata, map_column};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn col(name: &str, ty: &str) -> TableColumn {
        map_column(&NativeColumnMetadata::new(name, ty))
    }

    fn json_value(v: serde_json::Value) -> CellValue {
        v.into()
    }

    #[test]
    fn collections() {
        let list = render_literal(&col("l", "list<int>"), &json_value(json!([72, 75, 76])), None);
        assert_eq!(list.unwrap(), "[ 72, 75, 76 ]");

        let set = render_literal(&col("s", "set<int>"), &json_value(json!([1, 2])), None);
        assert_eq!(set.unwrap(), "{ 1, 2 }");

        let map = render_literal(
            &col("m", "map<varchar,int>"),
            &json_value(json!({"almaden": "10000"})),
            None,
        );
        assert_eq!(map.unwrap(), "{ 'almaden': 10000 }");

        let nested = render_literal(
            &col("n", "frozen<list<set<text>>>"),
            &json_value(json!([["a'b"]])),
            None,
        );
        assert_eq!(nested.unwrap(), "[ { 'a''b' } ]");

        let empty = render_literal(&col("l", "list<int>"), &json_value(json!([])), None);
        assert_eq!(empty.unwrap(), "[]");
    }

    #[test]
    fn tuples_must_match_arity() {
        let c = col("t", "tuple<int, text>");
        assert_eq!(
            render_literal(&c, &json_value(json!([1, "x"])), None).unwrap(),
            "( 1, 'x' )"
        );
        assert!(render_literal(&c, &json_value(json!([1])), None).is_err());
    }

    #[test]
    fn scalars() {
        assert_eq!(
            render_literal(&col("n", "text"), &"O'Brien".into(), None).unwrap(),
            "'O''Brien'"
        );
        assert_eq!(
            render_literal(&col("n", "bigint"), &CellValue::Int(42), None).unwrap(),
            "42"
        );
        assert_eq!(
            render_literal(&col("n", "boolean"), &CellValue::Bool(true), None).unwrap(),
            "true"
        );
        assert_eq!(
            render_literal(&col("n", "uuid"), &"9b2c3a52-1111-4c6e-9d5f-000000000000".into(), None)
                .unwrap(),
            "9b2c3a52-1111-4c6e-9d5f-000000000000"
        );
        assert_eq!(
            render_literal(&col("n", "int"), &CellValue::Null, None).unwrap(),
            "null"
        );
    }

    #[test]
    fn temporal_values() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            render_literal(&col("t", "timestamp"), &CellValue::Timestamp(ts), None).unwrap(),
            "'2020-01-02T03:04:05.000Z'"
        );
        assert_eq!(
            render_literal(&col("d", "date"), &"2020-01-02".into(), None).unwrap(),
            "'2020-01-02'"
        );
        assert_eq!(
            render_literal(&col("t", "time"), &"08:12:54.123".into(), None).unwrap(),
            "'08:12:54.123'"
        );
    }

    #[test]
    fn blobs() {
        let c = col("b", "blob");
        assert_eq!(
            render_literal(&c, &"0xcafe".into(), Some(Encoding::Hex)).unwrap(),
            "0xcafe"
        );
        assert_eq!(
            render_literal(&c, &"yv4=".into(), Some(Encoding::Base64)).unwrap(),
            "0xcafe"
        );
        assert_eq!(
            render_literal(&c, &"it's".into(), Some(Encoding::Utf8)).unwrap(),
            "textAsBlob('it''s')"
        );
        assert_eq!(
            render_literal(&c, &"abc".into(), Some(Encoding::Ascii)).unwrap(),
            "asciiAsBlob('abc')"
        );
        assert!(matches!(
            render_literal(&c, &"abc".into(), None),
            Err(Error::Build(_))
        ));
        assert!(matches!(
            render_literal(&c, &"0xcafz".into(), Some(Encoding::Hex)),
            Err(Error::Encoding { .. })
        ));
        assert_eq!(
            render_literal(&c, &"CAFE".into(), Some(Encoding::Hex)).unwrap(),
            "0xCAFE"
        );
        assert_eq!(
            render_literal(&c, &CellValue::Bytes(vec![1, 2]), None).unwrap(),
            "0x0102"
        );
    }

    #[test]
    fn user_defined_types() {
        let c = col("addr", "frozen<address>");
        assert_eq!(
            render_literal(&c, &json_value(json!({"street": "Main", "no": 5})), None).unwrap(),
            "{ no: 5, street: 'Main' }"
        );
    }
}
