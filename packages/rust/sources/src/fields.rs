//! Field extraction and coercion for raw source records.

use pokedex_shared::{PokedexError, RawRecord, RecordId, Result};
use serde_json::Value;

/// Coerce a JSON scalar to an integer.
///
/// Accepts integers, integral floats (`12.0`) and numeric strings (`"12"`).
pub(crate) fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// A required integer field; missing or non-numeric is a malformed record.
pub(crate) fn require_int(raw: &RawRecord, key: &str, id: Option<RecordId>) -> Result<i64> {
    let value = raw
        .get(key)
        .ok_or_else(|| PokedexError::malformed(id, format!("missing required field '{key}'")))?;
    coerce_int(value)
        .ok_or_else(|| PokedexError::malformed(id, format!("field '{key}' is not an integer: {value}")))
}

/// An optional integer field; absent or null reads as `None`.
pub(crate) fn optional_int(raw: &RawRecord, key: &str, id: RecordId) -> Result<Option<i64>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_int(value).map(Some).ok_or_else(|| {
            PokedexError::malformed(Some(id), format!("field '{key}' is not an integer: {value}"))
        }),
    }
}

/// A required non-empty text field.
pub(crate) fn require_text(raw: &RawRecord, key: &str, id: RecordId) -> Result<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| PokedexError::malformed(Some(id), format!("missing required field '{key}'")))
}
