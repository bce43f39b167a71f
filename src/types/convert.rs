//! Coercion of textual cell values into typed [`Value`]s.
//!
//! The function returns `Result<Value, String>` so callers can wrap failures
//! into their specific error types with row context attached.

use chrono::{NaiveDate, NaiveDateTime};

use crate::types::Value;

/// Layout of a `timestamp` cell, with an optional fraction of up to
/// millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Layout of a `date` cell.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Maps one raw cell to a typed value based on the declared column type.
///
/// The match is case-sensitive on the type keyword; unrecognized types pass
/// through as [`Value::Text`]. A type that declares a numeric or temporal
/// shape fails loudly on unparseable text rather than degrading to a string.
pub fn coerce(raw: &str, column_type: &str) -> Result<Value, String> {
    match column_type {
        "tinyint" | "smallint" | "integer" | "int" => raw
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|e| format!("invalid integer value {raw:?}: {e}")),
        "bigint" => raw
            .parse::<i64>()
            .map(Value::BigInt)
            .map_err(|e| format!("invalid bigint value {raw:?}: {e}")),
        "double" | "float" => raw
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|e| format!("invalid float value {raw:?}: {e}")),
        "boolean" => raw
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| format!("invalid boolean value {raw:?}: {e}")),
        "timestamp" => parse_timestamp(raw).map(Value::Timestamp),
        "timestamp with time zone" => parse_timestamp_with_zone(raw).map(Value::Timestamp),
        "date" => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|e| format!("invalid date value {raw:?}: {e}")),
        _ => Ok(Value::Text(raw.to_owned())),
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| format!("invalid timestamp value {raw:?}: {e}"))
}

/// The zone suffix is a named abbreviation (`... UTC`). The abbreviation is
/// accepted but not mapped to an offset; the datetime part is taken as-is.
fn parse_timestamp_with_zone(raw: &str) -> Result<NaiveDateTime, String> {
    let (datetime, zone) = raw
        .rsplit_once(' ')
        .ok_or_else(|| format!("invalid timestamp with time zone value {raw:?}"))?;
    if zone.is_empty() {
        return Err(format!("invalid time zone in value {raw:?}"));
    }
    parse_timestamp(datetime)
}
