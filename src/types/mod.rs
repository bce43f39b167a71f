//! Row values and textual type coercion.

mod convert;

pub use convert::{coerce, DATE_FORMAT, TIMESTAMP_FORMAT};

use chrono::{NaiveDate, NaiveDateTime};

/// One decoded cell value.
///
/// The service transmits every cell as text; [`coerce`] maps that text into a
/// `Value` using the column's declared type name. Decimals and character
/// types stay textual — parsing a decimal into a binary float would lose
/// precision, so that choice is left to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// tinyint / smallint / integer / int.
    Int(i32),
    /// bigint.
    BigInt(i64),
    /// float / double.
    Double(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    /// decimal, char, varchar, string, and any unrecognized type.
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some((*v).into()),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            _ => None,
        }
    }
}
