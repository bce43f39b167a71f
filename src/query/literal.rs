//! SQL literal rendering for `EXECUTE ... USING` parameter lists.

use chrono::{NaiveDate, NaiveDateTime};

const TIMESTAMP_LITERAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const DATE_LITERAL_FORMAT: &str = "%Y-%m-%d";

/// A positional parameter bound to a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

macro_rules! impl_from_param {
    ($ty:ty => $variant:ident) => {
        impl From<$ty> for Param {
            fn from(value: $ty) -> Self {
                Param::$variant(value)
            }
        }
    };
}

impl_from_param!(i32 => Int32);
impl_from_param!(i64 => Int64);
impl_from_param!(f32 => Float32);
impl_from_param!(f64 => Float64);
impl_from_param!(bool => Bool);
impl_from_param!(String => Text);
impl_from_param!(NaiveDateTime => Timestamp);
impl_from_param!(NaiveDate => Date);

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_owned())
    }
}

impl From<i16> for Param {
    fn from(value: i16) -> Self {
        Param::Int32(value.into())
    }
}

impl Param {
    /// Renders the literal text this parameter occupies in an
    /// `EXECUTE ... USING` list.
    ///
    /// Strings are quoted with embedded quotes doubled — except that a string
    /// which parses as a number renders as a bare numeric literal. That
    /// default is lossy for callers whose string data merely looks numeric;
    /// passing `force_numeric_string = true` opts out and keeps every string
    /// quoted. Floats use their shortest round-trip form; temporal values
    /// render as typed literal expressions.
    pub fn to_literal(&self, force_numeric_string: bool) -> String {
        match self {
            Param::Null => "NULL".to_owned(),
            Param::Int32(v) => v.to_string(),
            Param::Int64(v) => v.to_string(),
            Param::Float32(v) => v.to_string(),
            Param::Float64(v) => v.to_string(),
            Param::Bool(v) => v.to_string(),
            Param::Text(v) => {
                if !force_numeric_string && v.parse::<f64>().is_ok() {
                    v.clone()
                } else {
                    format!("'{}'", v.replace('\'', "''"))
                }
            }
            Param::Timestamp(v) => {
                format!("TIMESTAMP '{}'", v.format(TIMESTAMP_LITERAL_FORMAT))
            }
            Param::Date(v) => format!("DATE '{}'", v.format(DATE_LITERAL_FORMAT)),
        }
    }
}

/// Builds the `EXECUTE` statement text for a prepared-statement run.
pub(crate) fn execute_query_text(
    prepare_key: &str,
    params: &[Param],
    force_numeric_string: bool,
) -> String {
    if params.is_empty() {
        return format!("EXECUTE {prepare_key}");
    }
    let rendered: Vec<String> = params
        .iter()
        .map(|param| param.to_literal(force_numeric_string))
        .collect();
    format!("EXECUTE {} USING {}", prepare_key, rendered.join(","))
}
