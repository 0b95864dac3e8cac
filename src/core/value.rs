//! Purpose: Typed scalar model for column values, block bounds and filter constants.
//! Exports: `Value`, `Datum`, `compare`.
//! Role: Borrowed `Value` views point into cursor buffers; `Datum` is the owned form.
//! Invariants: A `Value::Str` never outlives the buffer it borrows from.
//! Invariants: Cross-type comparison is numeric-only; strings never compare to numbers.
use std::cmp::Ordering;
use std::fmt;

use bstr::BStr;

use crate::core::format::ColumnType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    Float32(f32),
    Int32(i32),
    Str(&'a [u8]),
}

impl<'a> Value<'a> {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Float32(_) => ColumnType::Float32,
            Value::Int32(_) => ColumnType::Int32,
            Value::Str(_) => ColumnType::FixedString32,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Str(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn to_datum(&self) -> Datum {
        match *self {
            Value::Float32(v) => Datum::Float32(v),
            Value::Int32(v) => Datum::Int32(v),
            Value::Str(bytes) => Datum::Str(bytes.to_vec()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Str(_) => None,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float32(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Str(bytes) => write!(f, "{:?}", BStr::new(bytes)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Float32(f32),
    Int32(i32),
    Str(Vec<u8>),
}

impl Datum {
    pub fn as_value(&self) -> Value<'_> {
        match self {
            Datum::Float32(v) => Value::Float32(*v),
            Datum::Int32(v) => Value::Int32(*v),
            Datum::Str(bytes) => Value::Str(bytes),
        }
    }

    pub fn comparable_with(&self, column_type: ColumnType) -> bool {
        match self {
            Datum::Float32(_) | Datum::Int32(_) => column_type.is_numeric(),
            Datum::Str(_) => !column_type.is_numeric(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Float32(_) => "float",
            Datum::Int32(_) => "int",
            Datum::Str(_) => "string",
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_value().fmt(f)
    }
}

impl From<i32> for Datum {
    fn from(value: i32) -> Self {
        Datum::Int32(value)
    }
}

impl From<f32> for Datum {
    fn from(value: f32) -> Self {
        Datum::Float32(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Str(value.as_bytes().to_vec())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Str(value.into_bytes())
    }
}

impl From<&[u8]> for Datum {
    fn from(value: &[u8]) -> Self {
        Datum::Str(value.to_vec())
    }
}

/// Three-way comparison in the column's native ordering.
///
/// Integers compare exactly; any pairing involving a float compares as `f64`.
/// Strings compare byte-lexicographically over their stored length. Returns
/// `None` for string/number pairs and for NaN.
pub fn compare(left: Value<'_>, right: Value<'_>) -> Option<Ordering> {
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(&b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Str(_), _) | (_, Value::Str(_)) => None,
        (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}
