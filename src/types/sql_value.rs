use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::{DbSqlError, Result};

/// Represents a SQL value in a driver-agnostic way.
/// Drivers are responsible for converting these to and from their native types.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "Bool",
            SqlValue::Int16(_) => "Int16",
            SqlValue::Int32(_) => "Int32",
            SqlValue::Int64(_) => "Int64",
            SqlValue::Float32(_) => "Float32",
            SqlValue::Float64(_) => "Float64",
            SqlValue::Text(_) => "Text",
            SqlValue::Bytes(_) => "Bytes",
            SqlValue::Uuid(_) => "Uuid",
            SqlValue::Timestamp(_) => "Timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i16> for SqlValue {
    fn from(value: i16) -> Self {
        SqlValue::Int16(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int64(value)
    }
}

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        SqlValue::Float32(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float64(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// Conversion from a cursor value into a Rust field or scalar type.
///
/// Integer targets accept narrower integer columns, and wider ones when the
/// value fits, so `COUNT(*)` can be read as `i32` or `i64` regardless of what
/// the database reports.
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: SqlValue) -> Result<Self>;
}

fn mismatch<T>(value: &SqlValue) -> DbSqlError {
    DbSqlError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        actual: value.kind(),
    }
}

macro_rules! impl_from_sql_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self> {
                    let converted = match &value {
                        SqlValue::Int16(v) => <$ty>::try_from(*v).ok(),
                        SqlValue::Int32(v) => <$ty>::try_from(*v).ok(),
                        SqlValue::Int64(v) => <$ty>::try_from(*v).ok(),
                        _ => None,
                    };
                    converted.ok_or_else(|| mismatch::<$ty>(&value))
                }
            }
        )*
    };
}

impl_from_sql_value_int!(i16, i32, i64);

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            other => Err(mismatch::<bool>(&other)),
        }
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float32(v) => Ok(v),
            other => Err(mismatch::<f32>(&other)),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float32(v) => Ok(f64::from(v)),
            SqlValue::Float64(v) => Ok(v),
            other => Err(mismatch::<f64>(&other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(v) => Ok(v),
            other => Err(mismatch::<String>(&other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bytes(v) => Ok(v),
            other => Err(mismatch::<Vec<u8>>(&other)),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Uuid(v) => Ok(v),
            other => Err(mismatch::<Uuid>(&other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Timestamp(v) => Ok(v),
            other => Err(mismatch::<NaiveDateTime>(&other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        Ok(value)
    }
}
