//! Row reader adapter
//!
//! Typed, null-aware accessors over a single [`Row`], addressed by column
//! name. Conversion failures are the only errors raised here.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::{Row, Value};

/// Conversion from a non-null column value
pub trait FromValue: Sized {
    /// Target type name used in conversion errors
    const TYPE_NAME: &'static str;

    /// Convert, returning `None` when the value has an incompatible type
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromValue for Decimal {
    const TYPE_NAME: &'static str = "Decimal";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_decimal()
    }
}

impl FromValue for i16 {
    const TYPE_NAME: &'static str = "i16";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|n| i16::try_from(n).ok())
    }
}

impl FromValue for i32 {
    const TYPE_NAME: &'static str = "i32";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|n| i32::try_from(n).ok())
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for NaiveDate {
    const TYPE_NAME: &'static str = "NaiveDate";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "NaiveDateTime";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// Read-only view over one result row.
///
/// ```rust,ignore
/// let reader = RowReader::new(&row);
/// let id = reader.get_i32("CUSNUM")?;
/// let street = reader.get_string_or("STREET", None)?;
/// let credit = reader.get_decimal_or("CDTLMT", Some(Decimal::ZERO))?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RowReader<'a> {
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    /// Wrap a row
    pub fn new(row: &'a Row) -> Self {
        Self { row }
    }

    /// The underlying row
    pub fn row(&self) -> &'a Row {
        self.row
    }

    fn value(&self, column: &str) -> Result<&'a Value> {
        self.row
            .get_by_name(column)
            .ok_or_else(|| Error::ColumnNotFound {
                column: column.to_string(),
            })
    }

    /// Whether the column holds SQL NULL
    pub fn is_null(&self, column: &str) -> Result<bool> {
        Ok(self.value(column)?.is_null())
    }

    /// Non-null typed read; NULL or an incompatible value is a conversion error
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self.value(column)?;
        T::from_value(value).ok_or_else(|| {
            Error::type_conversion(format!(
                "column {column}: cannot convert {} to {}",
                value.sql_type(),
                T::TYPE_NAME
            ))
        })
    }

    /// Nullable typed read; returns `default` exactly when the column is NULL
    pub fn get_or<T: FromValue>(&self, column: &str, default: T) -> Result<T> {
        if self.is_null(column)? {
            Ok(default)
        } else {
            self.get(column)
        }
    }

    /// Nullable typed read with an optional default
    pub fn get_opt<T: FromValue>(&self, column: &str, default: Option<T>) -> Result<Option<T>> {
        if self.is_null(column)? {
            Ok(default)
        } else {
            self.get(column).map(Some)
        }
    }

    /// Non-null string
    pub fn get_string(&self, column: &str) -> Result<String> {
        self.get(column)
    }

    /// Nullable string
    pub fn get_string_or(&self, column: &str, default: Option<String>) -> Result<Option<String>> {
        self.get_opt(column, default)
    }

    /// Non-null decimal
    pub fn get_decimal(&self, column: &str) -> Result<Decimal> {
        self.get(column)
    }

    /// Nullable decimal
    pub fn get_decimal_or(
        &self,
        column: &str,
        default: Option<Decimal>,
    ) -> Result<Option<Decimal>> {
        self.get_opt(column, default)
    }

    /// Non-null 32-bit integer
    pub fn get_i32(&self, column: &str) -> Result<i32> {
        self.get(column)
    }

    /// Nullable 32-bit integer
    pub fn get_i32_or(&self, column: &str, default: Option<i32>) -> Result<Option<i32>> {
        self.get_opt(column, default)
    }

    /// Non-null 64-bit integer
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get(column)
    }

    /// Nullable 64-bit integer
    pub fn get_i64_or(&self, column: &str, default: Option<i64>) -> Result<Option<i64>> {
        self.get_opt(column, default)
    }
}
