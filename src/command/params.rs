//! Typed access to command document fields.

use crate::document::{Array, Document, Value};
use crate::errors::DbError;
use std::time::Duration;

/// A value type that can be read out of a command field.
pub trait Param<'a>: Sized {
    /// Type alias used in error messages.
    const ALIAS: &'static str;

    fn extract(value: &'a Value) -> Option<Self>;
}

impl<'a> Param<'a> for &'a str {
    const ALIAS: &'static str = "string";

    fn extract(value: &'a Value) -> Option<Self> {
        value.as_str()
    }
}

impl<'a> Param<'a> for bool {
    const ALIAS: &'static str = "bool";

    fn extract(value: &'a Value) -> Option<Self> {
        value.as_bool()
    }
}

impl<'a> Param<'a> for &'a Document {
    const ALIAS: &'static str = "object";

    fn extract(value: &'a Value) -> Option<Self> {
        value.as_document()
    }
}

impl<'a> Param<'a> for &'a Array {
    const ALIAS: &'static str = "array";

    fn extract(value: &'a Value) -> Option<Self> {
        value.as_array()
    }
}

fn wrong_type<'a, T: Param<'a>>(key: &str, value: &Value) -> DbError {
    DbError::bad_value(format!(
        "BSON field '{key}' is the wrong type '{}', expected type '{}'",
        value.type_alias(),
        T::ALIAS
    ))
}

/// # Errors
/// `BadValue` when the field is missing or has the wrong type.
pub fn get_required_param<'a, T: Param<'a>>(doc: &'a Document, key: &str) -> Result<T, DbError> {
    let value = doc
        .get(key)
        .ok_or_else(|| DbError::bad_value(format!("required parameter \"{key}\" is missing")))?;
    T::extract(value).ok_or_else(|| wrong_type::<T>(key, value))
}

/// `Ok(None)` when the field is absent.
///
/// # Errors
/// `BadValue` when the field is present with the wrong type.
pub fn get_optional_param<'a, T: Param<'a>>(doc: &'a Document, key: &str) -> Result<Option<T>, DbError> {
    match doc.get(key) {
        None => Ok(None),
        Some(value) => T::extract(value).map(Some).ok_or_else(|| wrong_type::<T>(key, value)),
    }
}

/// Fails on the first of `fields` present in `doc`.
///
/// # Errors
/// `Unimplemented` naming the field.
pub fn unimplemented(doc: &Document, fields: &[&str]) -> Result<(), DbError> {
    match fields.iter().find(|f| doc.has(f)) {
        Some(f) => Err(DbError::Unimplemented((*f).to_owned())),
        None => Ok(()),
    }
}

/// Logs, at debug level, each of `fields` present in `doc`.
pub fn ignored(doc: &Document, fields: &[&str]) {
    for f in fields.iter().filter(|f| doc.has(f)) {
        log::debug!("{}: ignoring field {f:?}", doc.command().unwrap_or_default());
    }
}

/// Reads `maxTimeMS`; zero means no limit.
///
/// # Errors
/// `BadValue` for negative, fractional or non-numeric values.
pub fn max_time(doc: &Document) -> Result<Option<Duration>, DbError> {
    let Some(value) = doc.get("maxTimeMS") else {
        return Ok(None);
    };
    let millis = match value {
        Value::Int32(n) => i64::from(*n),
        Value::Int64(n) => *n,
        #[allow(clippy::cast_possible_truncation)]
        Value::Double(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
        other => {
            return Err(DbError::bad_value(format!(
                "maxTimeMS must be a number, not {}",
                other.type_alias()
            )));
        }
    };
    let millis = u64::try_from(millis)
        .map_err(|_| DbError::bad_value(format!("{millis} value for maxTimeMS is out of range")))?;
    Ok((millis > 0).then(|| Duration::from_millis(millis)))
}
