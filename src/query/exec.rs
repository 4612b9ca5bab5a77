use crate::document::{Array, DateTime, Document, Timestamp, Value};
use crate::errors::{DbError, ErrorCode};
use std::cmp::Ordering;

use super::eval::{compare_values, values_equal};
use super::types::{UpdateOp, UpdateOperator, UpdateSpec};

/// Applies a parsed update to `doc` in place and reports whether it changed.
///
/// On error `doc` is left untouched. `$setOnInsert` entries are skipped.
///
/// # Errors
/// Returns a validation error when an operator cannot be applied to the
/// current field value, or when the update would alter `_id`.
pub fn apply_update(doc: &mut Document, update: &UpdateSpec) -> Result<bool, DbError> {
    apply_with(doc, update, false)
}

/// Like [`apply_update`], for a document that is about to be inserted by an
/// upsert: `$setOnInsert` entries are applied too.
///
/// # Errors
/// See [`apply_update`].
pub fn apply_upsert(doc: &mut Document, update: &UpdateSpec) -> Result<bool, DbError> {
    apply_with(doc, update, true)
}

fn apply_with(doc: &mut Document, update: &UpdateSpec, inserting: bool) -> Result<bool, DbError> {
    let work = match update {
        UpdateSpec::Replacement(replacement) => replace(doc, replacement)?,
        UpdateSpec::Operators(ops) => {
            let mut work = doc.clone();
            for op in ops {
                apply_op(&mut work, op, inserting)?;
            }
            if let Some(old_id) = doc.get("_id")
                && work.get("_id") != Some(old_id)
            {
                return Err(DbError::command(
                    ErrorCode::ImmutableField,
                    "Performing an update on the path '_id' would modify the immutable field '_id'",
                ));
            }
            work
        }
    };
    let changed = work != *doc;
    *doc = work;
    Ok(changed)
}

fn replace(doc: &Document, replacement: &Document) -> Result<Document, DbError> {
    let mut out = Document::new();
    let old_id = doc.get("_id");
    if let Some(id) = old_id {
        out.set("_id", id.clone());
    }
    for (k, v) in replacement.iter() {
        if k == "_id"
            && let Some(id) = old_id
        {
            if id != v {
                return Err(DbError::command(
                    ErrorCode::ImmutableField,
                    format!(
                        "After applying the update, the (immutable) field '_id' was found to have been altered to _id: {v}"
                    ),
                ));
            }
            continue;
        }
        out.set(k, v.clone());
    }
    Ok(out)
}

fn apply_op(doc: &mut Document, op: &UpdateOp, inserting: bool) -> Result<(), DbError> {
    let path = op.path.as_str();
    match op.op {
        UpdateOperator::Set => set_path(doc, path, op.arg.clone()),
        UpdateOperator::SetOnInsert if inserting => set_path(doc, path, op.arg.clone()),
        UpdateOperator::SetOnInsert => Ok(()),
        UpdateOperator::Unset => {
            unset_path(doc, path);
            Ok(())
        }
        UpdateOperator::Inc | UpdateOperator::Mul => {
            let inc = op.op == UpdateOperator::Inc;
            let newv = match get_path(doc, path) {
                None if inc => op.arg.clone(),
                None => zero_like(&op.arg),
                Some(cur) if cur.is_number() => {
                    let res = if inc { add_numbers(cur, &op.arg) } else { mul_numbers(cur, &op.arg) };
                    res.ok_or_else(|| {
                        DbError::bad_value(format!(
                            "Failed to apply {} operations to current value ({cur}) for document {{_id: {}}}",
                            op.op.name(),
                            id_of(doc)
                        ))
                    })?
                }
                Some(cur) => {
                    return Err(DbError::command(
                        ErrorCode::TypeMismatch,
                        format!(
                            "Cannot apply {} to a value of non-numeric type. {{_id: {}}} has the field '{}' of non-numeric type {}",
                            op.op.name(),
                            id_of(doc),
                            last_segment(path),
                            cur.type_alias()
                        ),
                    ));
                }
            };
            set_path(doc, path, newv)
        }
        UpdateOperator::Min | UpdateOperator::Max => {
            let want = if op.op == UpdateOperator::Min { Ordering::Less } else { Ordering::Greater };
            let replace = get_path(doc, path).is_none_or(|cur| compare_values(&op.arg, cur) == want);
            if replace { set_path(doc, path, op.arg.clone()) } else { Ok(()) }
        }
        UpdateOperator::Rename => {
            let Value::String(to) = &op.arg else {
                return Err(DbError::bad_value("$rename target must be a string"));
            };
            match get_path(doc, path).cloned() {
                Some(v) => {
                    unset_path(doc, path);
                    set_path(doc, to, v)
                }
                None => Ok(()),
            }
        }
        UpdateOperator::CurrentDate => {
            let as_timestamp = matches!(
                &op.arg,
                Value::Document(d) if d.get("$type").and_then(Value::as_str) == Some("timestamp")
            );
            let now =
                if as_timestamp { Value::Timestamp(Timestamp::now()) } else { Value::DateTime(DateTime::now()) };
            set_path(doc, path, now)
        }
        UpdateOperator::Push | UpdateOperator::AddToSet => {
            let unique = op.op == UpdateOperator::AddToSet;
            let mut items = match get_path(doc, path) {
                None => Array::new(),
                Some(Value::Array(a)) => a.clone(),
                Some(other) => {
                    return Err(DbError::bad_value(format!(
                        "The field '{path}' must be an array but is of type {} in document {{_id: {}}}",
                        other.type_alias(),
                        id_of(doc)
                    )));
                }
            };
            for v in each_values(&op.arg) {
                if unique && items.iter().any(|existing| values_equal(existing, &v)) {
                    continue;
                }
                items.append(v);
            }
            set_path(doc, path, Value::Array(items))
        }
        UpdateOperator::Pop => {
            let mut items = match get_path(doc, path) {
                None => return Ok(()),
                Some(Value::Array(a)) => a.clone(),
                Some(other) => {
                    return Err(DbError::bad_value(format!(
                        "Path '{path}' contains an element of non-array type '{}'",
                        other.type_alias()
                    )));
                }
            };
            if op.arg.as_f64().is_some_and(|n| n < 0.0) {
                items.pop_front();
            } else {
                items.pop_back();
            }
            set_path(doc, path, Value::Array(items))
        }
    }
}

fn each_values(arg: &Value) -> Vec<Value> {
    match arg {
        Value::Document(d) if d.command() == Some("$each") => match d.get("$each") {
            Some(Value::Array(items)) => items.to_vec(),
            _ => Vec::new(),
        },
        v => vec![v.clone()],
    }
}

fn id_of(doc: &Document) -> String {
    doc.get("_id").map_or_else(|| "null".to_owned(), ToString::to_string)
}

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

fn zero_like(v: &Value) -> Value {
    match v {
        Value::Int32(_) => Value::Int32(0),
        Value::Int64(_) => Value::Int64(0),
        _ => Value::Double(0.0),
    }
}

/// Adds two numeric values, widening Int32 to Int64 on overflow.
/// Returns `None` on Int64 overflow.
#[must_use]
pub fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => {
            Some(x.checked_add(*y).map_or_else(|| Value::Int64(i64::from(*x) + i64::from(*y)), Value::Int32))
        }
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            as_i64(a)?.checked_add(as_i64(b)?).map(Value::Int64)
        }
        _ => Some(Value::Double(a.as_f64()? + b.as_f64()?)),
    }
}

/// Multiplies two numeric values with the same widening rules as [`add_numbers`].
#[must_use]
pub fn mul_numbers(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => {
            Some(x.checked_mul(*y).map_or_else(|| Value::Int64(i64::from(*x) * i64::from(*y)), Value::Int32))
        }
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            as_i64(a)?.checked_mul(as_i64(b)?).map(Value::Int64)
        }
        _ => Some(Value::Double(a.as_f64()? * b.as_f64()?)),
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int32(i) => Some(i64::from(*i)),
        Value::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Reads the single value at a dotted path; numeric segments index arrays.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segs = path.split('.');
    let mut cur = doc.get(segs.next()?)?;
    for seg in segs {
        cur = match cur {
            Value::Document(d) => d.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Largest number of null elements a single write may append to an array.
const MAX_ARRAY_BACKFILL: usize = 1_500_000;

fn path_not_viable(field: &str, key: &str, at: &Value) -> DbError {
    DbError::command(
        ErrorCode::PathNotViable,
        format!("Cannot create field '{field}' in element {{{key}: {at}}}"),
    )
}

/// Sets the value at a dotted path, creating intermediate documents as needed.
/// Existing fields keep their position; new fields are appended.
///
/// # Errors
/// Returns `PathNotViable` when the path runs through a scalar.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<(), DbError> {
    let segs: Vec<&str> = path.split('.').collect();
    set_in_doc(doc, &segs, value)
}

fn set_in_doc(doc: &mut Document, segs: &[&str], value: Value) -> Result<(), DbError> {
    let Some((head, rest)) = segs.split_first() else {
        return Ok(());
    };
    if rest.is_empty() {
        doc.set(*head, value);
        return Ok(());
    }
    match doc.get_mut(head) {
        Some(child) => set_in_value(child, head, rest, value),
        None => {
            let mut child = Document::new();
            set_in_doc(&mut child, rest, value)?;
            doc.set(*head, child);
            Ok(())
        }
    }
}

fn set_in_value(cur: &mut Value, key: &str, segs: &[&str], value: Value) -> Result<(), DbError> {
    match cur {
        Value::Document(d) => set_in_doc(d, segs, value),
        Value::Array(items) => {
            let Some((head, rest)) = segs.split_first() else {
                return Ok(());
            };
            let Ok(idx) = head.parse::<usize>() else {
                return Err(path_not_viable(head, key, &Value::Array(items.clone())));
            };
            if idx.saturating_sub(items.len()) > MAX_ARRAY_BACKFILL {
                return Err(DbError::bad_value(format!(
                    "can't backfill more than {MAX_ARRAY_BACKFILL} elements: {key}.{head}"
                )));
            }
            if rest.is_empty() {
                let len = idx
                    .checked_add(1)
                    .ok_or_else(|| DbError::bad_value(format!("array index out of range: {key}.{head}")))?;
                items.pad_to(len);
                if !items.set(idx, value) {
                    return Err(DbError::command(
                        ErrorCode::InternalError,
                        format!("failed to write array element {key}.{head}"),
                    ));
                }
                return Ok(());
            }
            if idx >= items.len() {
                items.pad_to(idx);
                let mut child = Document::new();
                set_in_doc(&mut child, rest, value)?;
                items.append(child);
                return Ok(());
            }
            match items.get_mut(idx) {
                Some(child) => set_in_value(child, head, rest, value),
                None => Ok(()),
            }
        }
        other => Err(path_not_viable(segs.first().copied().unwrap_or_default(), key, other)),
    }
}

/// Removes the value at a dotted path. Array elements are nulled rather than
/// removed so positions of the remaining elements are kept.
pub fn unset_path(doc: &mut Document, path: &str) {
    let segs: Vec<&str> = path.split('.').collect();
    unset_in_doc(doc, &segs);
}

fn unset_in_doc(doc: &mut Document, segs: &[&str]) {
    match segs {
        [] => {}
        [last] => {
            doc.remove(last);
        }
        [head, rest @ ..] => {
            if let Some(child) = doc.get_mut(head) {
                unset_in_value(child, rest);
            }
        }
    }
}

fn unset_in_value(cur: &mut Value, segs: &[&str]) {
    match cur {
        Value::Document(d) => unset_in_doc(d, segs),
        Value::Array(items) => {
            let Some((head, rest)) = segs.split_first() else {
                return;
            };
            let Ok(idx) = head.parse::<usize>() else {
                return;
            };
            if rest.is_empty() {
                items.set(idx, Value::Null);
            } else if let Some(child) = items.get_mut(idx) {
                unset_in_value(child, rest);
            }
        }
        _ => {}
    }
}
