use crate::document::{Document, Value};
use crate::errors::{DbError, ErrorCode};

use super::types::{CmpOp, Filter, TypeSpec, UpdateOp, UpdateOperator, UpdateSpec};

/// Compiles a filter document into a [`Filter`] tree.
///
/// # Errors
/// Returns a `BadValue` error for unknown or malformed operators.
pub fn parse_filter(filter: &Document) -> Result<Filter, DbError> {
    let mut parts = Vec::with_capacity(filter.len());
    for (key, value) in filter.iter() {
        match key {
            "$and" | "$or" | "$nor" => {
                let subs = parse_filter_list(key, value)?;
                parts.push(match key {
                    "$and" => Filter::And(subs),
                    "$or" => Filter::Or(subs),
                    _ => Filter::Nor(subs),
                });
            }
            "$comment" => {}
            k if k.starts_with('$') => {
                return Err(DbError::bad_value(format!("unknown top level operator: {k}")));
            }
            path => parts.push(parse_field(path, value)?),
        }
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    })
}

fn parse_filter_list(op: &str, value: &Value) -> Result<Vec<Filter>, DbError> {
    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        _ => return Err(DbError::bad_value(format!("{op} must be a nonempty array"))),
    };
    items
        .iter()
        .map(|item| match item {
            Value::Document(d) => parse_filter(d),
            _ => Err(DbError::bad_value(format!("{op} argument's entries must be objects"))),
        })
        .collect()
}

fn is_operator_doc(value: &Value) -> Option<&Document> {
    match value {
        Value::Document(d) if d.command().is_some_and(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn parse_field(path: &str, value: &Value) -> Result<Filter, DbError> {
    if let Some(ops) = is_operator_doc(value) {
        return parse_operators(path, ops);
    }
    if let Value::Regex(r) = value {
        return regex_filter(path, &r.pattern, &r.options);
    }
    Ok(Filter::Cmp { path: path.to_owned(), op: CmpOp::Eq, value: value.clone() })
}

fn parse_operators(path: &str, ops: &Document) -> Result<Filter, DbError> {
    let mut parts = Vec::with_capacity(ops.len());
    for (op, arg) in ops.iter() {
        let path_s = path.to_owned();
        let f = match op {
            "$eq" => Filter::Cmp { path: path_s, op: CmpOp::Eq, value: arg.clone() },
            "$ne" => Filter::Not(Box::new(Filter::Cmp {
                path: path_s,
                op: CmpOp::Eq,
                value: arg.clone(),
            })),
            "$gt" => Filter::Cmp { path: path_s, op: CmpOp::Gt, value: arg.clone() },
            "$gte" => Filter::Cmp { path: path_s, op: CmpOp::Gte, value: arg.clone() },
            "$lt" => Filter::Cmp { path: path_s, op: CmpOp::Lt, value: arg.clone() },
            "$lte" => Filter::Cmp { path: path_s, op: CmpOp::Lte, value: arg.clone() },
            "$in" | "$nin" => {
                let Value::Array(items) = arg else {
                    return Err(DbError::bad_value(format!("{op} needs an array")));
                };
                let f = Filter::In { path: path_s, values: items.to_vec() };
                if op == "$in" { f } else { Filter::Not(Box::new(f)) }
            }
            "$exists" => Filter::Exists { path: path_s, exists: truthy(arg) },
            "$not" => match arg {
                Value::Document(d) if d.is_empty() => {
                    return Err(DbError::bad_value("$not cannot be empty"));
                }
                Value::Document(d) if is_operator_doc(arg).is_some() => {
                    Filter::Not(Box::new(parse_operators(path, d)?))
                }
                Value::Regex(r) => Filter::Not(Box::new(regex_filter(path, &r.pattern, &r.options)?)),
                _ => return Err(DbError::bad_value("$not needs a regex or a document")),
            },
            "$regex" => {
                let options = match ops.get("$options") {
                    Some(Value::String(s)) => s.clone(),
                    Some(_) => return Err(DbError::bad_value("$options has to be a string")),
                    None => String::new(),
                };
                match arg {
                    Value::String(p) => regex_filter(path, p, &options)?,
                    Value::Regex(r) if options.is_empty() => regex_filter(path, &r.pattern, &r.options)?,
                    Value::Regex(r) => regex_filter(path, &r.pattern, &options)?,
                    _ => return Err(DbError::bad_value("$regex has to be a string")),
                }
            }
            "$options" => {
                if !ops.has("$regex") {
                    return Err(DbError::bad_value("$options needs a $regex"));
                }
                continue;
            }
            "$size" => Filter::Size { path: path_s, size: parse_size(arg)? },
            "$all" => {
                let Value::Array(items) = arg else {
                    return Err(DbError::bad_value("$all needs an array"));
                };
                Filter::All { path: path_s, values: items.to_vec() }
            }
            "$elemMatch" => {
                let Value::Document(inner) = arg else {
                    return Err(DbError::bad_value("$elemMatch needs an Object"));
                };
                let inner_filter = match inner.command() {
                    Some(k) if k.starts_with('$') && !matches!(k, "$and" | "$or" | "$nor") => {
                        parse_operators("", inner)?
                    }
                    _ => parse_filter(inner)?,
                };
                Filter::ElemMatch { path: path_s, filter: Box::new(inner_filter) }
            }
            "$type" => Filter::Type { path: path_s, types: parse_types(arg)? },
            other => return Err(DbError::bad_value(format!("unknown operator: {other}"))),
        };
        parts.push(f);
    }
    Ok(match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    })
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Int32(i) => *i != 0,
        Value::Int64(i) => *i != 0,
        Value::Double(d) => *d != 0.0,
        _ => true,
    }
}

fn parse_size(arg: &Value) -> Result<usize, DbError> {
    let n = match arg {
        Value::Int32(i) => i64::from(*i),
        Value::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Value::Double(d) if d.fract() == 0.0 => *d as i64,
        Value::Double(_) => {
            return Err(DbError::bad_value(format!("$size must be a whole number: {arg}")));
        }
        _ => return Err(DbError::bad_value("$size needs a number")),
    };
    usize::try_from(n).map_err(|_| DbError::bad_value(format!("$size may not be negative: {n}")))
}

fn parse_types(arg: &Value) -> Result<Vec<TypeSpec>, DbError> {
    #[allow(clippy::cast_possible_truncation)]
    fn one(v: &Value) -> Result<TypeSpec, DbError> {
        Ok(match v {
            Value::String(alias) => match alias.as_str() {
                "number" => TypeSpec::Number,
                "double" => TypeSpec::Code(1),
                "string" => TypeSpec::Code(2),
                "object" => TypeSpec::Code(3),
                "array" => TypeSpec::Code(4),
                "binData" => TypeSpec::Code(5),
                "objectId" => TypeSpec::Code(7),
                "bool" => TypeSpec::Code(8),
                "date" => TypeSpec::Code(9),
                "null" => TypeSpec::Code(10),
                "regex" => TypeSpec::Code(11),
                "int" => TypeSpec::Code(16),
                "timestamp" => TypeSpec::Code(17),
                "long" => TypeSpec::Code(18),
                other => {
                    return Err(DbError::bad_value(format!("Unknown type name alias: {other}")));
                }
            },
            n if n.is_number() => {
                let code = n.as_f64().unwrap_or(f64::NAN);
                let known = [1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 8.0, 9.0, 10.0, 11.0, 16.0, 17.0, 18.0];
                if !known.contains(&code) {
                    return Err(DbError::bad_value(format!("Invalid numerical type code: {n}")));
                }
                TypeSpec::Code(code as i32)
            }
            _ => return Err(DbError::bad_value("type must be represented as a number or a string")),
        })
    }
    match arg {
        Value::Array(items) => items.iter().map(one).collect(),
        v => Ok(vec![one(v)?]),
    }
}

#[cfg(feature = "regex")]
fn regex_filter(path: &str, pattern: &str, options: &str) -> Result<Filter, DbError> {
    let mut builder = regex::RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(DbError::bad_value(format!("invalid flag in regex options: {other}")));
            }
        };
    }
    let regex = builder
        .build()
        .map_err(|e| DbError::bad_value(format!("Regular expression is invalid: {e}")))?;
    Ok(Filter::Regex { path: path.to_owned(), regex })
}

#[cfg(not(feature = "regex"))]
fn regex_filter(_path: &str, _pattern: &str, _options: &str) -> Result<Filter, DbError> {
    Err(DbError::Unimplemented("$regex".into()))
}

fn failed_to_parse(message: impl Into<String>) -> DbError {
    DbError::command(ErrorCode::FailedToParse, message)
}

/// Validates an update document and returns its parsed form.
///
/// The first key decides the form: `$`-prefixed means operator form, anything
/// else means replacement form. Mixing both is rejected either way.
///
/// # Errors
/// Returns a validation error describing the first problem found.
pub fn parse_update(update: &Document) -> Result<UpdateSpec, DbError> {
    let Some(first) = update.command() else {
        return Err(failed_to_parse("update document must not be empty"));
    };
    if first.starts_with('$') {
        parse_operator_update(update).map(UpdateSpec::Operators)
    } else {
        validate_replacement(update)?;
        Ok(UpdateSpec::Replacement(update.clone()))
    }
}

/// # Errors
/// See [`parse_update`].
pub fn validate_update(update: &Document) -> Result<(), DbError> {
    parse_update(update).map(|_| ())
}

fn validate_replacement(update: &Document) -> Result<(), DbError> {
    fn check_nested(doc: &Document) -> Result<(), DbError> {
        for (k, v) in doc.iter() {
            if k.starts_with('$') {
                return Err(DbError::command(
                    ErrorCode::DollarPrefixedFieldName,
                    format!("The dollar ($) prefixed field '{k}' in '{k}' is not valid for storage."),
                ));
            }
            if let Value::Document(d) = v {
                check_nested(d)?;
            }
        }
        Ok(())
    }
    for (k, _) in update.iter() {
        if k.contains('.') {
            return Err(DbError::command(
                ErrorCode::DottedFieldName,
                format!("The dotted field '{k}' in '{k}' is not valid for storage."),
            ));
        }
    }
    check_nested(update)
}

fn parse_operator_update(update: &Document) -> Result<Vec<UpdateOp>, DbError> {
    let mut ops = Vec::new();
    let mut touched: Vec<String> = Vec::new();
    for (name, arg) in update.iter() {
        let Some(op) = UpdateOperator::from_name(name) else {
            return Err(failed_to_parse(format!(
                "Unknown modifier: {name}. Expected a valid update modifier or pipeline-style update specified as an array"
            )));
        };
        let Value::Document(fields) = arg else {
            return Err(failed_to_parse(format!(
                "Modifiers operate on fields but we found type {} instead. For example: {{$mod: {{<field>: ...}}}} not {{{name}: {arg}}}",
                arg.type_alias()
            )));
        };
        if fields.is_empty() {
            return Err(failed_to_parse(format!(
                "'{name}' is empty. You must specify a field like so: {{{name}: {{<field>: ...}}}}"
            )));
        }
        for (path, value) in fields.iter() {
            validate_path(path)?;
            validate_arg(op, path, value)?;
            claim_path(&mut touched, path)?;
            if op == UpdateOperator::Rename
                && let Value::String(to) = value
            {
                validate_path(to)?;
                claim_path(&mut touched, to)?;
            }
            ops.push(UpdateOp { op, path: path.to_owned(), arg: value.clone() });
        }
    }
    Ok(ops)
}

fn validate_path(path: &str) -> Result<(), DbError> {
    if path.is_empty() {
        return Err(DbError::command(ErrorCode::EmptyFieldName, "An empty update path is not valid."));
    }
    for seg in path.split('.') {
        if seg.is_empty() {
            return Err(DbError::command(
                ErrorCode::EmptyFieldName,
                format!("The update path '{path}' contains an empty field name, which is not allowed."),
            ));
        }
        if seg.starts_with('$') {
            return Err(DbError::command(
                ErrorCode::DollarPrefixedFieldName,
                format!("The dollar ($) prefixed field '{seg}' in '{path}' is not valid for storage."),
            ));
        }
    }
    Ok(())
}

fn claim_path(touched: &mut Vec<String>, path: &str) -> Result<(), DbError> {
    let overlaps = |a: &str, b: &str| {
        a == b
            || (a.len() > b.len() && a.starts_with(b) && a.as_bytes()[b.len()] == b'.')
            || (b.len() > a.len() && b.starts_with(a) && b.as_bytes()[a.len()] == b'.')
    };
    if let Some(prev) = touched.iter().find(|p| overlaps(p.as_str(), path)) {
        let at = if prev.len() <= path.len() { prev.as_str() } else { path };
        return Err(DbError::command(
            ErrorCode::ConflictingUpdateOperators,
            format!("Updating the path '{path}' would create a conflict at '{at}'"),
        ));
    }
    touched.push(path.to_owned());
    Ok(())
}

fn validate_arg(op: UpdateOperator, path: &str, arg: &Value) -> Result<(), DbError> {
    match op {
        UpdateOperator::Inc | UpdateOperator::Mul if !arg.is_number() => {
            let verb = if op == UpdateOperator::Inc { "increment" } else { "multiply" };
            Err(DbError::command(
                ErrorCode::TypeMismatch,
                format!("Cannot {verb} with non-numeric argument: {{{path}: {arg}}}"),
            ))
        }
        UpdateOperator::Rename => match arg {
            Value::String(to) if to == path => Err(DbError::bad_value(format!(
                "The source and target field for $rename must differ: {path}: {arg}"
            ))),
            Value::String(_) => Ok(()),
            _ => Err(DbError::bad_value(format!(
                "The 'to' field for $rename must be a string: {path}: {arg}"
            ))),
        },
        UpdateOperator::CurrentDate => {
            let ok = match arg {
                Value::Bool(_) => true,
                Value::Document(d) => {
                    d.len() == 1
                        && matches!(d.get("$type").and_then(Value::as_str), Some("date" | "timestamp"))
                }
                _ => false,
            };
            if ok {
                Ok(())
            } else {
                Err(DbError::bad_value(format!(
                    "{arg} is not valid type for $currentDate. Please use a boolean ('true') or a $type expression ({{$type: 'timestamp/date'}})."
                )))
            }
        }
        UpdateOperator::Pop => match arg.as_f64() {
            Some(n) if n == 1.0 || n == -1.0 => Ok(()),
            Some(_) => Err(failed_to_parse(format!("$pop expects 1 or -1, found: {arg}"))),
            None => Err(failed_to_parse(format!("Expected a number in: {path}: {arg}"))),
        },
        UpdateOperator::Push | UpdateOperator::AddToSet => validate_each(op, arg),
        _ => Ok(()),
    }
}

fn validate_each(op: UpdateOperator, arg: &Value) -> Result<(), DbError> {
    let Some(d) = is_operator_doc(arg) else {
        return Ok(());
    };
    for (k, v) in d.iter() {
        match k {
            "$each" if !matches!(v, Value::Array(_)) => {
                return Err(DbError::bad_value(format!(
                    "The argument to $each in {} must be an array but it was of type: {}",
                    op.name(),
                    v.type_alias()
                )));
            }
            "$each" => {}
            "$slice" | "$sort" | "$position" if op == UpdateOperator::Push => {
                return Err(DbError::Unimplemented(k.to_owned()));
            }
            other => {
                return Err(DbError::bad_value(format!(
                    "Unrecognized clause in {}: {other}",
                    op.name()
                )));
            }
        }
    }
    if !d.has("$each") {
        return Err(DbError::bad_value(format!("{} modifiers require $each", op.name())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(pairs: Vec<(&str, Value)>) -> Document {
        pairs.into_iter().collect()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches!(parse_filter(&Document::new()).unwrap(), Filter::True));
    }

    #[test]
    fn unknown_operators_are_rejected() {
        let f = d(vec![("a", Value::Document(d(vec![("$foo", Value::Int32(1))])))]);
        let err = parse_filter(&f).unwrap_err();
        assert_eq!(err.to_string(), "unknown operator: $foo");
        let f = d(vec![("$where", Value::from("x"))]);
        assert_eq!(parse_filter(&f).unwrap_err().to_string(), "unknown top level operator: $where");
    }

    #[test]
    fn in_requires_array() {
        let f = d(vec![("a", Value::Document(d(vec![("$in", Value::Int32(1))])))]);
        assert_eq!(parse_filter(&f).unwrap_err().to_string(), "$in needs an array");
    }

    #[test]
    fn update_form_is_detected() {
        let u = d(vec![("$set", Value::Document(d(vec![("a", Value::Int32(1))])))]);
        assert!(matches!(parse_update(&u).unwrap(), UpdateSpec::Operators(ops) if ops.len() == 1));
        let u = d(vec![("a", Value::Int32(1))]);
        assert!(matches!(parse_update(&u).unwrap(), UpdateSpec::Replacement(_)));
    }

    #[test]
    fn mixed_forms_are_rejected() {
        let u = d(vec![
            ("$set", Value::Document(d(vec![("a", Value::Int32(1))]))),
            ("b", Value::Int32(2)),
        ]);
        let err = parse_update(&u).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedToParse);
        assert!(err.to_string().starts_with("Unknown modifier: b."));

        let u = d(vec![
            ("b", Value::Int32(2)),
            ("$set", Value::Document(d(vec![("a", Value::Int32(1))]))),
        ]);
        assert_eq!(parse_update(&u).unwrap_err().code(), ErrorCode::DollarPrefixedFieldName);
    }

    #[test]
    fn conflicting_paths_are_rejected() {
        let u = d(vec![
            ("$set", Value::Document(d(vec![("a.b", Value::Int32(1))]))),
            ("$unset", Value::Document(d(vec![("a", Value::from(""))]))),
        ]);
        let err = parse_update(&u).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConflictingUpdateOperators);
        assert_eq!(err.to_string(), "Updating the path 'a' would create a conflict at 'a'");
    }

    #[test]
    fn sibling_paths_do_not_conflict() {
        let u = d(vec![
            ("$set", Value::Document(d(vec![("ab", Value::Int32(1))]))),
            ("$inc", Value::Document(d(vec![("a", Value::Int32(1))]))),
        ]);
        assert!(parse_update(&u).is_ok());
    }

    #[test]
    fn empty_update_is_rejected() {
        assert_eq!(parse_update(&Document::new()).unwrap_err().code(), ErrorCode::FailedToParse);
    }
}
