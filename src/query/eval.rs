use crate::document::{Document, Value};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, TypeSpec};

/// Evaluates a compiled filter against a document.
#[must_use]
pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        _ => {
            let root = DocRoot::Doc(doc);
            eval_leaf(&root, filter)
        }
    }
}

/// Evaluates a filter against an arbitrary value; used for `$elemMatch`
/// where the array element itself is the match target.
#[must_use]
pub fn eval_value(value: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_value(value, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_value(value, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_value(value, f)),
        Filter::Not(f) => !eval_value(value, f),
        _ => eval_leaf(&DocRoot::Value(value), filter),
    }
}

#[derive(Clone, Copy)]
enum DocRoot<'a> {
    Doc(&'a Document),
    Value(&'a Value),
}

impl<'a> DocRoot<'a> {
    fn lookup(&self, path: &str) -> Vec<&'a Value> {
        let mut out = Vec::new();
        match *self {
            DocRoot::Value(v) if path.is_empty() => out.push(v),
            DocRoot::Value(Value::Document(d)) | DocRoot::Doc(d) if !path.is_empty() => {
                let segs: Vec<&str> = path.split('.').collect();
                collect_in_doc(d, &segs, &mut out);
            }
            _ => {}
        }
        out
    }
}

fn collect_in_doc<'a>(doc: &'a Document, segs: &[&str], out: &mut Vec<&'a Value>) {
    if let Some((head, rest)) = segs.split_first()
        && let Some(v) = doc.get(head)
    {
        collect_in_value(v, rest, out);
    }
}

fn collect_in_value<'a>(cur: &'a Value, segs: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segs.split_first() else {
        out.push(cur);
        return;
    };
    match cur {
        Value::Document(d) => collect_in_doc(d, segs, out),
        Value::Array(items) => {
            if let Ok(idx) = head.parse::<usize>() {
                if let Some(v) = items.get(idx) {
                    collect_in_value(v, rest, out);
                }
                return;
            }
            for item in items {
                if let Value::Document(d) = item {
                    collect_in_doc(d, segs, out);
                }
            }
        }
        _ => {}
    }
}

/// Resolves a dotted path into every value it addresses, fanning out over arrays.
#[must_use]
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    DocRoot::Doc(doc).lookup(path)
}

fn eval_leaf(root: &DocRoot<'_>, filter: &Filter) -> bool {
    match filter {
        Filter::Cmp { path, op, value } => {
            let cands = root.lookup(path);
            match op {
                CmpOp::Eq => matches_eq(&cands, value),
                CmpOp::Gte | CmpOp::Lte if matches!(value, Value::Null) => matches_eq(&cands, value),
                _ => cands.iter().any(|c| cmp_candidate(c, *op, value)),
            }
        }
        Filter::In { path, values } => {
            let cands = root.lookup(path);
            values.iter().any(|v| matches_eq(&cands, v))
        }
        Filter::Exists { path, exists } => root.lookup(path).is_empty() != *exists,
        Filter::Size { path, size } => root
            .lookup(path)
            .iter()
            .any(|c| matches!(c, Value::Array(items) if items.len() == *size)),
        Filter::All { path, values } => {
            let cands = root.lookup(path);
            !values.is_empty() && values.iter().all(|v| matches_eq(&cands, v))
        }
        Filter::ElemMatch { path, filter } => root.lookup(path).iter().any(|c| match c {
            Value::Array(items) => items.iter().any(|item| eval_value(item, filter)),
            _ => false,
        }),
        Filter::Type { path, types } => root.lookup(path).iter().any(|c| {
            type_matches(c, types)
                || matches!(c, Value::Array(items) if items.iter().any(|i| type_matches(i, types)))
        }),
        #[cfg(feature = "regex")]
        Filter::Regex { path, regex } => root.lookup(path).iter().any(|c| match c {
            Value::String(s) => regex.is_match(s),
            Value::Array(items) => {
                items.iter().any(|i| matches!(i, Value::String(s) if regex.is_match(s)))
            }
            _ => false,
        }),
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_leaf(root, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_leaf(root, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_leaf(root, f)),
        Filter::Not(f) => !eval_leaf(root, f),
    }
}

fn matches_eq(cands: &[&Value], value: &Value) -> bool {
    if cands.is_empty() {
        return matches!(value, Value::Null);
    }
    cands.iter().any(|c| {
        values_equal(c, value)
            || matches!(c, Value::Array(items) if items.iter().any(|i| values_equal(i, value)))
    })
}

fn cmp_candidate(cand: &Value, op: CmpOp, value: &Value) -> bool {
    let check = |c: &Value| {
        if type_rank(c) != type_rank(value) {
            return false;
        }
        let ord = compare_values(c, value);
        match op {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Gte => ord != Ordering::Less,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Lte => ord != Ordering::Greater,
        }
    };
    check(cand) || matches!(cand, Value::Array(items) if items.iter().any(check))
}

fn type_matches(v: &Value, types: &[TypeSpec]) -> bool {
    types.iter().any(|t| match t {
        TypeSpec::Number => v.is_number(),
        TypeSpec::Code(code) => v.type_code() == *code,
    })
}

/// Comparison-aware equality: numbers compare by value across numeric types.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Canonical cross-type ordering rank.
#[must_use]
pub const fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 1,
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) => 2,
        Value::String(_) => 3,
        Value::Document(_) => 4,
        Value::Array(_) => 5,
        Value::Binary(_) => 6,
        Value::ObjectId(_) => 7,
        Value::Bool(_) => 8,
        Value::DateTime(_) => 9,
        Value::Timestamp(_) => 10,
        Value::Regex(_) => 11,
    }
}

/// Total order over values: first by type rank, then by value.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Document(x), Value::Document(y)) => compare_docs(x, y),
        (Value::Array(x), Value::Array(y)) => {
            for (i, j) in x.iter().zip(y.iter()) {
                let ord = compare_values(i, j);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Binary(x), Value::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then(x.subtype.cmp(&y.subtype))
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Value::ObjectId(x), Value::ObjectId(y)) => x.0.cmp(&y.0),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Regex(x), Value::Regex(y)) => {
            x.pattern.cmp(&y.pattern).then_with(|| x.options.cmp(&y.options))
        }
        _ if a.is_number() => compare_numbers(a, b),
        _ => Ordering::Equal,
    }
}

fn compare_docs(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => x.cmp(y),
        (Value::Int32(x), Value::Int64(y)) => i64::from(*x).cmp(y),
        (Value::Int64(x), Value::Int32(y)) => x.cmp(&i64::from(*y)),
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        _ => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Array;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    #[test]
    fn numbers_compare_across_types() {
        assert!(values_equal(&Value::Int32(1), &Value::Double(1.0)));
        assert!(values_equal(&Value::Int64(7), &Value::Int32(7)));
        assert_eq!(compare_values(&Value::Double(f64::NAN), &Value::Int32(-5)), Ordering::Less);
        assert!(values_equal(&Value::Double(f64::NAN), &Value::Double(f64::NAN)));
    }

    #[test]
    fn type_order_is_canonical() {
        assert_eq!(compare_values(&Value::Null, &Value::Int32(0)), Ordering::Less);
        assert_eq!(compare_values(&Value::Int32(100), &Value::from("a")), Ordering::Less);
        assert_eq!(compare_values(&Value::Bool(false), &Value::from("z")), Ordering::Greater);
    }

    #[test]
    fn lookup_fans_out_over_arrays() {
        let items: Array = vec![
            Value::Document(doc(&[("b", Value::Int32(1))])),
            Value::Document(doc(&[("b", Value::Int32(2))])),
            Value::Int32(3),
        ]
        .into();
        let d = doc(&[("a", Value::Array(items))]);
        assert_eq!(lookup(&d, "a.b").len(), 2);
        assert_eq!(lookup(&d, "a.2"), vec![&Value::Int32(3)]);
        assert!(lookup(&d, "a.c").is_empty());
    }

    #[test]
    fn eq_matches_array_elements_and_missing_null() {
        let d = doc(&[("tags", Value::Array(vec![Value::from("x"), Value::from("y")].into()))]);
        let f = Filter::Cmp { path: "tags".into(), op: CmpOp::Eq, value: "y".into() };
        assert!(eval_filter(&d, &f));
        let f = Filter::Cmp { path: "missing".into(), op: CmpOp::Eq, value: Value::Null };
        assert!(eval_filter(&d, &f));
    }

    #[test]
    fn range_ops_respect_type_brackets() {
        let d = doc(&[("a", Value::from("10"))]);
        let f = Filter::Cmp { path: "a".into(), op: CmpOp::Gt, value: Value::Int32(1) };
        assert!(!eval_filter(&d, &f));
        let d = doc(&[("a", Value::Int64(10))]);
        assert!(eval_filter(&d, &f));
    }
}
