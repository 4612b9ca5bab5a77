mod common;

use bson::{Bson, doc};
use common::to_doc;
use nexuswire::errors::ErrorCode;
use nexuswire::query::filter_document;

fn matches(d: bson::Document, f: bson::Document) -> bool {
    filter_document(&to_doc(d), &to_doc(f)).unwrap()
}

#[test]
fn empty_filter_matches_everything() {
    assert!(matches(doc! {}, doc! {}));
    assert!(matches(doc! {"a": 1}, doc! {}));
}

#[test]
fn implicit_and_of_top_level_keys() {
    let d = doc! {"a": 1, "b": "x"};
    assert!(matches(d.clone(), doc! {"a": 1, "b": "x"}));
    assert!(!matches(d, doc! {"a": 1, "b": "y"}));
}

#[test]
fn numeric_equality_crosses_types() {
    assert!(matches(doc! {"a": 1}, doc! {"a": 1.0}));
    assert!(matches(doc! {"a": 1_i64}, doc! {"a": 1}));
}

#[test]
fn dotted_paths_and_arrays() {
    let d = doc! {"a": {"b": {"c": 3}}, "tags": ["x", "y"], "items": [{"k": 1}, {"k": 2}]};
    assert!(matches(d.clone(), doc! {"a.b.c": 3}));
    assert!(matches(d.clone(), doc! {"tags": "y"}));
    assert!(matches(d.clone(), doc! {"tags.1": "y"}));
    assert!(matches(d.clone(), doc! {"items.k": 2}));
    assert!(!matches(d, doc! {"items.k": 3}));
}

#[test]
fn null_matches_missing() {
    assert!(matches(doc! {"a": 1}, doc! {"b": Bson::Null}));
    assert!(!matches(doc! {"a": 1}, doc! {"b": {"$exists": true}}));
}

#[test]
fn comparison_operators() {
    let d = doc! {"n": 5, "s": "m"};
    assert!(matches(d.clone(), doc! {"n": {"$gt": 4, "$lte": 5}}));
    assert!(!matches(d.clone(), doc! {"n": {"$lt": 5}}));
    assert!(matches(d.clone(), doc! {"n": {"$ne": 4}}));
    assert!(matches(d.clone(), doc! {"n": {"$in": [1, 5]}}));
    assert!(matches(d.clone(), doc! {"n": {"$nin": [1, 2]}}));
    // range comparisons stay within one type class
    assert!(!matches(d, doc! {"s": {"$gt": 1}}));
}

#[test]
fn logical_operators() {
    let d = doc! {"a": 1, "b": 2};
    assert!(matches(d.clone(), doc! {"$or": [{"a": 9}, {"b": 2}]}));
    assert!(matches(d.clone(), doc! {"$and": [{"a": 1}, {"b": 2}]}));
    assert!(!matches(d.clone(), doc! {"$nor": [{"a": 1}]}));
    assert!(matches(d, doc! {"a": {"$not": {"$gt": 3}}}));
}

#[test]
fn array_operators() {
    let d = doc! {"xs": [1, 2, 3], "objs": [{"k": 1, "v": "a"}, {"k": 2, "v": "b"}]};
    assert!(matches(d.clone(), doc! {"xs": {"$size": 3}}));
    assert!(matches(d.clone(), doc! {"xs": {"$all": [3, 1]}}));
    assert!(!matches(d.clone(), doc! {"xs": {"$all": [4]}}));
    assert!(matches(d.clone(), doc! {"objs": {"$elemMatch": {"k": 2, "v": "b"}}}));
    assert!(!matches(d, doc! {"objs": {"$elemMatch": {"k": 1, "v": "b"}}}));
}

#[test]
fn type_operator() {
    let d = doc! {"a": 1, "b": "s", "c": 2.5};
    assert!(matches(d.clone(), doc! {"a": {"$type": "int"}}));
    assert!(matches(d.clone(), doc! {"b": {"$type": 2}}));
    assert!(matches(d.clone(), doc! {"c": {"$type": "number"}}));
    assert!(!matches(d, doc! {"c": {"$type": ["string", "bool"]}}));
}

#[cfg(feature = "regex")]
#[test]
fn regex_matching() {
    let d = doc! {"name": "Alice"};
    assert!(matches(d.clone(), doc! {"name": {"$regex": "^al", "$options": "i"}}));
    assert!(!matches(d.clone(), doc! {"name": {"$regex": "^al"}}));
    assert!(matches(d, doc! {"name": Bson::RegularExpression(bson::Regex { pattern: "ice$".into(), options: String::new() })}));
}

#[test]
fn unknown_operators_are_bad_value() {
    let err = filter_document(&to_doc(doc! {}), &to_doc(doc! {"a": {"$near": 1}})).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadValue);
    assert_eq!(err.to_string(), "unknown operator: $near");
    let err = filter_document(&to_doc(doc! {}), &to_doc(doc! {"$where": "1"})).unwrap_err();
    assert_eq!(err.to_string(), "unknown top level operator: $where");
}
