#![no_main]
use libfuzzer_sys::fuzz_target;
use nexuswire::document::{Document, Value};
use nexuswire::query::{eval_filter, parse_filter};

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    let Ok(raw) = Document::from_bytes(data) else { return };
    let Ok(filter) = parse_filter(&raw) else { return };
    let nested: Document = vec![("z", Value::Int32(3))].into_iter().collect();
    let docs: [Document; 3] = [
        vec![("a", Value::Int32(1)), ("b", Value::Int32(2)), ("name", Value::from("x"))].into_iter().collect(),
        vec![
            ("a", Value::Int64(10)),
            ("tags", Value::Array(vec![Value::from("p"), Value::Null].into())),
            ("nested", Value::Document(nested)),
        ]
        .into_iter()
        .collect(),
        vec![("active", Value::Bool(true))].into_iter().collect(),
    ];
    for d in &docs {
        let _ = eval_filter(d, &filter);
    }
});
