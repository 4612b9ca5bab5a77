#![no_main]
use libfuzzer_sys::fuzz_target;
use nexuswire::document::{Document, Value};
use nexuswire::query::{apply_update, parse_update};

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 {
        return;
    }
    let Ok(raw) = Document::from_bytes(data) else { return };
    let Ok(update) = parse_update(&raw) else { return };
    let mut doc: Document = vec![
        ("_id", Value::Int32(1)),
        ("n", Value::Int32(i32::MAX)),
        ("xs", Value::Array(vec![Value::Int32(1)].into())),
    ]
    .into_iter()
    .collect();
    let before = doc.clone();
    match apply_update(&mut doc, &update) {
        Ok(changed) => assert_eq!(changed, doc != before),
        Err(_) => assert_eq!(doc, before),
    }
});
