//! Fuzz target for annotation JSON parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the persisted-form
//! parser and, when parsing succeeds, runs schema conversion, checking
//! for panics, crashes, or hangs.

#![no_main]

use annopack::model::io_json::{annotation_from_json, from_json_slice};
use annopack::model::{AnnotationSchema, PropertySpec, PropertyType};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(records) = from_json_slice(data) {
        let schema = AnnotationSchema::with_properties(
            3,
            vec![
                PropertySpec::new("color", PropertyType::Rgb),
                PropertySpec::new("size", PropertyType::Float32),
            ],
            vec!["segments".into()],
        )
        .unwrap();
        for record in &records {
            let _ = annotation_from_json(record, &schema);
        }
    }
});
