//! Fuzz target for schema JSON parsing.

#![no_main]

use annopack::model::AnnotationSchema;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    if let Ok(schema) = serde_json::from_slice::<AnnotationSchema>(data) {
        let _ = AnnotationSchema::with_properties(
            schema.rank,
            schema.properties,
            schema.relationships,
        );
    }
});
