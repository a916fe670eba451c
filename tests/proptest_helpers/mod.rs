#![allow(dead_code)]

use annopack::model::{
    Annotation, AnnotationGeometry, AnnotationKind, AnnotationSchema, PropertySpec, PropertyType,
};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_property_type() -> impl Strategy<Value = PropertyType> {
    prop_oneof![
        Just(PropertyType::Rgb),
        Just(PropertyType::Rgba),
        Just(PropertyType::Float32),
        Just(PropertyType::Int32),
        Just(PropertyType::Uint32),
        Just(PropertyType::Int16),
        Just(PropertyType::Uint16),
        Just(PropertyType::Int8),
        Just(PropertyType::Uint8),
    ]
}

/// A schema with up to `max_properties` properties and up to two
/// relationships.
pub fn arb_schema(max_properties: usize) -> BoxedStrategy<AnnotationSchema> {
    (
        1usize..=4,
        prop::collection::vec(arb_property_type(), 0..=max_properties),
        0usize..=2,
    )
        .prop_map(|(rank, types, relationship_count)| {
            let properties = types
                .into_iter()
                .enumerate()
                .map(|(i, t)| PropertySpec::new(format!("p{}", i), t))
                .collect();
            let relationships = (0..relationship_count)
                .map(|i| format!("rel{}", i))
                .collect();
            AnnotationSchema::with_properties(rank, properties, relationships)
                .expect("generated identifiers are unique")
        })
        .boxed()
}

/// A value exactly representable by the given property type, so that
/// binary and JSON round trips are lossless.
pub fn arb_property_value(property_type: PropertyType) -> BoxedStrategy<f64> {
    match property_type {
        PropertyType::Rgb => (0u32..1 << 24).prop_map(|v| v as f64).boxed(),
        PropertyType::Rgba => any::<u32>().prop_map(|v| v as f64).boxed(),
        PropertyType::Float32 => (-1.0e6f32..1.0e6f32).prop_map(|v| v as f64).boxed(),
        PropertyType::Int32 => any::<i32>().prop_map(|v| v as f64).boxed(),
        PropertyType::Uint32 => any::<u32>().prop_map(|v| v as f64).boxed(),
        PropertyType::Int16 => any::<i16>().prop_map(|v| v as f64).boxed(),
        PropertyType::Uint16 => any::<u16>().prop_map(|v| v as f64).boxed(),
        PropertyType::Int8 => any::<i8>().prop_map(|v| v as f64).boxed(),
        PropertyType::Uint8 => any::<u8>().prop_map(|v| v as f64).boxed(),
    }
}

fn arb_vector(rank: usize) -> BoxedStrategy<Vec<f32>> {
    prop::collection::vec(-1.0e6f32..1.0e6f32, rank).boxed()
}

fn arb_radii(rank: usize) -> BoxedStrategy<Vec<f32>> {
    prop::collection::vec(0.0f32..1.0e6f32, rank).boxed()
}

pub fn arb_geometry(rank: usize) -> BoxedStrategy<AnnotationGeometry> {
    prop_oneof![
        arb_vector(rank).prop_map(|point| AnnotationGeometry::Point { point }),
        (arb_vector(rank), arb_vector(rank))
            .prop_map(|(point_a, point_b)| AnnotationGeometry::Line { point_a, point_b }),
        (arb_vector(rank), arb_vector(rank)).prop_map(|(point_a, point_b)| {
            AnnotationGeometry::AxisAlignedBoundingBox { point_a, point_b }
        }),
        (arb_vector(rank), arb_radii(rank))
            .prop_map(|(center, radii)| AnnotationGeometry::Ellipsoid { center, radii }),
    ]
    .boxed()
}

fn arb_properties(schema: &AnnotationSchema) -> BoxedStrategy<Vec<f64>> {
    let strategies: Vec<BoxedStrategy<f64>> = schema
        .properties
        .iter()
        .map(|spec| arb_property_value(spec.property_type))
        .collect();
    strategies.boxed()
}

fn arb_segments(relationship_count: usize) -> BoxedStrategy<Vec<Vec<u64>>> {
    prop::collection::vec(prop::collection::vec(any::<u64>(), 0..=4), relationship_count).boxed()
}

/// A collection of schema-valid annotations with unique sequential ids.
pub fn arb_annotations(
    schema: &AnnotationSchema,
    max_count: usize,
) -> BoxedStrategy<Vec<Annotation>> {
    let rank = schema.rank;
    let relationship_count = schema.relationships.len();
    let record = (
        arb_geometry(rank),
        arb_properties(schema),
        arb_segments(relationship_count),
        prop::option::of("[a-z]{1,12}"),
    );
    prop::collection::vec(record, 0..=max_count)
        .prop_map(|records| {
            records
                .into_iter()
                .enumerate()
                .map(|(i, (geometry, properties, segments, description))| {
                    let mut annotation = Annotation::with_id(format!("ann{}", i), geometry)
                        .with_properties(properties)
                        .with_segments(segments);
                    annotation.description = description;
                    annotation
                })
                .collect()
        })
        .boxed()
}

/// A schema together with a matching annotation collection.
pub fn arb_schema_and_annotations(
    max_properties: usize,
    max_count: usize,
) -> BoxedStrategy<(AnnotationSchema, Vec<Annotation>)> {
    arb_schema(max_properties)
        .prop_flat_map(move |schema| {
            let annotations = arb_annotations(&schema, max_count);
            (Just(schema), annotations)
        })
        .boxed()
}

/// Counts annotations of each kind, in fixed kind order.
pub fn kind_counts(annotations: &[Annotation]) -> [usize; 4] {
    let mut counts = [0usize; 4];
    for annotation in annotations {
        counts[annotation.kind().index()] += 1;
    }
    counts
}

/// The kinds in their fixed serialization order.
pub fn kinds() -> [AnnotationKind; 4] {
    AnnotationKind::ALL
}
