//! Geometry type codecs.
//!
//! Each geometry kind serializes as one or two consecutive rank-length
//! float32 vectors: a point is one vector; lines, boxes, and ellipsoids
//! are two. Components are written and read positionally in the global
//! byte order. Dispatch is a match on the closed [`AnnotationKind`]
//! enum, so an unregistered kind is unrepresentable.
//!
//! Deserialization always yields `properties: []` and no description or
//! segments; those are attached by the caller, not by the geometry
//! codec.

use crate::error::AnnopackError;
use crate::layout::{read_f32, write_f32, Endianness};
use crate::model::{Annotation, AnnotationGeometry, AnnotationId, AnnotationKind};

/// Number of rank-length vectors a kind serializes.
#[inline]
fn vector_count(kind: AnnotationKind) -> usize {
    match kind {
        AnnotationKind::Point => 1,
        AnnotationKind::Line
        | AnnotationKind::AxisAlignedBoundingBox
        | AnnotationKind::Ellipsoid => 2,
    }
}

/// Size in bytes of one serialized geometry of the given kind.
#[inline]
pub fn serialized_bytes(kind: AnnotationKind, rank: usize) -> usize {
    vector_count(kind) * rank * 4
}

/// Writes the geometry of `annotation` at `offset`.
///
/// The annotation must already be validated against the schema; vector
/// lengths are checked again before any byte is written.
pub fn serialize(
    buf: &mut [u8],
    offset: usize,
    endianness: Endianness,
    rank: usize,
    annotation: &Annotation,
) -> Result<(), AnnopackError> {
    let mut cursor = offset;
    for vector in annotation.geometry.vectors().into_iter().flatten() {
        if vector.len() != rank {
            return Err(AnnopackError::InvalidVectorLength {
                field: "geometry",
                expected: rank,
                actual: vector.len(),
            });
        }
        for &component in vector {
            write_f32(buf, cursor, component, endianness);
            cursor += 4;
        }
    }
    Ok(())
}

/// Reads one geometry of `kind` at `offset`, attaching `id`.
///
/// The returned record has empty properties, no description, and no
/// related segments.
pub fn deserialize(
    buf: &[u8],
    offset: usize,
    endianness: Endianness,
    rank: usize,
    kind: AnnotationKind,
    id: AnnotationId,
) -> Annotation {
    let read_vector = |base: usize| -> Vec<f32> {
        (0..rank)
            .map(|i| read_f32(buf, base + i * 4, endianness))
            .collect()
    };
    let first = read_vector(offset);
    let geometry = match kind {
        AnnotationKind::Point => AnnotationGeometry::Point { point: first },
        AnnotationKind::Line => AnnotationGeometry::Line {
            point_a: first,
            point_b: read_vector(offset + rank * 4),
        },
        AnnotationKind::AxisAlignedBoundingBox => AnnotationGeometry::AxisAlignedBoundingBox {
            point_a: first,
            point_b: read_vector(offset + rank * 4),
        },
        AnnotationKind::Ellipsoid => AnnotationGeometry::Ellipsoid {
            center: first,
            radii: read_vector(offset + rank * 4),
        },
    };
    Annotation {
        id,
        geometry,
        description: None,
        related_segments: None,
        properties: Vec::new(),
    }
}
