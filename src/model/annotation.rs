//! The annotation record and its geometry tagged union.
//!
//! Four geometry kinds exist and the set is closed: points, lines,
//! axis-aligned bounding boxes, and ellipsoids. Every geometric vector
//! has exactly `rank` components, where `rank` comes from the schema of
//! the store that owns the record.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AnnotationId;
use super::property::AnnotationSchema;
use crate::error::AnnopackError;

/// The geometry kind of an annotation.
///
/// `ALL` fixes the serialization order that the binary serializer and
/// the picking resolver share; reordering it corrupts hit-testing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Point,
    Line,
    AxisAlignedBoundingBox,
    Ellipsoid,
}

/// Number of geometry kinds.
pub const KIND_COUNT: usize = 4;

impl AnnotationKind {
    /// All kinds, in the fixed order used for binary packing and picking.
    pub const ALL: [AnnotationKind; KIND_COUNT] = [
        AnnotationKind::Point,
        AnnotationKind::Line,
        AnnotationKind::AxisAlignedBoundingBox,
        AnnotationKind::Ellipsoid,
    ];

    /// Index of this kind within [`AnnotationKind::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            AnnotationKind::Point => 0,
            AnnotationKind::Line => 1,
            AnnotationKind::AxisAlignedBoundingBox => 2,
            AnnotationKind::Ellipsoid => 3,
        }
    }

    /// Lowercase tag used in the persisted JSON form.
    pub fn tag(self) -> &'static str {
        match self {
            AnnotationKind::Point => "point",
            AnnotationKind::Line => "line",
            AnnotationKind::AxisAlignedBoundingBox => "axis_aligned_bounding_box",
            AnnotationKind::Ellipsoid => "ellipsoid",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The geometric payload of an annotation.
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationGeometry {
    /// A single point.
    Point { point: Vec<f32> },
    /// A line segment between two endpoints.
    Line { point_a: Vec<f32>, point_b: Vec<f32> },
    /// An axis-aligned box spanned by two corners.
    AxisAlignedBoundingBox { point_a: Vec<f32>, point_b: Vec<f32> },
    /// An ellipsoid given by its center and per-axis radii.
    Ellipsoid { center: Vec<f32>, radii: Vec<f32> },
}

impl AnnotationGeometry {
    /// The kind tag of this geometry.
    pub fn kind(&self) -> AnnotationKind {
        match self {
            AnnotationGeometry::Point { .. } => AnnotationKind::Point,
            AnnotationGeometry::Line { .. } => AnnotationKind::Line,
            AnnotationGeometry::AxisAlignedBoundingBox { .. } => {
                AnnotationKind::AxisAlignedBoundingBox
            }
            AnnotationGeometry::Ellipsoid { .. } => AnnotationKind::Ellipsoid,
        }
    }

    /// The rank-length vectors of this geometry, in serialization order.
    pub fn vectors(&self) -> [Option<&[f32]>; 2] {
        match self {
            AnnotationGeometry::Point { point } => [Some(point), None],
            AnnotationGeometry::Line { point_a, point_b }
            | AnnotationGeometry::AxisAlignedBoundingBox { point_a, point_b } => {
                [Some(point_a), Some(point_b)]
            }
            AnnotationGeometry::Ellipsoid { center, radii } => [Some(center), Some(radii)],
        }
    }

    /// Validates vector arity and finiteness against `rank`.
    pub fn validate(&self, rank: usize) -> Result<(), AnnopackError> {
        match self {
            AnnotationGeometry::Point { point } => {
                check_vector("point", point, rank)?;
            }
            AnnotationGeometry::Line { point_a, point_b }
            | AnnotationGeometry::AxisAlignedBoundingBox { point_a, point_b } => {
                check_vector("pointA", point_a, rank)?;
                check_vector("pointB", point_b, rank)?;
            }
            AnnotationGeometry::Ellipsoid { center, radii } => {
                check_vector("center", center, rank)?;
                check_vector("radii", radii, rank)?;
                if radii.iter().any(|&r| r < 0.0) {
                    return Err(AnnopackError::NegativeRadius);
                }
            }
        }
        Ok(())
    }
}

fn check_vector(field: &'static str, v: &[f32], rank: usize) -> Result<(), AnnopackError> {
    if v.len() != rank {
        return Err(AnnopackError::InvalidVectorLength {
            field,
            expected: rank,
            actual: v.len(),
        });
    }
    if v.iter().any(|c| !c.is_finite()) {
        return Err(AnnopackError::NonFiniteComponent { field });
    }
    Ok(())
}

/// One annotation record.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Unique identifier within the owning store.
    pub id: AnnotationId,

    /// Geometric payload.
    pub geometry: AnnotationGeometry,

    /// Optional free-form description.
    pub description: Option<String>,

    /// Linked segment ids, one list per schema relationship.
    pub related_segments: Option<Vec<Vec<u64>>>,

    /// Property values in schema order.
    pub properties: Vec<f64>,
}

impl Annotation {
    /// Creates an annotation with a fresh random id and empty extras.
    pub fn new(geometry: AnnotationGeometry) -> Self {
        Self {
            id: AnnotationId::random(),
            geometry,
            description: None,
            related_segments: None,
            properties: Vec::new(),
        }
    }

    /// Creates an annotation with an explicit id.
    pub fn with_id(id: impl Into<AnnotationId>, geometry: AnnotationGeometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            description: None,
            related_segments: None,
            properties: Vec::new(),
        }
    }

    /// Sets the property values (schema order).
    pub fn with_properties(mut self, properties: Vec<f64>) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the related segment lists.
    pub fn with_segments(mut self, segments: Vec<Vec<u64>>) -> Self {
        self.related_segments = Some(segments);
        self
    }

    /// The geometry kind of this record.
    #[inline]
    pub fn kind(&self) -> AnnotationKind {
        self.geometry.kind()
    }

    /// Validates the record against a schema.
    ///
    /// Checks id non-emptiness, vector arity/finiteness, property count,
    /// and segment-list arity. Schema violations are fatal at the point
    /// of detection; nothing is coerced.
    pub fn validate(&self, schema: &AnnotationSchema) -> Result<(), AnnopackError> {
        if self.id.is_empty() {
            return Err(AnnopackError::EmptyAnnotationId);
        }
        self.geometry.validate(schema.rank)?;
        if self.properties.len() != schema.properties.len() {
            return Err(AnnopackError::PropertyCountMismatch {
                expected: schema.properties.len(),
                actual: self.properties.len(),
            });
        }
        if let Some(segments) = &self.related_segments {
            if segments.len() != schema.relationships.len() {
                return Err(AnnopackError::SegmentArityMismatch {
                    expected: schema.relationships.len(),
                    actual: segments.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::property::{PropertySpec, PropertyType};

    fn schema() -> AnnotationSchema {
        AnnotationSchema::with_properties(
            3,
            vec![PropertySpec::new("size", PropertyType::Float32)],
            vec!["segments".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_kind_order_is_stable() {
        for (i, kind) in AnnotationKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(AnnotationKind::Point.tag(), "point");
        assert_eq!(
            AnnotationKind::AxisAlignedBoundingBox.tag(),
            "axis_aligned_bounding_box"
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_records() {
        let ann = Annotation::new(AnnotationGeometry::Point {
            point: vec![1.0, 2.0, 3.0],
        })
        .with_properties(vec![5.0])
        .with_segments(vec![vec![10, 20]]);
        assert!(ann.validate(&schema()).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_rank() {
        let ann = Annotation::new(AnnotationGeometry::Point {
            point: vec![1.0, 2.0],
        })
        .with_properties(vec![5.0]);
        assert!(matches!(
            ann.validate(&schema()),
            Err(AnnopackError::InvalidVectorLength { expected: 3, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_components() {
        let ann = Annotation::new(AnnotationGeometry::Line {
            point_a: vec![0.0, 0.0, 0.0],
            point_b: vec![1.0, f32::NAN, 2.0],
        })
        .with_properties(vec![5.0]);
        assert!(matches!(
            ann.validate(&schema()),
            Err(AnnopackError::NonFiniteComponent { field: "pointB" })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_radii() {
        let ann = Annotation::new(AnnotationGeometry::Ellipsoid {
            center: vec![0.0, 0.0, 0.0],
            radii: vec![1.0, -1.0, 1.0],
        })
        .with_properties(vec![5.0]);
        assert!(matches!(
            ann.validate(&schema()),
            Err(AnnopackError::NegativeRadius)
        ));
    }

    #[test]
    fn test_validate_rejects_property_count_mismatch() {
        let ann = Annotation::new(AnnotationGeometry::Point {
            point: vec![1.0, 2.0, 3.0],
        });
        assert!(matches!(
            ann.validate(&schema()),
            Err(AnnopackError::PropertyCountMismatch {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_validate_rejects_segment_arity_mismatch() {
        let ann = Annotation::new(AnnotationGeometry::Point {
            point: vec![1.0, 2.0, 3.0],
        })
        .with_properties(vec![5.0])
        .with_segments(vec![vec![1], vec![2]]);
        assert!(matches!(
            ann.validate(&schema()),
            Err(AnnopackError::SegmentArityMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }
}
