//! The persisted JSON form of annotations.
//!
//! One annotation serializes as a self-describing object:
//! `{type, id, description?, segments?, props?, <geometry fields>}`
//! with a lowercase `type` tag. Geometry fields are `point`,
//! `pointA`+`pointB`, or `center`+`radii`, each an array of `rank`
//! numbers. Segment ids are decimal strings (numbers are accepted on
//! input) grouped per relationship, flattened to a single array when the
//! schema has exactly one relationship. A whole collection is an array
//! of such objects.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::annotation::{Annotation, AnnotationGeometry, AnnotationKind};
use super::ids::AnnotationId;
use super::property::AnnotationSchema;
use crate::error::AnnopackError;

/// The persisted JSON shape of one annotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationJson {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Vec<f64>>,

    #[serde(rename = "pointA", default, skip_serializing_if = "Option::is_none")]
    pub point_a: Option<Vec<f64>>,

    #[serde(rename = "pointB", default, skip_serializing_if = "Option::is_none")]
    pub point_b: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radii: Option<Vec<f64>>,
}

/// Converts an in-memory record to its persisted form.
pub fn annotation_to_json(annotation: &Annotation, schema: &AnnotationSchema) -> AnnotationJson {
    let mut json = AnnotationJson {
        kind: annotation.kind(),
        id: Some(annotation.id.as_str().to_owned()),
        description: annotation.description.clone(),
        segments: segments_to_json(annotation.related_segments.as_deref(), schema),
        props: if annotation.properties.is_empty() {
            None
        } else {
            Some(annotation.properties.clone())
        },
        point: None,
        point_a: None,
        point_b: None,
        center: None,
        radii: None,
    };
    match &annotation.geometry {
        AnnotationGeometry::Point { point } => {
            json.point = Some(vec64(point));
        }
        AnnotationGeometry::Line { point_a, point_b }
        | AnnotationGeometry::AxisAlignedBoundingBox { point_a, point_b } => {
            json.point_a = Some(vec64(point_a));
            json.point_b = Some(vec64(point_b));
        }
        AnnotationGeometry::Ellipsoid { center, radii } => {
            json.center = Some(vec64(center));
            json.radii = Some(vec64(radii));
        }
    }
    json
}

/// Parses and validates a persisted record against the schema.
///
/// A missing `id` gets a fresh random one; a missing `props` takes the
/// schema defaults; a missing `segments` becomes one empty list per
/// relationship. Any malformed field is fatal for the record.
pub fn annotation_from_json(
    json: &AnnotationJson,
    schema: &AnnotationSchema,
) -> Result<Annotation, AnnopackError> {
    let kind = json.kind;
    let geometry = match kind {
        AnnotationKind::Point => AnnotationGeometry::Point {
            point: require_vector(kind, "point", &json.point)?,
        },
        AnnotationKind::Line => AnnotationGeometry::Line {
            point_a: require_vector(kind, "pointA", &json.point_a)?,
            point_b: require_vector(kind, "pointB", &json.point_b)?,
        },
        AnnotationKind::AxisAlignedBoundingBox => AnnotationGeometry::AxisAlignedBoundingBox {
            point_a: require_vector(kind, "pointA", &json.point_a)?,
            point_b: require_vector(kind, "pointB", &json.point_b)?,
        },
        AnnotationKind::Ellipsoid => AnnotationGeometry::Ellipsoid {
            center: require_vector(kind, "center", &json.center)?,
            radii: require_vector(kind, "radii", &json.radii)?,
        },
    };

    let id = match &json.id {
        Some(id) => AnnotationId::new(id.clone()),
        None => AnnotationId::random(),
    };
    let properties = match &json.props {
        Some(props) => props.clone(),
        None => schema.default_properties(),
    };
    let related_segments = Some(match &json.segments {
        Some(value) => segments_from_json(value, schema.relationships.len())?,
        None => vec![Vec::new(); schema.relationships.len()],
    });

    let annotation = Annotation {
        id,
        geometry,
        description: json.description.clone(),
        related_segments,
        properties,
    };
    annotation.validate(schema)?;
    Ok(annotation)
}

fn vec64(v: &[f32]) -> Vec<f64> {
    v.iter().map(|&c| c as f64).collect()
}

fn require_vector(
    kind: AnnotationKind,
    field: &'static str,
    value: &Option<Vec<f64>>,
) -> Result<Vec<f32>, AnnopackError> {
    match value {
        Some(v) => Ok(v.iter().map(|&c| c as f32).collect()),
        None => Err(AnnopackError::MissingGeometryField {
            kind: kind.tag(),
            field,
        }),
    }
}

fn segments_to_json(segments: Option<&[Vec<u64>]>, schema: &AnnotationSchema) -> Option<Value> {
    let segments = segments?;
    if segments.iter().all(|list| list.is_empty()) {
        return None;
    }
    let list_to_json = |list: &Vec<u64>| {
        Value::Array(list.iter().map(|id| Value::String(id.to_string())).collect())
    };
    // A single relationship serializes as one flat array.
    if schema.relationships.len() == 1 {
        Some(list_to_json(&segments[0]))
    } else {
        Some(Value::Array(segments.iter().map(list_to_json).collect()))
    }
}

fn segments_from_json(
    value: &Value,
    relationship_count: usize,
) -> Result<Vec<Vec<u64>>, AnnopackError> {
    let Value::Array(items) = value else {
        return Err(AnnopackError::InvalidSegmentId(value.to_string()));
    };
    // A flat array is the shorthand for exactly one relationship.
    let flat = relationship_count == 1 && !items.iter().any(|item| item.is_array());
    if flat {
        let list = items
            .iter()
            .map(parse_segment_id)
            .collect::<Result<Vec<u64>, _>>()?;
        return Ok(vec![list]);
    }
    if items.len() != relationship_count {
        return Err(AnnopackError::SegmentArityMismatch {
            expected: relationship_count,
            actual: items.len(),
        });
    }
    items
        .iter()
        .map(|item| {
            let Value::Array(ids) = item else {
                return Err(AnnopackError::InvalidSegmentId(item.to_string()));
            };
            ids.iter().map(parse_segment_id).collect()
        })
        .collect()
}

fn parse_segment_id(value: &Value) -> Result<u64, AnnopackError> {
    match value {
        Value::String(s) => s
            .parse::<u64>()
            .map_err(|_| AnnopackError::InvalidSegmentId(s.clone())),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| AnnopackError::InvalidSegmentId(n.to_string())),
        other => Err(AnnopackError::InvalidSegmentId(other.to_string())),
    }
}

/// Reads a collection of persisted annotations from a JSON file.
pub fn read_annotation_json(path: &Path) -> Result<Vec<AnnotationJson>, AnnopackError> {
    let file = File::open(path).map_err(AnnopackError::Io)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|source| AnnopackError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a collection of persisted annotations to a JSON file.
pub fn write_annotation_json(
    path: &Path,
    annotations: &[AnnotationJson],
) -> Result<(), AnnopackError> {
    let file = File::create(path).map_err(AnnopackError::Io)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, annotations).map_err(|source| AnnopackError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses a collection from a JSON string.
///
/// Useful for testing without file I/O.
pub fn from_json_str(json: &str) -> Result<Vec<AnnotationJson>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parses a collection from a JSON byte slice.
pub fn from_json_slice(json: &[u8]) -> Result<Vec<AnnotationJson>, serde_json::Error> {
    serde_json::from_slice(json)
}

/// Serializes a collection to a JSON string.
pub fn to_json_string(annotations: &[AnnotationJson]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(annotations)
}

/// Reads a schema from a JSON file.
pub fn read_schema_json(path: &Path) -> Result<AnnotationSchema, AnnopackError> {
    let file = File::open(path).map_err(AnnopackError::Io)?;
    let reader = BufReader::new(file);
    let schema: AnnotationSchema =
        serde_json::from_reader(reader).map_err(|source| AnnopackError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    AnnotationSchema::with_properties(schema.rank, schema.properties, schema.relationships)
}
