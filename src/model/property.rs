//! Property schemas for annotation collections.
//!
//! A schema is an ordered, immutable sequence of typed property specs
//! plus a coordinate rank and an ordered list of relationship names.
//! The schema governs both the JSON `props` array and the packed binary
//! layout of every annotation in one store.

use serde::{Deserialize, Serialize};

use crate::error::AnnopackError;

/// The wire type of one annotation property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Rgb,
    Rgba,
    Float32,
    Int32,
    Uint32,
    Int16,
    Uint16,
    Int8,
    Uint8,
}

impl PropertyType {
    /// Number of bytes this property occupies in the packed layout.
    ///
    /// `Int8` reports 2 bytes while its codec touches a single byte.
    /// The extra byte is a reserved pad that downstream offset
    /// consumers depend on; do not change it.
    pub fn serialized_bytes(self) -> usize {
        match self {
            PropertyType::Rgb => 3,
            PropertyType::Rgba => 4,
            PropertyType::Float32 | PropertyType::Int32 | PropertyType::Uint32 => 4,
            PropertyType::Int16 | PropertyType::Uint16 => 2,
            PropertyType::Int8 => 2,
            PropertyType::Uint8 => 1,
        }
    }

    /// Required byte alignment of this property within the packed layout.
    pub fn alignment(self) -> usize {
        match self {
            PropertyType::Float32 | PropertyType::Int32 | PropertyType::Uint32 => 4,
            PropertyType::Int16 | PropertyType::Uint16 => 2,
            PropertyType::Rgb | PropertyType::Rgba | PropertyType::Int8 | PropertyType::Uint8 => 1,
        }
    }

    /// Returns true for the packed-color types.
    pub fn is_color(self) -> bool {
        matches!(self, PropertyType::Rgb | PropertyType::Rgba)
    }
}

/// The declaration of one user-defined annotation property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Identifier, unique within a schema.
    pub identifier: String,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Wire type of the property.
    #[serde(rename = "type")]
    pub property_type: PropertyType,

    /// Default value used when a persisted record omits `props`.
    #[serde(default)]
    pub default: f64,

    /// Optional lower bound (numeric types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Optional upper bound (numeric types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Optional UI step (numeric types only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl PropertySpec {
    /// Creates a spec with the given identifier and type.
    pub fn new(identifier: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            identifier: identifier.into(),
            description: None,
            property_type,
            default: 0.0,
            min: None,
            max: None,
            step: None,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The schema governing one annotation collection.
///
/// Immutable once constructed; the layout engine, the store, and the
/// binary serializer all assume a fixed property order and rank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSchema {
    /// Coordinate dimensionality of every geometric vector.
    pub rank: usize,

    /// Ordered property declarations.
    #[serde(default)]
    pub properties: Vec<PropertySpec>,

    /// Ordered relationship names (segment-linkage categories).
    #[serde(default)]
    pub relationships: Vec<String>,
}

impl AnnotationSchema {
    /// Creates a schema with no properties or relationships.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            properties: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Creates a schema and validates property identifier uniqueness.
    pub fn with_properties(
        rank: usize,
        properties: Vec<PropertySpec>,
        relationships: Vec<String>,
    ) -> Result<Self, AnnopackError> {
        let schema = Self {
            rank,
            properties,
            relationships,
        };
        schema.check_identifiers()?;
        Ok(schema)
    }

    /// Default property values in schema order.
    pub fn default_properties(&self) -> Vec<f64> {
        self.properties.iter().map(|p| p.default).collect()
    }

    fn check_identifiers(&self) -> Result<(), AnnopackError> {
        let mut seen = std::collections::HashSet::new();
        for spec in &self.properties {
            if !seen.insert(spec.identifier.as_str()) {
                return Err(AnnopackError::DuplicatePropertyIdentifier(
                    spec.identifier.clone(),
                ));
            }
        }
        Ok(())
    }
}
