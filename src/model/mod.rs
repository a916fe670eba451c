//! Core data model for annopack.
//!
//! This module defines the schema-driven annotation representation: the
//! property schema governing one collection, the geometry tagged union,
//! the annotation record itself, and its persisted JSON form. The
//! layout engine, store, and binary serializer all build on these
//! types.

pub mod annotation;
pub mod ids;
pub mod io_json;
pub mod property;

pub use annotation::{Annotation, AnnotationGeometry, AnnotationKind, KIND_COUNT};
pub use ids::AnnotationId;
pub use io_json::AnnotationJson;
pub use property::{AnnotationSchema, PropertySpec, PropertyType};
