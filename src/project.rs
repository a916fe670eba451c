//! Rank migration: re-projecting stored geometry when the ambient
//! coordinate dimensions change.
//!
//! A [`DimensionMapping`] matches each dimension of the new rank to an
//! old dimension by its identity (name). Projection copies the matched
//! component and fills unmatched dimensions with 0. The
//! [`ProjectedView`] applies the mapping lazily: the projected list is
//! recomputed only on access, and only when the store has actually
//! changed since the cached copy was built.

use std::cell::RefCell;
use std::rc::Rc;

use crate::model::{Annotation, AnnotationGeometry};
use crate::store::AnnotationStore;

/// An identity-based mapping from an old dimension list to a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionMapping {
    /// For each new dimension, the index of the matching old dimension.
    source: Vec<Option<usize>>,
}

impl DimensionMapping {
    /// Builds a mapping by matching new dimension names against old ones.
    pub fn new(old_names: &[String], new_names: &[String]) -> Self {
        let source = new_names
            .iter()
            .map(|name| old_names.iter().position(|old| old == name))
            .collect();
        Self { source }
    }

    /// Rank of the projected vectors.
    pub fn new_rank(&self) -> usize {
        self.source.len()
    }

    /// Projects one vector; unmatched dimensions become 0.
    pub fn project_vector(&self, vector: &[f32]) -> Vec<f32> {
        self.source
            .iter()
            .map(|dim| dim.map_or(0.0, |i| vector[i]))
            .collect()
    }

    /// Projects every geometric vector of a record in place.
    pub fn project_annotation(&self, annotation: &Annotation) -> Annotation {
        let geometry = match &annotation.geometry {
            AnnotationGeometry::Point { point } => AnnotationGeometry::Point {
                point: self.project_vector(point),
            },
            AnnotationGeometry::Line { point_a, point_b } => AnnotationGeometry::Line {
                point_a: self.project_vector(point_a),
                point_b: self.project_vector(point_b),
            },
            AnnotationGeometry::AxisAlignedBoundingBox { point_a, point_b } => {
                AnnotationGeometry::AxisAlignedBoundingBox {
                    point_a: self.project_vector(point_a),
                    point_b: self.project_vector(point_b),
                }
            }
            AnnotationGeometry::Ellipsoid { center, radii } => AnnotationGeometry::Ellipsoid {
                center: self.project_vector(center),
                radii: self.project_vector(radii),
            },
        };
        Annotation {
            id: annotation.id.clone(),
            geometry,
            description: annotation.description.clone(),
            related_segments: annotation.related_segments.clone(),
            properties: annotation.properties.clone(),
        }
    }
}

/// A derived, read-only projection of a store under a dimension mapping.
///
/// The projected record list is cached against the store's change
/// counter; swapping the mapping invalidates the cache.
pub struct ProjectedView {
    mapping: DimensionMapping,
    cache: RefCell<Option<(u64, Rc<Vec<Annotation>>)>>,
}

impl ProjectedView {
    /// Creates a view with the given mapping.
    pub fn new(mapping: DimensionMapping) -> Self {
        Self {
            mapping,
            cache: RefCell::new(None),
        }
    }

    /// The active mapping.
    pub fn mapping(&self) -> &DimensionMapping {
        &self.mapping
    }

    /// Replaces the mapping; the cached projection is discarded.
    pub fn set_mapping(&mut self, mapping: DimensionMapping) {
        if self.mapping != mapping {
            self.mapping = mapping;
            self.cache.replace(None);
        }
    }

    /// The projected records, recomputed only when the store changed.
    pub fn annotations(&self, store: &AnnotationStore) -> Rc<Vec<Annotation>> {
        let generation = store.change_count();
        if let Some((cached_generation, cached)) = self.cache.borrow().as_ref() {
            if *cached_generation == generation {
                return Rc::clone(cached);
            }
        }
        let projected = Rc::new(
            store
                .iter()
                .map(|record| self.mapping.project_annotation(record))
                .collect::<Vec<_>>(),
        );
        self.cache
            .replace(Some((generation, Rc::clone(&projected))));
        projected
    }
}
