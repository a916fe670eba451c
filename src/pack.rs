//! Binary serialization of an annotation snapshot.
//!
//! A snapshot groups annotations by geometry kind in the fixed order
//! [`AnnotationKind::ALL`], then writes each record's geometry bytes
//! immediately followed by its property bytes. Each kind's subtotal is
//! padded to a 4-byte boundary and its starting offset recorded. The
//! fixed kind order and the within-kind record order (store iteration
//! order) are both part of the external contract: the picking resolver
//! inverts exactly this layout.
//!
//! The result is immutable and self-consistent; it never observes later
//! store mutations. [`SnapshotCache`] re-encodes at most once per store
//! change by comparing change counters.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::codec;
use crate::error::AnnopackError;
use crate::layout::{Endianness, PropertyLayout};
use crate::model::{Annotation, AnnotationId, AnnotationKind, AnnotationSchema, KIND_COUNT};
use crate::store::AnnotationStore;

/// An immutable packed snapshot of one annotation collection.
#[derive(Clone, Debug)]
pub struct SerializedAnnotations {
    /// The contiguous packed buffer.
    pub data: Vec<u8>,

    /// Ordered annotation ids per kind (write order).
    pub type_to_ids: [Vec<AnnotationId>; KIND_COUNT],

    /// Starting byte offset of each kind's block.
    pub type_to_offset: [usize; KIND_COUNT],

    /// Reverse id-to-index map per kind.
    pub type_to_id_index: [HashMap<AnnotationId, usize>; KIND_COUNT],

    /// Coordinate rank the geometry was packed with.
    pub rank: usize,

    /// Size of one property block (already padded to 4).
    pub property_bytes: usize,
}

impl SerializedAnnotations {
    /// Stride of one record of the given kind.
    #[inline]
    pub fn bytes_per_record(&self, kind: AnnotationKind) -> usize {
        codec::serialized_bytes(kind, self.rank) + self.property_bytes
    }

    /// Number of packed records of the given kind.
    #[inline]
    pub fn count(&self, kind: AnnotationKind) -> usize {
        self.type_to_ids[kind.index()].len()
    }

    /// Byte offset of the record at `index` within the given kind.
    #[inline]
    pub fn byte_offset_of(&self, kind: AnnotationKind, index: usize) -> usize {
        self.type_to_offset[kind.index()] + index * self.bytes_per_record(kind)
    }
}

/// Packs a snapshot of `annotations` into one contiguous buffer.
///
/// The iterator must already be restricted to the records that should
/// be visible (committed, filter-matching); within-kind order follows
/// iteration order.
pub fn serialize<'a>(
    annotations: impl IntoIterator<Item = &'a Annotation>,
    schema: &AnnotationSchema,
    layout: &PropertyLayout,
    endianness: Endianness,
) -> Result<SerializedAnnotations, AnnopackError> {
    let rank = schema.rank;
    let property_bytes = layout.serialized_bytes;

    let mut by_kind: [Vec<&Annotation>; KIND_COUNT] = Default::default();
    for annotation in annotations {
        by_kind[annotation.kind().index()].push(annotation);
    }

    // Pass 1: per-kind starting offsets and the total size.
    let mut type_to_offset = [0usize; KIND_COUNT];
    let mut total = 0usize;
    for kind in AnnotationKind::ALL {
        type_to_offset[kind.index()] = total;
        let stride = codec::serialized_bytes(kind, rank) + property_bytes;
        let subtotal = stride * by_kind[kind.index()].len();
        total += subtotal.next_multiple_of(4);
    }

    // Pass 2: write records and build the id maps.
    let mut data = vec![0u8; total];
    let mut type_to_ids: [Vec<AnnotationId>; KIND_COUNT] = Default::default();
    let mut type_to_id_index: [HashMap<AnnotationId, usize>; KIND_COUNT] = Default::default();
    for kind in AnnotationKind::ALL {
        let geometry_bytes = codec::serialized_bytes(kind, rank);
        let mut cursor = type_to_offset[kind.index()];
        for (index, annotation) in by_kind[kind.index()].iter().enumerate() {
            codec::serialize(&mut data, cursor, endianness, rank, annotation)?;
            layout.encode(
                &schema.properties,
                endianness,
                &annotation.properties,
                &mut data,
                cursor + geometry_bytes,
            )?;
            cursor += geometry_bytes + property_bytes;
            type_to_ids[kind.index()].push(annotation.id.clone());
            type_to_id_index[kind.index()].insert(annotation.id.clone(), index);
        }
    }

    Ok(SerializedAnnotations {
        data,
        type_to_ids,
        type_to_offset,
        type_to_id_index,
        rank,
        property_bytes,
    })
}

/// Packs the committed contents of a store, optionally restricted by a
/// visibility predicate.
pub fn serialize_store(
    store: &AnnotationStore,
    layout: &PropertyLayout,
    endianness: Endianness,
    filter: Option<&dyn Fn(&Annotation) -> bool>,
) -> Result<SerializedAnnotations, AnnopackError> {
    let visible = store
        .iter_committed()
        .map(Rc::as_ref)
        .filter(|annotation| filter.map_or(true, |f| f(annotation)));
    serialize(visible, store.schema(), layout, endianness)
}

/// A visibility predicate over linked segments.
///
/// An annotation matches when it has no related segments at all, or when
/// any of its linked ids is currently visible.
pub fn segment_filter(visible: &HashSet<u64>) -> impl Fn(&Annotation) -> bool + '_ {
    |annotation: &Annotation| match &annotation.related_segments {
        None => true,
        Some(lists) if lists.iter().all(|list| list.is_empty()) => true,
        Some(lists) => lists
            .iter()
            .any(|list| list.iter().any(|id| visible.contains(id))),
    }
}

/// Caches the packed snapshot against the store's change counter.
///
/// `get` re-serializes only when the counter differs from the one the
/// cache last saw, giving at-most-once re-encoding per logical change.
#[derive(Default)]
pub struct SnapshotCache {
    cached: RefCell<Option<(u64, Rc<SerializedAnnotations>)>>,
}

impl SnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot, re-encoding only if the store changed.
    pub fn get(
        &self,
        store: &AnnotationStore,
        layout: &PropertyLayout,
        endianness: Endianness,
        filter: Option<&dyn Fn(&Annotation) -> bool>,
    ) -> Result<Rc<SerializedAnnotations>, AnnopackError> {
        let generation = store.change_count();
        if let Some((cached_generation, snapshot)) = self.cached.borrow().as_ref() {
            if *cached_generation == generation {
                return Ok(Rc::clone(snapshot));
            }
        }
        let snapshot = Rc::new(serialize_store(store, layout, endianness, filter)?);
        self.cached
            .replace(Some((generation, Rc::clone(&snapshot))));
        Ok(snapshot)
    }
}
