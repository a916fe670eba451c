//! Reverse lookup from a flat pick offset to an annotation identity.
//!
//! During rendering, each drawn instance of a geometry kind consumes a
//! contiguous block of pick ids, walking the kinds in the same fixed
//! order the binary serializer used. Hit-testing results arrive
//! asynchronously as a flat offset into that enumeration; this module
//! inverts it back to a kind, an annotation id, a part index within the
//! instance, and the record's byte location in the packed buffer.
//!
//! [`resolve`] and [`pick_offset_of`] are exact inverses; both walk
//! [`AnnotationKind::ALL`], the constant the serializer is driven by.

use crate::model::{AnnotationId, AnnotationKind, KIND_COUNT};
use crate::pack::SerializedAnnotations;

/// Pick ids consumed per drawn instance, per geometry kind.
///
/// These counts are a property of each kind's render handler and are an
/// input here; a kind with 0 never matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PickIdsPerKind(pub [usize; KIND_COUNT]);

impl PickIdsPerKind {
    /// The same count for every kind.
    pub fn uniform(count: usize) -> Self {
        Self([count; KIND_COUNT])
    }

    /// Pick ids per instance for one kind.
    #[inline]
    pub fn get(&self, kind: AnnotationKind) -> usize {
        self.0[kind.index()]
    }
}

/// The resolution of one pick offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickResult {
    pub kind: AnnotationKind,
    pub id: AnnotationId,
    /// Index of the instance within its kind's block.
    pub instance_index: usize,
    /// Which pick id of the instance was hit.
    pub part_index: usize,
    /// Byte location of the record in the packed buffer.
    pub byte_offset: usize,
}

/// Maps a flat pick offset back to the annotation that produced it.
///
/// Returns `None` when the offset lies past the final kind's block.
pub fn resolve(
    snapshot: &SerializedAnnotations,
    pick_ids: &PickIdsPerKind,
    pick_offset: u64,
) -> Option<PickResult> {
    let mut remainder = pick_offset;
    for kind in AnnotationKind::ALL {
        let per_instance = pick_ids.get(kind) as u64;
        let block = snapshot.count(kind) as u64 * per_instance;
        if remainder >= block {
            remainder -= block;
            continue;
        }
        let instance_index = (remainder / per_instance) as usize;
        let part_index = (remainder % per_instance) as usize;
        return Some(PickResult {
            kind,
            id: snapshot.type_to_ids[kind.index()][instance_index].clone(),
            instance_index,
            part_index,
            byte_offset: snapshot.byte_offset_of(kind, instance_index),
        });
    }
    None
}

/// The flat pick offset assigned to an instance during forward draw
/// enumeration. Inverse of [`resolve`].
pub fn pick_offset_of(
    snapshot: &SerializedAnnotations,
    pick_ids: &PickIdsPerKind,
    kind: AnnotationKind,
    instance_index: usize,
) -> u64 {
    let mut offset = 0u64;
    for earlier in AnnotationKind::ALL {
        if earlier == kind {
            break;
        }
        offset += snapshot.count(earlier) as u64 * pick_ids.get(earlier) as u64;
    }
    offset + (instance_index * pick_ids.get(kind)) as u64
}
