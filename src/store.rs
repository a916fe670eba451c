//! The mutable annotation store and its reference handles.
//!
//! The store is a keyed, insertion-ordered collection of annotation
//! records bound to one schema. Records are created by [`add`], mutated
//! only by whole-record replacement via [`update`], and removed by
//! [`delete`]. A record added with `commit = false` stays *pending* —
//! present for iteration and lookup but excluded from every serialized
//! snapshot — until [`commit`] clears it.
//!
//! Change notification follows the single-threaded cooperative model:
//! the store carries a monotonically increasing [`change_count`], and
//! every live [`AnnotationReference`] carries its own `changed_count`
//! bumped whenever its record is added, updated, deleted, or
//! re-resolved. Consumers compare counters against the last value they
//! saw, which gives at-most-once re-encoding of the binary snapshot per
//! logical change.
//!
//! [`add`]: AnnotationStore::add
//! [`update`]: AnnotationStore::update
//! [`delete`]: AnnotationStore::delete
//! [`commit`]: AnnotationStore::commit
//! [`change_count`]: AnnotationStore::change_count

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use crate::error::AnnopackError;
use crate::model::io_json::{annotation_from_json, annotation_to_json};
use crate::model::{Annotation, AnnotationId, AnnotationJson, AnnotationSchema};

/// The current observation of a reference.
#[derive(Clone, Debug)]
pub enum ReferenceValue {
    /// Lookup has not resolved yet.
    Unresolved,
    /// The record was confirmed deleted (or never existed).
    Deleted,
    /// The current record.
    Present(Rc<Annotation>),
}

impl ReferenceValue {
    /// Returns true if the reference observed a deletion.
    pub fn is_deleted(&self) -> bool {
        matches!(self, ReferenceValue::Deleted)
    }

    /// Returns the record if present.
    pub fn annotation(&self) -> Option<&Rc<Annotation>> {
        match self {
            ReferenceValue::Present(annotation) => Some(annotation),
            _ => None,
        }
    }
}

type ReferenceRegistry = RefCell<HashMap<AnnotationId, Weak<ReferenceState>>>;

/// Shared interior of all handles for one id.
struct ReferenceState {
    id: AnnotationId,
    value: RefCell<ReferenceValue>,
    changed: Cell<u64>,
    registry: Weak<ReferenceRegistry>,
}

impl Drop for ReferenceState {
    // Last holder gone: retire the registration.
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(&self.id);
        }
    }
}

/// A shared, revocable handle to one annotation id.
///
/// All handles for one id share a single registration; cloning a handle
/// adds a holder. The store retires the registration when the last
/// holder drops.
#[derive(Clone)]
pub struct AnnotationReference {
    state: Rc<ReferenceState>,
}

impl AnnotationReference {
    /// The id this handle refers to.
    pub fn id(&self) -> &AnnotationId {
        &self.state.id
    }

    /// The current observation of the referenced record.
    pub fn value(&self) -> ReferenceValue {
        self.state.value.borrow().clone()
    }

    /// Number of change notifications this handle has received.
    pub fn changed_count(&self) -> u64 {
        self.state.changed.get()
    }
}

impl std::fmt::Debug for AnnotationReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationReference")
            .field("id", &self.state.id)
            .field("changed", &self.state.changed.get())
            .finish()
    }
}

/// A mutable keyed collection of annotations bound to one schema.
pub struct AnnotationStore {
    schema: AnnotationSchema,
    annotations: HashMap<AnnotationId, Rc<Annotation>>,
    order: Vec<AnnotationId>,
    pending: HashSet<AnnotationId>,
    references: Rc<ReferenceRegistry>,
    change_count: Cell<u64>,
}

impl AnnotationStore {
    /// Creates an empty store bound to `schema`.
    pub fn new(schema: AnnotationSchema) -> Self {
        Self {
            schema,
            annotations: HashMap::new(),
            order: Vec::new(),
            pending: HashSet::new(),
            references: Rc::new(RefCell::new(HashMap::new())),
            change_count: Cell::new(0),
        }
    }

    /// The schema governing this store.
    pub fn schema(&self) -> &AnnotationSchema {
        &self.schema
    }

    /// Monotonic counter bumped on every mutation.
    pub fn change_count(&self) -> u64 {
        self.change_count.get()
    }

    /// Number of records, pending included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns true if `id` is pending (added but not committed).
    pub fn is_pending(&self, id: &AnnotationId) -> bool {
        self.pending.contains(id)
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &AnnotationId) -> Option<Rc<Annotation>> {
        self.annotations.get(id).cloned()
    }

    /// Iterates all current records, pending included, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<Annotation>> {
        self.order.iter().map(|id| &self.annotations[id])
    }

    /// Iterates committed (non-pending) records in insertion order.
    pub fn iter_committed(&self) -> impl Iterator<Item = &Rc<Annotation>> {
        self.order
            .iter()
            .filter(|id| !self.pending.contains(*id))
            .map(|id| &self.annotations[id])
    }

    /// Adds a record and returns a handle to it.
    ///
    /// Fails on schema violations and on a duplicate id. With
    /// `commit = false` the record is marked pending and excluded from
    /// serialized output until [`AnnotationStore::commit`].
    pub fn add(
        &mut self,
        annotation: Annotation,
        commit: bool,
    ) -> Result<AnnotationReference, AnnopackError> {
        annotation.validate(&self.schema)?;
        let id = annotation.id.clone();
        if self.annotations.contains_key(&id) {
            return Err(AnnopackError::DuplicateAnnotationId(id.0));
        }

        let record = Rc::new(annotation);
        self.annotations.insert(id.clone(), Rc::clone(&record));
        self.order.push(id.clone());
        if !commit {
            self.pending.insert(id.clone());
        }
        self.bump();

        let reference = self.obtain_reference(&id);
        Self::notify(&reference.state, ReferenceValue::Present(record));
        Ok(reference)
    }

    /// Clears pending status for the referenced id. Idempotent.
    pub fn commit(&mut self, reference: &AnnotationReference) {
        if self.pending.remove(reference.id()) {
            self.bump();
        }
    }

    /// Replaces the referenced record wholesale.
    ///
    /// Fails if the reference observed a deletion or if the new record's
    /// id differs from the reference's id; id stability is a
    /// precondition, not a rename mechanism.
    pub fn update(
        &mut self,
        reference: &AnnotationReference,
        annotation: Annotation,
    ) -> Result<(), AnnopackError> {
        if reference.value().is_deleted() {
            return Err(AnnopackError::ReferenceDeleted(reference.id().0.clone()));
        }
        if annotation.id != *reference.id() {
            return Err(AnnopackError::IdMismatch {
                reference: reference.id().0.clone(),
                annotation: annotation.id.0,
            });
        }
        annotation.validate(&self.schema)?;

        let record = Rc::new(annotation);
        self.annotations
            .insert(record.id.clone(), Rc::clone(&record));
        self.bump();
        Self::notify(&reference.state, ReferenceValue::Present(record));
        Ok(())
    }

    /// Removes the referenced record. No-op if already deleted.
    pub fn delete(&mut self, reference: &AnnotationReference) -> Result<(), AnnopackError> {
        if reference.value().is_deleted() {
            return Ok(());
        }
        let id = reference.id().clone();
        if self.annotations.remove(&id).is_none() {
            // Unresolved handle to an id that never existed.
            Self::notify(&reference.state, ReferenceValue::Deleted);
            return Ok(());
        }
        self.order.retain(|existing| *existing != id);
        self.pending.remove(&id);
        self.bump();
        Self::notify(&reference.state, ReferenceValue::Deleted);
        Ok(())
    }

    /// Returns the shared handle for `id`, creating one lazily.
    ///
    /// The handle's value is initialized from current store state:
    /// deleted if the id is not present.
    pub fn get_reference(&self, id: &AnnotationId) -> AnnotationReference {
        let reference = self.obtain_reference(id);
        // Resolve an unresolved handle against current contents.
        if matches!(*reference.state.value.borrow(), ReferenceValue::Unresolved) {
            let value = match self.annotations.get(id) {
                Some(record) => ReferenceValue::Present(Rc::clone(record)),
                None => ReferenceValue::Deleted,
            };
            *reference.state.value.borrow_mut() = value;
        }
        reference
    }

    /// Exports committed records to their persisted JSON form.
    pub fn to_json(&self) -> Vec<AnnotationJson> {
        self.iter_committed()
            .map(|record| annotation_to_json(record, &self.schema))
            .collect()
    }

    /// Replaces the whole collection from persisted records.
    ///
    /// All records are parsed and validated before anything is applied;
    /// a single malformed record aborts the restore and leaves the store
    /// untouched. Every live reference is re-resolved against the new
    /// contents and notified.
    pub fn restore_state(&mut self, records: &[AnnotationJson]) -> Result<(), AnnopackError> {
        let mut annotations = HashMap::new();
        let mut order = Vec::with_capacity(records.len());
        for record in records {
            let annotation = annotation_from_json(record, &self.schema)?;
            let id = annotation.id.clone();
            if annotations.insert(id.clone(), Rc::new(annotation)).is_some() {
                return Err(AnnopackError::DuplicateAnnotationId(id.0));
            }
            order.push(id);
        }

        self.annotations = annotations;
        self.order = order;
        self.pending.clear();
        self.bump();
        self.resolve_all_references();
        Ok(())
    }

    /// Removes every record and notifies all live references.
    pub fn clear(&mut self) {
        self.annotations.clear();
        self.order.clear();
        self.pending.clear();
        self.bump();
        self.resolve_all_references();
    }

    fn bump(&self) {
        self.change_count.set(self.change_count.get() + 1);
    }

    fn obtain_reference(&self, id: &AnnotationId) -> AnnotationReference {
        if let Some(existing) = self.references.borrow().get(id).and_then(Weak::upgrade) {
            return AnnotationReference { state: existing };
        }
        let state = Rc::new(ReferenceState {
            id: id.clone(),
            value: RefCell::new(ReferenceValue::Unresolved),
            changed: Cell::new(0),
            registry: Rc::downgrade(&self.references),
        });
        self.references
            .borrow_mut()
            .insert(id.clone(), Rc::downgrade(&state));
        AnnotationReference { state }
    }

    fn notify(state: &Rc<ReferenceState>, value: ReferenceValue) {
        *state.value.borrow_mut() = value;
        state.changed.set(state.changed.get() + 1);
    }

    fn resolve_all_references(&self) {
        let states: Vec<Rc<ReferenceState>> = self
            .references
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect();
        for state in states {
            let value = match self.annotations.get(&state.id) {
                Some(record) => ReferenceValue::Present(Rc::clone(record)),
                None => ReferenceValue::Deleted,
            };
            Self::notify(&state, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::io_json::{from_json_str, to_json_string};
    use crate::model::property::{PropertySpec, PropertyType};
    use crate::model::AnnotationGeometry;

    fn schema() -> AnnotationSchema {
        AnnotationSchema::with_properties(
            2,
            vec![PropertySpec::new("size", PropertyType::Float32).with_default(1.0)],
            vec!["segments".into()],
        )
        .unwrap()
    }

    fn point(id: &str, x: f32, y: f32) -> Annotation {
        Annotation::with_id(id, AnnotationGeometry::Point { point: vec![x, y] })
            .with_properties(vec![1.0])
            .with_segments(vec![vec![]])
    }

    #[test]
    fn test_add_get_and_iteration_order() {
        let mut store = AnnotationStore::new(schema());
        store.add(point("a", 0.0, 0.0), true).unwrap();
        store.add(point("b", 1.0, 1.0), true).unwrap();
        store.add(point("c", 2.0, 2.0), true).unwrap();

        let ids: Vec<&str> = store.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(store.get(&AnnotationId::from("b")).is_some());
        assert!(store.get(&AnnotationId::from("z")).is_none());
    }

    #[test]
    fn test_duplicate_add_is_an_error() {
        let mut store = AnnotationStore::new(schema());
        store.add(point("a", 0.0, 0.0), true).unwrap();
        assert!(matches!(
            store.add(point("a", 1.0, 1.0), true),
            Err(AnnopackError::DuplicateAnnotationId(_))
        ));
    }

    #[test]
    fn test_references_share_one_registration() {
        let mut store = AnnotationStore::new(schema());
        store.add(point("a", 0.0, 0.0), true).unwrap();

        let id = AnnotationId::from("a");
        let first = store.get_reference(&id);
        let second = store.get_reference(&id);

        let before_first = first.changed_count();
        let before_second = second.changed_count();

        let updated = point("a", 9.0, 9.0);
        store.update(&first, updated.clone()).unwrap();

        // Both handles observe the same value and exactly one notification.
        assert_eq!(first.changed_count(), before_first + 1);
        assert_eq!(second.changed_count(), before_second + 1);
        let value = second.value();
        assert_eq!(value.annotation().unwrap().geometry, updated.geometry);
    }

    #[test]
    fn test_delete_notifies_each_handle_exactly_once() {
        let mut store = AnnotationStore::new(schema());
        let reference = store.add(point("a", 0.0, 0.0), true).unwrap();
        let other = store.get_reference(&AnnotationId::from("a"));

        let before = other.changed_count();
        store.delete(&reference).unwrap();
        assert!(reference.value().is_deleted());
        assert!(other.value().is_deleted());
        assert_eq!(other.changed_count(), before + 1);

        // Second delete is a no-op, no further notification.
        store.delete(&reference).unwrap();
        assert_eq!(other.changed_count(), before + 1);
    }

    #[test]
    fn test_update_after_delete_is_an_error() {
        let mut store = AnnotationStore::new(schema());
        let reference = store.add(point("a", 0.0, 0.0), true).unwrap();
        store.delete(&reference).unwrap();
        assert!(matches!(
            store.update(&reference, point("a", 1.0, 1.0)),
            Err(AnnopackError::ReferenceDeleted(_))
        ));
    }

    #[test]
    fn test_update_rejects_id_mismatch() {
        let mut store = AnnotationStore::new(schema());
        let reference = store.add(point("a", 0.0, 0.0), true).unwrap();
        assert!(matches!(
            store.update(&reference, point("b", 1.0, 1.0)),
            Err(AnnopackError::IdMismatch { .. })
        ));
    }

    #[test]
    fn test_reference_for_unknown_id_is_deleted() {
        let store = AnnotationStore::new(schema());
        let reference = store.get_reference(&AnnotationId::from("missing"));
        assert!(reference.value().is_deleted());
    }

    #[test]
    fn test_registration_retires_with_last_holder() {
        let mut store = AnnotationStore::new(schema());
        store.add(point("a", 0.0, 0.0), true).unwrap();

        let id = AnnotationId::from("a");
        {
            let first = store.get_reference(&id);
            let second = first.clone();
            assert_eq!(store.references.borrow().len(), 1);
            drop(first);
            assert_eq!(store.references.borrow().len(), 1);
            drop(second);
        }
        assert!(store.references.borrow().is_empty());
    }

    #[test]
    fn test_pending_excluded_from_json_until_commit() {
        let mut store = AnnotationStore::new(schema());
        store.add(point("a", 0.0, 0.0), true).unwrap();
        let pending = store.add(point("b", 1.0, 1.0), false).unwrap();

        assert_eq!(store.len(), 2);
        let exported = store.to_json();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].id.as_deref(), Some("a"));

        store.commit(&pending);
        assert!(!store.is_pending(&AnnotationId::from("b")));
        assert_eq!(store.to_json().len(), 2);

        // Idempotent; a second commit changes nothing.
        let count = store.change_count();
        store.commit(&pending);
        assert_eq!(store.change_count(), count);
    }

    #[test]
    fn test_change_count_bumps_on_every_mutation() {
        let mut store = AnnotationStore::new(schema());
        let c0 = store.change_count();
        let reference = store.add(point("a", 0.0, 0.0), true).unwrap();
        let c1 = store.change_count();
        assert!(c1 > c0);
        store.update(&reference, point("a", 1.0, 1.0)).unwrap();
        let c2 = store.change_count();
        assert!(c2 > c1);
        store.delete(&reference).unwrap();
        assert!(store.change_count() > c2);
    }

    #[test]
    fn test_json_roundtrip_through_restore() {
        let mut store = AnnotationStore::new(schema());
        store
            .add(
                point("a", 0.5, 1.5).with_description("first"),
                true,
            )
            .unwrap();
        store
            .add(
                Annotation::with_id(
                    "b",
                    AnnotationGeometry::Ellipsoid {
                        center: vec![1.0, 2.0],
                        radii: vec![3.0, 4.0],
                    },
                )
                .with_properties(vec![2.0])
                .with_segments(vec![vec![7, 8]]),
                true,
            )
            .unwrap();

        let json = to_json_string(&store.to_json()).unwrap();
        let parsed = from_json_str(&json).unwrap();

        let mut restored = AnnotationStore::new(schema());
        restored.restore_state(&parsed).unwrap();

        assert_eq!(restored.len(), 2);
        let ids: Vec<&str> = restored.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let b = restored.get(&AnnotationId::from("b")).unwrap();
        assert_eq!(b.related_segments, Some(vec![vec![7, 8]]));
        assert_eq!(b.properties, vec![2.0]);
    }

    #[test]
    fn test_restore_is_all_or_nothing() {
        let mut store = AnnotationStore::new(schema());
        store.add(point("keep", 0.0, 0.0), true).unwrap();

        // Second record has the wrong rank; nothing must be applied.
        let parsed = from_json_str(
            r#"[
                {"type":"point","id":"x","point":[0,0],"props":[1]},
                {"type":"point","id":"y","point":[0,0,0],"props":[1]}
            ]"#,
        )
        .unwrap();
        assert!(store.restore_state(&parsed).is_err());
        assert_eq!(store.len(), 1);
        assert!(store.get(&AnnotationId::from("keep")).is_some());
    }

    #[test]
    fn test_restore_re_resolves_live_references() {
        let mut store = AnnotationStore::new(schema());
        let reference = store.add(point("a", 0.0, 0.0), true).unwrap();

        let parsed = from_json_str(
            r#"[{"type":"point","id":"b","point":[1,1],"props":[2]}]"#,
        )
        .unwrap();
        let before = reference.changed_count();
        store.restore_state(&parsed).unwrap();

        // "a" is gone in the new contents; its reference observes the
        // deletion and is notified.
        assert!(reference.value().is_deleted());
        assert_eq!(reference.changed_count(), before + 1);
        assert!(store.get(&AnnotationId::from("b")).is_some());
    }

    #[test]
    fn test_clear_empties_and_notifies() {
        let mut store = AnnotationStore::new(schema());
        let reference = store.add(point("a", 0.0, 0.0), true).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(reference.value().is_deleted());
    }
}
