//! Identity bookkeeping between stream ids and heap objects.

use alloc::format;
use alloc::string::{String, ToString};

use log::trace;
use strand_utils::hash::HashMap;

use crate::value::ObjectId;

/// Why a reference operation could not be completed.
///
/// These failures mean the id space of one operation is inconsistent and
/// are never recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceError(pub String);

impl core::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::error::Error for ReferenceError {}

/// Maps stream reference ids to objects and back.
///
/// One resolver normally lives for a single serialize or deserialize call;
/// pass one explicitly to share ids across several calls.
pub trait ReferenceResolver {
    /// The object registered under `id`, if any.
    fn resolve_reference(&self, id: &str) -> Option<ObjectId>;

    /// The id of `target`, assigning a new one on first request.
    fn reference_id(&mut self, target: ObjectId) -> String;

    /// Whether `target` already has an id.
    fn is_referenced(&self, target: ObjectId) -> bool;

    /// Registers an id read from the stream.
    fn add_reference(&mut self, id: &str, target: ObjectId) -> Result<(), ReferenceError>;
}

/// Assigns ids `"1"`, `"2"`, ... in first-seen order.
///
/// ```
/// use strand_graph::heap::{Heap, Instance};
/// use strand_graph::info::TypeKey;
/// use strand_graph::reference::{DefaultReferenceResolver, ReferenceResolver};
///
/// let mut heap = Heap::new();
/// let a = heap.alloc(Instance::new(TypeKey::ANY));
/// let b = heap.alloc(Instance::new(TypeKey::ANY));
///
/// let mut refs = DefaultReferenceResolver::new();
/// assert_eq!(refs.reference_id(a), "1");
/// assert_eq!(refs.reference_id(b), "2");
/// assert_eq!(refs.reference_id(a), "1");
/// assert_eq!(refs.resolve_reference("2"), Some(b));
/// assert!(refs.add_reference("1", b).is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct DefaultReferenceResolver {
    counter: u64,
    id_to_object: HashMap<String, ObjectId>,
    object_to_id: HashMap<ObjectId, String>,
}

impl DefaultReferenceResolver {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.id_to_object.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.id_to_object.is_empty()
    }
}

impl ReferenceResolver for DefaultReferenceResolver {
    fn resolve_reference(&self, id: &str) -> Option<ObjectId> {
        self.id_to_object.get(id).copied()
    }

    fn reference_id(&mut self, target: ObjectId) -> String {
        if let Some(id) = self.object_to_id.get(&target) {
            return id.clone();
        }
        // Skip ids already taken by `add_reference`.
        let id = loop {
            self.counter += 1;
            let id = self.counter.to_string();
            if !self.id_to_object.contains_key(&id) {
                break id;
            }
        };
        trace!("assigned reference id {id} to {target:?}");
        self.id_to_object.insert(id.clone(), target);
        self.object_to_id.insert(target, id.clone());
        id
    }

    #[inline]
    fn is_referenced(&self, target: ObjectId) -> bool {
        self.object_to_id.contains_key(&target)
    }

    fn add_reference(&mut self, id: &str, target: ObjectId) -> Result<(), ReferenceError> {
        if let Some(existing) = self.id_to_object.get(id) {
            return Err(ReferenceError(if *existing == target {
                format!("Reference id '{id}' was registered twice.")
            } else {
                format!("Error reading object reference '{id}': id is already used by another object.")
            }));
        }
        if let Some(existing) = self.object_to_id.get(&target) {
            return Err(ReferenceError(format!(
                "Error reading object reference '{id}': object already has reference id '{existing}'."
            )));
        }
        self.id_to_object.insert(id.into(), target);
        self.object_to_id.insert(target, id.into());
        Ok(())
    }
}

impl<R: ReferenceResolver + ?Sized> ReferenceResolver for &mut R {
    #[inline]
    fn resolve_reference(&self, id: &str) -> Option<ObjectId> {
        (**self).resolve_reference(id)
    }

    #[inline]
    fn reference_id(&mut self, target: ObjectId) -> String {
        (**self).reference_id(target)
    }

    #[inline]
    fn is_referenced(&self, target: ObjectId) -> bool {
        (**self).is_referenced(target)
    }

    #[inline]
    fn add_reference(&mut self, id: &str, target: ObjectId) -> Result<(), ReferenceError> {
        (**self).add_reference(id, target)
    }
}

#[cfg(test)]
mod tests {
    use super::{DefaultReferenceResolver, ReferenceResolver};
    use crate::heap::{Heap, Instance};
    use crate::info::TypeKey;

    #[test]
    fn external_ids() {
        let mut heap = Heap::new();
        let a = heap.alloc(Instance::new(TypeKey::ANY));
        let b = heap.alloc(Instance::new(TypeKey::ANY));
        let c = heap.alloc(Instance::new(TypeKey::ANY));

        let mut refs = DefaultReferenceResolver::new();
        refs.add_reference("1", a).unwrap();
        refs.add_reference("abc", b).unwrap();
        assert_eq!(refs.reference_id(c), "2");
        assert_eq!(refs.reference_id(b), "abc");
        assert!(refs.is_referenced(a));
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn conflicts_are_fatal() {
        let mut heap = Heap::new();
        let a = heap.alloc(Instance::new(TypeKey::ANY));
        let b = heap.alloc(Instance::new(TypeKey::ANY));

        let mut refs = DefaultReferenceResolver::new();
        refs.add_reference("x", a).unwrap();
        assert!(refs.add_reference("x", a).is_err());
        assert!(refs.add_reference("x", b).is_err());
        assert!(refs.add_reference("y", a).is_err());
        assert_eq!(refs.resolve_reference("x"), Some(a));
    }
}
