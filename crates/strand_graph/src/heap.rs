//! Arena of typed instances forming the object graph.

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use chrono::{DateTime, FixedOffset};
use slotmap::SlotMap;
use strand_utils::hash::HashMap;
use uuid::Uuid;

use crate::info::TypeKey;
use crate::value::{EnumValue, ObjectId, Value};

// -----------------------------------------------------------------------------
// Entries

/// Hashable image of an entry key. Equal keys have equal images.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Char(char),
    String(String),
    Date(DateTime<FixedOffset>),
    Guid(Uuid),
    Bytes(Vec<u8>),
    Enum(EnumValue),
    Object(ObjectId),
}

/// A key type of [`Entries`].
pub trait EntryKey: PartialEq {
    /// `None` for keys that cannot be hashed; those are matched by a scan.
    fn index_key(&self) -> Option<IndexKey>;
}

impl EntryKey for String {
    #[inline]
    fn index_key(&self) -> Option<IndexKey> {
        Some(IndexKey::String(self.clone()))
    }
}

impl EntryKey for Value {
    fn index_key(&self) -> Option<IndexKey> {
        let key = match self {
            Value::Null => IndexKey::Null,
            Value::Bool(v) => IndexKey::Bool(*v),
            Value::Int(v) => IndexKey::Int(*v),
            Value::Float(v) if v.is_nan() => return None,
            // 0.0 == -0.0
            Value::Float(v) => IndexKey::Float((*v + 0.0).to_bits()),
            Value::Char(v) => IndexKey::Char(*v),
            Value::String(v) => IndexKey::String(v.clone()),
            Value::Date(v) => IndexKey::Date(*v),
            Value::Guid(v) => IndexKey::Guid(*v),
            Value::Bytes(v) => IndexKey::Bytes(v.clone()),
            Value::Enum(v) => IndexKey::Enum(*v),
            Value::Object(v) => IndexKey::Object(*v),
            Value::Node(_) => return None,
        };
        Some(key)
    }
}

/// Insertion-ordered key/value pairs with unique keys.
///
/// Lookups and inserts go through a hash index, so filling a body with `n`
/// entries is linear in `n`.
///
/// ```
/// use strand_graph::heap::Entries;
/// use strand_graph::value::Value;
///
/// let mut entries = Entries::<String>::new();
/// entries.insert("b".into(), Value::Int(1));
/// entries.insert("a".into(), Value::Int(2));
/// entries.insert("b".into(), Value::Int(3));
///
/// assert_eq!(entries.get(&"b".into()), Some(&Value::Int(3)));
/// assert_eq!(entries.as_slice()[0], ("b".into(), Value::Int(3)));
/// assert_eq!(entries.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Entries<K> {
    pairs: Vec<(K, Value)>,
    index: HashMap<IndexKey, usize>,
}

impl<K> Default for Entries<K> {
    #[inline]
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            index: HashMap::default(),
        }
    }
}

impl<K: PartialEq> PartialEq for Entries<K> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl<K: EntryKey> Entries<K> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &K) -> Option<usize> {
        match key.index_key() {
            Some(hashed) => self.index.get(&hashed).copied(),
            None => self.pairs.iter().position(|(k, _)| k == key),
        }
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&Value> {
        self.position(key).map(|i| &self.pairs[i].1)
    }

    /// Replaces the value of an existing key in place, or appends the pair.
    pub fn insert(&mut self, key: K, value: Value) {
        if let Some(i) = self.position(&key) {
            self.pairs[i].1 = value;
            return;
        }
        if let Some(hashed) = key.index_key() {
            self.index.insert(hashed, self.pairs.len());
        }
        self.pairs.push((key, value));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[(K, Value)] {
        &self.pairs
    }

    #[inline]
    pub fn into_vec(self) -> Vec<(K, Value)> {
        self.pairs
    }
}

impl<K: EntryKey> FromIterator<(K, Value)> for Entries<K> {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut entries = Self::new();
        for (key, value) in iter {
            entries.insert(key, value);
        }
        entries
    }
}

// -----------------------------------------------------------------------------
// Body

/// Collection storage of an [`Instance`], if the type has one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Ordered elements of a one-dimensional sequence.
    List(Vec<Value>),
    /// Row-major elements of a multidimensional array.
    Grid { dims: Vec<usize>, items: Vec<Value> },
    /// Insertion-ordered key/value pairs.
    Map(Entries<Value>),
    /// Members added at runtime to a dynamic object.
    Dynamic(Entries<String>),
}

// -----------------------------------------------------------------------------
// Instance

/// A single object: its runtime type, member slots and collection body.
///
/// Slot layout is defined by the type's members, base type slots first.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub ty: TypeKey,
    pub slots: Vec<Value>,
    pub body: Body,
}

impl Instance {
    #[inline]
    pub fn new(ty: TypeKey) -> Self {
        Self {
            ty,
            slots: Vec::new(),
            body: Body::Empty,
        }
    }

    #[inline]
    pub fn list(ty: TypeKey, items: Vec<Value>) -> Self {
        Self {
            ty,
            slots: Vec::new(),
            body: Body::List(items),
        }
    }

    #[inline]
    pub fn grid(ty: TypeKey, dims: Vec<usize>, items: Vec<Value>) -> Self {
        Self {
            ty,
            slots: Vec::new(),
            body: Body::Grid { dims, items },
        }
    }

    #[inline]
    pub fn map(ty: TypeKey, entries: Vec<(Value, Value)>) -> Self {
        Self {
            ty,
            slots: Vec::new(),
            body: Body::Map(entries.into_iter().collect()),
        }
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Elements of a list or grid body.
    pub fn items(&self) -> Option<&[Value]> {
        match &self.body {
            Body::List(items) | Body::Grid { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn items_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.body {
            Body::List(items) | Body::Grid { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&[(Value, Value)]> {
        match &self.body {
            Body::Map(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// Looks up a map entry by key.
    pub fn entry(&self, key: &Value) -> Option<&Value> {
        match &self.body {
            Body::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Inserts or replaces a map entry; returns `false` if the body is not a map.
    pub fn insert_entry(&mut self, key: Value, value: Value) -> bool {
        let Body::Map(entries) = &mut self.body else {
            return false;
        };
        entries.insert(key, value);
        true
    }

    pub fn dynamic_members(&self) -> Option<&[(String, Value)]> {
        match &self.body {
            Body::Dynamic(members) => Some(members.as_slice()),
            _ => None,
        }
    }

    /// Sets a runtime member; returns `false` if the body is not dynamic.
    pub fn set_dynamic_member(&mut self, name: &str, value: Value) -> bool {
        let Body::Dynamic(members) = &mut self.body else {
            return false;
        };
        members.insert(name.into(), value);
        true
    }
}

// -----------------------------------------------------------------------------
// Heap

/// Owner of every instance in a graph.
///
/// Values refer to instances by [`ObjectId`], so shared references and cycles
/// are plain id equality.
///
/// # Example
///
/// ```
/// use strand_graph::heap::{Heap, Instance};
/// use strand_graph::info::TypeKey;
/// use strand_graph::value::Value;
///
/// let mut heap = Heap::new();
/// let list = heap.alloc(Instance::list(TypeKey::ANY, vec![Value::Int(1)]));
/// let outer = heap.alloc(Instance::list(TypeKey::ANY, vec![Value::Object(list)]));
///
/// assert_eq!(heap[outer].items().unwrap()[0], Value::Object(list));
/// assert_eq!(heap.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: SlotMap<ObjectId, Instance>,
}

impl Heap {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self, instance: Instance) -> ObjectId {
        self.objects.insert(instance)
    }

    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<&Instance> {
        self.objects.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Instance> {
        self.objects.get_mut(id)
    }

    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    #[inline]
    pub fn remove(&mut self, id: ObjectId) -> Option<Instance> {
        self.objects.remove(id)
    }

    #[inline]
    pub fn type_of(&self, id: ObjectId) -> Option<TypeKey> {
        self.objects.get(id).map(|inst| inst.ty)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Instance)> {
        self.objects.iter()
    }
}

impl Index<ObjectId> for Heap {
    type Output = Instance;

    #[inline]
    fn index(&self, id: ObjectId) -> &Instance {
        &self.objects[id]
    }
}

impl IndexMut<ObjectId> for Heap {
    #[inline]
    fn index_mut(&mut self, id: ObjectId) -> &mut Instance {
        &mut self.objects[id]
    }
}

#[cfg(test)]
mod tests {
    use super::{Body, Entries, Heap, Instance};
    use crate::info::TypeKey;
    use crate::value::Value;

    #[test]
    fn map_entries() {
        let mut inst = Instance::map(TypeKey::ANY, Vec::new());
        assert!(inst.insert_entry("a".into(), Value::Int(1)));
        assert!(inst.insert_entry("b".into(), Value::Int(2)));
        assert!(inst.insert_entry("a".into(), Value::Int(3)));
        assert_eq!(inst.entries().unwrap().len(), 2);
        assert_eq!(inst.entry(&"a".into()), Some(&Value::Int(3)));

        let mut plain = Instance::new(TypeKey::ANY);
        assert!(!plain.insert_entry(Value::Null, Value::Null));
    }

    #[test]
    fn indexed_entries() {
        let mut entries = Entries::<Value>::new();
        for i in 0..10_000 {
            entries.insert(Value::Int(i), Value::Int(i));
        }
        for i in (0..10_000).step_by(2) {
            entries.insert(Value::Int(i), Value::Null);
        }
        assert_eq!(entries.len(), 10_000);
        assert_eq!(entries.get(&Value::Int(42)), Some(&Value::Null));
        assert_eq!(entries.get(&Value::Int(43)), Some(&Value::Int(43)));
        assert_eq!(entries.as_slice()[9_999].0, Value::Int(9_999));

        entries.insert(Value::Float(-0.0), Value::Int(1));
        entries.insert(Value::Float(0.0), Value::Int(2));
        assert_eq!(entries.len(), 10_001);
        assert_eq!(entries.get(&Value::Float(-0.0)), Some(&Value::Int(2)));

        // NaN never equals itself.
        entries.insert(Value::Float(f64::NAN), Value::Null);
        entries.insert(Value::Float(f64::NAN), Value::Null);
        assert_eq!(entries.len(), 10_003);
    }

    #[test]
    fn dynamic_members() {
        let mut inst = Instance::new(TypeKey::ANY);
        inst.body = Body::Dynamic(Entries::new());
        inst.set_dynamic_member("x", Value::Int(1));
        inst.set_dynamic_member("x", Value::Int(2));
        assert_eq!(inst.dynamic_members().unwrap(), &[("x".into(), Value::Int(2))]);
    }

    #[test]
    fn identity() {
        let mut heap = Heap::new();
        let a = heap.alloc(Instance::new(TypeKey::ANY));
        let b = heap.alloc(Instance::new(TypeKey::ANY));
        assert_ne!(a, b);
        assert_eq!(heap[a], heap[b]);
        assert!(heap.remove(a).is_some());
        assert!(!heap.contains(a));
    }
}
