use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::ErrorContext;
use crate::heap::{Body, Entries, Heap, Instance};
use crate::info::{
    BoxError, ConstructorInfo, CustomAttributes, MemberInfo, PrimitiveType, TypeKey,
    impl_custom_attributes_fn,
};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// Closures

/// Builds a collection instance from its elements.
pub type SequenceCreateFn =
    Arc<dyn Fn(&mut Heap, TypeKey, Vec<Value>) -> Result<ObjectId, BoxError> + Send + Sync>;

/// Builds a dictionary instance from its entries.
pub type PairsCreateFn =
    Arc<dyn Fn(&mut Heap, TypeKey, Vec<(Value, Value)>) -> Result<ObjectId, BoxError> + Send + Sync>;

pub type ToStringFn = Arc<dyn Fn(&Heap, &Value) -> Result<String, BoxError> + Send + Sync>;
pub type FromStringFn = Arc<dyn Fn(&mut Heap, &str) -> Result<Value, BoxError> + Send + Sync>;
pub type ToPrimitiveFn = Arc<dyn Fn(&Heap, &Value) -> Result<Value, BoxError> + Send + Sync>;
pub type FromPrimitiveFn = Arc<dyn Fn(&mut Heap, Value) -> Result<Value, BoxError> + Send + Sync>;

/// Runs while an object is written; it may only observe the heap.
pub type SerializeCallback = Arc<dyn Fn(&Heap, ObjectId) -> Result<(), BoxError> + Send + Sync>;

/// Runs while an object is read.
pub type DeserializeCallback =
    Arc<dyn Fn(&mut Heap, ObjectId) -> Result<(), BoxError> + Send + Sync>;

/// Offered errors raised while this object was being processed.
pub type ErrorCallback = Arc<dyn Fn(ObjectId, &mut ErrorContext<'_>) + Send + Sync>;

// -----------------------------------------------------------------------------
// Shapes

/// Enumeration variants, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    pub(crate) variants: Vec<(String, i64)>,
}

impl EnumInfo {
    #[inline]
    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find_map(|(name, v)| (*v == value).then_some(name.as_str()))
    }

    /// Looks a variant up by name, exact match first.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.variants.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Any,
    Object,
    Array,
}

/// The type holds an ordered sequence of elements.
#[derive(Clone)]
pub struct ListShape {
    pub element: TypeKey,
    pub fixed_size: bool,
    pub read_only: bool,
    /// Number of dimensions; greater than one for multidimensional arrays.
    pub rank: usize,
    /// Builds an instance from all elements at once.
    pub creator: Option<SequenceCreateFn>,
}

impl ListShape {
    #[inline]
    pub fn new(element: TypeKey) -> Self {
        Self {
            element,
            fixed_size: false,
            read_only: false,
            rank: 1,
            creator: None,
        }
    }
}

/// The type holds key/value entries.
#[derive(Clone)]
pub struct MapShape {
    pub key: TypeKey,
    pub value: TypeKey,
    pub read_only: bool,
    pub creator: Option<PairsCreateFn>,
}

impl MapShape {
    #[inline]
    pub fn new(key: TypeKey, value: TypeKey) -> Self {
        Self {
            key,
            value,
            read_only: false,
            creator: None,
        }
    }
}

/// Round-trip through a string without losing information.
#[derive(Clone)]
pub struct StringConversion {
    pub to_string: ToStringFn,
    pub from_string: FromStringFn,
}

/// Represented on the wire as a primitive.
#[derive(Clone)]
pub struct PrimitiveConversion {
    pub primitive: PrimitiveType,
    pub to_primitive: ToPrimitiveFn,
    pub from_primitive: FromPrimitiveFn,
}

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_serializing: Vec<SerializeCallback>,
    pub on_serialized: Vec<SerializeCallback>,
    pub on_deserializing: Vec<DeserializeCallback>,
    pub on_deserialized: Vec<DeserializeCallback>,
    pub on_error: Vec<ErrorCallback>,
}

impl Callbacks {
    /// Appends `other`'s callbacks after this set's.
    pub fn extend(&mut self, other: &Callbacks) {
        self.on_serializing.extend(other.on_serializing.iter().cloned());
        self.on_serialized.extend(other.on_serialized.iter().cloned());
        self.on_deserializing.extend(other.on_deserializing.iter().cloned());
        self.on_deserialized.extend(other.on_deserialized.iter().cloned());
        self.on_error.extend(other.on_error.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.on_serializing.is_empty()
            && self.on_serialized.is_empty()
            && self.on_deserializing.is_empty()
            && self.on_deserialized.is_empty()
            && self.on_error.is_empty()
    }
}

// -----------------------------------------------------------------------------
// TypeKind

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// The root type.
    Any,
    Primitive(PrimitiveType),
    Enum(EnumInfo),
    /// A value that may be absent.
    Nullable(TypeKey),
    Document(DocumentKind),
    Interface,
    Class,
}

// -----------------------------------------------------------------------------
// TypeInfo

/// Everything the engine knows about one registered type.
///
/// A type is described by capabilities rather than a single category: a
/// class may at the same time declare members, hold a list body and
/// convert to a string. The contract resolver decides which capability
/// governs serialization.
#[derive(Clone)]
pub struct TypeInfo {
    pub(crate) key: TypeKey,
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) base: Option<TypeKey>,
    pub(crate) interfaces: Vec<TypeKey>,
    pub(crate) is_abstract: bool,
    pub(crate) members: Vec<MemberInfo>,
    pub(crate) constructors: Vec<ConstructorInfo>,
    pub(crate) list: Option<ListShape>,
    pub(crate) map: Option<MapShape>,
    pub(crate) string_conversion: Option<StringConversion>,
    pub(crate) primitive_conversion: Option<PrimitiveConversion>,
    pub(crate) dynamic: bool,
    pub(crate) instantiate_as: Option<TypeKey>,
    pub(crate) callbacks: Callbacks,
    pub(crate) template: Vec<Value>,
    pub(crate) attributes: Option<Arc<CustomAttributes>>,
}

impl TypeInfo {
    impl_custom_attributes_fn!(attributes);

    pub(crate) fn new(key: TypeKey, path: String, kind: TypeKind) -> Self {
        let name = short_name(&path).into();
        Self {
            key,
            path,
            name,
            kind,
            base: None,
            interfaces: Vec::new(),
            is_abstract: false,
            members: Vec::new(),
            constructors: Vec::new(),
            list: None,
            map: None,
            string_conversion: None,
            primitive_conversion: None,
            dynamic: false,
            instantiate_as: None,
            callbacks: Callbacks::default(),
            template: Vec::new(),
            attributes: None,
        }
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Full type path, e.g. `"demo::Person"` or `"List<i32>"`.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, e.g. `"Person"`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    #[inline]
    pub fn base(&self) -> Option<TypeKey> {
        self.base
    }

    #[inline]
    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    /// Members declared on this type only, in declaration order.
    #[inline]
    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }

    #[inline]
    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    #[inline]
    pub fn list(&self) -> Option<&ListShape> {
        self.list.as_ref()
    }

    #[inline]
    pub fn map(&self) -> Option<&MapShape> {
        self.map.as_ref()
    }

    #[inline]
    pub fn string_conversion(&self) -> Option<&StringConversion> {
        self.string_conversion.as_ref()
    }

    #[inline]
    pub fn primitive_conversion(&self) -> Option<&PrimitiveConversion> {
        self.primitive_conversion.as_ref()
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// The type actually created when this type is the target of a read.
    #[inline]
    pub fn created_type(&self) -> TypeKey {
        self.instantiate_as.unwrap_or(self.key)
    }

    #[inline]
    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Default slot values, base type slots first.
    #[inline]
    pub fn template(&self) -> &[Value] {
        &self.template
    }

    /// `null` is a legal value of this type.
    pub fn accepts_null(&self) -> bool {
        match &self.kind {
            TypeKind::Primitive(p) => p.is_reference_like(),
            TypeKind::Enum(_) => false,
            _ => true,
        }
    }

    /// Allocates an uninitialized instance laid out for this type.
    pub fn instantiate(&self) -> Instance {
        let body = if let Some(list) = &self.list {
            if list.rank > 1 {
                Body::Grid {
                    dims: alloc::vec![0; list.rank],
                    items: Vec::new(),
                }
            } else {
                Body::List(Vec::new())
            }
        } else if self.map.is_some() {
            Body::Map(Entries::new())
        } else if self.dynamic {
            Body::Dynamic(Entries::new())
        } else {
            Body::Empty
        };
        Instance {
            ty: self.key,
            slots: self.template.clone(),
            body,
        }
    }
}

impl core::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

/// `a::b::C<x::Y>` -> `C<x::Y>`.
pub(crate) fn short_name(path: &str) -> &str {
    let head = path.split('<').next().unwrap_or(path);
    match head.rfind("::") {
        Some(index) => &path[index + 2..],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::{EnumInfo, short_name};

    #[test]
    fn type_name() {
        assert_eq!(short_name("demo::Person"), "Person");
        assert_eq!(short_name("List<demo::Person>"), "List<demo::Person>");
        assert_eq!(short_name("a::b::Pair<x::Y>"), "Pair<x::Y>");
        assert_eq!(short_name("i32"), "i32");
    }

    #[test]
    fn enum_lookup() {
        let info = EnumInfo {
            variants: vec![("Red".into(), 0), ("Green".into(), 4)],
        };
        assert_eq!(info.name_of(4), Some("Green"));
        assert_eq!(info.value_of("red"), Some(0));
        assert_eq!(info.value_of("Blue"), None);
    }
}
