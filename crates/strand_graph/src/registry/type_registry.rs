use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, Utc};
use strand_utils::hash::{HashMap, HashSet};
use uuid::Uuid;

use crate::info::{
    DocumentKind, ListShape, MapShape, PrimitiveType, TypeBuilder, TypeInfo, TypeKey, TypeKind,
    short_name, slot_bindings,
};
use crate::registry::RegistryError;
use crate::value::{EnumValue, Value};

#[derive(Clone)]
enum Entry {
    Declared(String),
    Defined(TypeInfo),
}

impl Entry {
    fn path(&self) -> &str {
        match self {
            Entry::Declared(path) => path,
            Entry::Defined(info) => info.path(),
        }
    }
}

// -----------------------------------------------------------------------------
// TypeRegistry

/// Central table of every type the engine can serialize.
///
/// Types are added in two phases so they can refer to themselves:
/// [`declare`](Self::declare) reserves a [`TypeKey`] for a path and
/// [`define`](Self::define) attaches the description.
/// [`register`](Self::register) does both at once.
///
/// Builtin types (the root `Any`, the primitives and the document tree
/// types) are present from [`TypeRegistry::new`] at the fixed keys exposed
/// on [`TypeKey`].
///
/// # Example
///
/// ```
/// use strand_graph::info::{TypeBuilder, TypeKey};
/// use strand_graph::registry::TypeRegistry;
///
/// let mut registry = TypeRegistry::new();
/// let shape = registry
///     .register("geo::Shape", TypeBuilder::class().abstract_type())
///     .unwrap();
/// let circle = registry
///     .register(
///         "geo::Circle",
///         TypeBuilder::class()
///             .base(shape)
///             .field("Radius", TypeKey::F64)
///             .default_constructor(),
///     )
///     .unwrap();
///
/// assert!(registry.is_assignable(circle, shape));
/// assert!(!registry.is_assignable(shape, circle));
/// assert_eq!(registry.get_with_type_name("Circle").unwrap().key(), circle);
/// ```
#[derive(Clone)]
pub struct TypeRegistry {
    entries: Vec<Entry>,
    type_path_to_key: HashMap<String, TypeKey>,
    type_name_to_key: HashMap<String, TypeKey>,
    ambiguous_names: HashSet<String>,
    auto_registered: bool,
}

impl Default for TypeRegistry {
    /// See [`TypeRegistry::new`].
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates a registry holding only the builtin types.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            type_path_to_key: HashMap::default(),
            type_name_to_key: HashMap::default(),
            ambiguous_names: HashSet::default(),
            auto_registered: false,
        };

        registry.push_builtin("Any", TypeBuilder::kind(TypeKind::Any));
        for p in PrimitiveType::ALL {
            registry.push_builtin(p.type_path(), TypeBuilder::kind(TypeKind::Primitive(p)));
        }
        registry.push_builtin("Node", TypeBuilder::kind(TypeKind::Document(DocumentKind::Any)));
        registry.push_builtin(
            "NodeObject",
            TypeBuilder::kind(TypeKind::Document(DocumentKind::Object)).base(TypeKey::NODE),
        );
        registry.push_builtin(
            "NodeArray",
            TypeBuilder::kind(TypeKind::Document(DocumentKind::Array)).base(TypeKey::NODE),
        );
        debug_assert_eq!(registry.entries.len(), TypeKey::BUILTIN_COUNT as usize);
        registry
    }

    fn push_builtin(&mut self, path: &str, builder: TypeBuilder) {
        let key = TypeKey(self.entries.len() as u32);
        let base = builder.base_type().and_then(|b| self.get(b)).cloned();
        let info = builder.build(key, path.into(), base.as_ref(), Vec::new(), |_| Value::Null);
        self.add_indices(path, key);
        self.entries.push(Entry::Defined(info));
    }

    fn add_indices(&mut self, path: &str, key: TypeKey) {
        let name = String::from(short_name(path));
        if !self.ambiguous_names.contains(&name) {
            if self.type_name_to_key.contains_key(&name) {
                self.type_name_to_key.remove(&name);
                self.ambiguous_names.insert(name);
            } else {
                self.type_name_to_key.insert(name, key);
            }
        }
        self.type_path_to_key.insert(path.into(), key);
    }

    // -------------------------------------------------------------------------
    // Registration

    /// Reserves a key for `path` without describing the type yet.
    pub fn declare(&mut self, path: impl Into<String>) -> Result<TypeKey, RegistryError> {
        let path = path.into();
        if self.type_path_to_key.contains_key(&path) {
            return Err(RegistryError::DuplicatePath(path));
        }
        let key = TypeKey(self.entries.len() as u32);
        self.add_indices(&path, key);
        self.entries.push(Entry::Declared(path));
        Ok(key)
    }

    /// Describes a previously declared type.
    ///
    /// The base type and interfaces must already be defined.
    pub fn define(&mut self, key: TypeKey, builder: TypeBuilder) -> Result<(), RegistryError> {
        let path = match self.entries.get(key.index()) {
            None => return Err(RegistryError::UnknownKey(key)),
            Some(Entry::Defined(info)) => {
                return Err(RegistryError::AlreadyDefined(info.path().into()));
            }
            Some(Entry::Declared(path)) => path.clone(),
        };

        let mut chain: Vec<&TypeInfo> = Vec::new();
        if let Some(base) = builder.base_type() {
            let base_info = self.defined(base, &path)?;
            if !matches!(base_info.kind(), TypeKind::Class) {
                return Err(RegistryError::InvalidBase {
                    path,
                    base: base_info.path().into(),
                    reason: "only classes can be derived from",
                });
            }
            chain = self.base_chain(base);
        }
        for &interface in builder.interface_types() {
            let info = self.defined(interface, &path)?;
            if !info.is_interface() {
                return Err(RegistryError::NotAnInterface {
                    path,
                    interface: info.path().into(),
                });
            }
        }

        let base = chain.first().map(|b| (*b).clone());
        let inherited = slot_bindings(&chain);
        let info = builder.build(key, path, base.as_ref(), inherited, |ty| self.default_value(ty));
        self.entries[key.index()] = Entry::Defined(info);
        Ok(())
    }

    fn defined(&self, key: TypeKey, dependent: &str) -> Result<&TypeInfo, RegistryError> {
        match self.entries.get(key.index()) {
            None => Err(RegistryError::UnknownKey(key)),
            Some(Entry::Declared(path)) => Err(RegistryError::UndefinedDependency {
                path: dependent.into(),
                dependency: path.clone(),
            }),
            Some(Entry::Defined(info)) => Ok(info),
        }
    }

    /// Declares and defines a type in one step.
    pub fn register(
        &mut self,
        path: impl Into<String>,
        builder: TypeBuilder,
    ) -> Result<TypeKey, RegistryError> {
        let key = self.declare(path)?;
        self.define(key, builder)?;
        Ok(key)
    }

    /// Runs every function submitted with [`auto_register!`](crate::auto_register).
    ///
    /// Only the first call does any work. Returns the number of functions run.
    /// Without the `auto_register` feature this does nothing.
    pub fn auto_register(&mut self) -> Result<usize, RegistryError> {
        if self.auto_registered {
            return Ok(0);
        }
        self.auto_registered = true;

        #[cfg(feature = "auto_register")]
        {
            let mut count = 0;
            for registration in super::auto_register::registrations() {
                registration.run(self)?;
                count += 1;
            }
            log::debug!("auto registration ran {count} functions");
            Ok(count)
        }

        #[cfg(not(feature = "auto_register"))]
        Ok(0)
    }

    // -------------------------------------------------------------------------
    // Generic instantiation

    fn instantiate_generic(
        &mut self,
        path: String,
        builder: impl FnOnce() -> TypeBuilder,
    ) -> Result<TypeKey, RegistryError> {
        if let Some(&key) = self.type_path_to_key.get(&path) {
            return Ok(key);
        }
        self.register(path, builder())
    }

    fn path_or_err(&self, key: TypeKey) -> Result<String, RegistryError> {
        self.path_of(key)
            .map(String::from)
            .ok_or(RegistryError::UnknownKey(key))
    }

    /// `List<T>`: a growable sequence with a default constructor.
    pub fn list_of(&mut self, element: TypeKey) -> Result<TypeKey, RegistryError> {
        let path = format!("List<{}>", self.path_or_err(element)?);
        self.instantiate_generic(path, || {
            TypeBuilder::class()
                .list(ListShape::new(element))
                .default_constructor()
        })
    }

    /// `ReadOnlyList<T>`: built from all elements at once.
    pub fn read_only_list_of(&mut self, element: TypeKey) -> Result<TypeKey, RegistryError> {
        let path = format!("ReadOnlyList<{}>", self.path_or_err(element)?);
        self.instantiate_generic(path, || {
            TypeBuilder::class().list(ListShape {
                read_only: true,
                ..ListShape::new(element)
            })
        })
    }

    /// `T[]`, `T[,]`, ...: fixed-size arrays of the given rank.
    pub fn array_of(&mut self, element: TypeKey, rank: usize) -> Result<TypeKey, RegistryError> {
        let rank = rank.max(1);
        let commas = ",".repeat(rank - 1);
        let path = format!("{}[{commas}]", self.path_or_err(element)?);
        self.instantiate_generic(path, || {
            TypeBuilder::class().list(ListShape {
                fixed_size: true,
                rank,
                ..ListShape::new(element)
            })
        })
    }

    /// `Map<K, V>`: an insertion-ordered dictionary.
    pub fn map_of(&mut self, key: TypeKey, value: TypeKey) -> Result<TypeKey, RegistryError> {
        let path = format!("Map<{}, {}>", self.path_or_err(key)?, self.path_or_err(value)?);
        self.instantiate_generic(path, || {
            TypeBuilder::class()
                .map(MapShape::new(key, value))
                .default_constructor()
        })
    }

    pub fn read_only_map_of(&mut self, key: TypeKey, value: TypeKey) -> Result<TypeKey, RegistryError> {
        let path = format!(
            "ReadOnlyMap<{}, {}>",
            self.path_or_err(key)?,
            self.path_or_err(value)?
        );
        self.instantiate_generic(path, || {
            TypeBuilder::class().map(MapShape {
                read_only: true,
                ..MapShape::new(key, value)
            })
        })
    }

    /// `Option<T>`. Types that already accept null are returned unchanged.
    pub fn nullable_of(&mut self, inner: TypeKey) -> Result<TypeKey, RegistryError> {
        if let Some(info) = self.get(inner)
            && (info.accepts_null() || matches!(info.kind(), TypeKind::Nullable(_)))
        {
            return Ok(inner);
        }
        let path = format!("Option<{}>", self.path_or_err(inner)?);
        self.instantiate_generic(path, || TypeBuilder::kind(TypeKind::Nullable(inner)))
    }

    // -------------------------------------------------------------------------
    // Lookup

    /// Returns the description of a defined type.
    #[inline]
    pub fn get(&self, key: TypeKey) -> Option<&TypeInfo> {
        match self.entries.get(key.index()) {
            Some(Entry::Defined(info)) => Some(info),
            _ => None,
        }
    }

    /// Path of a declared or defined type.
    #[inline]
    pub fn path_of(&self, key: TypeKey) -> Option<&str> {
        self.entries.get(key.index()).map(Entry::path)
    }

    #[inline]
    pub fn contains(&self, key: TypeKey) -> bool {
        key.index() < self.entries.len()
    }

    pub fn key_of_path(&self, type_path: &str) -> Option<TypeKey> {
        self.type_path_to_key.get(type_path).copied()
    }

    pub fn get_with_type_path(&self, type_path: &str) -> Option<&TypeInfo> {
        self.key_of_path(type_path).and_then(|key| self.get(key))
    }

    /// Looks a type up by its short name.
    ///
    /// Returns `None` if the name is ambiguous, see [`Self::is_ambiguous`].
    pub fn key_of_name(&self, type_name: &str) -> Option<TypeKey> {
        self.type_name_to_key.get(type_name).copied()
    }

    pub fn get_with_type_name(&self, type_name: &str) -> Option<&TypeInfo> {
        self.key_of_name(type_name).and_then(|key| self.get(key))
    }

    #[inline]
    pub fn is_ambiguous(&self, type_name: &str) -> bool {
        self.ambiguous_names.contains(type_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Defined(info) => Some(info),
            Entry::Declared(_) => None,
        })
    }

    // -------------------------------------------------------------------------
    // Relations

    /// `ty` and its base types, most derived first.
    pub fn base_chain(&self, ty: TypeKey) -> Vec<&TypeInfo> {
        let mut chain = Vec::new();
        let mut next = Some(ty);
        while let Some(key) = next
            && let Some(info) = self.get(key)
        {
            chain.push(info);
            next = info.base();
        }
        chain
    }

    /// Interfaces implemented by `ty` or its bases, transitively, nearest first.
    pub fn all_interfaces(&self, ty: TypeKey) -> Vec<TypeKey> {
        let mut out: Vec<TypeKey> = Vec::new();
        let mut queue: VecDeque<TypeKey> = self
            .base_chain(ty)
            .iter()
            .flat_map(|info| info.interfaces().iter().copied())
            .collect();
        while let Some(key) = queue.pop_front() {
            if out.contains(&key) {
                continue;
            }
            out.push(key);
            if let Some(info) = self.get(key) {
                queue.extend(info.interfaces().iter().copied());
            }
        }
        out
    }

    /// Whether a value of type `from` may be stored where `to` is expected.
    pub fn is_assignable(&self, from: TypeKey, to: TypeKey) -> bool {
        if from == to || to == TypeKey::ANY {
            return true;
        }
        if let Some(info) = self.get(to)
            && let TypeKind::Nullable(inner) = info.kind()
        {
            return self.is_assignable(from, *inner);
        }
        if self.base_chain(from).iter().any(|info| info.key() == to) {
            return true;
        }
        self.all_interfaces(from).contains(&to)
    }

    /// Strips a nullable wrapper.
    pub fn non_nullable(&self, ty: TypeKey) -> TypeKey {
        match self.get(ty).map(TypeInfo::kind) {
            Some(TypeKind::Nullable(inner)) => *inner,
            _ => ty,
        }
    }

    /// The value a slot of type `ty` holds before anything is assigned.
    pub fn default_value(&self, ty: TypeKey) -> Value {
        let Some(info) = self.get(ty) else {
            return Value::Null;
        };
        match info.kind() {
            TypeKind::Primitive(p) => match p {
                PrimitiveType::Boolean => Value::Bool(false),
                PrimitiveType::Char => Value::Char('\0'),
                PrimitiveType::Float32 | PrimitiveType::Float64 => Value::Float(0.0),
                PrimitiveType::DateTime => Value::Date(DateTime::<Utc>::UNIX_EPOCH.fixed_offset()),
                PrimitiveType::Guid => Value::Guid(Uuid::nil()),
                PrimitiveType::String | PrimitiveType::Bytes => Value::Null,
                _ => Value::Int(0),
            },
            TypeKind::Enum(_) => Value::Enum(EnumValue { ty, value: 0 }),
            _ => Value::Null,
        }
    }
}

impl core::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(Entry::path))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::TypeRegistry;
    use crate::info::{TypeBuilder, TypeKey, TypeKind};
    use crate::registry::RegistryError;
    use crate::value::{EnumValue, Value};

    #[test]
    fn builtins() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.key_of_path("i32"), Some(TypeKey::I32));
        assert_eq!(registry.key_of_path("Any"), Some(TypeKey::ANY));
        assert_eq!(registry.get(TypeKey::NODE_OBJECT).unwrap().base(), Some(TypeKey::NODE));
        assert!(registry.is_assignable(TypeKey::NODE_ARRAY, TypeKey::NODE));
    }

    #[test]
    fn declare_then_define() {
        let mut registry = TypeRegistry::new();
        let node = registry.declare("demo::Tree").unwrap();
        let children = registry.list_of(node).unwrap();
        assert!(registry.get(node).is_none());
        registry
            .define(node, TypeBuilder::class().field("Children", children))
            .unwrap();
        assert_eq!(registry.get(node).unwrap().members().len(), 1);
        assert_eq!(registry.list_of(node).unwrap(), children);
        assert_eq!(registry.path_of(children), Some("List<demo::Tree>"));

        assert_eq!(
            registry.define(node, TypeBuilder::class()),
            Err(RegistryError::AlreadyDefined("demo::Tree".into()))
        );
    }

    #[test]
    fn undefined_base() {
        let mut registry = TypeRegistry::new();
        let base = registry.declare("demo::Base").unwrap();
        let err = registry
            .register("demo::Derived", TypeBuilder::class().base(base))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UndefinedDependency { .. }));
    }

    #[test]
    fn ambiguous_names() {
        let mut registry = TypeRegistry::new();
        registry.register("a::Item", TypeBuilder::class()).unwrap();
        registry.register("b::Item", TypeBuilder::class()).unwrap();
        assert!(registry.is_ambiguous("Item"));
        assert!(registry.get_with_type_name("Item").is_none());
        assert!(registry.get_with_type_path("b::Item").is_some());
    }

    #[test]
    fn slots_follow_base() {
        let mut registry = TypeRegistry::new();
        let base = registry
            .register(
                "demo::Base",
                TypeBuilder::class().field("A", TypeKey::I32).field("B", TypeKey::STRING),
            )
            .unwrap();
        let derived = registry
            .register(
                "demo::Derived",
                TypeBuilder::class().base(base).field("C", TypeKey::BOOL),
            )
            .unwrap();
        let info = registry.get(derived).unwrap();
        assert_eq!(
            info.template(),
            &[Value::Int(0), Value::Null, Value::Bool(false)]
        );
        assert!(registry.is_assignable(derived, base));
        assert!(registry.is_assignable(derived, TypeKey::ANY));
    }

    #[test]
    fn interfaces_and_nullable() {
        let mut registry = TypeRegistry::new();
        let named = registry.register("demo::INamed", TypeBuilder::interface()).unwrap();
        let labeled = registry
            .register("demo::ILabeled", TypeBuilder::interface().implements(named))
            .unwrap();
        let item = registry
            .register("demo::Item", TypeBuilder::class().implements(labeled))
            .unwrap();
        assert!(registry.is_assignable(item, named));
        assert_eq!(registry.all_interfaces(item), vec![labeled, named]);

        let opt = registry.nullable_of(TypeKey::I32).unwrap();
        assert!(matches!(registry.get(opt).unwrap().kind(), TypeKind::Nullable(_)));
        assert!(registry.is_assignable(TypeKey::I32, opt));
        assert_eq!(registry.non_nullable(opt), TypeKey::I32);
        assert_eq!(registry.nullable_of(TypeKey::STRING).unwrap(), TypeKey::STRING);

        let err = registry
            .register("demo::Bad", TypeBuilder::class().implements(item))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotAnInterface { .. }));
    }

    #[test]
    fn array_paths() {
        let mut registry = TypeRegistry::new();
        let grid = registry.array_of(TypeKey::I32, 2).unwrap();
        assert_eq!(registry.path_of(grid), Some("i32[,]"));
        assert_eq!(registry.get(grid).unwrap().list().unwrap().rank, 2);
    }

    #[test]
    fn enum_default_is_zero() {
        let mut registry = TypeRegistry::new();
        let color = registry
            .register("demo::Color", TypeBuilder::enumeration([("Red", 1), ("Green", 2)]))
            .unwrap();
        assert_eq!(
            registry.default_value(color),
            Value::Enum(EnumValue { ty: color, value: 0 })
        );
    }

    #[test]
    fn clones_are_independent() {
        let mut registry = TypeRegistry::new();
        let item = registry.register("demo::Item", TypeBuilder::class()).unwrap();
        let mut copy = registry.clone();
        let extra = copy.register("demo::Extra", TypeBuilder::class()).unwrap();

        assert_eq!(copy.get_with_type_path("demo::Item").unwrap().key(), item);
        assert!(copy.get(extra).is_some());
        assert!(registry.get_with_type_path("demo::Extra").is_none());
    }

    #[cfg(feature = "auto_register")]
    fn register_marker(registry: &mut TypeRegistry) -> Result<(), RegistryError> {
        registry.register("auto::Marker", TypeBuilder::class())?;
        Ok(())
    }

    #[cfg(feature = "auto_register")]
    crate::auto_register!(register_marker);

    #[cfg(feature = "auto_register")]
    #[test]
    fn auto_register() {
        let mut registry = TypeRegistry::new();
        let count = registry.auto_register().unwrap();
        assert!(count >= 1);
        assert!(registry.get_with_type_path("auto::Marker").is_some());
        assert_eq!(registry.auto_register().unwrap(), 0);
    }
}
