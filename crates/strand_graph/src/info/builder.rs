use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;

use crate::heap::Heap;
use crate::info::attributes::share_attributes;
use crate::info::{
    BoxError, Callbacks, ConstructFn, ConstructorInfo, CustomAttributes, DeserializeCallback,
    EnumInfo, ErrorCallback, GetFn, Getter, ListShape, MapShape, MemberInfo, MemberKind,
    ParameterInfo, PrimitiveConversion, PrimitiveType, SerializeCallback, SetFn, Setter,
    StringConversion, TypeInfo, TypeKey, TypeKind, Visibility,
};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// MemberBuilder

/// Describes a member before its type is defined.
///
/// A member without explicit accessors is stored in an instance slot.
///
/// ```
/// use strand_graph::info::{MemberBuilder, TypeKey};
///
/// let id = MemberBuilder::field("Id", TypeKey::I32).read_only();
/// let total = MemberBuilder::property("Total", TypeKey::F64)
///     .getter(|_heap, _id| Ok(42.0.into()));
/// # let _ = (id, total);
/// ```
pub struct MemberBuilder {
    name: String,
    ty: TypeKey,
    kind: MemberKind,
    visibility: Visibility,
    setter_visibility: Visibility,
    read_only: bool,
    get: Option<GetFn>,
    set: Option<SetFn>,
    default: Option<Value>,
    attributes: CustomAttributes,
}

impl MemberBuilder {
    fn new(name: impl Into<String>, ty: TypeKey, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
            visibility: Visibility::Public,
            setter_visibility: Visibility::Public,
            read_only: false,
            get: None,
            set: None,
            default: None,
            attributes: CustomAttributes::new(),
        }
    }

    pub fn field(name: impl Into<String>, ty: TypeKey) -> Self {
        Self::new(name, ty, MemberKind::Field)
    }

    pub fn property(name: impl Into<String>, ty: TypeKey) -> Self {
        Self::new(name, ty, MemberKind::Property)
    }

    /// Removes the setter.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self.setter_visibility = Visibility::NonPublic;
        self
    }

    pub fn non_public_setter(mut self) -> Self {
        self.setter_visibility = Visibility::NonPublic;
        self
    }

    /// Initial slot value for new instances.
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn getter<F>(mut self, get: F) -> Self
    where
        F: Fn(&Heap, ObjectId) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.get = Some(Arc::new(get));
        self
    }

    pub fn setter<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut Heap, ObjectId, Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(set));
        self
    }

    pub fn attribute<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.attributes.insert(value);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_computed(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }
}

// -----------------------------------------------------------------------------
// ConstructorBuilder

/// Describes a constructor.
///
/// Without an explicit body, each argument is stored in the slot of the
/// member whose name matches the parameter (case-insensitively).
pub struct ConstructorBuilder {
    parameters: Vec<ParameterInfo>,
    visibility: Visibility,
    body: Option<ConstructFn>,
    attributes: CustomAttributes,
}

impl ConstructorBuilder {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            visibility: Visibility::Public,
            body: None,
            attributes: CustomAttributes::new(),
        }
    }

    pub fn param(self, name: impl Into<String>, ty: TypeKey) -> Self {
        self.param_with(name, ty, CustomAttributes::new())
    }

    pub fn param_with(
        mut self,
        name: impl Into<String>,
        ty: TypeKey,
        attributes: CustomAttributes,
    ) -> Self {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            ty,
            attributes: share_attributes(attributes),
        });
        self
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Heap, ObjectId, &[Value]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn attribute<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.attributes.insert(value);
        self
    }

    fn build(self, slots: &[(String, usize)]) -> ConstructorInfo {
        let body: ConstructFn = match self.body {
            Some(body) => body,
            None => {
                let bindings: Vec<Option<usize>> = self
                    .parameters
                    .iter()
                    .map(|p| {
                        slots
                            .iter()
                            .rev()
                            .find(|(name, _)| name.eq_ignore_ascii_case(&p.name))
                            .map(|(_, slot)| *slot)
                    })
                    .collect();
                Arc::new(move |heap: &mut Heap, target: ObjectId, args: &[Value]| -> Result<(), BoxError> {
                    let inst = heap
                        .get_mut(target)
                        .ok_or_else(|| BoxError::from("constructor target is not allocated"))?;
                    for (arg, slot) in args.iter().zip(&bindings) {
                        if let Some(slot) = slot
                            && let Some(dst) = inst.slots.get_mut(*slot)
                        {
                            *dst = arg.clone();
                        }
                    }
                    Ok(())
                })
            }
        };
        ConstructorInfo {
            parameters: self.parameters,
            visibility: self.visibility,
            body,
            attributes: share_attributes(self.attributes),
        }
    }
}

// -----------------------------------------------------------------------------
// TypeBuilder

/// Describes a user type for [`TypeRegistry::define`](crate::registry::TypeRegistry::define).
///
/// # Example
///
/// ```
/// use strand_graph::info::{TypeBuilder, TypeKey};
/// use strand_graph::registry::TypeRegistry;
///
/// let mut registry = TypeRegistry::new();
/// let person = registry.declare("demo::Person").unwrap();
/// let people = registry.list_of(person).unwrap();
/// registry
///     .define(
///         person,
///         TypeBuilder::class()
///             .field("Name", TypeKey::STRING)
///             .field("Friends", people)
///             .default_constructor(),
///     )
///     .unwrap();
///
/// let info = registry.get(person).unwrap();
/// assert_eq!(info.name(), "Person");
/// assert_eq!(info.template().len(), 2);
/// ```
pub struct TypeBuilder {
    kind: TypeKind,
    base: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
    is_abstract: bool,
    members: Vec<MemberBuilder>,
    constructors: Vec<ConstructorBuilder>,
    list: Option<ListShape>,
    map: Option<MapShape>,
    string_conversion: Option<StringConversion>,
    primitive_conversion: Option<PrimitiveConversion>,
    dynamic: bool,
    instantiate_as: Option<TypeKey>,
    callbacks: Callbacks,
    attributes: CustomAttributes,
}

impl TypeBuilder {
    fn with_kind(kind: TypeKind) -> Self {
        Self {
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
            attributes: CustomAttributes::new(),
        }
    }

    pub fn class() -> Self {
        Self::with_kind(TypeKind::Class)
    }

    /// An interface; its members have no storage.
    pub fn interface() -> Self {
        Self::with_kind(TypeKind::Interface)
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self::with_kind(TypeKind::Enum(EnumInfo {
            variants: variants.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }))
    }

    pub(crate) fn kind(kind: TypeKind) -> Self {
        Self::with_kind(kind)
    }

    pub fn base(mut self, base: TypeKey) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: TypeKey) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn member(mut self, member: MemberBuilder) -> Self {
        self.members.push(member);
        self
    }

    /// Shorthand for a public, slot backed field.
    pub fn field(self, name: impl Into<String>, ty: TypeKey) -> Self {
        self.member(MemberBuilder::field(name, ty))
    }

    pub fn constructor(mut self, ctor: ConstructorBuilder) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Adds a public parameterless constructor.
    pub fn default_constructor(self) -> Self {
        self.constructor(ConstructorBuilder::new())
    }

    pub fn list(mut self, shape: ListShape) -> Self {
        self.list = Some(shape);
        self
    }

    pub fn map(mut self, shape: MapShape) -> Self {
        self.map = Some(shape);
        self
    }

    pub fn string_conversion<T, F>(mut self, to_string: T, from_string: F) -> Self
    where
        T: Fn(&Heap, &Value) -> Result<String, BoxError> + Send + Sync + 'static,
        F: Fn(&mut Heap, &str) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.string_conversion = Some(StringConversion {
            to_string: Arc::new(to_string),
            from_string: Arc::new(from_string),
        });
        self
    }

    pub fn primitive_conversion<T, F>(
        mut self,
        primitive: PrimitiveType,
        to_primitive: T,
        from_primitive: F,
    ) -> Self
    where
        T: Fn(&Heap, &Value) -> Result<Value, BoxError> + Send + Sync + 'static,
        F: Fn(&mut Heap, Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.primitive_conversion = Some(PrimitiveConversion {
            primitive,
            to_primitive: Arc::new(to_primitive),
            from_primitive: Arc::new(from_primitive),
        });
        self
    }

    /// Instances carry a bag of runtime members.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// Create `concrete` whenever this type is the target of a read.
    pub fn instantiate_as(mut self, concrete: TypeKey) -> Self {
        self.instantiate_as = Some(concrete);
        self
    }

    pub fn attribute<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.attributes.insert(value);
        self
    }

    pub fn on_serializing<F>(mut self, f: F) -> Self
    where
        F: Fn(&Heap, ObjectId) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callbacks.on_serializing.push(Arc::new(f) as SerializeCallback);
        self
    }

    pub fn on_serialized<F>(mut self, f: F) -> Self
    where
        F: Fn(&Heap, ObjectId) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callbacks.on_serialized.push(Arc::new(f) as SerializeCallback);
        self
    }

    pub fn on_deserializing<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Heap, ObjectId) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callbacks.on_deserializing.push(Arc::new(f) as DeserializeCallback);
        self
    }

    pub fn on_deserialized<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Heap, ObjectId) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.callbacks.on_deserialized.push(Arc::new(f) as DeserializeCallback);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(ObjectId, &mut crate::error::ErrorContext<'_>) + Send + Sync + 'static,
    {
        self.callbacks.on_error.push(Arc::new(f) as ErrorCallback);
        self
    }

    #[inline]
    pub(crate) fn base_type(&self) -> Option<TypeKey> {
        self.base
    }

    #[inline]
    pub(crate) fn interface_types(&self) -> &[TypeKey] {
        &self.interfaces
    }

    /// Lays out slots and produces the final [`TypeInfo`].
    ///
    /// `base` must already be defined; `default_of` gives the initial value
    /// of a slot whose member has no explicit one.
    pub(crate) fn build(
        self,
        key: TypeKey,
        path: String,
        base: Option<&TypeInfo>,
        inherited_slots: Vec<(String, usize)>,
        default_of: impl Fn(TypeKey) -> Value,
    ) -> TypeInfo {
        let mut info = TypeInfo::new(key, path, self.kind);
        let storage = !info.is_interface();

        let mut template = base.map(|b| b.template.clone()).unwrap_or_default();
        let mut slots = inherited_slots;

        let mut members = Vec::with_capacity(self.members.len());
        for m in self.members {
            let (getter, setter) = if !storage {
                (None, None)
            } else if m.is_computed() {
                (m.get.map(Getter::Computed), m.set.map(Setter::Computed))
            } else {
                let slot = template.len();
                template.push(m.default.clone().unwrap_or_else(|| default_of(m.ty)));
                slots.push((m.name.clone(), slot));
                let setter = (!m.read_only).then_some(Setter::Slot(slot));
                (Some(Getter::Slot(slot)), setter)
            };
            members.push(MemberInfo {
                name: m.name,
                ty: m.ty,
                kind: m.kind,
                declaring_type: key,
                getter,
                setter,
                visibility: m.visibility,
                setter_visibility: m.setter_visibility,
                attributes: share_attributes(m.attributes),
            });
        }

        info.constructors = self.constructors.into_iter().map(|c| c.build(&slots)).collect();
        info.members = members;
        info.base = self.base;
        info.interfaces = self.interfaces;
        info.is_abstract = self.is_abstract;
        info.list = self.list;
        info.map = self.map;
        info.string_conversion = self.string_conversion;
        info.primitive_conversion = self.primitive_conversion;
        info.dynamic = self.dynamic;
        info.instantiate_as = self.instantiate_as;
        info.callbacks = self.callbacks;
        info.template = template;
        info.attributes = share_attributes(self.attributes);
        info
    }
}

/// Name to slot bindings of every slot-backed member of `info`, base first.
pub(crate) fn slot_bindings(chain: &[&TypeInfo]) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    for info in chain.iter().rev() {
        for m in &info.members {
            if let Some(Getter::Slot(slot)) = &m.getter {
                let slot = *slot;
                out.push((m.name.clone(), slot));
            }
        }
    }
    out
}
