//! Serialization annotations and where the resolver reads them from.
//!
//! Annotations are ordinary [`CustomAttributes`] entries. The resolver
//! never reads them directly; it asks an [`AttributeProvider`], so
//! annotations can also be attached to types the caller does not own
//! through [`OverlayAttributes`].

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;

use strand_utils::hash::HashMap;

use crate::convert::Converter;
use crate::heap::Heap;
use crate::info::{ConstructorInfo, CustomAttributes, MemberInfo, ParameterInfo, TypeInfo};
use crate::settings::{
    DefaultValueHandling, MemberSerialization, MissingMemberHandling, NullValueHandling,
    ObjectCreationHandling, ReferenceLoopHandling, Required, TypeNameHandling,
};
use crate::value::{ObjectId, Value};

// -----------------------------------------------------------------------------
// Type annotations

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    Object,
    Array,
    Dictionary,
}

/// Type-level options; a `shape` forces the contract kind.
#[derive(Clone, Default)]
pub struct ContainerOptions {
    pub shape: Option<ContainerShape>,
    pub member_serialization: Option<MemberSerialization>,
    pub item_required: Option<Required>,
    pub is_reference: Option<bool>,
    pub item_is_reference: Option<bool>,
    pub item_reference_loop_handling: Option<ReferenceLoopHandling>,
    pub item_type_name_handling: Option<TypeNameHandling>,
    pub item_converter: Option<Arc<dyn Converter>>,
    pub missing_member_handling: Option<MissingMemberHandling>,
}

impl ContainerOptions {
    pub fn shaped(shape: ContainerShape) -> Self {
        Self {
            shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn with_member_serialization(mut self, mode: MemberSerialization) -> Self {
        self.member_serialization = Some(mode);
        self
    }

    pub fn with_item_required(mut self, required: Required) -> Self {
        self.item_required = Some(required);
        self
    }

    pub fn with_is_reference(mut self, is_reference: bool) -> Self {
        self.is_reference = Some(is_reference);
        self
    }

    pub fn with_item_is_reference(mut self, is_reference: bool) -> Self {
        self.item_is_reference = Some(is_reference);
        self
    }

    pub fn with_item_type_name_handling(mut self, handling: TypeNameHandling) -> Self {
        self.item_type_name_handling = Some(handling);
        self
    }

    pub fn with_item_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.item_converter = Some(converter);
        self
    }

    pub fn with_missing_member_handling(mut self, handling: MissingMemberHandling) -> Self {
        self.missing_member_handling = Some(handling);
        self
    }
}

// -----------------------------------------------------------------------------
// Member annotations

/// Member-level options. Its presence also opts a member in.
#[derive(Clone, Default)]
pub struct PropertyOptions {
    pub name: Option<String>,
    pub required: Option<Required>,
    pub order: Option<i32>,
    pub null_value_handling: Option<NullValueHandling>,
    pub default_value_handling: Option<DefaultValueHandling>,
    pub reference_loop_handling: Option<ReferenceLoopHandling>,
    pub object_creation_handling: Option<ObjectCreationHandling>,
    pub type_name_handling: Option<TypeNameHandling>,
    pub is_reference: Option<bool>,
    pub item_is_reference: Option<bool>,
    pub item_reference_loop_handling: Option<ReferenceLoopHandling>,
    pub item_type_name_handling: Option<TypeNameHandling>,
    pub item_converter: Option<Arc<dyn Converter>>,
}

macro_rules! option_setters {
    ($($fn_name:ident => $field:ident: $ty:ty),* $(,)?) => {
        impl PropertyOptions {
            $(
                #[inline]
                pub fn $fn_name(mut self, value: $ty) -> Self {
                    self.$field = Some(value);
                    self
                }
            )*
        }
    };
}

option_setters! {
    required => required: Required,
    order => order: i32,
    null_value_handling => null_value_handling: NullValueHandling,
    default_value_handling => default_value_handling: DefaultValueHandling,
    reference_loop_handling => reference_loop_handling: ReferenceLoopHandling,
    object_creation_handling => object_creation_handling: ObjectCreationHandling,
    type_name_handling => type_name_handling: TypeNameHandling,
    is_reference => is_reference: bool,
    item_is_reference => item_is_reference: bool,
    item_reference_loop_handling => item_reference_loop_handling: ReferenceLoopHandling,
    item_type_name_handling => item_type_name_handling: TypeNameHandling,
    item_converter => item_converter: Arc<dyn Converter>,
}

impl PropertyOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized name of the member.
    #[inline]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Excludes a member.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ignore;

/// Marks the dictionary member that collects unmatched properties.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionData {
    /// Entries are written out as properties.
    pub write: bool,
    /// Unmatched input properties are stored.
    pub read: bool,
}

impl Default for ExtensionData {
    fn default() -> Self {
        Self {
            write: true,
            read: true,
        }
    }
}

/// The value compared against by default-value handling and assigned by
/// populate.
#[derive(Debug, Clone)]
pub struct DefaultValue(pub Value);

/// Uses a converter for the target (a type, a member, or a parameter).
#[derive(Clone)]
pub struct UseConverter(pub Arc<dyn Converter>);

/// Selects the constructor used when reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializationConstructor;

/// Decides per instance whether a member is written.
#[derive(Clone)]
pub struct ShouldSerialize(pub Arc<dyn Fn(&Heap, ObjectId) -> bool + Send + Sync>);

impl ShouldSerialize {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Heap, ObjectId) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }
}

// -----------------------------------------------------------------------------
// AttributeProvider

/// Something annotations can be attached to.
#[derive(Clone, Copy)]
pub enum AttributeTarget<'a> {
    Type(&'a TypeInfo),
    Member(&'a TypeInfo, &'a MemberInfo),
    Constructor(&'a TypeInfo, &'a ConstructorInfo),
    Parameter(&'a TypeInfo, &'a ParameterInfo),
}

impl<'a> AttributeTarget<'a> {
    /// Attributes declared on the target itself.
    pub fn declared(self) -> &'a CustomAttributes {
        match self {
            AttributeTarget::Type(info) => info.custom_attributes(),
            AttributeTarget::Member(_, member) => member.custom_attributes(),
            AttributeTarget::Constructor(_, ctor) => ctor.custom_attributes(),
            AttributeTarget::Parameter(_, param) => param.custom_attributes(),
        }
    }
}

/// Layers of attributes for one target, searched front to back.
#[derive(Default)]
pub struct AttributeSet<'a> {
    layers: Vec<&'a CustomAttributes>,
}

impl<'a> AttributeSet<'a> {
    #[inline]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    #[inline]
    pub fn push(&mut self, layer: &'a CustomAttributes) {
        self.layers.push(layer);
    }

    pub fn get<T: Any>(&self) -> Option<&'a T> {
        self.layers.iter().copied().find_map(|layer| layer.get::<T>())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.layers.iter().any(|layer| layer.contains::<T>())
    }
}

/// Source of annotations consulted by the contract resolver.
pub trait AttributeProvider: Send + Sync {
    fn attributes<'a>(&'a self, target: AttributeTarget<'a>) -> AttributeSet<'a>;
}

/// Reads the attributes declared in the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredAttributes;

impl AttributeProvider for DeclaredAttributes {
    fn attributes<'a>(&'a self, target: AttributeTarget<'a>) -> AttributeSet<'a> {
        let mut set = AttributeSet::new();
        set.push(target.declared());
        set
    }
}

/// Adds attributes to types and members by path, over the declared ones.
///
/// ```
/// use strand_graph::attrs::{AttributeProvider, AttributeTarget, Ignore, OverlayAttributes};
/// use strand_graph::info::{CustomAttributes, TypeBuilder, TypeKey};
/// use strand_graph::registry::TypeRegistry;
///
/// let mut registry = TypeRegistry::new();
/// let key = registry
///     .register("vendor::Config", TypeBuilder::class().field("Secret", TypeKey::STRING))
///     .unwrap();
///
/// let overlay = OverlayAttributes::new()
///     .with_member("vendor::Config", "Secret", CustomAttributes::new().with_attribute(Ignore));
///
/// let info = registry.get(key).unwrap();
/// let member = &info.members()[0];
/// assert!(overlay.attributes(AttributeTarget::Member(info, member)).contains::<Ignore>());
/// ```
#[derive(Default)]
pub struct OverlayAttributes {
    types: HashMap<String, CustomAttributes>,
    members: HashMap<(String, String), CustomAttributes>,
}

impl OverlayAttributes {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, type_path: impl Into<String>, attrs: CustomAttributes) -> Self {
        self.types.insert(type_path.into(), attrs);
        self
    }

    pub fn with_member(
        mut self,
        type_path: impl Into<String>,
        member: impl Into<String>,
        attrs: CustomAttributes,
    ) -> Self {
        self.members.insert((type_path.into(), member.into()), attrs);
        self
    }
}

impl AttributeProvider for OverlayAttributes {
    fn attributes<'a>(&'a self, target: AttributeTarget<'a>) -> AttributeSet<'a> {
        let mut set = AttributeSet::new();
        let overlay = match target {
            AttributeTarget::Type(info) => self.types.get(info.path()),
            AttributeTarget::Member(owner, member) => self
                .members
                .get(&(String::from(owner.path()), String::from(member.name()))),
            _ => None,
        };
        if let Some(layer) = overlay {
            set.push(layer);
        }
        set.push(target.declared());
        set
    }
}
