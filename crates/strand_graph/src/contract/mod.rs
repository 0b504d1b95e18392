//! Resolved per-type serialization behavior.
//!
//! A [`Contract`] is computed once per type by a
//! [`ContractResolve`](crate::resolve::ContractResolve) implementation and
//! shared between every serializer using that resolver. Each variant
//! wraps the data specific to its kind; the fields common to every kind
//! live in [`ContractBase`].

// -----------------------------------------------------------------------------
// Modules

mod collection;
mod leaf;
mod object;
mod property;

// -----------------------------------------------------------------------------
// Exports

pub use collection::{ArrayContract, DictionaryContract, DynamicContract};
pub use leaf::{DocumentContract, PrimitiveContract, StringContract};
pub use object::{CreatorKind, ExtensionDataMember, ObjectContract, ObjectCreator};
pub use property::{Property, PropertyCollection};

use alloc::string::String;
use alloc::sync::Arc;
use core::{error, fmt};

use crate::convert::Converter;
use crate::info::{Callbacks, ConstructorInfo, TypeKey};
use crate::settings::{ReferenceLoopHandling, TypeNameHandling};

// -----------------------------------------------------------------------------
// ContractBase

/// Data shared by every contract kind.
#[derive(Clone)]
pub struct ContractBase {
    pub(crate) underlying_type: TypeKey,
    pub(crate) created_type: TypeKey,
    pub(crate) type_path: String,
    pub(crate) is_nullable: bool,
    pub(crate) is_instantiable: bool,
    pub(crate) is_reference: Option<bool>,
    pub(crate) converter: Option<Arc<dyn Converter>>,
    pub(crate) default_creator: Option<ConstructorInfo>,
    pub(crate) default_creator_non_public: bool,
    pub(crate) callbacks: Callbacks,
}

impl ContractBase {
    /// The declared type this contract was resolved for.
    #[inline]
    pub fn underlying_type(&self) -> TypeKey {
        self.underlying_type
    }

    /// The type instantiated when reading; differs from the underlying type
    /// for nullable wrappers and `instantiate_as` redirections.
    #[inline]
    pub fn created_type(&self) -> TypeKey {
        self.created_type
    }

    #[inline]
    pub fn type_path(&self) -> &str {
        &self.type_path
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    #[inline]
    pub fn is_instantiable(&self) -> bool {
        self.is_instantiable
    }

    #[inline]
    pub fn is_reference(&self) -> Option<bool> {
        self.is_reference
    }

    #[inline]
    pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
        self.converter.as_ref()
    }

    #[inline]
    pub fn set_converter(&mut self, converter: Option<Arc<dyn Converter>>) {
        self.converter = converter;
    }

    /// The parameterless constructor, if any.
    #[inline]
    pub fn default_creator(&self) -> Option<&ConstructorInfo> {
        self.default_creator.as_ref()
    }

    #[inline]
    pub fn default_creator_non_public(&self) -> bool {
        self.default_creator_non_public
    }

    /// Callbacks of the type and all its bases, base callbacks first.
    #[inline]
    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }
}

impl fmt::Debug for ContractBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBase")
            .field("underlying_type", &self.underlying_type)
            .field("created_type", &self.created_type)
            .field("type_path", &self.type_path)
            .field("is_nullable", &self.is_nullable)
            .field("is_instantiable", &self.is_instantiable)
            .field("is_reference", &self.is_reference)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ItemSettings

/// Defaults applied to the items of a container.
#[derive(Clone, Default)]
pub struct ItemSettings {
    pub(crate) is_reference: Option<bool>,
    pub(crate) reference_loop_handling: Option<ReferenceLoopHandling>,
    pub(crate) type_name_handling: Option<TypeNameHandling>,
    pub(crate) converter: Option<Arc<dyn Converter>>,
}

impl ItemSettings {
    #[inline]
    pub fn is_reference(&self) -> Option<bool> {
        self.is_reference
    }

    #[inline]
    pub fn reference_loop_handling(&self) -> Option<ReferenceLoopHandling> {
        self.reference_loop_handling
    }

    #[inline]
    pub fn type_name_handling(&self) -> Option<TypeNameHandling> {
        self.type_name_handling
    }

    #[inline]
    pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
        self.converter.as_ref()
    }
}

impl fmt::Debug for ItemSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemSettings")
            .field("is_reference", &self.is_reference)
            .field("reference_loop_handling", &self.reference_loop_handling)
            .field("type_name_handling", &self.type_name_handling)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ContractKind

/// The kind of a [`Contract`], without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Object,
    Array,
    Dictionary,
    Primitive,
    String,
    Dynamic,
    Document,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::Object => "Object",
            ContractKind::Array => "Array",
            ContractKind::Dictionary => "Dictionary",
            ContractKind::Primitive => "Primitive",
            ContractKind::String => "String",
            ContractKind::Dynamic => "Dynamic",
            ContractKind::Document => "Document",
        };
        f.write_str(name)
    }
}

/// A contract was cast to the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractKindError {
    pub expected: ContractKind,
    pub received: ContractKind,
}

impl fmt::Display for ContractKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "contract kind mismatch: expected {}, received {}",
            self.expected, self.received
        )
    }
}

impl error::Error for ContractKindError {}

// -----------------------------------------------------------------------------
// Contract

/// How one type is written and read.
#[derive(Clone, Debug)]
pub enum Contract {
    Object(ObjectContract),
    Array(ArrayContract),
    Dictionary(DictionaryContract),
    Primitive(PrimitiveContract),
    String(StringContract),
    Dynamic(DynamicContract),
    Document(DocumentContract),
}

macro_rules! impl_cast_method {
    ($name:ident : $kind:ident => $contract:ident) => {
        #[doc = concat!("Casts to [`", stringify!($contract), "`].")]
        pub const fn $name(&self) -> Result<&$contract, ContractKindError> {
            match self {
                Self::$kind(contract) => Ok(contract),
                _ => Err(ContractKindError {
                    expected: ContractKind::$kind,
                    received: self.kind(),
                }),
            }
        }
    };
}

impl Contract {
    pub const fn kind(&self) -> ContractKind {
        match self {
            Self::Object(_) => ContractKind::Object,
            Self::Array(_) => ContractKind::Array,
            Self::Dictionary(_) => ContractKind::Dictionary,
            Self::Primitive(_) => ContractKind::Primitive,
            Self::String(_) => ContractKind::String,
            Self::Dynamic(_) => ContractKind::Dynamic,
            Self::Document(_) => ContractKind::Document,
        }
    }

    pub const fn base(&self) -> &ContractBase {
        match self {
            Self::Object(c) => &c.base,
            Self::Array(c) => &c.base,
            Self::Dictionary(c) => &c.base,
            Self::Primitive(c) => &c.base,
            Self::String(c) => &c.base,
            Self::Dynamic(c) => &c.base,
            Self::Document(c) => &c.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ContractBase {
        match self {
            Self::Object(c) => &mut c.base,
            Self::Array(c) => &mut c.base,
            Self::Dictionary(c) => &mut c.base,
            Self::Primitive(c) => &mut c.base,
            Self::String(c) => &mut c.base,
            Self::Dynamic(c) => &mut c.base,
            Self::Document(c) => &mut c.base,
        }
    }

    /// Item defaults of container kinds.
    pub const fn items(&self) -> Option<&ItemSettings> {
        match self {
            Self::Object(c) => Some(&c.items),
            Self::Array(c) => Some(&c.items),
            Self::Dictionary(c) => Some(&c.items),
            Self::Dynamic(c) => Some(&c.items),
            _ => None,
        }
    }

    #[inline]
    pub const fn underlying_type(&self) -> TypeKey {
        self.base().underlying_type
    }

    #[inline]
    pub const fn created_type(&self) -> TypeKey {
        self.base().created_type
    }

    #[inline]
    pub fn type_path(&self) -> &str {
        &self.base().type_path
    }

    #[inline]
    pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
        self.base().converter.as_ref()
    }

    #[inline]
    pub fn callbacks(&self) -> &Callbacks {
        &self.base().callbacks
    }

    /// Written as a start/end object or array pair rather than a literal.
    #[inline]
    pub const fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Object(_) | Self::Array(_) | Self::Dictionary(_) | Self::Dynamic(_)
        )
    }

    impl_cast_method!(as_object: Object => ObjectContract);
    impl_cast_method!(as_array: Array => ArrayContract);
    impl_cast_method!(as_dictionary: Dictionary => DictionaryContract);
    impl_cast_method!(as_primitive: Primitive => PrimitiveContract);
    impl_cast_method!(as_string: String => StringContract);
    impl_cast_method!(as_dynamic: Dynamic => DynamicContract);
    impl_cast_method!(as_document: Document => DocumentContract);
}
