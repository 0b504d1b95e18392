use alloc::string::String;
use alloc::sync::Arc;

use crate::contract::{ContractBase, ItemSettings, PropertyCollection};
use crate::info::{ConstructorInfo, Getter, Setter, TypeKey};
use crate::resolve::NamingStrategy;
use crate::settings::{MemberSerialization, MissingMemberHandling, Required};

/// Why a constructor other than the default one is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorKind {
    /// Marked with [`SerializationConstructor`](crate::attrs::SerializationConstructor).
    Annotated,
    /// Every property is read-only and this constructor covers them all.
    Immutable,
    /// The only public constructor and it takes parameters.
    Parameterized,
}

/// A constructor taking arguments, bound to input properties by
/// [`ObjectContract::creator_parameters`].
#[derive(Clone, Debug)]
pub struct ObjectCreator {
    pub(crate) constructor: ConstructorInfo,
    pub(crate) kind: CreatorKind,
}

impl ObjectCreator {
    #[inline]
    pub fn constructor(&self) -> &ConstructorInfo {
        &self.constructor
    }

    #[inline]
    pub fn kind(&self) -> CreatorKind {
        self.kind
    }
}

/// The dictionary member collecting unmatched properties.
#[derive(Clone)]
pub struct ExtensionDataMember {
    pub(crate) member_name: String,
    pub(crate) getter: Option<Getter>,
    pub(crate) setter: Option<Setter>,
    pub(crate) map_type: TypeKey,
    pub(crate) value_type: TypeKey,
    pub(crate) write: bool,
    pub(crate) read: bool,
}

impl ExtensionDataMember {
    #[inline]
    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    #[inline]
    pub fn map_type(&self) -> TypeKey {
        self.map_type
    }

    #[inline]
    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }
}

impl core::fmt::Debug for ExtensionDataMember {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtensionDataMember")
            .field("member_name", &self.member_name)
            .field("map_type", &self.map_type)
            .field("write", &self.write)
            .field("read", &self.read)
            .finish_non_exhaustive()
    }
}

/// A type written as a set of named properties.
#[derive(Clone)]
pub struct ObjectContract {
    pub(crate) base: ContractBase,
    pub(crate) items: ItemSettings,
    pub(crate) member_serialization: MemberSerialization,
    pub(crate) item_required: Option<Required>,
    pub(crate) missing_member_handling: Option<MissingMemberHandling>,
    pub(crate) properties: PropertyCollection,
    pub(crate) creator: Option<ObjectCreator>,
    pub(crate) creator_parameters: PropertyCollection,
    pub(crate) extension_data: Option<ExtensionDataMember>,
    pub(crate) naming: Arc<dyn NamingStrategy>,
}

impl ObjectContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn member_serialization(&self) -> MemberSerialization {
        self.member_serialization
    }

    #[inline]
    pub fn item_required(&self) -> Option<Required> {
        self.item_required
    }

    #[inline]
    pub fn properties(&self) -> &PropertyCollection {
        &self.properties
    }

    #[inline]
    pub fn properties_mut(&mut self) -> &mut PropertyCollection {
        &mut self.properties
    }

    /// The parameterized creator, if one was selected.
    #[inline]
    pub fn creator(&self) -> Option<&ObjectCreator> {
        self.creator.as_ref()
    }

    /// One property per creator parameter, in parameter order.
    #[inline]
    pub fn creator_parameters(&self) -> &PropertyCollection {
        &self.creator_parameters
    }

    #[inline]
    pub fn extension_data(&self) -> Option<&ExtensionDataMember> {
        self.extension_data.as_ref()
    }

    #[inline]
    pub fn missing_member_handling(&self) -> Option<MissingMemberHandling> {
        self.missing_member_handling
    }

    /// Maps an extension data key to the property name written out.
    #[inline]
    pub fn extension_data_name(&self, key: &str) -> String {
        self.naming.extension_data_name(key)
    }
}

impl core::fmt::Debug for ObjectContract {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectContract")
            .field("base", &self.base)
            .field("member_serialization", &self.member_serialization)
            .field("properties", &self.properties)
            .field("creator", &self.creator)
            .field("extension_data", &self.extension_data)
            .finish_non_exhaustive()
    }
}
