use crate::contract::{ContractBase, ItemSettings, PropertyCollection};
use alloc::sync::Arc;

use crate::info::{PairsCreateFn, SequenceCreateFn, TypeKey};
use crate::resolve::NamingStrategy;

/// A type written as an array of elements.
#[derive(Clone)]
pub struct ArrayContract {
    pub(crate) base: ContractBase,
    pub(crate) items: ItemSettings,
    pub(crate) element_type: TypeKey,
    pub(crate) fixed_size: bool,
    pub(crate) read_only: bool,
    pub(crate) rank: usize,
    pub(crate) creator: Option<SequenceCreateFn>,
}

impl ArrayContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn element_type(&self) -> TypeKey {
        self.element_type
    }

    #[inline]
    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[inline]
    pub fn is_multidimensional(&self) -> bool {
        self.rank > 1
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Elements must be collected before the instance can exist.
    #[inline]
    pub fn needs_temporary(&self) -> bool {
        self.creator.is_some()
    }

    /// An existing instance may be filled in place.
    #[inline]
    pub fn can_reuse(&self) -> bool {
        !self.fixed_size && !self.read_only
    }
}

impl core::fmt::Debug for ArrayContract {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArrayContract")
            .field("base", &self.base)
            .field("element_type", &self.element_type)
            .field("fixed_size", &self.fixed_size)
            .field("read_only", &self.read_only)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// A type written as an object whose names are keys.
#[derive(Clone)]
pub struct DictionaryContract {
    pub(crate) base: ContractBase,
    pub(crate) items: ItemSettings,
    pub(crate) key_type: TypeKey,
    pub(crate) value_type: TypeKey,
    pub(crate) read_only: bool,
    pub(crate) creator: Option<PairsCreateFn>,
    pub(crate) naming: Arc<dyn NamingStrategy>,
}

impl DictionaryContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn key_type(&self) -> TypeKey {
        self.key_type
    }

    #[inline]
    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Entries must be collected before the instance can exist.
    #[inline]
    pub fn needs_temporary(&self) -> bool {
        self.creator.is_some()
    }

    /// An existing instance may be filled in place.
    #[inline]
    pub fn can_reuse(&self) -> bool {
        !self.read_only
    }

    /// Maps a stringified key to the property name written out.
    #[inline]
    pub fn key_name(&self, key: &str) -> alloc::string::String {
        self.naming.dictionary_key(key)
    }
}

impl core::fmt::Debug for DictionaryContract {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DictionaryContract")
            .field("base", &self.base)
            .field("key_type", &self.key_type)
            .field("value_type", &self.value_type)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

/// An object whose members are partly declared and partly held in a
/// runtime member bag.
#[derive(Clone)]
pub struct DynamicContract {
    pub(crate) base: ContractBase,
    pub(crate) items: ItemSettings,
    pub(crate) properties: PropertyCollection,
    pub(crate) naming: Arc<dyn NamingStrategy>,
}

impl DynamicContract {
    #[inline]
    pub fn base(&self) -> &ContractBase {
        &self.base
    }

    #[inline]
    pub fn properties(&self) -> &PropertyCollection {
        &self.properties
    }

    /// Maps a runtime member name to the property name written out.
    #[inline]
    pub fn member_name(&self, name: &str) -> alloc::string::String {
        self.naming.property_name(name, false)
    }
}

impl core::fmt::Debug for DynamicContract {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DynamicContract")
            .field("base", &self.base)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
