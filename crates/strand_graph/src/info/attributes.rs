use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

use strand_utils::TypeIdMap;

// -----------------------------------------------------------------------------
// CustomAttributes

/// Annotations attached to a type, member, constructor or parameter.
///
/// Attributes are keyed by their concrete Rust type, so there is at most
/// one attribute of each type per target. The serialization annotations in
/// [`attrs`](crate::attrs) are ordinary attributes stored here.
///
/// # Example
///
/// ```
/// use strand_graph::info::CustomAttributes;
///
/// #[derive(Debug, PartialEq)]
/// struct Doc(&'static str);
///
/// let attrs = CustomAttributes::new()
///     .with_attribute(Doc("first"))
///     .with_attribute(7_u32)
///     .with_attribute(Doc("second"));
///
/// assert_eq!(attrs.len(), 2);
/// assert_eq!(attrs.get::<Doc>(), Some(&Doc("second")));
/// assert!(!attrs.contains::<i64>());
/// ```
#[derive(Default)]
pub struct CustomAttributes {
    attributes: TypeIdMap<Box<dyn Any + Send + Sync>>,
}

impl CustomAttributes {
    /// Shared empty set, returned by targets without attributes.
    pub(crate) const EMPTY: &'static Self = &Self::new();

    #[inline]
    pub const fn new() -> Self {
        Self {
            attributes: TypeIdMap::new(),
        }
    }

    /// Adds an attribute, replacing any earlier one of the same type.
    #[inline]
    pub fn with_attribute<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    #[inline]
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.attributes.insert(TypeId::of::<T>(), Box::new(value));
    }

    #[inline]
    pub fn contains<T: Any>(&self) -> bool {
        self.attributes.contains_type::<T>()
    }

    #[inline]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.attributes
            .get_type::<T>()
            .and_then(|boxed| (**boxed).downcast_ref::<T>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Debug for CustomAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAttributes")
            .field("len", &self.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Auxiliary macro

/// Implements `custom_attributes`, `get_attribute` and `has_attribute`
/// over an `Option<Arc<CustomAttributes>>` field.
macro_rules! impl_custom_attributes_fn {
    ($field:ident) => {
        /// Returns the attributes declared on this target.
        #[inline]
        pub fn custom_attributes(&self) -> &$crate::info::CustomAttributes {
            match &self.$field {
                Some(attrs) => attrs,
                None => $crate::info::CustomAttributes::EMPTY,
            }
        }

        /// Returns the attribute of type `T`, if present.
        #[inline]
        pub fn get_attribute<T: ::core::any::Any>(&self) -> Option<&T> {
            self.custom_attributes().get::<T>()
        }

        /// Returns `true` if an attribute of type `T` is present.
        #[inline]
        pub fn has_attribute<T: ::core::any::Any>(&self) -> bool {
            self.custom_attributes().contains::<T>()
        }
    };
}

pub(crate) use impl_custom_attributes_fn;

/// Wraps a builder's attribute set, dropping it when empty.
#[inline]
pub(crate) fn share_attributes(
    attrs: CustomAttributes,
) -> Option<alloc::sync::Arc<CustomAttributes>> {
    if attrs.is_empty() {
        None
    } else {
        Some(alloc::sync::Arc::new(attrs))
    }
}
