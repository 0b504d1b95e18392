//! Mapping between types and the names written in `$type` metadata.

use alloc::string::String;

use crate::info::TypeKey;
use crate::registry::TypeRegistry;

/// Resolves type names found in input and names types for output.
pub trait TypeBinder: Send + Sync {
    /// The type a `$type` value refers to, or `None` if it is unknown.
    fn bind_to_type(&self, registry: &TypeRegistry, name: &str) -> Option<TypeKey>;

    /// The name written for `ty`.
    fn bind_to_name(&self, registry: &TypeRegistry, ty: TypeKey) -> Option<String>;
}

/// Writes full type paths; reads full paths, then unambiguous short names.
///
/// ```
/// use strand_graph::binder::{DefaultTypeBinder, TypeBinder};
/// use strand_graph::info::TypeBuilder;
/// use strand_graph::registry::TypeRegistry;
///
/// let mut registry = TypeRegistry::new();
/// let key = registry.register("zoo::Cat", TypeBuilder::class()).unwrap();
///
/// let binder = DefaultTypeBinder;
/// assert_eq!(binder.bind_to_name(&registry, key).as_deref(), Some("zoo::Cat"));
/// assert_eq!(binder.bind_to_type(&registry, "Cat"), Some(key));
/// assert_eq!(binder.bind_to_type(&registry, "Dog"), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTypeBinder;

impl TypeBinder for DefaultTypeBinder {
    fn bind_to_type(&self, registry: &TypeRegistry, name: &str) -> Option<TypeKey> {
        registry
            .key_of_path(name)
            .or_else(|| registry.key_of_name(name))
    }

    fn bind_to_name(&self, registry: &TypeRegistry, ty: TypeKey) -> Option<String> {
        registry.path_of(ty).map(String::from)
    }
}
