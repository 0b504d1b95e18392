//! Building [`Contract`]s from registered type metadata.
//!
//! ## Menu
//!
//! - [`ContractResolve`]: the `TypeKey -> Contract` lookup the graph walkers
//!   depend on.
//! - [`DefaultContractResolver`]: the caching implementation.
//! - [`ContractFactory`]: per-kind hooks to customize how contracts are built.
//! - [`NamingStrategy`]: how member names and keys are written.

// -----------------------------------------------------------------------------
// Modules

pub mod build;
mod constructors;
mod discovery;
mod factory;
mod naming;

// -----------------------------------------------------------------------------
// Exports

pub use factory::{ContractFactory, ResolveContext};
pub use naming::{IdentityNaming, NamingStrategy};

use alloc::sync::Arc;
use std::sync::{PoisonError, RwLock};

use log::debug;
use strand_utils::hash::HashMap;

use crate::attrs::{AttributeProvider, ContainerShape, DeclaredAttributes};
use crate::contract::Contract;
use crate::error::Result;
use crate::info::{TypeInfo, TypeKey, TypeKind};
use crate::registry::TypeRegistry;
use crate::settings::MemberSerialization;

// -----------------------------------------------------------------------------
// ContractResolve

/// Maps a type to its [`Contract`].
///
/// Implementations must return the same contract for the same type for as
/// long as they live; the graph walkers may call this many times per value.
pub trait ContractResolve: Send + Sync {
    fn registry(&self) -> &TypeRegistry;

    fn resolve_contract(&self, ty: TypeKey) -> Result<Arc<Contract>>;
}

// -----------------------------------------------------------------------------
// ResolverOptions

/// Defaults applied while contracts are built.
#[derive(Clone)]
pub struct ResolverOptions {
    /// Used for types without an explicit mode in their `ContainerOptions`.
    pub member_serialization: MemberSerialization,
    pub naming: Arc<dyn NamingStrategy>,
    pub attributes: Arc<dyn AttributeProvider>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            member_serialization: MemberSerialization::OptOut,
            naming: Arc::new(IdentityNaming),
            attributes: Arc::new(DeclaredAttributes),
        }
    }
}

// -----------------------------------------------------------------------------
// DefaultContractResolver

/// Builds contracts on first request and caches them for its lifetime.
///
/// The cache may be shared between threads. A contract missing from the
/// cache is built without holding the lock; if two threads race, the first
/// one to insert wins and both get that contract.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use strand_graph::info::{TypeBuilder, TypeKey};
/// use strand_graph::registry::TypeRegistry;
/// use strand_graph::resolve::{ContractResolve, DefaultContractResolver};
///
/// let mut registry = TypeRegistry::new();
/// let point = registry
///     .register(
///         "geo::Point",
///         TypeBuilder::class()
///             .field("X", TypeKey::F64)
///             .field("Y", TypeKey::F64)
///             .default_constructor(),
///     )
///     .unwrap();
///
/// let resolver = DefaultContractResolver::new(Arc::new(registry));
/// let contract = resolver.resolve_contract(point).unwrap();
/// let object = contract.as_object().unwrap();
///
/// let names: Vec<_> = object.properties().iter().map(|p| p.name()).collect();
/// assert_eq!(names, ["X", "Y"]);
/// assert!(Arc::ptr_eq(&contract, &resolver.resolve_contract(point).unwrap()));
/// ```
pub struct DefaultContractResolver<F: ContractFactory = ()> {
    registry: Arc<TypeRegistry>,
    options: ResolverOptions,
    factory: F,
    cache: RwLock<HashMap<TypeKey, Arc<Contract>>>,
}

impl DefaultContractResolver {
    #[inline]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_options(registry, ResolverOptions::default())
    }

    #[inline]
    pub fn with_options(registry: Arc<TypeRegistry>, options: ResolverOptions) -> Self {
        Self::with_factory(registry, options, ())
    }
}

impl<F: ContractFactory> DefaultContractResolver<F> {
    pub fn with_factory(registry: Arc<TypeRegistry>, options: ResolverOptions, factory: F) -> Self {
        Self {
            registry,
            options,
            factory,
            cache: RwLock::new(HashMap::default()),
        }
    }

    #[inline]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    #[inline]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Number of cached contracts.
    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[inline(never)]
    fn get_cached(&self, ty: TypeKey) -> Option<Arc<Contract>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ty)
            .cloned()
    }

    #[inline(never)]
    fn insert_cached(&self, ty: TypeKey, contract: Contract) -> Arc<Contract> {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(ty)
            .or_insert_with(|| Arc::new(contract))
            .clone()
    }

    fn context(&self) -> ResolveContext<'_> {
        ResolveContext {
            registry: &self.registry,
            options: &self.options,
            factory: &self.factory,
        }
    }
}

impl<F: ContractFactory> ContractResolve for DefaultContractResolver<F> {
    #[inline]
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn resolve_contract(&self, ty: TypeKey) -> Result<Arc<Contract>> {
        if let Some(contract) = self.get_cached(ty) {
            return Ok(contract);
        }
        let contract = create_contract(&self.context(), ty)?;
        debug!("built {} contract for `{}`", contract.kind(), contract.type_path());
        Ok(self.insert_cached(ty, contract))
    }
}

// -----------------------------------------------------------------------------
// Dispatch

/// Picks the contract kind of `ty` and builds it through the factory.
///
/// The first matching rule wins: primitive or enum (after unwrapping a
/// nullable), an explicit container shape, document tree, map shape, list
/// shape, string conversion, dynamic members, primitive conversion, and
/// finally a plain object.
pub fn create_contract(cx: &ResolveContext<'_>, ty: TypeKey) -> Result<Contract> {
    let info = cx.type_info(ty)?;
    let shape = build::shape_type(cx, info)?;
    let factory = cx.factory;

    if matches!(shape.kind(), TypeKind::Primitive(_) | TypeKind::Enum(_)) {
        return factory.create_primitive_contract(cx, info).map(Contract::Primitive);
    }

    if let Some(kind) = cx.container_options(shape).and_then(|c| c.shape) {
        return match kind {
            ContainerShape::Object => factory.create_object_contract(cx, info).map(Contract::Object),
            ContainerShape::Array => factory.create_array_contract(cx, info).map(Contract::Array),
            ContainerShape::Dictionary => factory
                .create_dictionary_contract(cx, info)
                .map(Contract::Dictionary),
        };
    }

    if is_document(cx, shape) {
        return factory.create_document_contract(cx, info).map(Contract::Document);
    }
    if shape.map().is_some() {
        return factory
            .create_dictionary_contract(cx, info)
            .map(Contract::Dictionary);
    }
    if shape.list().is_some() {
        return factory.create_array_contract(cx, info).map(Contract::Array);
    }
    if shape.string_conversion().is_some() {
        return factory.create_string_contract(cx, info).map(Contract::String);
    }
    if shape.is_dynamic() {
        return factory.create_dynamic_contract(cx, info).map(Contract::Dynamic);
    }
    if shape.primitive_conversion().is_some() {
        return factory.create_primitive_contract(cx, info).map(Contract::Primitive);
    }
    factory.create_object_contract(cx, info).map(Contract::Object)
}

/// The document tree type or one deriving from it.
fn is_document(cx: &ResolveContext<'_>, info: &TypeInfo) -> bool {
    matches!(info.kind(), TypeKind::Document(_))
        || cx
            .registry
            .base_chain(info.key())
            .iter()
            .any(|level| level.key() == TypeKey::NODE)
}

#[cfg(test)]
mod tests;
