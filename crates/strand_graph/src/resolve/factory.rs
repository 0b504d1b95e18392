use crate::attrs::{AttributeSet, AttributeTarget, ContainerOptions};
use crate::contract::{
    ArrayContract, DictionaryContract, DocumentContract, DynamicContract, ObjectContract,
    PrimitiveContract, Property, StringContract,
};
use crate::error::{ContractIssue, Error, Result};
use crate::info::{MemberInfo, TypeInfo, TypeKey};
use crate::registry::TypeRegistry;
use crate::resolve::{ResolverOptions, build, discovery};

// -----------------------------------------------------------------------------
// ResolveContext

/// What a [`ContractFactory`] sees while one contract is being built.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) options: &'a ResolverOptions,
    pub(crate) factory: &'a dyn ContractFactory,
}

impl<'a> ResolveContext<'a> {
    #[inline]
    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    #[inline]
    pub fn options(&self) -> &'a ResolverOptions {
        self.options
    }

    #[inline]
    pub fn factory(&self) -> &'a dyn ContractFactory {
        self.factory
    }

    /// Annotations of `target`, as seen through the configured provider.
    #[inline]
    pub fn attributes(&self, target: AttributeTarget<'a>) -> AttributeSet<'a> {
        self.options.attributes.attributes(target)
    }

    #[inline]
    pub fn container_options(&self, info: &'a TypeInfo) -> Option<&'a ContainerOptions> {
        self.attributes(AttributeTarget::Type(info)).get::<ContainerOptions>()
    }

    pub fn type_info(&self, key: TypeKey) -> Result<&'a TypeInfo> {
        self.registry.get(key).ok_or_else(|| {
            let path = self.registry.path_of(key).unwrap_or("<unknown>");
            Error::contract(path, ContractIssue::UnknownType(key))
        })
    }
}

// -----------------------------------------------------------------------------
// ContractFactory

/// Per-kind construction hooks of
/// [`DefaultContractResolver`](super::DefaultContractResolver).
///
/// Every method defaults to the builtin construction, so an implementation
/// overrides only the kinds it wants to change. The builtin functions are
/// public in [`build`](crate::resolve::build) and may be called first and
/// the result adjusted.
///
/// `info` is the type the contract is resolved for. For nullable wrappers
/// it is the wrapper itself; the wrapped type is the contract's
/// [`created_type`](crate::contract::ContractBase::created_type).
pub trait ContractFactory: Send + Sync {
    fn create_object_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<ObjectContract> {
        discovery::object_contract(cx, info)
    }

    fn create_array_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<ArrayContract> {
        build::array_contract(cx, info)
    }

    fn create_dictionary_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<DictionaryContract> {
        build::dictionary_contract(cx, info)
    }

    fn create_primitive_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<PrimitiveContract> {
        build::primitive_contract(cx, info)
    }

    fn create_string_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<StringContract> {
        build::string_contract(cx, info)
    }

    fn create_dynamic_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<DynamicContract> {
        discovery::dynamic_contract(cx, info)
    }

    fn create_document_contract<'a>(
        &self,
        cx: &ResolveContext<'a>,
        info: &'a TypeInfo,
    ) -> Result<DocumentContract> {
        build::document_contract(cx, info)
    }

    /// Builds the property of one discovered member. `owner` declares it.
    fn create_property<'a>(
        &self,
        cx: &ResolveContext<'a>,
        owner: &'a TypeInfo,
        member: &'a MemberInfo,
    ) -> Result<Property> {
        discovery::create_property(cx, owner, member)
    }
}

impl ContractFactory for () {}
