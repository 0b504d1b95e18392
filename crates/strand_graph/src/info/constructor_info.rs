use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::heap::Heap;
use crate::info::{BoxError, CustomAttributes, TypeKey, Visibility, impl_custom_attributes_fn};
use crate::value::{ObjectId, Value};

/// Initializes a freshly allocated instance from constructor arguments.
pub type ConstructFn = Arc<dyn Fn(&mut Heap, ObjectId, &[Value]) -> Result<(), BoxError> + Send + Sync>;

// -----------------------------------------------------------------------------
// ParameterInfo

#[derive(Clone, Debug)]
pub struct ParameterInfo {
    pub(crate) name: String,
    pub(crate) ty: TypeKey,
    pub(crate) attributes: Option<Arc<CustomAttributes>>,
}

impl ParameterInfo {
    impl_custom_attributes_fn!(attributes);

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> TypeKey {
        self.ty
    }
}

// -----------------------------------------------------------------------------
// ConstructorInfo

/// A constructor of a class type.
///
/// The engine allocates an instance from the type's slot template and then
/// runs the body with the bound arguments.
#[derive(Clone)]
pub struct ConstructorInfo {
    pub(crate) parameters: Vec<ParameterInfo>,
    pub(crate) visibility: Visibility,
    pub(crate) body: ConstructFn,
    pub(crate) attributes: Option<Arc<CustomAttributes>>,
}

impl ConstructorInfo {
    impl_custom_attributes_fn!(attributes);

    #[inline]
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn is_public(&self) -> bool {
        self.visibility.is_public()
    }

    /// `true` for a parameterless constructor.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.parameters.is_empty()
    }

    #[inline]
    pub fn invoke(&self, heap: &mut Heap, target: ObjectId, args: &[Value]) -> Result<(), BoxError> {
        (self.body)(heap, target, args)
    }
}

impl core::fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("parameters", &self.parameters)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}
