//! Static registration through the [`inventory`] crate.

use crate::registry::{RegistryError, TypeRegistry};

/// A registration function collected by [`auto_register!`](crate::auto_register).
pub struct AutoRegistration {
    register: fn(&mut TypeRegistry) -> Result<(), RegistryError>,
}

impl AutoRegistration {
    #[inline]
    pub const fn new(register: fn(&mut TypeRegistry) -> Result<(), RegistryError>) -> Self {
        Self { register }
    }

    #[inline]
    pub(crate) fn run(&self, registry: &mut TypeRegistry) -> Result<(), RegistryError> {
        (self.register)(registry)
    }
}

inventory::collect!(AutoRegistration);

/// Submits a registration function to [`TypeRegistry::auto_register`].
///
/// ```no_run
/// use strand_graph::info::{TypeBuilder, TypeKey};
/// use strand_graph::registry::{RegistryError, TypeRegistry};
///
/// fn register_point(registry: &mut TypeRegistry) -> Result<(), RegistryError> {
///     registry.register(
///         "geo::Point",
///         TypeBuilder::class()
///             .field("X", TypeKey::F64)
///             .field("Y", TypeKey::F64)
///             .default_constructor(),
///     )?;
///     Ok(())
/// }
///
/// strand_graph::auto_register!(register_point);
///
/// let mut registry = TypeRegistry::new();
/// registry.auto_register().unwrap();
/// assert!(registry.get_with_type_path("geo::Point").is_some());
/// ```
#[macro_export]
macro_rules! auto_register {
    ($register:path) => {
        $crate::__macro_exports::inventory::submit! {
            $crate::registry::AutoRegistration::new($register)
        }
    };
}

pub(crate) fn registrations() -> impl Iterator<Item = &'static AutoRegistration> {
    inventory::iter::<AutoRegistration>.into_iter()
}
