//! The table of registered types.
//!
//! Rust has no runtime reflection, so every type the engine walks is
//! described up front in a [`TypeRegistry`], either by hand or through
//! functions submitted with [`auto_register!`](crate::auto_register).

// -----------------------------------------------------------------------------
// Modules

#[cfg(feature = "auto_register")]
mod auto_register;
mod error;
mod type_registry;

// -----------------------------------------------------------------------------
// Exports

#[cfg(feature = "auto_register")]
pub use auto_register::AutoRegistration;
pub use error::RegistryError;
pub use type_registry::TypeRegistry;
