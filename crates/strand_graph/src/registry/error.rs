use alloc::string::String;

use thiserror::Error;

use crate::info::TypeKey;

/// Mistakes made while describing types to a [`TypeRegistry`](super::TypeRegistry).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("type path `{0}` is already registered")]
    DuplicatePath(String),
    #[error("{0:?} is not a registered type key")]
    UnknownKey(TypeKey),
    #[error("type `{0}` is already defined")]
    AlreadyDefined(String),
    #[error("`{path}` depends on `{dependency}`, which is declared but not defined")]
    UndefinedDependency { path: String, dependency: String },
    #[error("`{path}` cannot derive from `{base}`: {reason}")]
    InvalidBase {
        path: String,
        base: String,
        reason: &'static str,
    },
    #[error("`{path}` lists `{interface}` as an interface, but it is not one")]
    NotAnInterface { path: String, interface: String },
}
