//! Reflection metadata describing registered types.
//!
//! ## Menu
//!
//! - [`TypeKey`] and [`PrimitiveType`]: type identity and builtin leaves.
//! - [`TypeInfo`]: capabilities of one type (members, constructors,
//!   collection shapes, conversions, callbacks).
//! - [`MemberInfo`] / [`ConstructorInfo`]: declared members and constructors.
//! - [`CustomAttributes`]: annotations keyed by Rust type.
//! - [`TypeBuilder`]: how user types are described before registration.

// -----------------------------------------------------------------------------
// Modules

mod attributes;
mod builder;
mod constructor_info;
mod member_info;
mod type_info;
mod type_key;

// -----------------------------------------------------------------------------
// Exports

pub use attributes::CustomAttributes;
pub(crate) use attributes::impl_custom_attributes_fn;

pub use builder::{ConstructorBuilder, MemberBuilder, TypeBuilder};
pub(crate) use builder::slot_bindings;

pub use constructor_info::{ConstructFn, ConstructorInfo, ParameterInfo};
pub use member_info::{BoxError, GetFn, Getter, MemberInfo, MemberKind, SetFn, Setter, Visibility};
pub use type_info::{
    Callbacks, DeserializeCallback, DocumentKind, EnumInfo, ErrorCallback, FromPrimitiveFn,
    FromStringFn, ListShape, MapShape, PairsCreateFn, PrimitiveConversion, SequenceCreateFn,
    SerializeCallback, StringConversion, ToPrimitiveFn, ToStringFn, TypeInfo, TypeKind,
};
pub use type_key::{PrimitiveType, TypeKey};
pub(crate) use type_info::short_name;
