#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Alloc

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod coerce;
mod path;
mod serializer;
mod site;

pub mod attrs;
pub mod binder;
pub mod contract;
pub mod convert;
pub mod de;
pub mod error;
pub mod heap;
pub mod info;
pub mod reference;
pub mod registry;
pub mod resolve;
pub mod ser;
pub mod settings;
pub mod token;
pub mod value;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use error::{Error, Result};
pub use serializer::GraphSerializer;

#[doc(hidden)]
pub mod __macro_exports {
    #[cfg(feature = "auto_register")]
    pub use inventory;
}
