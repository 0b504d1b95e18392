//! The graph reader.
//!
//! A [`ReadContext`] pulls tokens through a cursor and rebuilds instances in
//! a [`Heap`](crate::heap::Heap) guided by the contract of each declared
//! type. Leading `$ref`, `$id`, `$type` and `$values` properties are read
//! as metadata, constructors are chosen per contract, and existing member
//! values are filled in place when the creation policy allows it.
//!
//! Recoverable failures are offered to error handlers; a handled failure
//! skips the rest of the offending value and reading continues with its
//! next sibling.

// -----------------------------------------------------------------------------
// Modules

mod collection;
mod context;
mod cursor;
mod metadata;
mod object;
mod walk;

// -----------------------------------------------------------------------------
// Exports

pub use context::ReadContext;
