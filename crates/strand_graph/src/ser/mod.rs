//! The graph writer.
//!
//! A [`WriteContext`] walks the values reachable from a root through their
//! contracts and emits tokens to a [`TokenWriter`](crate::token::TokenWriter).
//! It tracks the objects currently being written to detect reference loops,
//! writes `$id` / `$ref` / `$type` metadata as configured, and offers
//! recoverable failures to error handlers before giving up.
//!
//! Converters receive the context to write their own tokens or to hand a
//! nested value back to the walker.

// -----------------------------------------------------------------------------
// Modules

mod context;
mod walk;

// -----------------------------------------------------------------------------
// Exports

pub use context::WriteContext;
