//! Re-exports [`fastvec`]'s inline-first vector.
//!
//! Used for short candidate lists collected during contract resolution,
//! which rarely spill to the heap.

pub use fastvec::FastVec;
