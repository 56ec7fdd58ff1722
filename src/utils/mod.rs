//! Shared helpers used across the analysis passes.

mod bitset;
mod dot;

pub use bitset::{BitSet, BitSetIter};
pub use dot::{escape_dot, procedure_to_dot};
