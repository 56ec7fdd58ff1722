//! Type lattice used to annotate SSA values.
//!
//! # Key Components
//!
//! - [`Type`] - A lattice node, from [`Type::Unbound`] up to [`Type::Anything`]
//! - [`Nominal`] - The fixed set of registered named types
//! - [`FuncType`] - Function signatures, used for declared signatures
//! - [`JoinSemiLattice`] - The join abstraction the annotator is written against
//!
//! # Example
//!
//! ```rust
//! use tyflow::bytecode::Literal;
//! use tyflow::types::{Nominal, Type};
//!
//! let t = Type::Constant(Nominal::Bool, Literal::Bool(true));
//! let f = Type::Constant(Nominal::Bool, Literal::Bool(false));
//! assert_eq!(t.union(&f), Type::Nominal(Nominal::Bool));
//! assert_eq!(t.union(&Type::Unbound), t);
//! ```

mod lattice;
mod nominal;

pub use lattice::{FuncType, JoinSemiLattice, Type, LATTICE_HEIGHT};
pub use nominal::{Nominal, NominalInfo};
