//! SSA construction and type propagation passes.
//!
//! This module turns a decoded [`CodeObject`](crate::bytecode::CodeObject) into
//! an annotated [`Procedure`](crate::ir::Procedure). Each pass lives in its own
//! sub-module and works in place on the procedure:
//!
//! # Architecture
//!
//! - [`discovery`] - Abstract interpretation of the bytecode into blocks and edges
//! - [`dominators`] - Immediate dominators by fixed-point iteration
//! - [`liveness`] - Per-block live-in variable sets
//! - [`phis`] - Dominance frontiers, phi placement and variable resolution
//! - [`verify`] - Structural checks on the finished SSA graph
//! - [`annotator`] - Type propagation to a fixed point
//!
//! The passes must run in this order; [`crate::translate`] runs all of them.
//!
//! # Usage
//!
//! ```rust
//! use tyflow::analysis::{compute_dominators, construct_ssa, discover, propagate_liveness, verify};
//! use tyflow::bytecode::{CodeBuilder, Opcode};
//! use tyflow::TranslationConfig;
//!
//! let mut builder = CodeBuilder::new("identity").params(&["x"]);
//! builder.load_fast("x")?.op(Opcode::ReturnValue)?;
//! let code = builder.finish()?;
//!
//! let mut procedure = discover(&code, None, &TranslationConfig::default())?;
//! compute_dominators(&mut procedure)?;
//! propagate_liveness(&mut procedure)?;
//! let phis = construct_ssa(&mut procedure)?;
//! verify(&procedure)?;
//! assert_eq!(phis, 0);
//! # Ok::<(), tyflow::Error>(())
//! ```

pub mod annotator;
pub mod discovery;
pub mod dominators;
pub mod liveness;
pub mod phis;
pub mod verify;

pub use annotator::{AnnotationSummary, Annotator, Step};
pub use discovery::discover;
pub use dominators::{common_dominator, compute_dominators, DominatorIterator, DominatorTree};
pub use liveness::propagate_liveness;
pub use phis::{compute_frontiers, construct_ssa, frontier_sources, lookup, lookup_up, place_phis, resolve};
pub use verify::verify;
