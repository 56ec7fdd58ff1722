//! # tyflow Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the tyflow library. Import this module to get quick access to everything needed
//! to build, translate and inspect a function.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all tyflow operations
pub use crate::Error;

/// Unsupported-construct diagnostic
pub use crate::Diagnostic;

/// The result type used throughout tyflow
pub use crate::Result;

/// Translation settings
pub use crate::TranslationConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Single-function pipeline and the concurrent build cache
pub use crate::{translate, FunctionKey, TranslationUnit};

// ================================================================================================
// Bytecode
// ================================================================================================

/// Source function model and assembler
pub use crate::bytecode::{CodeBuilder, CodeObject, CompareOp, Literal, Opcode};

// ================================================================================================
// SSA Representation
// ================================================================================================

/// Procedures, blocks and values
pub use crate::ir::{
    Block, BlockId, Instruction, Op, Operand, Phi, Procedure, ValueData, ValueId, ValueKind,
    VarId,
};

/// Dominator queries
pub use crate::analysis::DominatorTree;

// ================================================================================================
// Type System
// ================================================================================================

/// The type lattice
pub use crate::types::{FuncType, JoinSemiLattice, Nominal, Type};
