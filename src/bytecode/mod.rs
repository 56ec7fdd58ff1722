//! Source bytecode model: code objects, opcodes, decoding and assembly.
//!
//! A [`CodeObject`] is everything the translator needs to know about one
//! source function: its instruction stream, the tables the instructions index
//! into, and the line-number table used for diagnostics.
//!
//! # Key Components
//!
//! - [`CodeObject`] - One compiled source function
//! - [`Literal`] - A constant-pool entry
//! - [`Opcode`] / [`CompareOp`] - Opcode and comparison tables
//! - [`decode_step`] / [`find_labels`] / [`disassembly_window`] - Raw stream access
//! - [`find_lineno`] - Offset to source line mapping
//! - [`CodeBuilder`] - Assembler with symbolic labels, used to produce test inputs

mod decoder;
mod encoder;
mod lineno;
mod opcodes;

pub use decoder::{decode_step, decode_stream, disassembly_window, find_labels, RawInstruction};
pub use encoder::CodeBuilder;
pub use lineno::find_lineno;
pub use opcodes::{opcode_name, CompareOp, JumpKind, Opcode, HAVE_ARGUMENT};

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::{unit::FunctionKey, Error, Result};

/// A constant-pool entry.
///
/// Floats compare and hash by their bit pattern so that equality stays
/// reflexive for every value, including NaN.
#[derive(Debug, Clone, Copy)]
pub enum Literal {
    /// The `None` singleton. It has no static type and cannot be translated.
    None,
    /// A boolean constant
    Bool(bool),
    /// An integer constant
    Int(i64),
    /// A floating-point constant
    Float(f64),
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::None, Literal::None) => true,
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::None => {}
            Literal::Bool(value) => value.hash(state),
            Literal::Int(value) => value.hash(state),
            Literal::Float(value) => value.to_bits().hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => write!(f, "None"),
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// One compiled source function.
///
/// `varnames` lists the parameters first (the first `argcount` entries),
/// followed by the remaining local variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    /// Function name
    pub name: String,
    /// File the function was compiled from
    pub filename: String,
    /// Source line of the function header
    pub first_line: u32,
    /// Raw instruction stream
    pub code: Vec<u8>,
    /// Constant pool, indexed by `LOAD_CONST`
    pub consts: Vec<Literal>,
    /// Global name table, indexed by `LOAD_GLOBAL` and `LOAD_ATTR`
    pub names: Vec<String>,
    /// Local variable table, indexed by `LOAD_FAST` and `STORE_FAST`
    pub varnames: Vec<String>,
    /// Number of formal parameters
    pub argcount: usize,
    /// Line-number table as `(address increment, line increment)` pairs
    pub lnotab: Vec<(u8, u8)>,
}

impl CodeObject {
    /// Identity of this function within a translation unit.
    #[must_use]
    pub fn key(&self) -> FunctionKey {
        FunctionKey::new(&self.filename, &self.name, self.first_line)
    }

    /// Source line of the instruction at `offset`.
    #[must_use]
    pub fn line_at(&self, offset: usize) -> u32 {
        find_lineno(self.first_line, &self.lnotab, offset)
    }

    /// Constant-pool entry referenced by the instruction at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `index` is outside the constant pool.
    pub fn constant(&self, index: u32, offset: usize) -> Result<Literal> {
        self.consts
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::Decode {
                offset,
                message: format!(
                    "constant index {index} outside a pool of {}",
                    self.consts.len()
                ),
            })
    }

    /// Global name referenced by the instruction at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `index` is outside the name table.
    pub fn global_name(&self, index: u32, offset: usize) -> Result<&str> {
        self.names
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| Error::Decode {
                offset,
                message: format!(
                    "name index {index} outside a table of {}",
                    self.names.len()
                ),
            })
    }

    /// Checks that `index` names a local variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `index` is outside the variable table.
    pub fn variable(&self, index: u32, offset: usize) -> Result<usize> {
        let index = index as usize;
        if index < self.varnames.len() {
            Ok(index)
        } else {
            Err(Error::Decode {
                offset,
                message: format!(
                    "variable index {index} outside a table of {}",
                    self.varnames.len()
                ),
            })
        }
    }
}
