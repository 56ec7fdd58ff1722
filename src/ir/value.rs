//! SSA values, operands and their identifiers.
//!
//! Every value of a procedure lives in one arena and is referred to by a
//! [`ValueId`]. Blocks are referred to by [`BlockId`] and source variables by
//! [`VarId`], an index into the procedure's variable table.

use std::{collections::BTreeMap, fmt};

use crate::{
    bytecode::Literal,
    ir::Op,
    types::Type,
};

/// Index of a value in its procedure's value arena.
///
/// Identifiers are handed out in creation order and are unique within the
/// procedure.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    /// Creates a value identifier from a raw arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Index of a block in its procedure. Block 0 is always the entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// The entry block of every procedure.
    pub const ENTRY: BlockId = BlockId(0);

    /// Creates a block identifier from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Index of a source variable in the procedure's variable table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Creates a variable identifier from a raw table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var{}", self.0)
    }
}

/// What a stack slot or a variable definition holds during discovery.
///
/// `Local` stands for "the value of this variable on entry to the block" and is
/// only meaningful until variable resolution runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// A concrete SSA value
    Value(ValueId),
    /// The incoming value of a variable, not yet resolved
    Local(VarId),
}

/// An instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// An SSA value
    Value(ValueId),
    /// A placeholder for a variable's incoming value; eliminated by resolution
    Local(VarId),
    /// A branch target
    Block(BlockId),
}

impl Operand {
    /// The value this operand refers to, if it is a value operand.
    #[must_use]
    pub fn value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(value) => Some(*value),
            _ => None,
        }
    }

    /// The block this operand targets, if it is a branch target.
    #[must_use]
    pub fn block(&self) -> Option<BlockId> {
        match self {
            Operand::Block(block) => Some(*block),
            _ => None,
        }
    }
}

impl From<Binding> for Operand {
    fn from(binding: Binding) -> Self {
        match binding {
            Binding::Value(value) => Operand::Value(value),
            Binding::Local(var) => Operand::Local(var),
        }
    }
}

/// An operation applied to operands, placed in a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Block the instruction belongs to
    pub block: BlockId,
    /// Bytecode offset the instruction was lowered from
    pub offset: usize,
    /// The operation
    pub op: Op,
    /// Ordered operands
    pub operands: Vec<Operand>,
}

/// A merge of one variable's values at a join block.
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    /// Join block the phi sits at
    pub block: BlockId,
    /// Variable being merged
    pub variable: VarId,
    /// Incoming value per predecessor
    pub incoming: BTreeMap<BlockId, ValueId>,
}

/// The different kinds of SSA value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// The result of an operation
    Instruction(Instruction),
    /// A phi at a join block
    Phi(Phi),
    /// A formal parameter, by position
    Argument {
        /// Parameter position
        index: usize,
    },
    /// A reference to a global by name
    Global {
        /// Global name
        name: String,
        /// Offset of the load
        offset: usize,
    },
    /// A constant-pool literal
    Constant {
        /// The literal
        literal: Literal,
        /// Offset of the load
        offset: usize,
    },
}

/// A value together with its annotation and users.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueData {
    pub(crate) kind: ValueKind,
    pub(crate) ty: Type,
    pub(crate) uses: Vec<ValueId>,
}

impl ValueData {
    /// What kind of value this is.
    #[must_use]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    /// Current type annotation.
    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Values that use this value as an operand or phi input, without duplicates.
    #[must_use]
    pub fn uses(&self) -> &[ValueId] {
        &self.uses
    }

    /// The instruction, if this value is one.
    #[must_use]
    pub fn as_instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(instruction) => Some(instruction),
            _ => None,
        }
    }

    /// The phi, if this value is one.
    #[must_use]
    pub fn as_phi(&self) -> Option<&Phi> {
        match &self.kind {
            ValueKind::Phi(phi) => Some(phi),
            _ => None,
        }
    }

    /// Returns `true` for instructions and phis, whose annotation is computed
    /// rather than fixed at creation.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self.kind, ValueKind::Instruction(_) | ValueKind::Phi(_))
    }
}
