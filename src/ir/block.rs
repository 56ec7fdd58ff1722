//! Basic blocks of a procedure.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ir::{Binding, BlockId, ValueId, VarId},
    utils::BitSet,
};

/// A straight-line run of instructions ending in one terminator.
///
/// Besides its instructions a block carries the per-block facts the SSA passes
/// compute: the variables it defines, the variables it may read from outside,
/// its immediate dominator, its phis and its dominance frontier.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) offset: usize,
    pub(crate) instructions: Vec<ValueId>,
    pub(crate) preds: Vec<BlockId>,
    pub(crate) succs: Vec<BlockId>,
    pub(crate) defines: BTreeMap<VarId, Binding>,
    pub(crate) depends: BitSet,
    pub(crate) idom: Option<BlockId>,
    pub(crate) phis: BTreeMap<VarId, ValueId>,
    pub(crate) frontiers: BTreeSet<BlockId>,
}

impl Block {
    pub(crate) fn new(id: BlockId, offset: usize, variables: usize) -> Self {
        Self {
            id,
            offset,
            instructions: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            defines: BTreeMap::new(),
            depends: BitSet::new(variables),
            idom: None,
            phis: BTreeMap::new(),
            frontiers: BTreeSet::new(),
        }
    }

    /// Identifier of this block.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Bytecode offset the block starts at.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Instructions in execution order. The last one is the terminator.
    #[must_use]
    pub fn instructions(&self) -> &[ValueId] {
        &self.instructions
    }

    /// The terminating instruction, once the block is complete.
    #[must_use]
    pub fn terminator(&self) -> Option<ValueId> {
        self.instructions.last().copied()
    }

    /// Predecessors, in the order their edges were discovered.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    /// Successors, in the order their edges were discovered.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }

    /// Binding of each variable the block assigns, as of the block's exit.
    #[must_use]
    pub fn defines(&self) -> &BTreeMap<VarId, Binding> {
        &self.defines
    }

    /// Variables whose incoming value the block may read.
    ///
    /// Before liveness this holds the block's own reads of variables it has not
    /// assigned yet; afterwards it is the live-in set.
    #[must_use]
    pub fn depends(&self) -> &BitSet {
        &self.depends
    }

    /// Immediate dominator; `None` for the entry block.
    #[must_use]
    pub fn idom(&self) -> Option<BlockId> {
        self.idom
    }

    /// Phis placed at this block, by variable.
    #[must_use]
    pub fn phis(&self) -> &BTreeMap<VarId, ValueId> {
        &self.phis
    }

    /// Blocks in this block's dominance frontier.
    #[must_use]
    pub fn frontiers(&self) -> &BTreeSet<BlockId> {
        &self.frontiers
    }

    /// Returns `true` if control can reach this block from more than one place.
    #[must_use]
    pub fn is_join(&self) -> bool {
        self.preds.len() >= 2
    }
}
