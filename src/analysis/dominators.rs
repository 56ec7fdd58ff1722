//! Immediate dominators by fixed-point iteration.
//!
//! A block `d` **dominates** a block `n` if every path from the entry to `n`
//! passes through `d`. The **immediate dominator** of `n` is the closest strict
//! dominator; linking every block to it forms the dominator tree, rooted at the
//! entry block.
//!
//! # Algorithm
//!
//! Every block is seeded with the predecessor that first discovered it along a
//! depth-first walk from the entry. Then, in reverse postorder, each block's
//! dominator is recomputed as the fold of [`common_dominator`] over its
//! predecessors, where `common_dominator` lifts the deeper of two blocks until
//! both are at the same depth and then climbs both chains in lock-step. Passes
//! repeat until one of them changes nothing.
//!
//! Each update moves a block's dominator towards the entry, so the iteration
//! terminates; a pass budget of one more than the block count guards against
//! defects.

use log::debug;

use crate::{
    ir::{BlockId, Procedure},
    Result,
};

/// Dominator relationships of a finished procedure.
///
/// # Examples
///
/// ```rust
/// use tyflow::analysis::DominatorTree;
/// use tyflow::bytecode::{CodeBuilder, Literal, Opcode};
/// use tyflow::{translate, TranslationConfig};
///
/// let mut builder = CodeBuilder::new("sign").params(&["x"]);
/// builder
///     .load_fast("x")?
///     .jump(Opcode::PopJumpIfFalse, "zero")?
///     .load_const(Literal::Int(1))?
///     .op(Opcode::ReturnValue)?
///     .label("zero")?
///     .load_const(Literal::Int(0))?
///     .op(Opcode::ReturnValue)?;
/// let procedure = translate(&builder.finish()?, None, &TranslationConfig::default())?;
///
/// let tree = DominatorTree::from_procedure(&procedure);
/// let entry = procedure.entry();
/// for block in procedure.blocks() {
///     assert!(tree.dominates(entry, block.id()));
/// }
/// # Ok::<(), tyflow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: BlockId,
    idom: Vec<Option<BlockId>>,
}

impl DominatorTree {
    /// Captures the `idom` links stored in a procedure's blocks.
    #[must_use]
    pub fn from_procedure(procedure: &Procedure) -> Self {
        Self {
            entry: procedure.entry(),
            idom: procedure.blocks().iter().map(|block| block.idom()).collect(),
        }
    }

    /// Returns the entry (root) block.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Returns the immediate dominator of a block, or `None` for the entry.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block.index()).copied().flatten()
    }

    /// Checks if block `a` dominates block `b`. A block dominates itself.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.dominators(b).any(|dominator| dominator == a)
    }

    /// Checks if block `a` dominates block `b` and `a != b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Iterates over the dominators of a block, from the block itself up to the entry.
    pub fn dominators(&self, block: BlockId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: Some(block),
            remaining: self.idom.len() + 1,
        }
    }

    /// Depth of a block in the dominator tree; the entry has depth 0.
    #[must_use]
    pub fn depth(&self, block: BlockId) -> usize {
        self.dominators(block).count().saturating_sub(1)
    }

    /// Blocks whose immediate dominator is `block`.
    #[must_use]
    pub fn children(&self, block: BlockId) -> Vec<BlockId> {
        self.idom
            .iter()
            .enumerate()
            .filter(|(_, idom)| **idom == Some(block))
            .map(|(i, _)| BlockId(i))
            .collect()
    }

    /// Number of blocks covered by the tree.
    #[inline]
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.idom.len()
    }
}

/// Iterator over the dominators of a block, from the block up to the entry.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<BlockId>,
    remaining: usize,
}

impl Iterator for DominatorIterator<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        if self.remaining == 0 {
            self.current = None;
            return None;
        }
        self.remaining -= 1;
        self.current = self.tree.immediate_dominator(current);
        Some(current)
    }
}

/// Computes the immediate dominator of every block and stores it in the block.
///
/// Returns the number of passes the fixed point took.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the dominator links ever form a cycle
/// or the iteration exceeds its pass budget.
pub fn compute_dominators(procedure: &mut Procedure) -> Result<usize> {
    let count = procedure.block_count();
    if count == 0 {
        return Ok(0);
    }
    let entry = procedure.entry();

    let mut idom: Vec<Option<BlockId>> = vec![None; count];
    let mut visited = vec![false; count];
    let mut postorder = Vec::with_capacity(count);
    let mut stack = vec![(entry, 0usize)];
    visited[entry.index()] = true;

    while let Some(top) = stack.last_mut() {
        let (block, cursor) = *top;
        match procedure.block(block).successors().get(cursor).copied() {
            Some(succ) => {
                top.1 += 1;
                if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    idom[succ.index()] = Some(block);
                    stack.push((succ, 0));
                }
            }
            None => {
                postorder.push(block);
                stack.pop();
            }
        }
    }

    let order: Vec<BlockId> = postorder
        .into_iter()
        .rev()
        .filter(|block| *block != entry)
        .collect();

    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;

        for &block in &order {
            let mut folded: Option<BlockId> = None;
            for &pred in procedure.block(block).predecessors() {
                if !visited[pred.index()] {
                    continue;
                }
                folded = Some(match folded {
                    None => pred,
                    Some(current) => common_dominator(&idom, current, pred)?,
                });
            }
            if folded.is_some() && folded != idom[block.index()] {
                idom[block.index()] = folded;
                changed = true;
            }
        }

        if !changed {
            break;
        }
        if passes > count {
            return Err(malformed_error!(
                "dominators of {} did not converge after {} passes",
                procedure.name(),
                passes
            ));
        }
    }

    for (index, dominator) in idom.into_iter().enumerate() {
        procedure.block_mut(BlockId(index)).idom = dominator;
    }
    debug!("{}: dominators converged after {} passes", procedure.name(), passes);
    Ok(passes)
}

/// Nearest block dominating both `a` and `b` under the current `idom` links.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the links form a cycle.
pub fn common_dominator(idom: &[Option<BlockId>], a: BlockId, b: BlockId) -> Result<BlockId> {
    let (mut a, mut b) = (a, b);
    let (mut depth_a, mut depth_b) = (depth(idom, a)?, depth(idom, b)?);

    while depth_a > depth_b {
        a = parent(idom, a)?;
        depth_a -= 1;
    }
    while depth_b > depth_a {
        b = parent(idom, b)?;
        depth_b -= 1;
    }
    while a != b {
        a = parent(idom, a)?;
        b = parent(idom, b)?;
    }
    Ok(a)
}

fn parent(idom: &[Option<BlockId>], block: BlockId) -> Result<BlockId> {
    idom.get(block.index())
        .copied()
        .flatten()
        .ok_or_else(|| malformed_error!("{} has no dominator", block))
}

fn depth(idom: &[Option<BlockId>], block: BlockId) -> Result<usize> {
    let mut depth = 0;
    let mut current = block;
    while let Some(next) = idom.get(current.index()).copied().flatten() {
        depth += 1;
        if depth > idom.len() {
            return Err(malformed_error!("dominator chain of {} is cyclic", block));
        }
        current = next;
    }
    Ok(depth)
}
