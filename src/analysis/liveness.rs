//! Live-in variable sets.
//!
//! Discovery leaves each block's `depends` set holding the variables the block
//! itself reads before assigning them. This pass extends those sets backwards
//! along the control-flow graph until they are the blocks' live-in sets:
//!
//! - `OUT[B]` = ∪{`depends`[S] | S is a successor of B}
//! - `depends`[B] = `depends`[B] ∪ (`OUT[B]` - `DEF[B]`)
//!
//! A variable that a block only reads after assigning it is therefore not in
//! its set, while a variable the block never touches but some successor reads
//! is. Sets only grow, so the fixed point is reached after at most one more
//! pass than there are blocks.

use log::debug;

use crate::{
    ir::{BlockId, Procedure},
    utils::BitSet,
    Result,
};

/// Propagates `depends` sets to a fixed point and returns the number of passes.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the sets keep growing past the pass bound.
pub fn propagate_liveness(procedure: &mut Procedure) -> Result<usize> {
    let count = procedure.block_count();
    let variables = procedure.varnames().len();

    let mut passes = 0;
    loop {
        passes += 1;
        let mut changed = false;

        for index in (0..count).rev() {
            let block = procedure.block(BlockId(index));
            let mut out = BitSet::new(variables);
            for succ in block.successors() {
                out.union_with(procedure.block(*succ).depends());
            }
            let mut defined = BitSet::new(variables);
            for var in block.defines().keys() {
                defined.insert(var.index());
            }
            out.difference_with(&defined);
            changed |= procedure.block_mut(BlockId(index)).depends.union_with(&out);
        }

        if !changed {
            break;
        }
        if passes > count + 1 {
            return Err(malformed_error!(
                "liveness of {} did not converge after {} passes",
                procedure.name(),
                passes
            ));
        }
    }

    debug!("{}: liveness converged after {} passes", procedure.name(), passes);
    Ok(passes)
}
