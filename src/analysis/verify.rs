//! Structural checks on a resolved procedure.
//!
//! The verifier runs after variable resolution when
//! [`TranslationConfig::verify`](crate::TranslationConfig::verify) is set. It
//! checks that:
//!
//! - the entry block has no predecessors and no dominator, every other block has one
//! - phis only sit at blocks with two or more predecessors
//! - every block ends in exactly one terminator and has no other
//! - every instruction carries as many value operands as its operation takes
//! - no [`Operand::Local`] placeholder survived resolution
//! - every phi has exactly one incoming value per predecessor
//! - every use is dominated by its definition (phi inputs at the end of the
//!   corresponding predecessor)
//! - use lists agree with the operands that reference each value

use log::trace;

use crate::{
    analysis::dominators::DominatorTree,
    ir::{BlockId, Operand, Procedure, ValueId, ValueKind},
    Result,
};

/// Position of a definition: its block and its index within the block, with
/// phis ahead of every instruction.
#[derive(Debug, Clone, Copy)]
struct Site {
    block: BlockId,
    position: Option<usize>,
}

/// Checks the SSA invariants of `procedure`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] describing the first violation found.
pub fn verify(procedure: &Procedure) -> Result<()> {
    let tree = DominatorTree::from_procedure(procedure);
    let sites = definition_sites(procedure);

    for block in procedure.blocks() {
        if block.id() == procedure.entry() {
            if !block.predecessors().is_empty() || block.idom().is_some() {
                return Err(malformed_error!("entry block has a predecessor or a dominator"));
            }
        } else if block.idom().is_none() {
            return Err(malformed_error!("{} has no immediate dominator", block.id()));
        }
        if !block.phis().is_empty() && !block.is_join() {
            return Err(malformed_error!(
                "{} has phis but only {} predecessor(s)",
                block.id(),
                block.predecessors().len()
            ));
        }

        let Some(last) = block.terminator() else {
            return Err(malformed_error!("{} has no terminator", block.id()));
        };
        if !is_terminator(procedure, last) {
            return Err(malformed_error!("{} does not end in a terminator", block.id()));
        }
        let body = &block.instructions()[..block.instructions().len() - 1];
        if let Some(stray) = body.iter().find(|id| is_terminator(procedure, **id)) {
            return Err(malformed_error!("{} has a terminator ({}) before its end", block.id(), stray));
        }

        for (position, id) in block.instructions().iter().enumerate() {
            let Some(instruction) = procedure.value(*id).as_instruction() else {
                return Err(malformed_error!("{} in {} is not an instruction", id, block.id()));
            };
            let values = instruction
                .operands
                .iter()
                .filter(|operand| !matches!(operand, Operand::Block(_)))
                .count();
            if values != instruction.op.arity() {
                return Err(malformed_error!(
                    "{} ({}) takes {} value operand(s) but has {}",
                    id,
                    instruction.op,
                    instruction.op.arity(),
                    values
                ));
            }
            for operand in &instruction.operands {
                match operand {
                    Operand::Local(var) => {
                        return Err(malformed_error!(
                            "{} still reads '{}' as an unresolved local",
                            id,
                            procedure.variable_name(*var)
                        ));
                    }
                    Operand::Value(used) => {
                        check_dominance(procedure, &tree, &sites, *used, block.id(), Some(position), *id)?;
                    }
                    Operand::Block(target) => {
                        if !block.successors().contains(target) {
                            return Err(malformed_error!(
                                "{} targets {} which is not a successor of {}",
                                id,
                                target,
                                block.id()
                            ));
                        }
                    }
                }
            }
        }

        let mut preds = block.predecessors().to_vec();
        preds.sort_unstable();
        for phi_id in block.phis().values() {
            let Some(phi) = procedure.value(*phi_id).as_phi() else {
                return Err(malformed_error!("{} in {} is not a phi", phi_id, block.id()));
            };
            let incoming: Vec<BlockId> = phi.incoming.keys().copied().collect();
            if incoming != preds {
                return Err(malformed_error!(
                    "{} at {} has inputs from {:?} but predecessors {:?}",
                    phi_id,
                    block.id(),
                    incoming,
                    preds
                ));
            }
            for (pred, value) in &phi.incoming {
                // the input must be available at the end of the predecessor
                check_dominance(procedure, &tree, &sites, *value, *pred, None, *phi_id)?;
            }
        }
    }

    check_use_lists(procedure)?;
    trace!("{}: verified", procedure.name());
    Ok(())
}

fn is_terminator(procedure: &Procedure, id: ValueId) -> bool {
    procedure
        .value(id)
        .as_instruction()
        .is_some_and(|instruction| instruction.op.is_terminator())
}

fn definition_sites(procedure: &Procedure) -> Vec<Option<Site>> {
    let mut sites = vec![None; procedure.value_count()];
    for block in procedure.blocks() {
        for phi in block.phis().values() {
            sites[phi.index()] = Some(Site {
                block: block.id(),
                position: None,
            });
        }
        for (position, id) in block.instructions().iter().enumerate() {
            sites[id.index()] = Some(Site {
                block: block.id(),
                position: Some(position),
            });
        }
    }
    for (index, value) in procedure.values().iter().enumerate() {
        if let ValueKind::Argument { .. } = value.kind() {
            sites[index] = Some(Site {
                block: procedure.entry(),
                position: None,
            });
        }
    }
    sites
}

/// Checks that `used` is available at `position` in `block`; `None` means the
/// end of the block.
fn check_dominance(
    procedure: &Procedure,
    tree: &DominatorTree,
    sites: &[Option<Site>],
    used: ValueId,
    block: BlockId,
    position: Option<usize>,
    user: ValueId,
) -> Result<()> {
    if used.index() >= procedure.value_count() {
        return Err(malformed_error!("{} uses {} which does not exist", user, used));
    }
    let Some(site) = sites[used.index()] else {
        // constants and globals are available everywhere
        return Ok(());
    };

    let available = if site.block == block {
        match (site.position, position) {
            (_, None) | (None, Some(_)) => true,
            (Some(def), Some(at)) => def < at,
        }
    } else {
        tree.dominates(site.block, block)
    };

    if available {
        Ok(())
    } else {
        Err(malformed_error!(
            "{} uses {} which is not available in {}",
            user,
            used,
            block
        ))
    }
}

fn check_use_lists(procedure: &Procedure) -> Result<()> {
    for (index, value) in procedure.values().iter().enumerate() {
        let user = ValueId::new(index);
        let used: Vec<ValueId> = match value.kind() {
            ValueKind::Instruction(instruction) => {
                instruction.operands.iter().filter_map(Operand::value).collect()
            }
            ValueKind::Phi(phi) => phi.incoming.values().copied().collect(),
            _ => continue,
        };
        for id in used {
            if !procedure.value(id).uses().contains(&user) {
                return Err(malformed_error!("{} is missing {} from its users", id, user));
            }
        }
    }
    Ok(())
}
