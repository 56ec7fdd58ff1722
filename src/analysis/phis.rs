//! Dominance frontiers, phi placement and variable resolution.
//!
//! This is the pass that turns the discovered graph into pure SSA:
//!
//! 1. [`compute_frontiers`] fills every block's dominance frontier.
//! 2. [`place_phis`] inserts a phi for variable `V` at a frontier block `F` of
//!    a block that assigns `V`, but only if `V` is live into `F`. Every inserted
//!    phi is itself an assignment, so `F`'s own frontier is offered `V` in turn.
//! 3. [`resolve`] fills each phi with one incoming value per predecessor and
//!    replaces every [`Operand::Local`] placeholder with the value that reaches
//!    it, found by walking the dominator tree.
//!
//! Placement is minimal (dominance-frontier based, pruned by liveness), so a
//! block with a single predecessor never receives a phi.

use std::collections::BTreeSet;

use log::{debug, trace};

use crate::{
    ir::{Binding, BlockId, Operand, Procedure, ValueId, VarId},
    Error, Result,
};

/// Computes the dominance frontier of every block.
///
/// For each join block, every predecessor's dominator chain is walked up to,
/// but excluding, the join's immediate dominator; every block on the way has
/// the join in its frontier.
pub fn compute_frontiers(procedure: &mut Procedure) {
    for index in 0..procedure.block_count() {
        let join = BlockId(index);
        if !procedure.block(join).is_join() {
            continue;
        }
        let stop = procedure.block(join).idom();
        let preds = procedure.block(join).predecessors().to_vec();

        for pred in preds {
            let mut runner = Some(pred);
            while let Some(current) = runner {
                if Some(current) == stop {
                    break;
                }
                procedure.block_mut(current).frontiers.insert(join);
                runner = procedure.block(current).idom();
            }
        }
    }
}

/// Inserts phis and returns how many were created.
pub fn place_phis(procedure: &mut Procedure) -> usize {
    let mut work: Vec<(BlockId, VarId)> = Vec::new();
    for block in procedure.blocks() {
        for frontier in block.frontiers() {
            for var in block.defines().keys() {
                work.push((*frontier, *var));
            }
        }
    }
    // Pop in the order the offers were made.
    work.reverse();

    let mut inserted = 0;
    while let Some((block, var)) = work.pop() {
        let target = procedure.block(block);
        if !target.depends().contains(var.index()) || target.phis().contains_key(&var) {
            continue;
        }
        let offers: Vec<BlockId> = target.frontiers().iter().rev().copied().collect();

        let phi = procedure.add_phi(block, var);
        inserted += 1;
        trace!(
            "{}: {} = phi for '{}' at {}",
            procedure.name(),
            phi,
            procedure.variable_name(var),
            block
        );
        work.extend(offers.into_iter().map(|frontier| (frontier, var)));
    }

    debug!("{}: placed {} phis", procedure.name(), inserted);
    inserted
}

/// Value of `var` at the exit of `block`.
///
/// Uses the block's own definition if it has one, following a definition that
/// is itself an incoming variable through [`lookup_up`]; otherwise continues
/// with [`lookup_up`].
///
/// # Errors
///
/// Returns [`Error::UnresolvedVariable`] if the walk reaches the entry block
/// without finding a value.
pub fn lookup(procedure: &Procedure, block: BlockId, var: VarId) -> Result<ValueId> {
    let mut block = block;
    let mut var = var;
    let origin = block;

    loop {
        match procedure.block(block).defines().get(&var) {
            Some(Binding::Value(value)) => return Ok(*value),
            Some(Binding::Local(incoming)) => var = *incoming,
            None => {}
        }

        if let Some(phi) = procedure.block(block).phis().get(&var) {
            return Ok(*phi);
        }
        match procedure.block(block).idom() {
            Some(idom) => block = idom,
            None => return Err(unresolved(procedure, var, origin)),
        }
    }
}

/// Value of `var` on entry to `block`: the block's phi for it if there is one,
/// otherwise its value at the exit of the immediate dominator.
///
/// # Errors
///
/// Returns [`Error::UnresolvedVariable`] if `block` is the entry block and has
/// no phi for `var`, or the walk up the dominator tree finds no value.
pub fn lookup_up(procedure: &Procedure, block: BlockId, var: VarId) -> Result<ValueId> {
    if let Some(phi) = procedure.block(block).phis().get(&var) {
        return Ok(*phi);
    }
    match procedure.block(block).idom() {
        Some(idom) => lookup(procedure, idom, var).map_err(|_| unresolved(procedure, var, block)),
        None => Err(unresolved(procedure, var, block)),
    }
}

fn unresolved(procedure: &Procedure, var: VarId, block: BlockId) -> Error {
    Error::UnresolvedVariable {
        name: procedure.variable_name(var).to_string(),
        block,
    }
}

/// Fills every phi and replaces every [`Operand::Local`] with a concrete value.
///
/// # Errors
///
/// Returns [`Error::UnresolvedVariable`] for a variable read on some path
/// before any assignment.
pub fn resolve(procedure: &mut Procedure) -> Result<()> {
    for index in 0..procedure.block_count() {
        let block = BlockId(index);
        let preds = procedure.block(block).predecessors().to_vec();
        let phis: Vec<(VarId, ValueId)> = procedure
            .block(block)
            .phis()
            .iter()
            .map(|(var, phi)| (*var, *phi))
            .collect();

        for pred in &preds {
            for (var, phi) in &phis {
                let value = lookup(procedure, *pred, *var)?;
                procedure.set_incoming(*phi, *pred, value)?;
            }
        }

        let mut rewrites: Vec<(ValueId, usize, VarId)> = Vec::new();
        for id in procedure.block(block).instructions() {
            if let Some(instruction) = procedure.value(*id).as_instruction() {
                for (position, operand) in instruction.operands.iter().enumerate() {
                    if let Operand::Local(var) = operand {
                        rewrites.push((*id, position, *var));
                    }
                }
            }
        }
        for (id, position, var) in rewrites {
            let value = lookup_up(procedure, block, var)?;
            procedure.set_operand(id, position, value)?;
        }
    }
    Ok(())
}

/// Runs frontier computation, phi placement and resolution in sequence.
///
/// Dominators and liveness must already have been computed.
///
/// # Errors
///
/// See [`resolve`].
pub fn construct_ssa(procedure: &mut Procedure) -> Result<usize> {
    compute_frontiers(procedure);
    let inserted = place_phis(procedure);
    resolve(procedure)?;
    Ok(inserted)
}

/// Blocks whose frontier contains `join`; exposed for diagnostics and tests.
#[must_use]
pub fn frontier_sources(procedure: &Procedure, join: BlockId) -> BTreeSet<BlockId> {
    procedure
        .blocks()
        .iter()
        .filter(|block| block.frontiers().contains(&join))
        .map(|block| block.id())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{dominators::compute_dominators, discovery::discover, liveness::propagate_liveness},
        bytecode::{CodeBuilder, CodeObject, Literal, Opcode},
        config::TranslationConfig,
        test::{conditional_assignment, counting_loop, nested_branches, reassigned_at_join},
    };

    fn prepared(code: &CodeObject) -> Result<Procedure> {
        let mut procedure = discover(code, None, &TranslationConfig::default())?;
        compute_dominators(&mut procedure)?;
        propagate_liveness(&mut procedure)?;
        Ok(procedure)
    }

    fn local_count(procedure: &Procedure) -> usize {
        procedure
            .instructions()
            .flat_map(|(_, i)| i.operands.iter())
            .filter(|operand| matches!(operand, Operand::Local(_)))
            .count()
    }

    #[test]
    fn test_frontiers_of_diamond() -> Result<()> {
        let mut procedure = prepared(&conditional_assignment()?)?;
        compute_frontiers(&mut procedure);

        let join = procedure.blocks().iter().find(|b| b.is_join()).expect("join").id();
        assert!(procedure.block(procedure.entry()).frontiers().is_empty());
        assert_eq!(frontier_sources(&procedure, join).len(), 1);
        Ok(())
    }

    #[test]
    fn test_single_phi_at_join() -> Result<()> {
        let mut procedure = prepared(&conditional_assignment()?)?;
        assert_eq!(construct_ssa(&mut procedure)?, 1);

        let (_, phi) = procedure.phis().next().expect("phi");
        assert_eq!(procedure.variable_name(phi.variable), "x");
        assert_eq!(phi.incoming.len(), 2);
        assert_eq!(local_count(&procedure), 0);
        Ok(())
    }

    #[test]
    fn test_loop_header_phis() -> Result<()> {
        let mut procedure = prepared(&counting_loop()?)?;
        assert_eq!(construct_ssa(&mut procedure)?, 2);

        let header = procedure.blocks().iter().find(|b| b.is_join()).expect("header");
        let merged: Vec<&str> = header
            .phis()
            .keys()
            .map(|var| procedure.variable_name(*var))
            .collect();
        assert_eq!(merged, vec!["i", "total"]);
        for (_, phi) in procedure.phis() {
            let keys: Vec<BlockId> = phi.incoming.keys().copied().collect();
            let mut preds = procedure.block(phi.block).predecessors().to_vec();
            preds.sort();
            assert_eq!(keys, preds);
        }
        assert_eq!(local_count(&procedure), 0);
        Ok(())
    }

    #[test]
    fn test_three_way_join() -> Result<()> {
        let mut procedure = prepared(&nested_branches()?)?;
        construct_ssa(&mut procedure)?;

        let phis: Vec<_> = procedure.phis().collect();
        assert_eq!(phis.len(), 1);
        assert_eq!(phis[0].1.incoming.len(), 3);
        Ok(())
    }

    #[test]
    fn test_join_that_reassigns_gets_phi() -> Result<()> {
        let mut procedure = prepared(&reassigned_at_join()?)?;
        assert_eq!(construct_ssa(&mut procedure)?, 1);

        let (phi_id, phi) = procedure.phis().next().expect("phi");
        let join = procedure.block(phi.block);
        let (_, add) = procedure
            .instructions()
            .find(|(_, i)| i.block == join.id() && i.op == crate::ir::Op::Add)
            .expect("add");
        assert_eq!(add.operands[0], Operand::Value(phi_id));
        Ok(())
    }

    #[test]
    fn test_no_phi_when_not_live() -> Result<()> {
        // the branch assigns y but nothing after the join reads it
        let mut builder = CodeBuilder::new("f").params(&["c"]);
        builder
            .load_const(Literal::Int(0))?
            .store_fast("y")?
            .load_fast("c")?
            .jump(Opcode::PopJumpIfFalse, "join")?
            .load_const(Literal::Int(1))?
            .store_fast("y")?
            .label("join")?
            .load_fast("c")?
            .op(Opcode::ReturnValue)?;
        let mut procedure = prepared(&builder.finish()?)?;
        assert_eq!(construct_ssa(&mut procedure)?, 0);
        Ok(())
    }

    #[test]
    fn test_unassigned_read_is_reported() -> Result<()> {
        let mut builder = CodeBuilder::new("f").params(&["c"]);
        builder
            .load_fast("c")?
            .jump(Opcode::PopJumpIfFalse, "join")?
            .load_const(Literal::Int(1))?
            .store_fast("y")?
            .label("join")?
            .load_fast("y")?
            .op(Opcode::ReturnValue)?;
        let mut procedure = prepared(&builder.finish()?)?;

        match construct_ssa(&mut procedure) {
            Err(Error::UnresolvedVariable { name, .. }) => assert_eq!(name, "y"),
            other => panic!("expected an unresolved variable, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_lookup_follows_local_bindings() -> Result<()> {
        // y = x in a block that never assigns x
        let mut builder = CodeBuilder::new("f").params(&["x"]);
        builder
            .load_fast("x")?
            .jump(Opcode::PopJumpIfFalse, "out")?
            .load_fast("x")?
            .store_fast("y")?
            .load_fast("y")?
            .op(Opcode::ReturnValue)?
            .label("out")?
            .load_fast("x")?
            .op(Opcode::ReturnValue)?;
        let mut procedure = prepared(&builder.finish()?)?;
        construct_ssa(&mut procedure)?;

        let x = procedure.variable("x").expect("x");
        let y = procedure.variable("y").expect("y");
        let argument = procedure.arguments()[0];
        let branch = BlockId(1);
        assert_eq!(lookup(&procedure, branch, y)?, argument);
        assert_eq!(lookup_up(&procedure, branch, x)?, argument);
        assert!(lookup_up(&procedure, procedure.entry(), y).is_err());
        Ok(())
    }
}
