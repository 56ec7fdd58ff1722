//! Arena-based SSA intermediate representation.
//!
//! A [`Procedure`] owns its [`Block`]s and values; everything else refers to
//! them through the index newtypes [`BlockId`], [`ValueId`] and [`VarId`].
//! Blocks hold value ids, values hold block ids, and neither owns the other,
//! so the cyclic block/instruction/phi relationships need no shared ownership.
//!
//! # Value kinds
//!
//! - [`Instruction`] - An [`Op`] applied to operands, placed in a block
//! - [`Phi`] - The merge of one variable at a join block
//! - `Argument` - A formal parameter, defined by the entry block
//! - `Global` - A reference to a free variable, always typed `anything`
//! - `Constant` - A constant-pool literal; not placed in any block
//!
//! During discovery, operands may also be [`Operand::Local`] placeholders
//! meaning "this variable's value on entry to the block". Variable resolution
//! replaces every one of them with a concrete value.

mod block;
mod op;
mod procedure;
mod value;

pub use block::Block;
pub use op::Op;
pub use procedure::Procedure;
pub use value::{
    Binding, BlockId, Instruction, Operand, Phi, ValueData, ValueId, ValueKind, VarId,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::Literal, test::code_object};

    #[test]
    fn test_edges_are_deduplicated() {
        let mut procedure = Procedure::new(&code_object(&["a"]), None);
        let entry = procedure.add_block(0);
        let target = procedure.add_block(9);
        let cond = procedure.add_argument(0);

        procedure.push_instruction(
            entry,
            3,
            Op::Cond,
            vec![
                Operand::Value(cond),
                Operand::Block(target),
                Operand::Block(target),
            ],
        );

        assert_eq!(procedure.block(entry).successors(), &[target]);
        assert_eq!(procedure.block(target).predecessors(), &[entry]);
        assert_eq!(procedure.value(cond).uses().len(), 1);
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let mut procedure = Procedure::new(&code_object(&[]), None);
        let block = procedure.add_block(0);
        let a = procedure.add_constant(Literal::Int(1), 0);
        let b = procedure.add_constant(Literal::Int(2), 3);
        let sum = procedure.push_instruction(
            block,
            6,
            Op::Add,
            vec![Operand::Value(a), Operand::Value(b)],
        );

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(sum.index(), 2);
        assert_eq!(procedure.value_count(), 3);
        assert_eq!(procedure.value(a).uses(), &[sum]);
        assert_eq!(procedure.instructions().count(), 1);
    }

    #[test]
    fn test_operand_and_phi_updates() -> crate::Result<()> {
        let mut procedure = Procedure::new(&code_object(&["x"]), None);
        let entry = procedure.add_block(0);
        let join = procedure.add_block(6);
        let x = procedure.add_argument(0);
        let ret = procedure.push_instruction(join, 6, Op::Return, vec![Operand::Local(VarId(0))]);
        let phi = procedure.add_phi(join, VarId(0));

        procedure.set_incoming(phi, entry, x)?;
        procedure.set_operand(ret, 0, phi)?;

        assert_eq!(procedure.value(phi).as_phi().map(|p| p.incoming.len()), Some(1));
        assert_eq!(
            procedure.value(ret).as_instruction().map(|i| i.operands[0]),
            Some(Operand::Value(phi))
        );
        assert_eq!(procedure.value(phi).uses(), &[ret]);
        assert!(procedure.set_operand(ret, 4, phi).is_err());
        assert!(procedure.set_incoming(x, entry, x).is_err());
        Ok(())
    }

    #[test]
    fn test_display_lists_arguments_and_blocks() {
        let mut procedure = Procedure::new(&code_object(&["a"]), None);
        let entry = procedure.add_block(0);
        let a = procedure.add_argument(0);
        procedure.push_instruction(entry, 3, Op::Return, vec![Operand::Value(a)]);

        let text = procedure.to_string();
        assert!(text.starts_with("procedure f(a: unbound) -> unbound"));
        assert!(text.contains("B0 @0:"));
        assert!(text.contains("= return %a"));
    }
}
