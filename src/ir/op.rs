//! Operations carried by SSA instructions.

use strum::{Display, EnumIter, IntoStaticStr};

use crate::bytecode::{CompareOp, Opcode};

/// The operation of an [`Instruction`](crate::ir::Instruction).
///
/// Arithmetic and comparisons take two value operands (`neg` takes one). The
/// control operations terminate their block: `jump` and `fallthrough` carry one
/// block target, `cond` carries the condition followed by the if-true and
/// if-false targets, and `return` carries the returned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Mod,
    FloorDiv,
    TrueDiv,
    Neg,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    Cond,
    Jump,
    Fallthrough,
    Return,
}

impl Op {
    /// Maps a binary or unary arithmetic opcode to its operation.
    #[must_use]
    pub fn from_opcode(opcode: Opcode) -> Option<Op> {
        match opcode {
            Opcode::BinaryAdd => Some(Op::Add),
            Opcode::BinarySubtract => Some(Op::Sub),
            Opcode::BinaryMultiply => Some(Op::Mul),
            Opcode::BinaryModulo => Some(Op::Mod),
            Opcode::BinaryFloorDivide => Some(Op::FloorDiv),
            Opcode::BinaryTrueDivide => Some(Op::TrueDiv),
            Opcode::UnaryNegative => Some(Op::Neg),
            _ => None,
        }
    }

    /// Maps an ordering or equality comparison to its operation.
    #[must_use]
    pub fn from_compare(comparison: CompareOp) -> Option<Op> {
        match comparison {
            CompareOp::Lt => Some(Op::Lt),
            CompareOp::Le => Some(Op::Le),
            CompareOp::Eq => Some(Op::Eq),
            CompareOp::Ne => Some(Op::Ne),
            CompareOp::Gt => Some(Op::Gt),
            CompareOp::Ge => Some(Op::Ge),
            _ => None,
        }
    }

    /// Number of value operands popped from the operand stack.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Op::Neg | Op::Return | Op::Cond => 1,
            Op::Jump | Op::Fallthrough => 0,
            _ => 2,
        }
    }

    /// Returns `true` for operations that end a block.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        matches!(self, Op::Cond | Op::Jump | Op::Fallthrough | Op::Return)
    }

    /// Returns `true` for operations whose result is numeric.
    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Op::Add | Op::Sub | Op::Mul | Op::Mod | Op::FloorDiv | Op::TrueDiv | Op::Neg
        )
    }

    /// Returns `true` for comparisons.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(self, Op::Lt | Op::Le | Op::Eq | Op::Ne | Op::Gt | Op::Ge)
    }

    /// Returns `true` if the instruction defines a value other instructions can use.
    #[must_use]
    pub fn produces_value(self) -> bool {
        !matches!(self, Op::Cond | Op::Jump | Op::Fallthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names() {
        assert_eq!(Op::FloorDiv.to_string(), "floordiv");
        assert_eq!(Op::TrueDiv.to_string(), "truediv");
        assert_eq!(Op::Fallthrough.to_string(), "fallthrough");
    }

    #[test]
    fn test_classification_is_disjoint() {
        for op in Op::iter() {
            let classes = [op.is_arithmetic(), op.is_comparison(), op.is_terminator()];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{op}");
        }
    }

    #[test]
    fn test_source_mapping() {
        assert_eq!(Op::from_opcode(Opcode::BinaryModulo), Some(Op::Mod));
        assert_eq!(Op::from_opcode(Opcode::BinarySubscr), None);
        assert_eq!(Op::from_compare(CompareOp::Ge), Some(Op::Ge));
        assert_eq!(Op::from_compare(CompareOp::In), None);
        assert_eq!(Op::Neg.arity(), 1);
        assert_eq!(Op::Mul.arity(), 2);
    }
}
