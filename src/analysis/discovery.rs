//! Bytecode-to-CFG builder.
//!
//! Discovery abstractly interprets the stack machine: it walks the instruction
//! stream with an explicit operand stack, turns every value-producing opcode
//! into an SSA [`Instruction`](crate::ir::Instruction) and splits the stream
//! into blocks at branch targets and after terminators.
//!
//! # Block memoization
//!
//! Blocks are keyed by bytecode offset. Each offset is associated with the loop
//! continuation context (the stack of enclosing `SETUP_LOOP` frames) it was
//! first reached under; reaching it again returns the same block, which is what
//! terminates discovery on back edges. Reaching it under a different context is
//! reported as [`Error::ContinuationMismatch`].
//!
//! # Variables
//!
//! Reads of variables the current block has not assigned yet push an
//! [`Operand::Local`] placeholder and mark the variable in the block's
//! `depends` set. Writes update the block's `defines` map. Both are resolved into
//! SSA values by [`crate::analysis::phis`].
//!
//! # Rejected input
//!
//! Any opcode outside the supported subset, stack-discipline violations,
//! branches into the entry block and running off the end of the stream fail the
//! whole function with [`Error::Unsupported`].

use std::collections::{BTreeSet, HashMap};

use log::{debug, trace};

use crate::{
    bytecode::{
        decode_step, disassembly_window, find_labels, CodeObject, CompareOp, Literal, Opcode,
        RawInstruction,
    },
    config::TranslationConfig,
    error::Diagnostic,
    ir::{Binding, BlockId, Op, Operand, Procedure, VarId},
    types::FuncType,
    Error, Result,
};

/// An enclosing loop, identified by the offset execution resumes at on `break`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopFrame {
    end: usize,
}

type Continuation = Vec<LoopFrame>;

struct Discovery<'a> {
    code: &'a CodeObject,
    config: &'a TranslationConfig,
    procedure: Procedure,
    labels: BTreeSet<usize>,
    jumps: HashMap<usize, (BlockId, Continuation)>,
    pending: Vec<(BlockId, Continuation)>,
}

/// Builds the control-flow graph of `code`.
///
/// The returned procedure has its blocks, edges, instructions, `defines` and
/// `depends` filled in. Its entry block defines one Argument per parameter.
/// Operands may still be [`Operand::Local`] placeholders.
///
/// # Errors
///
/// - [`Error::Unsupported`] for constructs the translator does not accept
/// - [`Error::Decode`] for truncated bytecode and out-of-range table indices
/// - [`Error::ContinuationMismatch`] if an offset is re-entered under another loop context
pub fn discover(
    code: &CodeObject,
    signature: Option<FuncType>,
    config: &TranslationConfig,
) -> Result<Procedure> {
    if code.argcount > code.varnames.len() {
        return Err(Error::Decode {
            offset: 0,
            message: format!(
                "{} parameters but only {} variable names",
                code.argcount,
                code.varnames.len()
            ),
        });
    }

    let mut discovery = Discovery {
        code,
        config,
        procedure: Procedure::new(code, signature),
        labels: find_labels(&code.code)?,
        jumps: HashMap::new(),
        pending: Vec::new(),
    };

    let entry = discovery.block_at(0, &Vec::new())?;
    for index in 0..code.argcount {
        let argument = discovery.procedure.add_argument(index);
        discovery
            .procedure
            .block_mut(entry)
            .defines
            .insert(VarId(index), Binding::Value(argument));
    }

    while let Some((block, context)) = discovery.pending.pop() {
        discovery.interpret(block, context)?;
    }

    debug!(
        "{}: discovered {} blocks, {} values",
        code.name,
        discovery.procedure.block_count(),
        discovery.procedure.value_count()
    );
    Ok(discovery.procedure)
}

impl Discovery<'_> {
    /// Returns the block starting at `offset`, creating and scheduling it on first visit.
    fn block_at(&mut self, offset: usize, context: &Continuation) -> Result<BlockId> {
        if let Some((block, seen)) = self.jumps.get(&offset) {
            if seen != context {
                return Err(Error::ContinuationMismatch { offset });
            }
            return Ok(*block);
        }

        let block = self.procedure.add_block(offset);
        self.jumps.insert(offset, (block, context.clone()));
        self.pending.push((block, context.clone()));
        Ok(block)
    }

    /// Resolves the target of a branch instruction into a block.
    fn branch(&mut self, raw: &RawInstruction, context: &Continuation) -> Result<BlockId> {
        let target = raw
            .jump_target()
            .ok_or_else(|| malformed_error!("{} at {} has no target", raw.name(), raw.offset))?;
        if target == 0 {
            return Err(self.unsupported(raw.offset, "branch back into the entry block"));
        }
        if target >= self.code.code.len() {
            return Err(self.unsupported(
                raw.offset,
                format!("branch target {target} is outside the code"),
            ));
        }
        self.block_at(target, context)
    }

    /// Interprets the instructions of `block` up to and including its terminator.
    fn interpret(&mut self, block: BlockId, mut context: Continuation) -> Result<()> {
        let start = self.procedure.block(block).offset();
        let mut stack: Vec<Binding> = Vec::new();
        let mut offset = start;
        trace!("{}: interpreting {} at offset {}", self.code.name, block, start);

        loop {
            if offset >= self.code.code.len() {
                return Err(self.unsupported(offset, "execution runs past the end of the code"));
            }

            if offset != start && self.labels.contains(&offset) {
                self.expect_empty(&stack, offset)?;
                let target = self.block_at(offset, &context)?;
                self.procedure
                    .push_instruction(block, offset, Op::Fallthrough, vec![Operand::Block(target)]);
                return Ok(());
            }

            let raw = decode_step(&self.code.code, offset)?;
            let Some(opcode) = raw.op() else {
                return Err(self.unsupported(offset, "unknown opcode"));
            };

            match opcode {
                Opcode::Nop => {}
                Opcode::LoadConst => {
                    let literal = self.code.constant(raw.argument, offset)?;
                    if matches!(literal, Literal::None) {
                        return Err(self.unsupported(offset, "the None constant has no static type"));
                    }
                    let value = self.procedure.add_constant(literal, offset);
                    stack.push(Binding::Value(value));
                }
                Opcode::LoadGlobal => {
                    let name = self.code.global_name(raw.argument, offset)?;
                    let value = self.procedure.add_global(name, offset);
                    stack.push(Binding::Value(value));
                }
                Opcode::LoadFast => {
                    let var = VarId(self.code.variable(raw.argument, offset)?);
                    let current = self.procedure.block_mut(block);
                    let binding = match current.defines.get(&var) {
                        Some(binding) => *binding,
                        None => {
                            current.depends.insert(var.index());
                            Binding::Local(var)
                        }
                    };
                    stack.push(binding);
                }
                Opcode::StoreFast => {
                    let var = VarId(self.code.variable(raw.argument, offset)?);
                    let value = self.pop(&mut stack, offset)?;
                    self.procedure.block_mut(block).defines.insert(var, value);
                }
                Opcode::PopTop => {
                    self.pop(&mut stack, offset)?;
                }
                Opcode::BinaryAdd
                | Opcode::BinarySubtract
                | Opcode::BinaryMultiply
                | Opcode::BinaryModulo
                | Opcode::BinaryFloorDivide
                | Opcode::BinaryTrueDivide => {
                    let op = Op::from_opcode(opcode)
                        .ok_or_else(|| malformed_error!("{} has no operation", opcode))?;
                    let rhs = self.pop(&mut stack, offset)?;
                    let lhs = self.pop(&mut stack, offset)?;
                    let value =
                        self.procedure
                            .push_instruction(block, offset, op, vec![lhs.into(), rhs.into()]);
                    stack.push(Binding::Value(value));
                }
                Opcode::UnaryNegative => {
                    let operand = self.pop(&mut stack, offset)?;
                    let value =
                        self.procedure
                            .push_instruction(block, offset, Op::Neg, vec![operand.into()]);
                    stack.push(Binding::Value(value));
                }
                Opcode::CompareOp => {
                    let op = CompareOp::from_argument(raw.argument)
                        .and_then(Op::from_compare)
                        .ok_or_else(|| {
                            let symbol = CompareOp::from_argument(raw.argument)
                                .map_or("?", CompareOp::symbol);
                            self.unsupported(offset, format!("comparison '{symbol}' is not supported"))
                        })?;
                    let rhs = self.pop(&mut stack, offset)?;
                    let lhs = self.pop(&mut stack, offset)?;
                    let value =
                        self.procedure
                            .push_instruction(block, offset, op, vec![lhs.into(), rhs.into()]);
                    stack.push(Binding::Value(value));
                }
                Opcode::JumpAbsolute | Opcode::JumpForward => {
                    self.expect_empty(&stack, offset)?;
                    let target = self.branch(&raw, &context)?;
                    self.procedure
                        .push_instruction(block, offset, Op::Jump, vec![Operand::Block(target)]);
                    return Ok(());
                }
                Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue => {
                    let condition = self.pop(&mut stack, offset)?;
                    self.expect_empty(&stack, offset)?;
                    let fallthrough = self.block_at(raw.next, &context)?;
                    let taken = self.branch(&raw, &context)?;
                    let (if_true, if_false) = if opcode == Opcode::PopJumpIfFalse {
                        (fallthrough, taken)
                    } else {
                        (taken, fallthrough)
                    };
                    self.procedure.push_instruction(
                        block,
                        offset,
                        Op::Cond,
                        vec![
                            condition.into(),
                            Operand::Block(if_true),
                            Operand::Block(if_false),
                        ],
                    );
                    return Ok(());
                }
                Opcode::ReturnValue => {
                    let value = self.pop(&mut stack, offset)?;
                    self.expect_empty(&stack, offset)?;
                    self.procedure
                        .push_instruction(block, offset, Op::Return, vec![value.into()]);
                    return Ok(());
                }
                Opcode::SetupLoop => {
                    let end = raw
                        .jump_target()
                        .ok_or_else(|| malformed_error!("SETUP_LOOP at {} has no target", offset))?;
                    context.push(LoopFrame { end });
                }
                Opcode::PopBlock => {
                    if context.pop().is_none() {
                        return Err(self.unsupported(offset, "POP_BLOCK outside of a loop"));
                    }
                }
                Opcode::BreakLoop => {
                    self.expect_empty(&stack, offset)?;
                    let Some(frame) = context.pop() else {
                        return Err(self.unsupported(offset, "break outside of a loop"));
                    };
                    let target = self.block_at(frame.end, &context)?;
                    self.procedure
                        .push_instruction(block, offset, Op::Jump, vec![Operand::Block(target)]);
                    return Ok(());
                }
                _ => {
                    return Err(self.unsupported(
                        offset,
                        format!("{opcode} is not supported by the target language"),
                    ));
                }
            }

            offset = raw.next;
        }
    }

    fn pop(&self, stack: &mut Vec<Binding>, offset: usize) -> Result<Binding> {
        stack
            .pop()
            .ok_or_else(|| self.unsupported(offset, "operand stack underflow"))
    }

    fn expect_empty(&self, stack: &[Binding], offset: usize) -> Result<()> {
        if stack.is_empty() {
            Ok(())
        } else {
            Err(self.unsupported(
                offset,
                format!("{} value(s) left on the operand stack", stack.len()),
            ))
        }
    }

    /// Builds the unsupported-construct error for the instruction at `offset`.
    fn unsupported(&self, offset: usize, reason: impl Into<String>) -> Error {
        let opcode = decode_step(&self.code.code, offset)
            .map_or_else(|_| "<end of code>".to_string(), |raw| raw.name());
        let diagnostic = Diagnostic {
            opcode,
            offset,
            reason: reason.into(),
            filename: self.code.filename.clone(),
            line: self.code.line_at(offset),
            window: disassembly_window(&self.code.code, offset, self.config.window),
        };
        debug!(
            "{}: rejecting {} at offset {} ({})",
            self.code.name, diagnostic.opcode, offset, diagnostic.reason
        );
        Error::Unsupported(Box::new(diagnostic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::CodeBuilder,
        ir::ValueKind,
        test::{conditional_assignment, counting_loop, scalar_expression},
    };

    fn run(code: &CodeObject) -> Result<Procedure> {
        discover(code, None, &TranslationConfig::default())
    }

    #[test]
    fn test_straight_line() -> Result<()> {
        let procedure = run(&scalar_expression()?)?;

        assert_eq!(procedure.block_count(), 1);
        let entry = procedure.block(procedure.entry());
        assert!(entry.predecessors().is_empty());
        assert_eq!(entry.defines().len(), 2);

        let ops: Vec<Op> = procedure.instructions().map(|(_, i)| i.op).collect();
        assert_eq!(ops, vec![Op::Mul, Op::Add, Op::Return]);
        assert_eq!(procedure.arguments().len(), 2);
        Ok(())
    }

    #[test]
    fn test_conditional_shape() -> Result<()> {
        let procedure = run(&conditional_assignment()?)?;

        assert_eq!(procedure.block_count(), 3);
        let entry = procedure.block(procedure.entry());
        assert_eq!(entry.successors().len(), 2);

        let join = procedure
            .blocks()
            .iter()
            .find(|block| block.is_join())
            .expect("join block");
        assert_eq!(join.predecessors().len(), 2);
        let x = procedure.variable("x").expect("x");
        assert!(join.depends().contains(x.index()));
        Ok(())
    }

    #[test]
    fn test_loop_terminates_with_back_edge() -> Result<()> {
        let procedure = run(&counting_loop()?)?;

        let header = procedure
            .blocks()
            .iter()
            .find(|block| block.is_join())
            .expect("loop header");
        let back_edges = header
            .predecessors()
            .iter()
            .filter(|pred| pred.index() > header.id().index())
            .count();
        assert_eq!(back_edges, 1);
        Ok(())
    }

    #[test]
    fn test_pop_jump_if_true_swaps_targets() -> Result<()> {
        let mut builder = CodeBuilder::new("f").params(&["c"]);
        builder
            .load_fast("c")?
            .jump(Opcode::PopJumpIfTrue, "yes")?
            .load_const(Literal::Int(0))?
            .op(Opcode::ReturnValue)?
            .label("yes")?
            .load_const(Literal::Int(1))?
            .op(Opcode::ReturnValue)?;
        let procedure = run(&builder.finish()?)?;

        let (_, cond) = procedure
            .instructions()
            .find(|(_, i)| i.op == Op::Cond)
            .expect("cond");
        let if_true = cond.operands[1].block().expect("target");
        assert_eq!(procedure.block(if_true).offset(), 10);
        Ok(())
    }

    #[test]
    fn test_constants_and_globals_are_values() -> Result<()> {
        let mut builder = CodeBuilder::new("f");
        builder
            .load_global("scale")?
            .load_const(Literal::Float(2.0))?
            .op(Opcode::BinaryMultiply)?
            .op(Opcode::ReturnValue)?;
        let procedure = run(&builder.finish()?)?;

        assert!(procedure
            .values()
            .iter()
            .any(|v| matches!(&v.kind(), ValueKind::Global { name, .. } if name == "scale")));
        assert!(procedure
            .values()
            .iter()
            .any(|v| matches!(v.kind(), ValueKind::Constant { .. })));
        assert_eq!(procedure.instructions().count(), 2);
        Ok(())
    }

    #[test]
    fn test_unsupported_opcode_diagnostic() -> Result<()> {
        let mut builder = CodeBuilder::new("f").params(&["b"]).filename("shader.py");
        builder
            .line(2)
            .load_fast("b")?
            .line(3)
            .load_attr("x")?
            .op(Opcode::ReturnValue)?;
        let err = run(&builder.finish()?).unwrap_err();

        let diagnostic = err.diagnostic().expect("diagnostic");
        assert_eq!(diagnostic.opcode, "LOAD_ATTR");
        assert_eq!(diagnostic.offset, 3);
        assert_eq!(diagnostic.line, 3);
        assert_eq!(diagnostic.window[0], "--> 3 LOAD_ATTR 0");
        assert_eq!(diagnostic.window.len(), 2);
        Ok(())
    }

    #[test]
    fn test_stack_discipline() -> Result<()> {
        let mut builder = CodeBuilder::new("f");
        builder.op(Opcode::ReturnValue)?;
        assert!(matches!(run(&builder.finish()?), Err(Error::Unsupported(_))));

        let mut builder = CodeBuilder::new("f");
        builder
            .load_const(Literal::Int(1))?
            .load_const(Literal::Int(2))?
            .op(Opcode::ReturnValue)?;
        assert!(matches!(run(&builder.finish()?), Err(Error::Unsupported(_))));
        Ok(())
    }

    #[test]
    fn test_rejected_control_flow() -> Result<()> {
        // running off the end
        let mut builder = CodeBuilder::new("f");
        builder.load_const(Literal::Int(1))?.op(Opcode::PopTop)?;
        let err = run(&builder.finish()?).unwrap_err();
        assert_eq!(err.diagnostic().map(|d| d.opcode.as_str()), Some("<end of code>"));

        // a branch back to offset 0
        let mut builder = CodeBuilder::new("f");
        builder.label("top")?.jump(Opcode::JumpAbsolute, "top")?;
        assert!(matches!(run(&builder.finish()?), Err(Error::Unsupported(_))));

        // None has no static type
        let mut builder = CodeBuilder::new("f");
        builder.load_const(Literal::None)?.op(Opcode::ReturnValue)?;
        assert!(matches!(run(&builder.finish()?), Err(Error::Unsupported(_))));

        // empty code
        assert!(matches!(run(&CodeBuilder::new("f").finish()?), Err(Error::Unsupported(_))));
        Ok(())
    }

    #[test]
    fn test_break_targets_loop_end() -> Result<()> {
        // while True: break
        // return 1
        let mut builder = CodeBuilder::new("f");
        builder
            .load_const(Literal::Int(0))?
            .op(Opcode::PopTop)?
            .jump(Opcode::SetupLoop, "end")?
            .label("head")?
            .op(Opcode::BreakLoop)?
            .jump(Opcode::JumpAbsolute, "head")?
            .op(Opcode::PopBlock)?
            .label("end")?
            .load_const(Literal::Int(1))?
            .op(Opcode::ReturnValue)?;
        let procedure = run(&builder.finish()?)?;

        let end = procedure
            .blocks()
            .iter()
            .find(|block| block.offset() == 12)
            .expect("loop exit block");
        assert_eq!(end.predecessors().len(), 1);
        Ok(())
    }

    #[test]
    fn test_continuation_mismatch() -> Result<()> {
        // jumping into a loop body from outside the loop
        let mut builder = CodeBuilder::new("f").params(&["c"]);
        builder
            .load_fast("c")?
            .jump(Opcode::PopJumpIfFalse, "body")?
            .jump(Opcode::SetupLoop, "end")?
            .label("body")?
            .load_fast("c")?
            .op(Opcode::ReturnValue)?
            .label("end")?
            .load_fast("c")?
            .op(Opcode::ReturnValue)?;
        assert_eq!(
            run(&builder.finish()?).unwrap_err(),
            Error::ContinuationMismatch { offset: 9 }
        );
        Ok(())
    }

    #[test]
    fn test_bad_tables() {
        let mut code = scalar_expression().unwrap();
        code.argcount = 5;
        assert!(matches!(run(&code), Err(Error::Decode { .. })));

        let mut code = scalar_expression().unwrap();
        code.consts.clear();
        assert!(matches!(run(&code), Err(Error::Decode { .. })));
    }
}
