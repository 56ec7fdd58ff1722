//! Type propagation over a resolved procedure.
//!
//! The [`Annotator`] drives the type lattice to a fixed point with a FIFO
//! worklist of values, in the manner of a sparse forward data flow solver:
//!
//! 1. Arguments take the declared parameter types, globals are `anything` and
//!    constants their literal type. Every phi and instruction is queued.
//! 2. A popped value recomputes its type from its operands' current types.
//! 3. The result is joined with the value's old type; if that moved the value,
//!    every user is queued again.
//!
//! Types only move up a lattice of finite height, so each value changes at most
//! [`LATTICE_HEIGHT`] times and the loop terminates. A budget of
//! `iteration_budget` iterations per value guards against a transfer rule that
//! breaks monotonicity.
//!
//! # Transfer rules
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `add`, `sub`, `mul`, `mod`, `floordiv`, `neg` | union of the widened operand types, `anything` unless numeric |
//! | `truediv` | `float` for numeric operands |
//! | comparisons | `bool` once every operand is bound |
//! | `cond`, `jump`, `fallthrough` | no value |
//! | `return` | the operand's type |
//! | phi | union of the incoming types |

use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::{
    config::TranslationConfig,
    ir::{Op, Operand, Procedure, ValueId, ValueKind},
    types::{JoinSemiLattice, Type, LATTICE_HEIGHT},
    Error, Result,
};

/// One processed worklist entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The value that was recomputed
    pub value: ValueId,
    /// Its type before the step
    pub before: Type,
    /// Its type after the step
    pub after: Type,
}

impl Step {
    /// Returns `true` if the step moved the value.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Counters of a finished propagation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    /// Values popped from the worklist
    pub iterations: usize,
    /// Pops that changed a type
    pub updates: usize,
}

/// Worklist-driven type propagation for one procedure.
///
/// # Usage
///
/// ```rust
/// use tyflow::analysis::{construct_ssa, compute_dominators, discover, propagate_liveness, Annotator};
/// use tyflow::bytecode::{CodeBuilder, Literal, Opcode};
/// use tyflow::types::{FuncType, Type};
/// use tyflow::TranslationConfig;
///
/// let mut builder = CodeBuilder::new("double").params(&["x"]);
/// builder
///     .load_fast("x")?
///     .load_const(Literal::Int(2))?
///     .op(Opcode::BinaryMultiply)?
///     .op(Opcode::ReturnValue)?;
/// let code = builder.finish()?;
///
/// let config = TranslationConfig::default();
/// let signature = FuncType::new(vec![Type::INT], Type::INT);
/// let mut procedure = discover(&code, Some(signature), &config)?;
/// compute_dominators(&mut procedure)?;
/// propagate_liveness(&mut procedure)?;
/// construct_ssa(&mut procedure)?;
///
/// Annotator::new(&mut procedure, &config).run()?;
/// assert_eq!(procedure.return_type(), &Type::INT);
/// # Ok::<(), tyflow::Error>(())
/// ```
pub struct Annotator<'a> {
    procedure: &'a mut Procedure,
    worklist: VecDeque<ValueId>,
    queued: Vec<bool>,
    budget: usize,
    summary: AnnotationSummary,
}

impl<'a> Annotator<'a> {
    /// Seeds fixed types and queues every phi and instruction.
    pub fn new(procedure: &'a mut Procedure, config: &TranslationConfig) -> Self {
        let count = procedure.value_count();
        let mut annotator = Self {
            procedure,
            worklist: VecDeque::with_capacity(count),
            queued: vec![false; count],
            budget: config.iteration_budget.saturating_mul(count.max(1)),
            summary: AnnotationSummary::default(),
        };
        annotator.seed();
        annotator
    }

    fn seed(&mut self) {
        let declared: Vec<Type> = self
            .procedure
            .signature()
            .map(|signature| signature.args.clone())
            .unwrap_or_default();

        for index in 0..self.procedure.value_count() {
            let id = ValueId::new(index);
            let value = self.procedure.value(id);
            if value.is_computed() {
                continue;
            }
            let fixed = match value.kind() {
                ValueKind::Argument { index } => declared.get(*index).cloned(),
                ValueKind::Global { .. } => Some(Type::Anything),
                ValueKind::Constant { literal, .. } => Type::constant(*literal),
                ValueKind::Instruction(_) | ValueKind::Phi(_) => None,
            };
            if let Some(ty) = fixed {
                self.procedure.set_type(id, ty);
            }
        }

        let mut order = Vec::new();
        for block in self.procedure.blocks() {
            order.extend(block.phis().values().copied());
            order.extend(block.instructions().iter().copied());
        }
        for id in order {
            self.enqueue(id);
        }
    }

    fn enqueue(&mut self, id: ValueId) {
        if !self.queued[id.index()] {
            self.queued[id.index()] = true;
            self.worklist.push_back(id);
        }
    }

    /// Number of values waiting to be processed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.worklist.len()
    }

    /// Processes one value, returning `None` once the worklist is empty.
    pub fn step(&mut self) -> Option<Step> {
        let id = self.worklist.pop_front()?;
        self.queued[id.index()] = false;
        self.summary.iterations += 1;

        let before = self.procedure.type_of(id).clone();
        // nothing sits above the top
        let after = if before.is_top() {
            before.clone()
        } else {
            before.join(&self.transfer(id))
        };
        if after != before {
            trace!(
                "{}: {} {} -> {}",
                self.procedure.name(),
                id,
                before,
                after
            );
            self.summary.updates += 1;
            self.procedure.set_type(id, after.clone());
            let users = self.procedure.value(id).uses().to_vec();
            for user in users {
                self.enqueue(user);
            }
        }

        Some(Step {
            value: id,
            before,
            after,
        })
    }

    /// Runs the worklist to its fixed point and records the return type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IterationLimit`] if the iteration budget is exhausted.
    pub fn run(mut self) -> Result<AnnotationSummary> {
        while self.step().is_some() {
            if self.summary.iterations > self.budget {
                return Err(Error::IterationLimit(self.budget));
            }
        }

        let returned = self
            .procedure
            .instructions()
            .filter(|(_, instruction)| instruction.op == Op::Return)
            .fold(Type::Unbound, |acc, (id, _)| acc.union(self.procedure.type_of(id)));
        self.check_signature(&returned);
        self.procedure.set_return_type(returned);

        debug!(
            "{}: types converged after {} iterations, {} updates (bound {})",
            self.procedure.name(),
            self.summary.iterations,
            self.summary.updates,
            self.procedure.value_count() * LATTICE_HEIGHT
        );
        Ok(self.summary)
    }

    fn check_signature(&self, returned: &Type) {
        if let Some(signature) = self.procedure.signature() {
            let declared = signature.ret.as_ref();
            if &declared.union(returned) != declared {
                warn!(
                    "{}: inferred return type {} does not fit the declared {}",
                    self.procedure.name(),
                    returned,
                    declared
                );
            }
        }
    }

    fn operand_type(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Value(value) => self.procedure.type_of(*value).clone(),
            Operand::Local(_) | Operand::Block(_) => Type::Unbound,
        }
    }

    fn transfer(&self, id: ValueId) -> Type {
        match self.procedure.value(id).kind() {
            ValueKind::Phi(phi) => phi
                .incoming
                .values()
                .fold(Type::Unbound, |acc, value| acc.union(self.procedure.type_of(*value))),
            ValueKind::Instruction(instruction) => {
                let operands: Vec<Type> = instruction
                    .operands
                    .iter()
                    .filter(|operand| !matches!(operand, Operand::Block(_)))
                    .map(|operand| self.operand_type(operand))
                    .collect();
                apply(instruction.op, &operands)
            }
            _ => self.procedure.type_of(id).clone(),
        }
    }
}

/// Transfer rule of one operation over its operand types.
fn apply(op: Op, operands: &[Type]) -> Type {
    match op {
        Op::Cond | Op::Jump | Op::Fallthrough => Type::Unbound,
        Op::Return => operands.first().cloned().unwrap_or(Type::Unbound),
        Op::TrueDiv => match numeric_union(operands) {
            Type::Unbound => Type::Unbound,
            ty if ty.is_numeric() => Type::FLOAT,
            _ => Type::Anything,
        },
        op if op.is_arithmetic() => numeric_union(operands),
        _ => {
            if operands.iter().any(Type::is_unbound) {
                Type::Unbound
            } else {
                Type::BOOL
            }
        }
    }
}

/// Union of the widened operand types, `anything` if it is not numeric.
fn numeric_union(operands: &[Type]) -> Type {
    let ty = operands
        .iter()
        .fold(Type::Unbound, |acc, operand| acc.union(&operand.widen_constant()));
    if ty.is_unbound() || ty.is_numeric() {
        ty
    } else {
        Type::Anything
    }
}
