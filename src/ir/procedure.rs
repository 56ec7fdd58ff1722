//! The procedure: arena of blocks and values for one translated function.

use std::fmt;

use crate::{
    bytecode::{CodeObject, Literal},
    ir::{Block, BlockId, Instruction, Op, Operand, Phi, ValueData, ValueId, ValueKind, VarId},
    types::{FuncType, Type},
    utils::procedure_to_dot,
    Result,
};

/// One translated function in SSA form.
///
/// Owns every block and value of the function. Values are created through the
/// crate's analysis passes only; once [`crate::TranslationUnit`] hands a
/// procedure out it is no longer mutated.
///
/// # Examples
///
/// ```rust
/// use tyflow::bytecode::{CodeBuilder, Literal, Opcode};
/// use tyflow::{translate, TranslationConfig};
///
/// let mut builder = CodeBuilder::new("answer");
/// builder.load_const(Literal::Int(42))?.op(Opcode::ReturnValue)?;
/// let procedure = translate(&builder.finish()?, None, &TranslationConfig::default())?;
///
/// assert_eq!(procedure.block_count(), 1);
/// assert_eq!(procedure.instructions().count(), 1);
/// println!("{procedure}");
/// # Ok::<(), tyflow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Procedure {
    name: String,
    filename: String,
    argcount: usize,
    varnames: Vec<String>,
    blocks: Vec<Block>,
    values: Vec<ValueData>,
    signature: Option<FuncType>,
    return_type: Type,
}

impl Procedure {
    /// Creates an empty procedure for `code`.
    pub(crate) fn new(code: &CodeObject, signature: Option<FuncType>) -> Self {
        Self {
            name: code.name.clone(),
            filename: code.filename.clone(),
            argcount: code.argcount,
            varnames: code.varnames.clone(),
            blocks: Vec::new(),
            values: Vec::new(),
            signature,
            return_type: Type::Unbound,
        }
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Number of formal parameters.
    #[must_use]
    pub fn argcount(&self) -> usize {
        self.argcount
    }

    /// Variable table, parameters first.
    #[must_use]
    pub fn varnames(&self) -> &[String] {
        &self.varnames
    }

    /// Name of a variable.
    #[must_use]
    pub fn variable_name(&self, var: VarId) -> &str {
        self.varnames.get(var.index()).map_or("?", String::as_str)
    }

    /// Looks a variable up by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<VarId> {
        self.varnames.iter().position(|n| n == name).map(VarId)
    }

    /// The entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        BlockId::ENTRY
    }

    /// All blocks, in discovery order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns a block.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this procedure.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// All values, in creation order.
    #[must_use]
    pub fn values(&self) -> &[ValueData] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Returns a value.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this procedure.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    /// Current annotation of a value.
    #[must_use]
    pub fn type_of(&self, id: ValueId) -> &Type {
        &self.values[id.index()].ty
    }

    /// Instructions of every block, in block order.
    pub fn instructions(&self) -> impl Iterator<Item = (ValueId, &Instruction)> + '_ {
        self.blocks.iter().flat_map(move |block| {
            block.instructions.iter().filter_map(move |id| {
                self.values[id.index()]
                    .as_instruction()
                    .map(|instruction| (*id, instruction))
            })
        })
    }

    /// Phis of every block, in block order.
    pub fn phis(&self) -> impl Iterator<Item = (ValueId, &Phi)> + '_ {
        self.blocks.iter().flat_map(move |block| {
            block
                .phis
                .values()
                .filter_map(move |id| self.values[id.index()].as_phi().map(|phi| (*id, phi)))
        })
    }

    /// Argument values, by parameter position.
    #[must_use]
    pub fn arguments(&self) -> Vec<ValueId> {
        let mut arguments: Vec<(usize, ValueId)> = self
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, value)| match value.kind {
                ValueKind::Argument { index } => Some((index, ValueId(i))),
                _ => None,
            })
            .collect();
        arguments.sort_unstable();
        arguments.into_iter().map(|(_, id)| id).collect()
    }

    /// Declared signature, if one was supplied.
    #[must_use]
    pub fn signature(&self) -> Option<&FuncType> {
        self.signature.as_ref()
    }

    /// Inferred return type: the union of every returned value's annotation.
    #[must_use]
    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Renders the procedure as a Graphviz DOT graph.
    #[must_use]
    pub fn to_dot(&self) -> String {
        procedure_to_dot(self)
    }

    #[cfg(test)]
    pub(crate) fn values_mut(&mut self) -> &mut [ValueData] {
        &mut self.values
    }

    pub(crate) fn set_return_type(&mut self, ty: Type) {
        self.return_type = ty;
    }

    pub(crate) fn set_type(&mut self, id: ValueId, ty: Type) {
        self.values[id.index()].ty = ty;
    }

    /// Appends a new, empty block.
    pub(crate) fn add_block(&mut self, offset: usize) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block::new(id, offset, self.varnames.len()));
        id
    }

    /// Allocates a value; identifiers follow creation order.
    pub(crate) fn add_value(&mut self, kind: ValueKind, ty: Type) -> ValueId {
        let id = ValueId(self.values.len());
        self.values.push(ValueData {
            kind,
            ty,
            uses: Vec::new(),
        });
        id
    }

    pub(crate) fn add_argument(&mut self, index: usize) -> ValueId {
        self.add_value(ValueKind::Argument { index }, Type::Unbound)
    }

    pub(crate) fn add_global(&mut self, name: &str, offset: usize) -> ValueId {
        self.add_value(
            ValueKind::Global {
                name: name.to_string(),
                offset,
            },
            Type::Unbound,
        )
    }

    pub(crate) fn add_constant(&mut self, literal: Literal, offset: usize) -> ValueId {
        self.add_value(ValueKind::Constant { literal, offset }, Type::Unbound)
    }

    /// Appends an instruction to `block`, recording its uses and control-flow edges.
    pub(crate) fn push_instruction(
        &mut self,
        block: BlockId,
        offset: usize,
        op: Op,
        operands: Vec<Operand>,
    ) -> ValueId {
        let id = self.add_value(
            ValueKind::Instruction(Instruction {
                block,
                offset,
                op,
                operands: operands.clone(),
            }),
            Type::Unbound,
        );
        for operand in &operands {
            match operand {
                Operand::Value(used) => self.add_use(*used, id),
                Operand::Block(target) => self.add_edge(block, *target),
                Operand::Local(_) => {}
            }
        }
        self.blocks[block.index()].instructions.push(id);
        id
    }

    /// Records a control-flow edge; edges are never duplicated.
    pub(crate) fn add_edge(&mut self, from: BlockId, to: BlockId) {
        let succs = &mut self.blocks[from.index()].succs;
        if !succs.contains(&to) {
            succs.push(to);
        }
        let preds = &mut self.blocks[to.index()].preds;
        if !preds.contains(&from) {
            preds.push(from);
        }
    }

    pub(crate) fn add_use(&mut self, used: ValueId, user: ValueId) {
        let uses = &mut self.values[used.index()].uses;
        if !uses.contains(&user) {
            uses.push(user);
        }
    }

    /// Creates an empty phi for `var` at `block`.
    pub(crate) fn add_phi(&mut self, block: BlockId, var: VarId) -> ValueId {
        let id = self.add_value(
            ValueKind::Phi(Phi {
                block,
                variable: var,
                incoming: std::collections::BTreeMap::new(),
            }),
            Type::Unbound,
        );
        self.blocks[block.index()].phis.insert(var, id);
        id
    }

    /// Sets the value a phi receives from `pred`.
    pub(crate) fn set_incoming(&mut self, phi: ValueId, pred: BlockId, value: ValueId) -> Result<()> {
        match &mut self.values[phi.index()].kind {
            ValueKind::Phi(node) => {
                node.incoming.insert(pred, value);
            }
            _ => return Err(malformed_error!("{} is not a phi", phi)),
        }
        self.add_use(value, phi);
        Ok(())
    }

    /// Replaces operand `index` of instruction `id` with `value`.
    pub(crate) fn set_operand(&mut self, id: ValueId, index: usize, value: ValueId) -> Result<()> {
        match &mut self.values[id.index()].kind {
            ValueKind::Instruction(instruction) => match instruction.operands.get_mut(index) {
                Some(slot) => *slot = Operand::Value(value),
                None => return Err(malformed_error!("{} has no operand {}", id, index)),
            },
            _ => return Err(malformed_error!("{} is not an instruction", id)),
        }
        self.add_use(value, id);
        Ok(())
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, operand: &Operand) -> fmt::Result {
        match operand {
            Operand::Value(id) => self.fmt_value_ref(f, *id),
            Operand::Local(var) => write!(f, "local({})", self.variable_name(*var)),
            Operand::Block(block) => write!(f, "{block}"),
        }
    }

    fn fmt_value_ref(&self, f: &mut fmt::Formatter<'_>, id: ValueId) -> fmt::Result {
        match self.values.get(id.index()).map(|value| &value.kind) {
            Some(ValueKind::Argument { index }) => {
                write!(f, "%{}", self.varnames.get(*index).map_or("?", String::as_str))
            }
            Some(ValueKind::Global { name, .. }) => write!(f, "@{name}"),
            Some(ValueKind::Constant { literal, .. }) => write!(f, "{literal}"),
            _ => write!(f, "{id}"),
        }
    }

    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
        write!(f, "{} @{}", block.id, block.offset)?;
        if let Some(idom) = block.idom {
            write!(f, " idom {idom}")?;
        }
        if !block.preds.is_empty() {
            write!(f, " preds {:?}", block.preds)?;
        }
        writeln!(f, ":")?;

        for id in block.phis.values() {
            let value = &self.values[id.index()];
            if let ValueKind::Phi(phi) = &value.kind {
                write!(f, "    {id}: {} = phi", value.ty)?;
                for (i, (pred, incoming)) in phi.incoming.iter().enumerate() {
                    write!(f, "{} {pred}: ", if i == 0 { "" } else { "," })?;
                    self.fmt_value_ref(f, *incoming)?;
                }
                writeln!(f, "  ; {}", self.variable_name(phi.variable))?;
            }
        }

        for id in &block.instructions {
            let value = &self.values[id.index()];
            let Some(instruction) = value.as_instruction() else {
                continue;
            };
            if instruction.op.produces_value() {
                write!(f, "    {id}: {} = {}", value.ty, instruction.op)?;
            } else {
                write!(f, "    {}", instruction.op)?;
            }
            for (i, operand) in instruction.operands.iter().enumerate() {
                write!(f, "{}", if i == 0 { " " } else { ", " })?;
                self.fmt_operand(f, operand)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    /// Renders one block the way [`fmt::Display`] does, one line per entry.
    #[must_use]
    pub fn block_lines(&self, id: BlockId) -> Vec<String> {
        struct BlockView<'a>(&'a Procedure, &'a Block);
        impl fmt::Display for BlockView<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt_block(f, self.1)
            }
        }
        BlockView(self, self.block(id))
            .to_string()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "procedure {}(", self.name)?;
        for (i, id) in self.arguments().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let name = self.varnames.get(i).map_or("?", String::as_str);
            write!(f, "{name}: {}", self.values[id.index()].ty)?;
        }
        writeln!(f, ") -> {}", self.return_type)?;
        for block in &self.blocks {
            self.fmt_block(f, block)?;
        }
        Ok(())
    }
}
