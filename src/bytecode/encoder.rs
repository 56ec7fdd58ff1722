//! Assembler for source bytecode with symbolic labels.
//!
//! [`CodeBuilder`] is the reverse of the decoder: it emits raw instructions,
//! interns constants, names and variables into their tables, records line
//! markers, and patches branch arguments once every label is known.
//!
//! # Example
//!
//! ```rust
//! use tyflow::bytecode::{CodeBuilder, CompareOp, Literal, Opcode};
//!
//! // def clamp(x):
//! //     if x > 10:
//! //         x = 10
//! //     return x
//! let mut builder = CodeBuilder::new("clamp").params(&["x"]);
//! builder
//!     .line(2)
//!     .load_fast("x")?
//!     .load_const(Literal::Int(10))?
//!     .compare(CompareOp::Gt)?
//!     .jump(Opcode::PopJumpIfFalse, "join")?
//!     .line(3)
//!     .load_const(Literal::Int(10))?
//!     .store_fast("x")?
//!     .label("join")?
//!     .line(4)
//!     .load_fast("x")?
//!     .op(Opcode::ReturnValue)?;
//! let code = builder.finish()?;
//! assert_eq!(code.argcount, 1);
//! assert_eq!(code.consts.len(), 1);
//! # Ok::<(), tyflow::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    bytecode::{CodeObject, CompareOp, JumpKind, Literal, Opcode},
    Error, Result,
};

/// A branch whose argument is patched in [`CodeBuilder::finish`].
#[derive(Debug, Clone)]
struct LabelFixup {
    label: String,
    /// Offset of the branch opcode
    position: usize,
    kind: JumpKind,
}

/// Incremental builder for a [`CodeObject`].
#[derive(Debug, Clone)]
pub struct CodeBuilder {
    name: String,
    filename: String,
    first_line: u32,
    code: Vec<u8>,
    consts: Vec<Literal>,
    names: Vec<String>,
    varnames: Vec<String>,
    argcount: usize,
    labels: HashMap<String, usize>,
    fixups: Vec<LabelFixup>,
    lnotab: Vec<(u8, u8)>,
    last_line: u32,
    last_address: usize,
}

impl CodeBuilder {
    /// Creates an empty builder for a function called `name`, starting at line 1
    /// of `<builder>`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            filename: "<builder>".to_string(),
            first_line: 1,
            code: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            argcount: 0,
            labels: HashMap::new(),
            fixups: Vec::new(),
            lnotab: Vec::new(),
            last_line: 1,
            last_address: 0,
        }
    }

    /// Sets the source file name.
    #[must_use]
    pub fn filename(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    /// Sets the line of the function header.
    #[must_use]
    pub fn first_line(mut self, line: u32) -> Self {
        self.first_line = line;
        self.last_line = line;
        self
    }

    /// Declares the formal parameters. Must be called before any variable is used.
    #[must_use]
    pub fn params(mut self, params: &[&str]) -> Self {
        for param in params {
            self.varnames.push((*param).to_string());
        }
        self.argcount = self.varnames.len();
        self
    }

    /// Offset the next instruction will be emitted at.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Emits an opcode that takes no argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the opcode requires an argument.
    pub fn op(&mut self, opcode: Opcode) -> Result<&mut Self> {
        if opcode.has_argument() {
            return Err(malformed_error!("{} requires an argument", opcode));
        }
        self.code.push(opcode as u8);
        Ok(self)
    }

    /// Emits an opcode with an explicit argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the opcode takes no argument or the
    /// argument does not fit in 16 bits.
    pub fn op_arg(&mut self, opcode: Opcode, argument: u32) -> Result<&mut Self> {
        if !opcode.has_argument() {
            return Err(malformed_error!("{} takes no argument", opcode));
        }
        let argument = u16::try_from(argument)
            .map_err(|_| malformed_error!("argument {} of {} exceeds 16 bits", argument, opcode))?;
        self.code.push(opcode as u8);
        self.code.extend_from_slice(&argument.to_le_bytes());
        Ok(self)
    }

    /// Appends raw bytes, bypassing all checks.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Emits `LOAD_CONST`, interning the literal into the constant pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the pool index does not fit in 16 bits.
    pub fn load_const(&mut self, literal: Literal) -> Result<&mut Self> {
        let index = intern(&mut self.consts, literal);
        self.op_arg(Opcode::LoadConst, index)
    }

    /// Emits `LOAD_FAST` for the named variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the table index does not fit in 16 bits.
    pub fn load_fast(&mut self, name: &str) -> Result<&mut Self> {
        let index = intern(&mut self.varnames, name.to_string());
        self.op_arg(Opcode::LoadFast, index)
    }

    /// Emits `STORE_FAST` for the named variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the table index does not fit in 16 bits.
    pub fn store_fast(&mut self, name: &str) -> Result<&mut Self> {
        let index = intern(&mut self.varnames, name.to_string());
        self.op_arg(Opcode::StoreFast, index)
    }

    /// Emits `LOAD_GLOBAL` for the named global.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the table index does not fit in 16 bits.
    pub fn load_global(&mut self, name: &str) -> Result<&mut Self> {
        let index = intern(&mut self.names, name.to_string());
        self.op_arg(Opcode::LoadGlobal, index)
    }

    /// Emits `LOAD_ATTR` for the named attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the table index does not fit in 16 bits.
    pub fn load_attr(&mut self, name: &str) -> Result<&mut Self> {
        let index = intern(&mut self.names, name.to_string());
        self.op_arg(Opcode::LoadAttr, index)
    }

    /// Emits `COMPARE_OP` with the given comparison.
    ///
    /// # Errors
    ///
    /// Never fails in practice; returns a `Result` for chaining.
    pub fn compare(&mut self, comparison: CompareOp) -> Result<&mut Self> {
        self.op_arg(Opcode::CompareOp, comparison as u32)
    }

    /// Emits a branching opcode targeting `label`, patched in [`CodeBuilder::finish`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `opcode` is not a branching opcode.
    pub fn jump(&mut self, opcode: Opcode, label: &str) -> Result<&mut Self> {
        let Some(kind) = opcode.jump_kind() else {
            return Err(malformed_error!("{} is not a branch", opcode));
        };
        self.fixups.push(LabelFixup {
            label: label.to_string(),
            position: self.code.len(),
            kind,
        });
        self.op_arg(opcode, 0)
    }

    /// Binds `name` to the current offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateLabel`] if the label is already defined.
    pub fn label(&mut self, name: &str) -> Result<&mut Self> {
        if self.labels.contains_key(name) {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        self.labels.insert(name.to_string(), self.code.len());
        Ok(self)
    }

    /// Marks the following instructions as belonging to source line `line`.
    ///
    /// Lines may only increase; a lower line number is ignored.
    pub fn line(&mut self, line: u32) -> &mut Self {
        if line < self.last_line {
            return self;
        }

        let mut address = self.code.len() - self.last_address;
        let mut delta = line - self.last_line;
        while address > 255 {
            self.lnotab.push((255, 0));
            address -= 255;
        }
        while delta > 255 {
            self.lnotab.push((address as u8, 255));
            address = 0;
            delta -= 255;
        }
        self.lnotab.push((address as u8, delta as u8));

        self.last_address = self.code.len();
        self.last_line = line;
        self
    }

    /// Resolves every label reference and produces the code object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedLabel`] for a branch to an unknown label, and
    /// [`Error::Malformed`] when a resolved target cannot be encoded.
    pub fn finish(mut self) -> Result<CodeObject> {
        for fixup in &self.fixups {
            let target = *self
                .labels
                .get(&fixup.label)
                .ok_or_else(|| Error::UndefinedLabel(fixup.label.clone()))?;

            let argument = match fixup.kind {
                JumpKind::Absolute => target,
                JumpKind::Relative => {
                    target.checked_sub(fixup.position + 3).ok_or_else(|| {
                        malformed_error!(
                            "relative branch at {} cannot reach earlier label '{}'",
                            fixup.position,
                            fixup.label
                        )
                    })?
                }
            };
            let argument = u16::try_from(argument)
                .map_err(|_| malformed_error!("branch target {} exceeds 16 bits", target))?;
            self.code[fixup.position + 1..fixup.position + 3]
                .copy_from_slice(&argument.to_le_bytes());
        }

        Ok(CodeObject {
            name: self.name,
            filename: self.filename,
            first_line: self.first_line,
            code: self.code,
            consts: self.consts,
            names: self.names,
            varnames: self.varnames,
            argcount: self.argcount,
            lnotab: self.lnotab,
        })
    }
}

/// Returns the index of `item` in `table`, appending it if missing.
fn intern<T: PartialEq>(table: &mut Vec<T>, item: T) -> u32 {
    let index = match table.iter().position(|existing| *existing == item) {
        Some(index) => index,
        None => {
            table.push(item);
            table.len() - 1
        }
    };
    u32::try_from(index).unwrap_or(u32::MAX)
}
