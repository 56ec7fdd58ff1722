use std::fmt;

use thiserror::Error;

use crate::ir::BlockId;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Context attached to an unsupported-source-construct failure.
///
/// The diagnostic is rendered in the same shape for every unsupported construct:
/// a header line, the source file and line of the failing instruction, and a short
/// disassembly window starting at the failure point (the first line is marked with
/// `-->`).
///
/// ```text
/// Operation not accepted by the target language.
///   File "shader.py", line 7
/// --> 24 LOAD_ATTR 3
///     27 LOAD_FAST 2
///     30 BINARY_MULTIPLY 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Name of the opcode that could not be translated (e.g. `LOAD_ATTR`).
    pub opcode: String,
    /// Bytecode offset of the failing instruction.
    pub offset: usize,
    /// Short explanation of why the construct was rejected.
    pub reason: String,
    /// Source file the code object was compiled from.
    pub filename: String,
    /// Source line of the failing instruction.
    pub line: u32,
    /// Formatted disassembly window, one instruction per entry.
    pub window: Vec<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Operation not accepted by the target language.")?;
        writeln!(f, "  File {:?}, line {}", self.filename, self.line)?;
        write!(f, "{}", self.window.join("\n"))?;
        if !self.reason.is_empty() {
            write!(f, "\n({})", self.reason)?;
        }
        Ok(())
    }
}

/// The generic Error type, which covers every failure the translation front end
/// can report.
///
/// Translation is a pure function of the input bytecode: it either succeeds
/// completely or is rejected completely. No partial IR is ever handed out after
/// one of these errors.
///
/// # Error Categories
///
/// ## Source errors (user facing)
/// - [`Error::Unsupported`] - An instruction or stack shape that cannot be modelled
/// - [`Error::UnresolvedVariable`] - A name is read on some path before any write
/// - [`Error::Decode`] - Truncated bytecode or an out-of-range table index
///
/// ## Internal defects
/// - [`Error::ContinuationMismatch`] - An offset was re-entered under another loop context
/// - [`Error::Malformed`] - An SSA invariant does not hold
/// - [`Error::IterationLimit`] - The annotation worklist exceeded its budget
///
/// ## Tooling
/// - [`Error::UndefinedLabel`] - A [`crate::bytecode::CodeBuilder`] label was never defined
/// - [`Error::DuplicateLabel`] - A [`crate::bytecode::CodeBuilder`] label was defined twice
///
/// Type unification never fails: shape mismatches degrade to
/// [`crate::types::Type::Anything`] instead.
///
/// # Examples
///
/// ```rust,ignore
/// use tyflow::{Error, TranslationUnit};
///
/// match unit.build_function(&code, None) {
///     Ok(procedure) => println!("{procedure}"),
///     Err(Error::Unsupported(diagnostic)) => eprintln!("{diagnostic}"),
///     Err(Error::UnresolvedVariable { name, .. }) => eprintln!("'{name}' is never assigned"),
///     Err(e) => eprintln!("internal error: {e}"),
/// }
/// ```
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    /// The source uses an instruction or stack shape the discovery builder cannot model.
    ///
    /// Carries the opcode, file, line and disassembly window of the failure point.
    #[error("{0}")]
    Unsupported(Box<Diagnostic>),

    /// A variable is read on some path without any preceding assignment.
    ///
    /// Resolution walked the dominator chain up to the entry block and found
    /// neither a definition nor an argument for the variable.
    #[error("Variable '{name}' is read in block {block} but never assigned on a path reaching it")]
    UnresolvedVariable {
        /// Name of the variable
        name: String,
        /// Block in which the unresolved read was found
        block: BlockId,
    },

    /// The bytecode stream or one of its tables is malformed.
    ///
    /// Covers truncated instructions and indices that fall outside the constant
    /// pool, name table or variable table.
    #[error("Invalid bytecode at offset {offset}: {message}")]
    Decode {
        /// Offset of the offending instruction
        offset: usize,
        /// Description of the problem
        message: String,
    },

    /// An offset was revisited under a different loop continuation context.
    ///
    /// This is an internal invariant violation of the discovery builder, not a
    /// property of the source program.
    #[error("Offset {offset} was re-entered under a different continuation context")]
    ContinuationMismatch {
        /// Offset that was revisited
        offset: usize,
    },

    /// An internal invariant of the SSA graph does not hold.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The type-propagation worklist exceeded its iteration budget.
    ///
    /// The lattice has finite height, so this indicates a non-monotone transfer
    /// rule. The associated value is the budget that was exhausted.
    #[error("Type propagation did not converge within {0} iterations")]
    IterationLimit(usize),

    /// A label referenced by a branch was never defined.
    #[error("Undefined label - {0}")]
    UndefinedLabel(String),

    /// A label was defined twice in the same code builder.
    #[error("Duplicate label - {0}")]
    DuplicateLabel(String),
}

impl Error {
    /// Returns the diagnostic of an [`Error::Unsupported`] failure.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Error::Unsupported(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}
