//! Opcode table of the source stack machine.
//!
//! Only the opcodes that the translator either lowers or must recognise for
//! label discovery and diagnostics are listed. Any other byte decodes to a raw
//! opcode without a table entry and is reported as `<N>` in disassembly.

use strum::{Display, EnumIter, FromRepr, IntoStaticStr};

/// First opcode value that carries a 16-bit argument.
pub const HAVE_ARGUMENT: u8 = 90;

/// Known opcodes of the source bytecode.
///
/// The discriminants are the encoded opcode bytes. The display form is the
/// canonical upper-case mnemonic used in disassembly windows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr, Display, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Opcode {
    PopTop = 1,
    RotTwo = 2,
    RotThree = 3,
    DupTop = 4,
    Nop = 9,
    UnaryPositive = 10,
    UnaryNegative = 11,
    UnaryNot = 12,
    BinaryPower = 19,
    BinaryMultiply = 20,
    BinaryModulo = 22,
    BinaryAdd = 23,
    BinarySubtract = 24,
    BinarySubscr = 25,
    BinaryFloorDivide = 26,
    BinaryTrueDivide = 27,
    GetIter = 68,
    PrintItem = 71,
    BreakLoop = 80,
    ReturnValue = 83,
    YieldValue = 86,
    PopBlock = 87,
    StoreName = 90,
    ForIter = 93,
    StoreAttr = 95,
    StoreGlobal = 97,
    LoadConst = 100,
    LoadName = 101,
    BuildTuple = 102,
    LoadAttr = 106,
    CompareOp = 107,
    JumpForward = 110,
    JumpIfFalseOrPop = 111,
    JumpIfTrueOrPop = 112,
    JumpAbsolute = 113,
    PopJumpIfFalse = 114,
    PopJumpIfTrue = 115,
    LoadGlobal = 116,
    ContinueLoop = 119,
    SetupLoop = 120,
    SetupExcept = 121,
    SetupFinally = 122,
    LoadFast = 124,
    StoreFast = 125,
    CallFunction = 131,
}

/// How a branching opcode encodes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Target is the offset of the next instruction plus the argument.
    Relative,
    /// Target is the argument itself.
    Absolute,
}

impl Opcode {
    /// Canonical mnemonic, e.g. `BINARY_ADD`.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Returns `true` if the opcode is followed by a 16-bit argument.
    #[must_use]
    pub fn has_argument(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }

    /// Returns how the opcode's argument designates a jump target, if it has one.
    #[must_use]
    pub fn jump_kind(self) -> Option<JumpKind> {
        match self {
            Opcode::JumpForward
            | Opcode::ForIter
            | Opcode::SetupLoop
            | Opcode::SetupExcept
            | Opcode::SetupFinally => Some(JumpKind::Relative),
            Opcode::JumpIfFalseOrPop
            | Opcode::JumpIfTrueOrPop
            | Opcode::JumpAbsolute
            | Opcode::PopJumpIfFalse
            | Opcode::PopJumpIfTrue
            | Opcode::ContinueLoop => Some(JumpKind::Absolute),
            _ => None,
        }
    }
}

/// Renders a raw opcode byte as its mnemonic, or `<N>` when it has no table entry.
#[must_use]
pub fn opcode_name(raw: u8) -> String {
    Opcode::from_repr(raw).map_or_else(|| format!("<{raw}>"), |op| op.name().to_string())
}

/// Comparison selector carried in the argument of `COMPARE_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, IntoStaticStr, EnumIter)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CompareOp {
    #[strum(serialize = "<")]
    Lt = 0,
    #[strum(serialize = "<=")]
    Le = 1,
    #[strum(serialize = "==")]
    Eq = 2,
    #[strum(serialize = "!=")]
    Ne = 3,
    #[strum(serialize = ">")]
    Gt = 4,
    #[strum(serialize = ">=")]
    Ge = 5,
    #[strum(serialize = "in")]
    In = 6,
    #[strum(serialize = "not in")]
    NotIn = 7,
    #[strum(serialize = "is")]
    Is = 8,
    #[strum(serialize = "is not")]
    IsNot = 9,
    #[strum(serialize = "exception match")]
    ExceptionMatch = 10,
}

impl CompareOp {
    /// Decodes a `COMPARE_OP` argument.
    #[must_use]
    pub fn from_argument(argument: u32) -> Option<Self> {
        u8::try_from(argument).ok().and_then(Self::from_repr)
    }

    /// Source-level operator symbol, e.g. `<=`.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.into()
    }
}
