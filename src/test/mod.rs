//! Shared code objects for unit tests.
//!
//! Each factory assembles a small function with [`CodeBuilder`], laid out the
//! way a stack-machine compiler emits it. The source each one stands for is
//! given in its doc comment.

use crate::{
    bytecode::{CodeBuilder, CodeObject, CompareOp, Literal, Opcode},
    config::TranslationConfig,
    ir::Procedure,
    translate, Result,
};

// Helper function to create an empty code object called `f`
pub fn code_object(params: &[&str]) -> CodeObject {
    CodeObject {
        name: "f".to_string(),
        filename: "<test>".to_string(),
        first_line: 1,
        code: Vec::new(),
        consts: Vec::new(),
        names: Vec::new(),
        varnames: params.iter().map(|p| (*p).to_string()).collect(),
        argcount: params.len(),
        lnotab: Vec::new(),
    }
}

// Helper function to run the whole pipeline with the default configuration
pub fn translated(code: &CodeObject) -> Result<Procedure> {
    translate(code, None, &TranslationConfig::default())
}

/// ```text
/// def expr(a, b):
///     return a + b * 20
/// ```
pub fn scalar_expression() -> Result<CodeObject> {
    let mut builder = CodeBuilder::new("expr").params(&["a", "b"]);
    builder
        .load_fast("a")?
        .load_fast("b")?
        .load_const(Literal::Int(20))?
        .op(Opcode::BinaryMultiply)?
        .op(Opcode::BinaryAdd)?
        .op(Opcode::ReturnValue)?;
    builder.finish()
}

/// ```text
/// def pick(c, a, b):
///     x = a
///     if c:
///         x = b
///     return x
/// ```
pub fn conditional_assignment() -> Result<CodeObject> {
    let mut builder = CodeBuilder::new("pick").params(&["c", "a", "b"]);
    builder
        .load_fast("a")?
        .store_fast("x")?
        .load_fast("c")?
        .jump(Opcode::PopJumpIfFalse, "join")?
        .load_fast("b")?
        .store_fast("x")?
        .label("join")?
        .load_fast("x")?
        .op(Opcode::ReturnValue)?;
    builder.finish()
}

/// ```text
/// def count(n):
///     i = 0
///     total = 0
///     while i < n:
///         total = total + i
///         i = i + 1
///     return total
/// ```
pub fn counting_loop() -> Result<CodeObject> {
    let mut builder = CodeBuilder::new("count").params(&["n"]);
    builder
        .load_const(Literal::Int(0))?
        .store_fast("i")?
        .load_const(Literal::Int(0))?
        .store_fast("total")?
        .jump(Opcode::SetupLoop, "end")?
        .label("head")?
        .load_fast("i")?
        .load_fast("n")?
        .compare(CompareOp::Lt)?
        .jump(Opcode::PopJumpIfFalse, "exit")?
        .load_fast("total")?
        .load_fast("i")?
        .op(Opcode::BinaryAdd)?
        .store_fast("total")?
        .load_fast("i")?
        .load_const(Literal::Int(1))?
        .op(Opcode::BinaryAdd)?
        .store_fast("i")?
        .jump(Opcode::JumpAbsolute, "head")?
        .label("exit")?
        .op(Opcode::PopBlock)?
        .label("end")?
        .load_fast("total")?
        .op(Opcode::ReturnValue)?;
    builder.finish()
}

/// ```text
/// def nested(c, d, a, b, e):
///     if c:
///         if d:
///             x = a
///         else:
///             x = b
///     else:
///         x = e
///     return x
/// ```
pub fn nested_branches() -> Result<CodeObject> {
    let mut builder = CodeBuilder::new("nested").params(&["c", "d", "a", "b", "e"]);
    builder
        .load_fast("c")?
        .jump(Opcode::PopJumpIfFalse, "outer_else")?
        .load_fast("d")?
        .jump(Opcode::PopJumpIfFalse, "inner_else")?
        .load_fast("a")?
        .store_fast("x")?
        .jump(Opcode::JumpForward, "join")?
        .label("inner_else")?
        .load_fast("b")?
        .store_fast("x")?
        .jump(Opcode::JumpForward, "join")?
        .label("outer_else")?
        .load_fast("e")?
        .store_fast("x")?
        .label("join")?
        .load_fast("x")?
        .op(Opcode::ReturnValue)?;
    builder.finish()
}

/// ```text
/// def bump(c, a, b):
///     if c:
///         x = a
///     else:
///         x = b
///     x = x + 1
///     return x
/// ```
pub fn reassigned_at_join() -> Result<CodeObject> {
    let mut builder = CodeBuilder::new("bump").params(&["c", "a", "b"]);
    builder
        .load_fast("c")?
        .jump(Opcode::PopJumpIfFalse, "else")?
        .load_fast("a")?
        .store_fast("x")?
        .jump(Opcode::JumpForward, "join")?
        .label("else")?
        .load_fast("b")?
        .store_fast("x")?
        .label("join")?
        .load_fast("x")?
        .load_const(Literal::Int(1))?
        .op(Opcode::BinaryAdd)?
        .store_fast("x")?
        .load_fast("x")?
        .op(Opcode::ReturnValue)?;
    builder.finish()
}
