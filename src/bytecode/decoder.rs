//! Raw instruction decoding, label discovery and disassembly windows.
//!
//! The stream encoding is one opcode byte, followed by a 16-bit little-endian
//! argument when the opcode is at or above [`HAVE_ARGUMENT`]. Decoding never
//! interprets stack effects; that is the job of
//! [`crate::analysis::discovery`].
//!
//! # Example
//!
//! ```rust
//! use tyflow::bytecode::{decode_step, find_labels, Opcode};
//!
//! // LOAD_FAST 0; POP_JUMP_IF_FALSE 7; LOAD_FAST 0; RETURN_VALUE
//! let code = [124, 0, 0, 114, 7, 0, 124, 0, 0, 83];
//! let first = decode_step(&code, 0)?;
//! assert_eq!(first.op(), Some(Opcode::LoadFast));
//! assert_eq!(first.next, 3);
//!
//! let labels = find_labels(&code)?;
//! assert!(labels.contains(&7));
//! # Ok::<(), tyflow::Error>(())
//! ```

use std::collections::BTreeSet;

use crate::{
    bytecode::opcodes::{opcode_name, JumpKind, Opcode, HAVE_ARGUMENT},
    Error, Result,
};

/// One decoded instruction of the raw stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInstruction {
    /// Offset of the opcode byte
    pub offset: usize,
    /// Raw opcode byte
    pub opcode: u8,
    /// Decoded argument, zero for argument-less opcodes
    pub argument: u32,
    /// Offset of the following instruction
    pub next: usize,
}

impl RawInstruction {
    /// Looks the raw opcode up in the opcode table.
    #[must_use]
    pub fn op(&self) -> Option<Opcode> {
        Opcode::from_repr(self.opcode)
    }

    /// Mnemonic of the instruction, `<N>` for unknown opcodes.
    #[must_use]
    pub fn name(&self) -> String {
        opcode_name(self.opcode)
    }

    /// Branch target of the instruction, if it is a branching opcode.
    #[must_use]
    pub fn jump_target(&self) -> Option<usize> {
        match self.op()?.jump_kind()? {
            JumpKind::Relative => Some(self.next + self.argument as usize),
            JumpKind::Absolute => Some(self.argument as usize),
        }
    }
}

/// Decodes the instruction starting at `offset`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if `offset` is past the end of the stream or the
/// instruction's argument is truncated.
pub fn decode_step(code: &[u8], offset: usize) -> Result<RawInstruction> {
    let Some(&opcode) = code.get(offset) else {
        return Err(Error::Decode {
            offset,
            message: format!("offset is outside the {}-byte stream", code.len()),
        });
    };

    if opcode < HAVE_ARGUMENT {
        return Ok(RawInstruction {
            offset,
            opcode,
            argument: 0,
            next: offset + 1,
        });
    }

    match (code.get(offset + 1), code.get(offset + 2)) {
        (Some(&lo), Some(&hi)) => Ok(RawInstruction {
            offset,
            opcode,
            argument: u32::from(u16::from_le_bytes([lo, hi])),
            next: offset + 3,
        }),
        _ => Err(Error::Decode {
            offset,
            message: format!("argument of {} is truncated", opcode_name(opcode)),
        }),
    }
}

/// Decodes the whole stream linearly.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the last instruction is truncated.
pub fn decode_stream(code: &[u8]) -> Result<Vec<RawInstruction>> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let instruction = decode_step(code, offset)?;
        offset = instruction.next;
        instructions.push(instruction);
    }
    Ok(instructions)
}

/// Collects every offset that is the target of a branching instruction.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the stream is truncated.
pub fn find_labels(code: &[u8]) -> Result<BTreeSet<usize>> {
    Ok(decode_stream(code)?
        .iter()
        .filter_map(RawInstruction::jump_target)
        .collect())
}

/// Formats up to `count` raw instructions starting at `offset`.
///
/// The first line is prefixed with `-->`, the others are indented to line up.
/// Decoding stops quietly at the end of the stream or at a truncated instruction.
#[must_use]
pub fn disassembly_window(code: &[u8], offset: usize, count: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(count);
    let mut cursor = offset;
    while lines.len() < count {
        let Ok(instruction) = decode_step(code, cursor) else {
            break;
        };
        let marker = if lines.is_empty() { "-->" } else { "   " };
        lines.push(format!(
            "{marker} {} {} {}",
            instruction.offset,
            instruction.name(),
            instruction.argument
        ));
        cursor = instruction.next;
    }
    lines
}
