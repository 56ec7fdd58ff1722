//! DOT format rendering of procedures.
//!
//! The output can be rendered with Graphviz (`dot -Tsvg`). Each block becomes a
//! record-shaped node listing its phis and instructions; each control-flow edge
//! becomes a graph edge, and immediate dominators are drawn as dashed edges.

use std::fmt::Write;

use crate::ir::Procedure;

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Handles quotes, backslashes, newlines and angle brackets.
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

/// Renders a procedure as a DOT digraph.
#[must_use]
pub fn procedure_to_dot(procedure: &Procedure) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(procedure.name()));
    let _ = writeln!(out, "    node [shape=box, fontname=\"monospace\"];");

    for block in procedure.blocks() {
        let label: String = procedure
            .block_lines(block.id())
            .iter()
            .map(|line| format!("{}\\l", escape_dot(line.trim_start())))
            .collect();
        let _ = writeln!(out, "    {} [label=\"{}\"];", block.id(), label);
    }

    for block in procedure.blocks() {
        for succ in block.successors() {
            let _ = writeln!(out, "    {} -> {};", block.id(), succ);
        }
        if let Some(idom) = block.idom() {
            let _ = writeln!(
                out,
                "    {} -> {} [style=dashed, color=gray, constraint=false];",
                idom,
                block.id()
            );
        }
    }

    out.push_str("}\n");
    out
}
