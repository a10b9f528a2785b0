//! CFG debug dump
//!
//! Serializes the graph into a Graphviz dot description: one box per block
//! with its label, length and instruction listing, one edge per successor.
//! Conditional edges are colored and tagged with their truth value; an
//! unconditional jump edge is solid and a fallthrough edge dotted.

use crate::compiler::ir::Program;
use std::fmt::Write;

/// Render the program as a Graphviz dot graph.
pub fn dump_dot(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("digraph G {\n");

    for block in program.blocks() {
        if block.is_orphaned() {
            continue;
        }

        if block.is_empty() {
            let _ = writeln!(
                out,
                "\t{} [shape=box, label=\"Block {}\\nEMPTY\"];",
                block.label, block.label
            );
        } else {
            let _ = write!(
                out,
                "\t{} [shape=box, label=\"Block {}, length {}.\\n",
                block.label,
                block.label,
                block.ops.len()
            );
            for inst in &block.ops {
                // Branches show their destination label, others their argument.
                if inst.is_jump() {
                    let destination = block
                        .jump_successor
                        .expect("terminated block without a jump successor");
                    let _ = write!(
                        out,
                        "{}: {:<12}block {}\\n",
                        inst.location, inst.opcode, destination
                    );
                } else {
                    let _ = write!(out, "{}\\n", inst);
                }
            }
            out.push_str("\"];\n");
        }

        if let Some(natural) = block.natural_successor {
            let style = if block.is_cjump() {
                "[color=red, label=\"F\"]"
            } else {
                "[style=dotted]"
            };
            let _ = writeln!(out, "\t{} -> {} {};", block.label, natural, style);
        }
        if let Some(jump) = block.jump_successor {
            let style = if block.is_cjump() {
                " [color=green, label=\"T\"]"
            } else {
                ""
            };
            let _ = writeln!(out, "\t{} -> {}{};", block.label, jump, style);
        }
    }

    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cfg::compile;

    #[test]
    fn test_dump_lists_every_block_and_edge() {
        let program = compile("[-]").unwrap();
        let dot = dump_dot(&program);

        assert!(dot.starts_with("digraph G {"));
        assert!(dot.ends_with('}'));
        for label in 0..4 {
            assert!(dot.contains(&format!("Block {label}")), "missing node {label}");
        }
        // The condition block has a labelled true and false edge.
        assert!(dot.contains("[color=green, label=\"T\"]"));
        assert!(dot.contains("[color=red, label=\"F\"]"));
        // The body falls through to the condition.
        assert!(dot.contains("1 -> 2 [style=dotted];"));
    }
}
