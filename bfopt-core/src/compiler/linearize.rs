//! Linearization back to an executable instruction stream
//!
//! The emulator consumes a flat instruction vector in which every branch
//! carries an absolute destination index. Concatenating the blocks in label
//! order restores exactly that shape; each terminator's destination is
//! re-resolved from the graph. Optimization can leave a fallthrough edge
//! pointing at a non-adjacent block - a synthesized unconditional branch
//! bridges the gap in the stream.
//!
//! The inverse direction, stream back to graph, is
//! [`CfgBuilder::build`](crate::compiler::cfg::CfgBuilder::build); an
//! unoptimized program survives the round trip with an isomorphic graph.

use crate::compiler::ir::{Instruction, Label, OpCode, Program};
use std::collections::BTreeMap;

/// Serialize the program into a linear instruction stream with absolute
/// branch destinations. `program_entry` lands at index 0 and `program_exit`
/// is the final instruction.
pub fn linearize(program: &Program) -> Vec<Instruction> {
    // First pass: the emitted length of every block, counting synthesized
    // branches for fallthrough edges that will not be adjacent.
    let mut start_of: BTreeMap<Label, usize> = BTreeMap::new();
    let mut offset = 0usize;
    for (position, block) in program.blocks().iter().enumerate() {
        start_of.insert(block.label, offset);
        offset += block.ops.len();
        if needs_synthetic_branch(program, position) {
            offset += 1;
        }
    }

    let mut code: Vec<Instruction> = Vec::with_capacity(offset);
    for (position, block) in program.blocks().iter().enumerate() {
        code.extend_from_slice(&block.ops);

        if block.has_terminator() {
            let destination = block
                .jump_successor
                .expect("terminated block without a jump successor");
            let last = code.last_mut().unwrap();
            debug_assert!(last.is_jump());
            last.argument = start_of[&destination] as i64;
        }

        if needs_synthetic_branch(program, position) {
            let natural = block
                .natural_successor
                .expect("synthesized branch without a fallthrough edge");
            let location = block
                .ops
                .last()
                .map(|inst| inst.location)
                .expect("an empty block never needs a synthesized branch");
            code.push(Instruction::new(
                OpCode::Branch,
                start_of[&natural] as i64,
                location,
            ));
        }
    }

    assert_eq!(code.first().map(|inst| inst.opcode), Some(OpCode::ProgramEntry));
    assert_eq!(code.last().map(|inst| inst.opcode), Some(OpCode::ProgramExit));
    code
}

/// A fallthrough edge must be bridged with an explicit branch when its
/// target will not sit right behind the block in the stream.
fn needs_synthetic_branch(program: &Program, position: usize) -> bool {
    let block = program.block_at(position);
    if block.is_ujump() {
        return false;
    }
    let Some(natural) = block.natural_successor else {
        return false;
    };
    let next_label = program
        .blocks()
        .get(position + 1)
        .map(|next_block| next_block.label);
    next_label != Some(natural)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cfg::compile;
    use crate::compiler::optimizer::inner_loops;

    #[test]
    fn test_linearize_restores_branch_indices() {
        let source = "[-]";
        let program = compile(source).unwrap();
        let code = linearize(&program);

        let opcodes: Vec<OpCode> = code.iter().map(|inst| inst.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::ProgramEntry,
                OpCode::Branch,
                OpCode::Inc,
                OpCode::BranchNz,
                OpCode::ProgramExit,
            ]
        );
        assert_eq!(code[1].argument, 3); // "[" jumps at the test
        assert_eq!(code[3].argument, 2); // "]" jumps at the body
    }

    #[test]
    fn test_linearize_after_loop_rewrite() {
        let mut program = compile("[-]").unwrap();
        inner_loops::eliminate_clear_loops(&mut program);
        let code = linearize(&program);
        let opcodes: Vec<OpCode> = code.iter().map(|inst| inst.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::ProgramEntry,
                OpCode::Branch,
                OpCode::LoadConst,
                OpCode::ProgramExit,
            ]
        );
        assert_eq!(code[1].argument, 2);
    }

    #[test]
    fn test_linearize_bridges_non_adjacent_fallthrough() {
        use crate::compiler::optimizer::branches;
        // Destination chaining can forward a conditional's natural edge past
        // its textual neighbour; the stream then needs an explicit branch
        // after the test.
        let mut program = compile("[[]]").unwrap();
        branches::eliminate_pure_ujumps(&mut program);
        assert_eq!(branches::chain_cjump_destinations(&mut program), 1);
        program.assert_invariants();

        let code = linearize(&program);
        let opcodes: Vec<OpCode> = code.iter().map(|inst| inst.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::ProgramEntry,
                OpCode::Branch,
                OpCode::BranchNz,
                OpCode::Branch, // synthesized bridge to the exit
                OpCode::BranchNz,
                OpCode::ProgramExit,
            ]
        );
        assert_eq!(code[1].argument, 4); // entry jumps at the outer test
        assert_eq!(code[2].argument, 2); // inner test spins on itself
        assert_eq!(code[3].argument, 5); // bridge jumps at the exit
        assert_eq!(code[4].argument, 2); // outer test enters the inner one
    }

    #[test]
    fn test_round_trip_is_isomorphic() {
        use crate::compiler::cfg::CfgBuilder;
        for source in ["", "+++", "[-]", "[[]]", "+[>,.<-]", "[>]<[[-]>]"] {
            let original = compile(source).unwrap();
            let rebuilt = CfgBuilder::build(&linearize(&original));
            assert_eq!(original.len(), rebuilt.len(), "block count for {source:?}");
            for (a, b) in original.blocks().iter().zip(rebuilt.blocks()) {
                assert_eq!(a.label, b.label, "labels for {source:?}");
                assert_eq!(a.natural_successor, b.natural_successor);
                assert_eq!(a.jump_successor, b.jump_successor);
                let ops_a: Vec<(OpCode, i64)> =
                    a.ops.iter().map(|inst| (inst.opcode, inst.argument)).collect();
                let ops_b: Vec<(OpCode, i64)> =
                    b.ops.iter().map(|inst| (inst.opcode, inst.argument)).collect();
                assert_eq!(ops_a, ops_b, "instructions for {source:?}");
            }
        }
    }
}
