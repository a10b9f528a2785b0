//! Cleanup passes
//!
//! Structural tidying after the semantic rewrites: erase nops, splice out
//! blocks with nothing in them, merge single-entry blocks into their
//! predecessor, and drop whatever the control flow can no longer reach.

use crate::compiler::analysis;
use crate::compiler::ir::{BasicBlock, Label, Program, SuccessorSlot};
use crate::compiler::optimizer::for_each_block;

/// Erase every `nop` in one block. Returns the number erased.
pub fn remove_nops_block(block: &mut BasicBlock) -> usize {
    let before = block.ops.len();
    block.ops.retain(|inst| !inst.is_nop());
    before - block.ops.len()
}

/// Erase every `nop` in the program. Always safe.
pub fn remove_nops(program: &mut Program) -> usize {
    for_each_block(program, remove_nops_block)
}

/// Splice out blocks that contain no instructions: every predecessor edge
/// is retargeted to the empty block's fallthrough successor.
pub fn eliminate_empty_blocks(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += empty_block_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn empty_block_at(program: &mut Program, label: Label) -> usize {
    let block = program.block(label);
    if !block.is_empty() || block.is_orphaned() {
        return 0;
    }
    // A block can only end up empty by losing non-branch instructions, so
    // it falls through.
    assert!(
        block.natural_successor.is_some() && block.jump_successor.is_none(),
        "empty block {label} is not a pure fallthrough"
    );
    let target = block.natural_successor.unwrap();
    assert_ne!(target, label, "empty block cannot fall through to itself");

    // Refuse the splice if it would alias both edges of some predecessor.
    for &pred in &block.predecessors {
        let pred_block = program.block(pred);
        let slot = pred_block.slot_to(label);
        if pred_block.successor(slot.other()) == Some(target) {
            return 0;
        }
    }

    let predecessors: Vec<Label> = program.block(label).predecessors.to_vec();
    for pred in predecessors {
        let slot = program.block(pred).slot_to(label);
        program.unlink(pred, slot);
        program.link(pred, slot, target);
    }
    program.orphan(label);
    1
}

/// Merge a block with a unique predecessor into that predecessor, dropping
/// the predecessor's terminating branch if it has one. Conditionals take
/// part on neither side: a conditional block must stay a lone test, and a
/// conditional predecessor keeps both outcomes.
pub fn merge_into_predecessors(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += merge_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn merge_at(program: &mut Program, label: Label) -> usize {
    let block = program.block(label);
    if block.is_orphaned() || block.is_cjump() {
        return 0;
    }
    let Some(pred) = block.unique_predecessor() else {
        return 0;
    };
    if pred == label || program.block(pred).is_pure_cjump() {
        return 0;
    }

    // Detach the predecessor's edge into the block; an unconditional branch
    // terminator disappears with it.
    if program.block(pred).is_ujump() {
        debug_assert_eq!(program.block(pred).jump_successor, Some(label));
        program.unlink(pred, SuccessorSlot::Jump);
        program.block_mut(pred).ops.pop();
    } else {
        debug_assert_eq!(program.block(pred).natural_successor, Some(label));
        program.unlink(pred, SuccessorSlot::Natural);
    }

    // Move the instructions and adopt the successors.
    let mut moved_ops = std::mem::take(&mut program.block_mut(label).ops);
    program.block_mut(pred).ops.append(&mut moved_ops);

    for slot in SuccessorSlot::BOTH {
        if let Some(successor) = program.block(label).successor(slot) {
            program.unlink(label, slot);
            program.link(pred, slot, successor);
        }
    }

    debug_assert!(program.block(label).is_orphaned());
    1
}

/// Orphan and erase every block the control flow cannot reach.
pub fn eliminate_dead_code(program: &mut Program) -> usize {
    let reachable = analysis::reachable_blocks(program);

    let dead: Vec<Label> = program
        .blocks()
        .iter()
        .enumerate()
        .filter(|&(position, _)| !reachable[position])
        .map(|(_, block)| block.label)
        .collect();

    for label in dead {
        program.orphan(label);
    }
    program.sweep_orphans()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::cfg::compile;
    use crate::compiler::ir::OpCode;
    use crate::compiler::optimizer::{arithmetic, branches};

    #[test]
    fn test_remove_nops_leaves_real_instructions() {
        let mut program = compile("+.").unwrap();
        program.block_mut(0).ops[1].make_nop();
        assert_eq!(remove_nops(&mut program), 1);
        assert_eq!(remove_nops(&mut program), 0);
        let opcodes: Vec<OpCode> = program.block(0).ops.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![OpCode::ProgramEntry, OpCode::Write, OpCode::ProgramExit]
        );
    }

    #[test]
    fn test_empty_block_is_spliced_out() {
        // "+-" inside a loop body cancels to nothing, leaving an empty
        // block the loop edges still route through.
        let mut program = compile("[+-.]").unwrap();
        // Make the body empty: fold "+-" away, then strip the write by hand
        // to produce an empty block between the loop edges.
        let mut program2 = compile("[+-]").unwrap();
        arithmetic::simplify(&mut program2, arithmetic::ArithmeticTag::Value);
        program2.assert_invariants();
        assert!(program2.block(1).is_empty());

        assert_eq!(eliminate_empty_blocks(&mut program2), 1);
        program2.assert_invariants();
        assert!(!program2.contains(1));
        // The condition's back edge now tests itself.
        assert!(program2.block(2).has_self_loop());

        // Control case: a populated body is left alone.
        assert_eq!(eliminate_empty_blocks(&mut program), 0);
    }

    #[test]
    fn test_merge_straight_line_chain() {
        // "[-]+" after the clear-loop rewrite turns into a fallthrough
        // chain that merging collapses into the entry block.
        let mut program = compile("[-]+").unwrap();
        crate::compiler::optimizer::inner_loops::eliminate_clear_loops(&mut program);
        branches::eliminate_pure_ujumps(&mut program);
        program.assert_invariants();

        let merged = merge_into_predecessors(&mut program);
        assert!(merged > 0);
        program.assert_invariants();

        // Everything straight-line collapses into one block ending in exit.
        assert_eq!(program.len(), 1);
        let opcodes: Vec<OpCode> = program.block(0).ops.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                OpCode::ProgramEntry,
                OpCode::LoadConst,
                OpCode::Inc,
                OpCode::ProgramExit
            ]
        );
    }

    #[test]
    fn test_merge_skips_conditional_boundaries() {
        let mut program = compile("+[.]").unwrap();
        // The loop body's unique predecessor is the pure conditional and
        // the conditional itself has two predecessors; nothing merges.
        assert_eq!(merge_into_predecessors(&mut program), 0);
    }

    #[test]
    fn test_dead_code_elimination_keeps_fully_reachable_programs() {
        let mut program = compile("[>]").unwrap();
        crate::compiler::optimizer::inner_loops::eliminate_search_loops(&mut program);
        program.assert_invariants();
        // The search rewrite already reclaimed the body; nothing is dead.
        assert_eq!(eliminate_dead_code(&mut program), 0);
    }

    #[test]
    fn test_dead_code_elimination_reclaims_unreachable_blocks() {
        use crate::compiler::cfg::CfgBuilder;
        use crate::compiler::ir::{Instruction, SourceLocation};
        // The write block has no entrants; only the jump around it runs.
        let stream: Vec<Instruction> = [
            (OpCode::ProgramEntry, 0),
            (OpCode::Branch, 4),
            (OpCode::Write, 0),
            (OpCode::Branch, 4),
            (OpCode::ProgramExit, 0),
        ]
        .iter()
        .map(|&(opcode, argument)| Instruction::new(opcode, argument, SourceLocation::new(1, 1)))
        .collect();
        let mut program = CfgBuilder::build(&stream);
        assert_eq!(program.len(), 3);

        assert_eq!(eliminate_dead_code(&mut program), 1);
        program.assert_invariants();
        assert_eq!(program.len(), 2);
        assert!(!program.contains(1));
    }
}
