//! Branch simplification passes
//!
//! Global passes that rewire jump edges: forwarding predecessors past a
//! block that only jumps, collapsing chains of identical conditional tests,
//! and folding a conditional whose outcome its sole predecessor already
//! decides.
//!
//! Every rewiring keeps the two successor slots of a block distinct; a
//! rewrite that would alias them is skipped rather than performed halfway.

use crate::compiler::analysis::BlockEvaluation;
use crate::compiler::ir::{Instruction, Label, OpCode, Program, SuccessorSlot};
use std::collections::BTreeSet;

/// Forward every predecessor of a block that consists solely of an
/// unconditional branch, then orphan the block.
pub fn eliminate_pure_ujumps(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += pure_ujump_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn pure_ujump_at(program: &mut Program, label: Label) -> usize {
    let block = program.block(label);
    if !block.is_pure_ujump() {
        return 0;
    }
    debug_assert_eq!(block.natural_successor, None);
    let target = block
        .jump_successor
        .expect("branch terminator without a destination");
    if target == label {
        // A branch to itself never completes; there is nothing to forward.
        return 0;
    }

    // All-or-nothing: refuse if any predecessor would end up with both
    // successor slots on the same block.
    for &pred in &block.predecessors {
        let pred_block = program.block(pred);
        let slot = pred_block.slot_to(label);
        if pred_block.successor(slot.other()) == Some(target) {
            return 0;
        }
    }

    let location = program.block(label).ops[0].location;
    let predecessors: Vec<Label> = program.block(label).predecessors.to_vec();
    for pred in predecessors {
        if program.block(pred).has_terminator() {
            // The predecessor already branches; only its destination moves.
            let slot = program.block(pred).slot_to(label);
            program.unlink(pred, slot);
            program.link(pred, slot, target);
        } else {
            // A fallthrough predecessor adopts the branch itself. No code
            // disappears here; the jump just moves one block upstream.
            debug_assert_eq!(program.block(pred).jump_successor, None);
            program.unlink(pred, SuccessorSlot::Natural);
            program
                .block_mut(pred)
                .ops
                .push(Instruction::new(OpCode::Branch, 0, location));
            program.link(pred, SuccessorSlot::Jump, target);
        }
    }

    program.orphan(label);
    1
}

/// Collapse chains of identical conditional tests: while a pure
/// conditional's successor is again a pure conditional, taking the same
/// edge there leads to the same decision, so the edge can skip ahead.
pub fn chain_cjump_destinations(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += chain_at(program, label);
    }
    count
}

fn chain_at(program: &mut Program, label: Label) -> usize {
    if !program.block(label).is_pure_cjump() {
        return 0;
    }

    let mut count = 0usize;
    for slot in SuccessorSlot::BOTH {
        let start = program
            .block(label)
            .successor(slot)
            .expect("conditional with a missing successor");

        // Follow the same-polarity edge while it keeps hitting pure
        // conditionals. A conditional whose own edge points back at itself
        // is a final stop (the decision spins there); a longer revisit means
        // the chain cycles without ever deciding - leave such an edge alone.
        let mut visited: BTreeSet<Label> = BTreeSet::new();
        visited.insert(label);
        visited.insert(start);
        let mut target = start;
        let mut steps = 0usize;
        loop {
            let target_block = program.block(target);
            if !target_block.is_pure_cjump() {
                break;
            }
            let next = target_block
                .successor(slot)
                .expect("conditional with a missing successor");
            if next == target {
                break;
            }
            if !visited.insert(next) {
                steps = 0;
                break;
            }
            target = next;
            steps += 1;
        }

        if steps == 0 || target == start {
            continue;
        }
        // Keep the two slots distinct.
        if program.block(label).successor(slot.other()) == Some(target) {
            continue;
        }

        program.unlink(label, slot);
        program.link(label, slot, target);
        count += steps;
    }
    count
}

/// Fold a pure conditional whose unique predecessor already determines the
/// tested value: route the predecessor straight to the decided side and
/// orphan the conditional.
pub fn fold_single_entry_cjumps(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += fold_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn fold_at(program: &mut Program, label: Label) -> usize {
    let block = program.block(label);
    if !block.is_pure_cjump() {
        return 0;
    }
    let Some(pred) = block.unique_predecessor() else {
        return 0;
    };
    if pred == label {
        return 0;
    }

    let pred_eval = BlockEvaluation::analyze(program, pred);
    if pred_eval.has_indeterminate_value() {
        return 0;
    }

    let block = program.block(label);
    let destination = if pred_eval.has_non_zero_result() {
        block.jump_successor
    } else {
        block.natural_successor
    }
    .expect("conditional with a missing successor");
    if destination == label {
        // The decided edge loops back into the test; this is an infinite
        // loop, not a fold.
        return 0;
    }

    let slot = program.block(pred).slot_to(label);
    if program.block(pred).successor(slot.other()) == Some(destination) {
        return 0;
    }

    program.unlink(pred, slot);
    program.orphan(label);
    program.link(pred, slot, destination);
    1
}
