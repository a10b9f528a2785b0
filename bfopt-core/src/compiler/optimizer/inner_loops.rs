//! Inner-loop recognizers
//!
//! An inner loop is a pure conditional block whose jump successor is a
//! non-branching body looping straight back to the test. Three rewrites fire
//! on that shape:
//!
//! - **clear loop**: the body provably drives the cell to zero (it writes a
//!   constant zero, or applies a net delta that is non-zero modulo the cell
//!   width, so wrapping eventually reaches zero). The test becomes
//!   `load_const 0`.
//! - **infinite body**: the body reestablishes a constant non-zero value, so
//!   entering with a non-zero cell never escapes. The test becomes
//!   `infinite` on non-zero.
//! - **search loop**: the body only moves the pointer by a fixed stride; the
//!   test becomes a `search` instruction.
//!
//! A conditional testing itself (`[]`) is the degenerate self-loop: it spins
//! on any non-zero cell and becomes `infinite` directly.
//!
//! Each rewrite severs the condition-to-body edge; a body with no other
//! entrants is orphaned and swept.

use crate::compiler::analysis::{BlockEvaluation, PointerMovement};
use crate::compiler::ir::{
    Instruction, Label, OpCode, Program, SuccessorSlot, CELL_MODULUS,
};

/// A recognized inner loop: the pure conditional and its body.
struct InnerLoop {
    condition: Label,
    body: Label,
}

impl InnerLoop {
    /// Recognize `condition` as an inner loop. Self-loops are excluded; they
    /// have no body block.
    fn recognize(program: &Program, condition: Label) -> Option<InnerLoop> {
        let cond_block = program.block(condition);
        if !cond_block.is_pure_cjump() || cond_block.has_self_loop() {
            return None;
        }
        let body = cond_block.jump_successor?;
        let body_block = program.block(body);
        if body_block.has_terminator() || !body_block.has_successor(condition) {
            return None;
        }
        debug_assert_eq!(body_block.jump_successor, None);
        debug_assert_eq!(body_block.natural_successor, Some(condition));
        Some(InnerLoop { condition, body })
    }

    /// Cut the condition's edge into the body. The body may keep other
    /// entrants (jump chaining can create them); only a fully disconnected
    /// body is orphaned.
    fn sever_body(&self, program: &mut Program) {
        program.unlink(self.condition, SuccessorSlot::Jump);
        if program.block(self.body).predecessors.is_empty() {
            program.orphan(self.body);
        }
    }
}

/// Replace loops that provably zero their cell with `load_const 0`.
pub fn eliminate_clear_loops(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += clear_loop_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn clear_loop_at(program: &mut Program, label: Label) -> usize {
    let Some(inner) = InnerLoop::recognize(program, label) else {
        return 0;
    };

    if PointerMovement::analyze(program.block(inner.body)).ptr_moves() {
        return 0;
    }
    let body_eval = BlockEvaluation::analyze(program, inner.body);
    if body_eval.has_visible_sideeffects() {
        return 0;
    }
    let clears = if body_eval.has_const_result() {
        body_eval.const_result() == 0
    } else {
        // Wrapping cell arithmetic: any delta that is not a multiple of the
        // cell width walks the cell through zero eventually.
        body_eval.value_delta() % CELL_MODULUS != 0
    };
    if !clears {
        return 0;
    }

    let location = program
        .block(inner.body)
        .ops
        .first()
        .map(|inst| inst.location)
        .unwrap_or(program.block(inner.condition).ops[0].location);
    program.block_mut(inner.condition).ops[0] =
        Instruction::new(OpCode::LoadConst, 0, location);
    inner.sever_body(program);
    1
}

/// Replace provably non-terminating loops with the `infinite` diagnostic
/// terminator.
pub fn eliminate_infinite_loops(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += infinite_loop_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn infinite_loop_at(program: &mut Program, label: Label) -> usize {
    let block = program.block(label);
    if block.is_pure_cjump() && block.has_self_loop() {
        return eliminate_self_loop(program, label);
    }

    let Some(inner) = InnerLoop::recognize(program, label) else {
        return 0;
    };
    if PointerMovement::analyze(program.block(inner.body)).ptr_moves() {
        return 0;
    }
    let body_eval = BlockEvaluation::analyze(program, inner.body);
    if body_eval.has_visible_sideeffects()
        || !body_eval.has_const_result()
        || body_eval.const_result() == 0
    {
        return 0;
    }

    program.block_mut(inner.condition).ops[0].make_infinite_on_not_zero();
    inner.sever_body(program);
    1
}

/// An empty loop tests its own cell forever: drop the self edge and make the
/// test `infinite` on non-zero.
fn eliminate_self_loop(program: &mut Program, condition: Label) -> usize {
    debug_assert!(program.block(condition).is_pure_cjump());
    debug_assert_ne!(program.block(condition).natural_successor, Some(condition));

    program.unlink(condition, SuccessorSlot::Jump);
    program.block_mut(condition).ops[0].make_infinite_on_not_zero();
    1
}

/// Replace loops whose body only moves the pointer with a single `search`.
pub fn eliminate_search_loops(program: &mut Program) -> usize {
    let mut count = 0usize;
    for label in program.labels() {
        count += search_loop_at(program, label);
    }
    program.sweep_orphans();
    count
}

fn search_loop_at(program: &mut Program, label: Label) -> usize {
    let Some(inner) = InnerLoop::recognize(program, label) else {
        return 0;
    };

    let movement = PointerMovement::analyze(program.block(inner.body));
    if !movement.only_moves_ptr() || movement.ptr_delta() == 0 {
        return 0;
    }

    program.block_mut(inner.condition).ops[0].make_search(movement.ptr_delta());
    inner.sever_body(program);
    1
}
