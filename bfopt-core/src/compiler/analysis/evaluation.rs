//! Block-evaluation and incoming-value analyses
//!
//! [`BlockEvaluation`] determines what can be said about the value stored at
//! the exit pointer position after running a block: nothing, a known
//! constant, provably non-zero, or indeterminate because of a read or a
//! possible overflow. [`IncomingValues`] classifies the values a block can
//! be entered with by looking at each predecessor edge.
//!
//! Cell arithmetic wraps modulo [`CELL_MODULUS`]; constants are tracked in
//! their canonical `0..256` form so that "non-zero" means non-zero in the
//! machine, not in unbounded integers.

use crate::compiler::analysis::pointer::PointerMovement;
use crate::compiler::ir::{wrap_cell, BasicBlock, Instruction, Label, OpCode, Program};
use std::collections::BTreeSet;

/// What is known about the cell under the pointer when a block exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    Unknown,
    /// A read reached the exit cell; its value depends on the input stream
    IndeterminateRead,
    /// Arithmetic on a non-zero value may have wrapped through zero
    IndeterminateOverflow,
    /// Non-zero, exact value unknown
    KnownNotZero,
    /// Exact value known
    KnownConstant,
}

/// Evaluation of one block's effect on its exit cell.
#[derive(Debug, Clone)]
pub struct BlockEvaluation {
    state: ResultState,
    const_result: i64,
    value_delta: i64,
    has_sideeffect: bool,
    ptr_moves: bool,
}

impl BlockEvaluation {
    /// Analyze the block with the given label.
    ///
    /// # Algorithm
    /// 1. If the block moves its pointer, the exit cell differs from any
    ///    analyzable entry cell; nothing is inferred from predecessors.
    /// 2. Otherwise the entry value comes from the predecessors: none means
    ///    the cell still holds its initial zero, a unique predecessor
    ///    donates its own evaluation, multiple predecessors stay unknown.
    /// 3. The instructions executing at the exit offset are walked in
    ///    program order, updating the tracked state: arithmetic adds to the
    ///    delta and to a known constant, `load_const` pins the state,
    ///    `infinite` pins it by its polarity (falling through an
    ///    infinite-on-non-zero means the cell was zero), `read` degrades to
    ///    indeterminate, `write` only marks the side effect.
    pub fn analyze(program: &Program, label: Label) -> Self {
        let mut chain: BTreeSet<Label> = BTreeSet::new();
        chain.insert(label);
        Self::analyze_guarded(program, label, &mut chain)
    }

    fn analyze_guarded(program: &Program, label: Label, chain: &mut BTreeSet<Label>) -> Self {
        let block = program.block(label);
        let movement = PointerMovement::analyze(block);

        let mut eval = Self {
            state: ResultState::Unknown,
            const_result: 0,
            value_delta: 0,
            has_sideeffect: false,
            ptr_moves: movement.ptr_moves(),
        };

        // A search scans to a data-dependent cell; every offset downstream
        // of it is unknowable, so nothing can be said about the exit cell.
        if block.ops.iter().any(Instruction::is_search) {
            eval.has_sideeffect = true;
            eval.ptr_moves = true;
            return eval;
        }

        eval.analyze_predecessors(program, block, &movement, chain);
        eval.analyze_within_block(block, &movement);
        eval
    }

    fn analyze_predecessors(
        &mut self,
        program: &Program,
        block: &BasicBlock,
        movement: &PointerMovement,
        chain: &mut BTreeSet<Label>,
    ) {
        if movement.ptr_moves() {
            // The entry cell is not the exit cell; predecessors say nothing.
            return;
        }
        match block.predecessors.len() {
            0 => {
                // Only the entry block has no predecessors; the tape is
                // still zero-initialized there.
                self.state = ResultState::KnownConstant;
                self.const_result = 0;
            }
            1 => {
                let pred = block.predecessors[0];
                if !chain.insert(pred) {
                    // Cyclic single-predecessor chain; give up on inference.
                    return;
                }
                let pred_eval = Self::analyze_guarded(program, pred, chain);
                self.state = pred_eval.state;
                if self.state == ResultState::KnownConstant {
                    self.const_result = pred_eval.const_result;
                }
            }
            // Joining values from multiple predecessors is out of reach for
            // a local analysis; stay unknown.
            _ => {}
        }
    }

    fn analyze_within_block(&mut self, block: &BasicBlock, movement: &PointerMovement) {
        let mut cursor = movement.cursor_at_offset(movement.ptr_delta());
        while cursor.is_valid() {
            let inst = &block.ops[cursor.index()];
            if inst.is_arithmetic() {
                self.value_delta += inst.argument;
                match self.state {
                    ResultState::KnownConstant => {
                        self.const_result = wrap_cell(self.const_result + inst.argument);
                    }
                    ResultState::KnownNotZero => {
                        self.state = ResultState::IndeterminateOverflow;
                    }
                    _ => {}
                }
            } else if inst.is_const() {
                self.state = ResultState::KnownConstant;
                self.const_result = wrap_cell(inst.argument);
            } else {
                match inst.opcode {
                    OpCode::Infinite => {
                        self.has_sideeffect = true;
                        if inst.loops_on_not_zero() {
                            // The block only falls through once the cell is zero.
                            self.state = ResultState::KnownConstant;
                            self.const_result = 0;
                        } else {
                            self.state = ResultState::KnownNotZero;
                        }
                    }
                    OpCode::Read => {
                        self.state = ResultState::IndeterminateRead;
                        self.has_sideeffect = true;
                    }
                    OpCode::Write => {
                        self.has_sideeffect = true;
                    }
                    _ => {}
                }
            }
            cursor.advance();
        }
    }

    #[inline]
    pub fn state(&self) -> ResultState {
        self.state
    }

    #[inline]
    pub fn has_const_result(&self) -> bool {
        self.state == ResultState::KnownConstant
    }

    /// The known constant, canonical in `0..256`.
    pub fn const_result(&self) -> i64 {
        assert!(self.has_const_result(), "no constant result to read");
        self.const_result
    }

    pub fn has_non_zero_result(&self) -> bool {
        (self.has_const_result() && self.const_result != 0)
            || self.state == ResultState::KnownNotZero
    }

    pub fn has_indeterminate_value(&self) -> bool {
        !self.has_const_result() && !self.has_non_zero_result()
    }

    /// True iff running the block is observable: I/O happened or the pointer
    /// moved.
    pub fn has_visible_sideeffects(&self) -> bool {
        self.has_sideeffect || self.ptr_moves
    }

    /// Net arithmetic applied to the exit cell. Only meaningful when the
    /// result is not a constant and the block has no visible side effects.
    pub fn value_delta(&self) -> i64 {
        assert!(
            !self.has_const_result() && !self.has_visible_sideeffects(),
            "value delta is meaningless for this block"
        );
        self.value_delta
    }
}

/// Classification of the cell values a block can be entered with, one
/// verdict per predecessor edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncomingValues {
    zero_seen: bool,
    non_zero_seen: bool,
}

impl IncomingValues {
    /// Inspect every predecessor edge of the block. A pure conditional
    /// predecessor contributes `non_zero` through its jump edge and `zero`
    /// through its natural edge; any other predecessor contributes what its
    /// block evaluation proves, or both when indeterminate.
    pub fn analyze(program: &Program, label: Label) -> Self {
        let mut incoming = Self::default();
        for &pred in &program.block(label).predecessors {
            incoming.analyze_predecessor(program, label, pred);
        }
        incoming
    }

    fn analyze_predecessor(&mut self, program: &Program, subject: Label, pred: Label) {
        let pred_block = program.block(pred);
        assert!(
            pred_block.has_successor(subject),
            "predecessor {pred} has no edge to block {subject}"
        );

        if pred_block.is_pure_cjump() {
            if pred_block.jump_successor == Some(subject) {
                self.non_zero_seen = true;
            } else {
                self.zero_seen = true;
            }
            return;
        }

        let eval = BlockEvaluation::analyze(program, pred);
        if eval.has_indeterminate_value() {
            self.zero_seen = true;
            self.non_zero_seen = true;
        } else if eval.has_non_zero_result() {
            self.non_zero_seen = true;
        } else {
            self.zero_seen = true;
        }
    }

    pub fn all_non_zero(&self) -> bool {
        !self.zero_seen
    }

    pub fn all_zero(&self) -> bool {
        !self.non_zero_seen
    }
}
