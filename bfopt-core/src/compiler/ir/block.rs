//! Basic blocks
//!
//! A block owns an ordered run of instructions and carries at most two
//! successor edges: the natural successor (fallthrough, or the false edge of
//! a conditional) and the jump successor (the unconditional destination, or
//! the true edge of a conditional). Edges are labels into the owning
//! [`Program`](super::Program) arena. The predecessor set mirrors every
//! successor edge pointing at this block.
//!
//! A block *has a terminator* iff its last instruction is `branch` or
//! `branch_nz`; otherwise fallthrough is implicit. Terminator discipline:
//! - `branch` terminator: jump successor set, natural successor absent
//! - `branch_nz` terminator: both successors set, false → natural, true → jump
//! - no terminator: only the natural successor may be set

use crate::compiler::ir::instruction::{Instruction, OpCode};
use smallvec::SmallVec;

/// Stable block identifier, assigned in insertion order by the CFG builder.
pub type Label = u32;

/// Names one of the two successor edge slots of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessorSlot {
    Natural,
    Jump,
}

impl SuccessorSlot {
    pub const BOTH: [SuccessorSlot; 2] = [SuccessorSlot::Natural, SuccessorSlot::Jump];

    pub fn other(self) -> SuccessorSlot {
        match self {
            SuccessorSlot::Natural => SuccessorSlot::Jump,
            SuccessorSlot::Jump => SuccessorSlot::Natural,
        }
    }
}

/// Basic block node of the control-flow graph.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Stable label; blocks are totally ordered by it
    pub label: Label,
    /// Instructions in program order
    pub ops: Vec<Instruction>,
    /// Fallthrough / false-edge successor
    pub natural_successor: Option<Label>,
    /// Unconditional / true-edge successor
    pub jump_successor: Option<Label>,
    /// Labels of blocks with a successor edge pointing here
    /// Most blocks have at most two predecessors
    pub predecessors: SmallVec<[Label; 2]>,
}

impl BasicBlock {
    pub fn new(label: Label, ops: Vec<Instruction>) -> Self {
        Self {
            label,
            ops,
            natural_successor: None,
            jump_successor: None,
            predecessors: SmallVec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// True iff the last instruction is a `branch` or `branch_nz`.
    pub fn has_terminator(&self) -> bool {
        self.ops.last().is_some_and(Instruction::is_jump)
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.ops.last().filter(|inst| inst.is_jump())
    }

    /// True iff the block ends with a conditional branch.
    pub fn is_cjump(&self) -> bool {
        self.ops
            .last()
            .is_some_and(|inst| inst.opcode == OpCode::BranchNz)
    }

    /// True iff the block ends with an unconditional branch.
    pub fn is_ujump(&self) -> bool {
        self.ops
            .last()
            .is_some_and(|inst| inst.opcode == OpCode::Branch)
    }

    /// True iff the block's only instruction is a conditional branch.
    pub fn is_pure_cjump(&self) -> bool {
        self.ops.len() == 1 && self.ops[0].opcode == OpCode::BranchNz
    }

    /// True iff the block's only instruction is an unconditional branch.
    pub fn is_pure_ujump(&self) -> bool {
        self.ops.len() == 1 && self.ops[0].opcode == OpCode::Branch
    }

    /// True iff the block's own jump edge loops back to itself.
    pub fn has_self_loop(&self) -> bool {
        self.jump_successor == Some(self.label)
    }

    pub fn successor(&self, slot: SuccessorSlot) -> Option<Label> {
        match slot {
            SuccessorSlot::Natural => self.natural_successor,
            SuccessorSlot::Jump => self.jump_successor,
        }
    }

    pub fn set_successor(&mut self, slot: SuccessorSlot, target: Option<Label>) {
        match slot {
            SuccessorSlot::Natural => self.natural_successor = target,
            SuccessorSlot::Jump => self.jump_successor = target,
        }
    }

    pub fn has_successor(&self, target: Label) -> bool {
        self.natural_successor == Some(target) || self.jump_successor == Some(target)
    }

    /// Which slot points at `target`. The caller must know the edge exists.
    pub fn slot_to(&self, target: Label) -> SuccessorSlot {
        if self.natural_successor == Some(target) {
            SuccessorSlot::Natural
        } else if self.jump_successor == Some(target) {
            SuccessorSlot::Jump
        } else {
            panic!(
                "block {} has no successor edge to block {}",
                self.label, target
            );
        }
    }

    /// Successor labels in `(natural, jump)` order.
    pub fn successors(&self) -> impl Iterator<Item = Label> + '_ {
        self.natural_successor
            .into_iter()
            .chain(self.jump_successor)
    }

    pub fn has_predecessor(&self, label: Label) -> bool {
        self.predecessors.contains(&label)
    }

    pub fn add_predecessor(&mut self, label: Label) {
        assert!(
            !self.has_predecessor(label),
            "block {} is already a predecessor of block {}",
            label,
            self.label
        );
        self.predecessors.push(label);
    }

    pub fn remove_predecessor(&mut self, label: Label) {
        let position = self
            .predecessors
            .iter()
            .position(|&pred| pred == label)
            .unwrap_or_else(|| {
                panic!(
                    "block {} is not a predecessor of block {}",
                    label, self.label
                )
            });
        self.predecessors.swap_remove(position);
    }

    /// The unique predecessor, if there is exactly one.
    pub fn unique_predecessor(&self) -> Option<Label> {
        if self.predecessors.len() == 1 {
            Some(self.predecessors[0])
        } else {
            None
        }
    }

    /// A block is orphaned once it has lost every connection and every
    /// instruction; the sweep may then reclaim it.
    pub fn is_orphaned(&self) -> bool {
        self.natural_successor.is_none()
            && self.jump_successor.is_none()
            && self.predecessors.is_empty()
            && self.ops.is_empty()
    }
}
