//! Program arena
//!
//! The program exclusively owns every basic block. Blocks are addressed by
//! their stable label and kept sorted by it, so iteration order is
//! deterministic across passes. Optimization passes mutate blocks through
//! the arena and must restore every graph invariant before returning; blocks
//! are destroyed only by [`Program::sweep_orphans`], which runs between
//! passes, never during one.

use crate::compiler::ir::block::{BasicBlock, Label, SuccessorSlot};
use crate::compiler::ir::instruction::OpCode;

/// Arena of basic blocks forming a control-flow graph.
#[derive(Debug, Clone)]
pub struct Program {
    blocks: Vec<BasicBlock>,
}

impl Program {
    /// Take ownership of blocks produced by the CFG builder.
    /// The blocks must already be sorted by label.
    pub fn from_blocks(blocks: Vec<BasicBlock>) -> Self {
        assert!(
            blocks.windows(2).all(|pair| pair[0].label < pair[1].label),
            "blocks must be sorted by strictly increasing label"
        );
        assert!(!blocks.is_empty(), "a program has at least an entry block");
        Self { blocks }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [BasicBlock] {
        &mut self.blocks
    }

    /// Snapshot of every label in iteration order. Passes iterate over this
    /// snapshot so that edits to the arena cannot skip or repeat blocks.
    pub fn labels(&self) -> Vec<Label> {
        self.blocks.iter().map(|block| block.label).collect()
    }

    /// Label of the entry block.
    pub fn entry_label(&self) -> Label {
        self.blocks[0].label
    }

    /// Position of a label within the sorted arena; the label must exist.
    pub fn position_of(&self, label: Label) -> usize {
        self.blocks
            .binary_search_by_key(&label, |block| block.label)
            .unwrap_or_else(|_| panic!("no block with label {label}"))
    }

    pub fn contains(&self, label: Label) -> bool {
        self.blocks
            .binary_search_by_key(&label, |block| block.label)
            .is_ok()
    }

    pub fn block(&self, label: Label) -> &BasicBlock {
        &self.blocks[self.position_of(label)]
    }

    pub fn block_mut(&mut self, label: Label) -> &mut BasicBlock {
        let position = self.position_of(label);
        &mut self.blocks[position]
    }

    pub fn block_at(&self, position: usize) -> &BasicBlock {
        &self.blocks[position]
    }

    /// Total number of instructions across all blocks.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.ops.len()).sum()
    }

    /// Set a successor edge and mirror it in the target's predecessor set.
    pub fn link(&mut self, from: Label, slot: SuccessorSlot, to: Label) {
        assert!(
            self.block(from).successor(slot).is_none(),
            "block {from} already has a successor in this slot"
        );
        self.block_mut(from).set_successor(slot, Some(to));
        self.block_mut(to).add_predecessor(from);
    }

    /// Clear a successor edge and its mirrored predecessor entry.
    pub fn unlink(&mut self, from: Label, slot: SuccessorSlot) {
        let to = self
            .block(from)
            .successor(slot)
            .unwrap_or_else(|| panic!("block {from} has no successor in this slot"));
        self.block_mut(from).set_successor(slot, None);
        self.block_mut(to).remove_predecessor(from);
    }

    /// Unbind a block from the graph entirely: detach it from its successors,
    /// null every predecessor's edge that still points at it, and drop its
    /// instructions. Afterwards the block satisfies
    /// [`BasicBlock::is_orphaned`] and the next sweep reclaims it.
    pub fn orphan(&mut self, label: Label) {
        for slot in SuccessorSlot::BOTH {
            if self.block(label).successor(slot).is_some() {
                self.unlink(label, slot);
            }
        }

        let predecessors: Vec<Label> = self.block(label).predecessors.to_vec();
        for pred in predecessors {
            let pred_block = self.block_mut(pred);
            // Only null edges that still point here; a pass may have
            // retargeted the predecessor before orphaning this block.
            if pred_block.jump_successor == Some(label) {
                pred_block.jump_successor = None;
            } else if pred_block.natural_successor == Some(label) {
                pred_block.natural_successor = None;
            }
        }

        let block = self.block_mut(label);
        block.predecessors.clear();
        block.ops.clear();
    }

    /// Erase every orphaned block from the arena. Returns the number of
    /// blocks reclaimed. This is the only point at which blocks are
    /// destroyed.
    pub fn sweep_orphans(&mut self) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|block| !block.is_orphaned());
        before - self.blocks.len()
    }

    /// Verify every structural invariant of the graph, aborting with a
    /// diagnostic on the first violation. The optimization driver runs this
    /// between passes in debug builds; tests call it directly.
    pub fn assert_invariants(&self) {
        assert!(
            self.blocks
                .windows(2)
                .all(|pair| pair[0].label < pair[1].label),
            "blocks are not sorted by label"
        );

        let entry = &self.blocks[0];
        assert_eq!(
            entry.ops.first().map(|inst| inst.opcode),
            Some(OpCode::ProgramEntry),
            "entry block must start with program_entry"
        );
        assert!(
            entry.predecessors.is_empty(),
            "entry block must have no predecessors"
        );

        let mut exit_blocks = 0usize;
        for block in &self.blocks {
            if block.ops.last().map(|inst| inst.opcode) == Some(OpCode::ProgramExit) {
                exit_blocks += 1;
            }
            for (index, inst) in block.ops.iter().enumerate() {
                assert!(
                    !inst.is_jump() || index + 1 == block.ops.len(),
                    "block {} has a branch before its last instruction",
                    block.label
                );
                assert!(
                    inst.opcode != OpCode::ProgramEntry || block.label == entry.label,
                    "program_entry outside the entry block"
                );
                assert!(
                    inst.opcode != OpCode::ProgramExit || index + 1 == block.ops.len(),
                    "program_exit before the end of block {}",
                    block.label
                );
            }
        }
        assert_eq!(exit_blocks, 1, "exactly one block must end in program_exit");

        for block in &self.blocks {
            if block.is_orphaned() {
                continue;
            }

            // Conditional blocks are always pure; nothing precedes the test.
            assert_eq!(
                block.is_cjump(),
                block.is_pure_cjump(),
                "block {} ends in branch_nz but carries other instructions",
                block.label
            );

            if block.is_ujump() {
                assert!(
                    block.natural_successor.is_none() && block.jump_successor.is_some(),
                    "branch terminator of block {} must have only a jump successor",
                    block.label
                );
            } else if block.is_cjump() {
                assert!(
                    block.natural_successor.is_some() && block.jump_successor.is_some(),
                    "branch_nz terminator of block {} must have both successors",
                    block.label
                );
            } else {
                assert!(
                    block.jump_successor.is_none(),
                    "block {} has a jump successor without a branch terminator",
                    block.label
                );
            }

            if block.ops.last().map(|inst| inst.opcode) != Some(OpCode::ProgramExit) {
                assert!(
                    block.successors().next().is_some(),
                    "non-exit block {} has no successor",
                    block.label
                );
            }

            if let (Some(natural), Some(jump)) = (block.natural_successor, block.jump_successor) {
                assert_ne!(
                    natural, jump,
                    "block {} has identical natural and jump successors",
                    block.label
                );
            }

            for successor in block.successors() {
                assert!(
                    self.contains(successor),
                    "block {} points at a reclaimed block {}",
                    block.label,
                    successor
                );
                let successor_block = self.block(successor);
                assert!(
                    !successor_block.is_orphaned(),
                    "block {} points at orphaned block {}",
                    block.label,
                    successor
                );
                let mirrored = successor_block
                    .predecessors
                    .iter()
                    .filter(|&&pred| pred == block.label)
                    .count();
                assert_eq!(
                    mirrored, 1,
                    "edge {} -> {} is not mirrored exactly once",
                    block.label, successor
                );
            }

            for &pred in &block.predecessors {
                assert!(
                    self.contains(pred),
                    "block {} lists a reclaimed predecessor {}",
                    block.label,
                    pred
                );
                let pred_block = self.block(pred);
                assert!(
                    !pred_block.is_orphaned(),
                    "block {} lists orphaned predecessor {}",
                    block.label,
                    pred
                );
                assert!(
                    pred_block.has_successor(block.label),
                    "predecessor {} of block {} has no matching successor edge",
                    pred,
                    block.label
                );
            }
        }
    }
}
