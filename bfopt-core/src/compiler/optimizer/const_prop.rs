//! Local constant propagation
//!
//! Within one block, a `load_const` makes every earlier write to the same
//! cell dead and absorbs every later arithmetic instruction on it. The pass
//! walks the same-offset cursor forwards and backwards from each constant,
//! folding and killing as it goes. I/O is a fence in both directions: a
//! `read` redefines the cell and a `write` observes it, so the walk stops
//! there.

use crate::compiler::analysis::pointer::PointerMovement;
use crate::compiler::analysis::SameOffsetCursor;
use crate::compiler::ir::{wrap_cell, BasicBlock, Program};
use crate::compiler::optimizer::{cleanup, for_each_block};

/// Propagate constants locally in every block. Returns the number of
/// eliminated instructions.
pub fn propagate_local_consts(program: &mut Program) -> usize {
    for_each_block(program, propagate_block)
}

fn propagate_block(block: &mut BasicBlock) -> usize {
    // A search lands on a data-dependent cell, so offsets downstream of it
    // are unknowable and no same-offset reasoning holds in this block.
    if block.ops.iter().any(|inst| inst.is_search()) {
        return 0;
    }

    let movement = PointerMovement::analyze(block);

    let mut search_from = 0usize;
    while let Some(position) = block.ops[search_from..]
        .iter()
        .position(|inst| inst.is_const())
    {
        let const_index = search_from + position;
        let cursor = movement.cursor_at_instruction(const_index);
        propagate_forward(block, cursor);
        propagate_backward(block, cursor);
        search_from = const_index + 1;
    }

    cleanup::remove_nops_block(block)
}

/// Fold later same-offset arithmetic into the constant. A later constant at
/// the same offset makes this one dead; I/O stops the walk.
fn propagate_forward(block: &mut BasicBlock, mut cursor: SameOffsetCursor<'_>) {
    debug_assert!(block.ops[cursor.index()].is_const());
    let const_index = cursor.index();

    loop {
        cursor.advance();
        if !cursor.is_valid() {
            return;
        }
        let index = cursor.index();
        let inst = block.ops[index];
        if inst.is_arithmetic() {
            block.ops[const_index].argument =
                wrap_cell(block.ops[const_index].argument + inst.argument);
            block.ops[index].make_nop();
        } else if inst.is_const() {
            block.ops[const_index].make_nop();
            return;
        } else if inst.is_io() {
            return;
        }
    }
}

/// Earlier same-offset arithmetic is dead: the constant overwrites its
/// result. Seeing another constant backwards cannot happen - the forward
/// walk from that one would have erased one of the pair already.
fn propagate_backward(block: &mut BasicBlock, mut cursor: SameOffsetCursor<'_>) {
    debug_assert!(block.ops[cursor.index()].is_const());

    loop {
        cursor.retreat();
        if !cursor.is_valid() {
            return;
        }
        let index = cursor.index();
        let inst = block.ops[index];
        if inst.is_arithmetic() {
            block.ops[index].make_nop();
        } else if inst.is_const() {
            unreachable!("forward propagation left two constants at one offset");
        } else if inst.is_io() {
            return;
        }
    }
}
