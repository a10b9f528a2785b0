//! Local analyses feeding the optimization passes.

pub mod evaluation;
pub mod pointer;

pub use evaluation::{BlockEvaluation, IncomingValues, ResultState};
pub use pointer::{PointerMovement, SameOffsetCursor, StationaryRange};

use crate::compiler::ir::Program;
use bitvec::prelude::*;
use std::collections::VecDeque;

/// Mark every block reachable from the entry by a breadth-first walk along
/// successor edges, imitating the control flow. The returned bit vector is
/// indexed by arena position; unmarked blocks cannot execute.
pub fn reachable_blocks(program: &Program) -> BitVec<u32> {
    let mut visited: BitVec<u32> = bitvec![u32, Lsb0; 0; program.len()];
    let mut waiting: VecDeque<usize> = VecDeque::new();
    waiting.push_back(program.position_of(program.entry_label()));

    while let Some(position) = waiting.pop_front() {
        if visited[position] {
            continue;
        }
        visited.set(position, true);

        for successor in program.block_at(position).successors() {
            waiting.push_back(program.position_of(successor));
        }
    }
    visited
}
