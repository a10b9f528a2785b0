//! Intermediate Representation
//!
//! The IR is a flat instruction record over a closed opcode set, grouped into
//! basic blocks that form a control-flow graph. Successor and predecessor
//! edges are block labels, never owning references; the [`Program`] arena
//! exclusively owns every block.

pub mod block;
pub mod instruction;
pub mod program;

pub use block::{BasicBlock, Label, SuccessorSlot};
pub use instruction::{Instruction, OpCode, SourceLocation};
pub use program::Program;

/// Cell values live in a single byte; all cell arithmetic wraps modulo this.
pub const CELL_MODULUS: i64 = 256;

/// Reduce a cell value computed in signed arithmetic to its canonical
/// representative in `0..CELL_MODULUS`.
#[inline]
pub fn wrap_cell(value: i64) -> i64 {
    value.rem_euclid(CELL_MODULUS)
}
