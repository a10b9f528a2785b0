//! Arithmetic simplification
//!
//! Consecutive value arithmetic (`+`/`-`) commutes within a run, as does
//! consecutive pointer arithmetic (`>`/`<`), so each maximal run collapses
//! to a single instruction carrying the summed argument - or to nothing when
//! the run cancels out. The tag selects which family of instructions the
//! pass looks at.

use crate::compiler::ir::{BasicBlock, Instruction, OpCode, Program};
use crate::compiler::optimizer::{cleanup, for_each_block};

/// Selects the instruction family to simplify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticTag {
    /// Cell-value arithmetic: runs of `inc`
    Value,
    /// Pointer arithmetic: runs of `right`
    Pointer,
    /// Both families, value first
    Both,
}

/// Simplify arithmetic runs in every block. Returns the number of
/// eliminated instructions.
pub fn simplify(program: &mut Program, tag: ArithmeticTag) -> usize {
    match tag {
        ArithmeticTag::Both => {
            simplify(program, ArithmeticTag::Value) + simplify(program, ArithmeticTag::Pointer)
        }
        _ => for_each_block(program, |block| simplify_block(block, tag)),
    }
}

/// Simplify one block.
///
/// # Algorithm
/// Take each maximal contiguous range of instructions of the selected
/// family. Ranges shorter than two instructions are already minimal. For the
/// rest, sum the signed arguments, turn the whole range into nops, and -
/// when the sum is non-zero - rewrite the head into a single instruction
/// performing the summed operation at the head's source location. The nops
/// are erased before returning.
fn simplify_block(block: &mut BasicBlock, tag: ArithmeticTag) -> usize {
    let (predicate, opcode): (fn(&Instruction) -> bool, OpCode) = match tag {
        ArithmeticTag::Value => (Instruction::is_arithmetic, OpCode::Inc),
        ArithmeticTag::Pointer => (Instruction::is_shift, OpCode::Right),
        ArithmeticTag::Both => unreachable!("compound tag is split by the caller"),
    };
    // Nops are erased by whichever pass creates them, so none enter here.
    debug_assert!(block.ops.iter().all(|inst| !inst.is_nop()));

    let mut index = 0usize;
    while index < block.ops.len() {
        if !predicate(&block.ops[index]) {
            index += 1;
            continue;
        }
        let head = index;
        while index < block.ops.len() && predicate(&block.ops[index]) {
            index += 1;
        }
        if index - head < 2 {
            continue;
        }

        let total: i64 = block.ops[head..index]
            .iter()
            .map(|inst| inst.argument)
            .fold(0i64, i64::wrapping_add);
        let location = block.ops[head].location;

        for inst in &mut block.ops[head..index] {
            inst.make_nop();
        }
        if total != 0 {
            block.ops[head] = Instruction::new(opcode, total, location);
        }
    }

    cleanup::remove_nops_block(block)
}
