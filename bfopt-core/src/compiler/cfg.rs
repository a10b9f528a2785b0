//! Frontend and CFG construction
//!
//! Turns validated source text into a linear instruction stream and the
//! stream into a graph of basic blocks. Construction happens in three
//! stages:
//!
//! 1. **Lexing**: the eight command characters become IR instructions with
//!    their `(line, column)` recorded; everything else is a comment. The
//!    stream is wrapped in `program_entry` / `program_exit` markers.
//! 2. **Bracket resolution**: a stack walk pairs every `[` with its `]` and
//!    stores absolute instruction indices as branch destinations. The `[`
//!    targets the closing `branch_nz` (the loop test runs first), the `]`
//!    targets the instruction right after the `[` (the loop body entry).
//! 3. **Block construction**: leaders split the stream into blocks, the
//!    terminators dictate the successor edges, and predecessor sets mirror
//!    them. Branch destinations then live only in the graph structure; the
//!    instruction arguments are cleared.
//!
//! Stage 3 accepts any linear stream whose branch arguments are absolute
//! indices, so the linearizer's output can be rebuilt into a graph with the
//! same code path.

use crate::compiler::error::CompileError;
use crate::compiler::ir::{BasicBlock, Instruction, Label, OpCode, Program, SourceLocation};
use crate::compiler::syntax;
use std::collections::BTreeSet;

/// Placeholder for a branch destination that has not been resolved yet.
const UNRESOLVED_TARGET: i64 = i64::MIN;

/// Compile validated source text into a control-flow graph.
///
/// # Errors
/// Returns [`CompileError::Syntax`] with every bracket mismatch when the
/// source is not well-formed. Any failure past validation is a contract
/// violation and aborts.
pub fn compile(source: &str) -> Result<Program, CompileError> {
    if !syntax::is_balanced(source) {
        let errors = syntax::validate(source);
        assert!(!errors.is_empty(), "quick and detailed validators disagree");
        return Err(CompileError::Syntax { errors });
    }

    let mut code = lex(source);
    resolve_jump_targets(&mut code);
    Ok(CfgBuilder::build(&code))
}

/// Lex source text into a linear instruction stream with unresolved branch
/// destinations. The stream is prefixed with `program_entry` and suffixed
/// with `program_exit`.
pub fn lex(source: &str) -> Vec<Instruction> {
    let mut code: Vec<Instruction> = Vec::with_capacity(2 + source.len());
    code.push(Instruction::new(
        OpCode::ProgramEntry,
        0,
        SourceLocation::new(1, 0),
    ));

    let mut line: u32 = 1;
    let mut column: u32 = 0;
    for ch in source.chars() {
        column += 1;
        let location = SourceLocation::new(line, column);
        match ch {
            '+' => code.push(Instruction::new(OpCode::Inc, 1, location)),
            '-' => code.push(Instruction::new(OpCode::Inc, -1, location)),
            '>' => code.push(Instruction::new(OpCode::Right, 1, location)),
            '<' => code.push(Instruction::new(OpCode::Right, -1, location)),
            ',' => code.push(Instruction::new(OpCode::Read, 0, location)),
            '.' => code.push(Instruction::new(OpCode::Write, 0, location)),
            '[' => code.push(Instruction::new(OpCode::Branch, UNRESOLVED_TARGET, location)),
            ']' => code.push(Instruction::new(OpCode::BranchNz, UNRESOLVED_TARGET, location)),
            '\n' => {
                line += 1;
                column = 0;
            }
            // Any other character is a comment.
            _ => {}
        }
    }

    code.push(Instruction::new(
        OpCode::ProgramExit,
        0,
        SourceLocation::new(line, column + 1),
    ));
    code
}

/// Pair brackets by a stack walk and store absolute instruction indices as
/// branch destinations: each `branch` targets its matching `branch_nz`, each
/// `branch_nz` targets the instruction following the matching `branch`.
pub fn resolve_jump_targets(code: &mut [Instruction]) {
    let mut opened_loops: Vec<usize> = Vec::new();

    for index in 0..code.len() {
        match code[index].opcode {
            OpCode::Branch => opened_loops.push(index),
            OpCode::BranchNz => {
                let open = opened_loops
                    .pop()
                    .expect("unmatched branch_nz in validated code");
                code[open].argument = index as i64;
                code[index].argument = (open + 1) as i64;
            }
            _ => {}
        }
    }
    assert!(
        opened_loops.is_empty(),
        "unmatched branch in validated code"
    );
}

/// Builds the basic-block graph from a linear instruction stream.
pub struct CfgBuilder;

impl CfgBuilder {
    /// Build a control-flow graph from a linear stream whose branch
    /// arguments are absolute instruction indices.
    ///
    /// # Algorithm
    /// 1. **Identify leaders**: the first instruction, every branch
    ///    destination, every `branch_nz` itself, and the instruction after
    ///    any branch. A sentinel one past the end closes the last block.
    /// 2. **Slice blocks**: consecutive leaders delimit one block each;
    ///    labels are assigned in stream order.
    /// 3. **Wire edges**: a `branch` terminator contributes a jump edge to
    ///    its destination's block; a `branch_nz` contributes a jump edge to
    ///    its destination and a natural edge to the next block; any other
    ///    ending falls through naturally. Predecessor sets mirror every
    ///    edge, and branch arguments are cleared - the graph is authoritative
    ///    from here on.
    pub fn build(code: &[Instruction]) -> Program {
        assert!(code.len() >= 2, "stream must carry entry and exit markers");
        assert_eq!(code[0].opcode, OpCode::ProgramEntry);
        assert_eq!(code[code.len() - 1].opcode, OpCode::ProgramExit);
        debug_assert!(
            code.iter()
                .all(|inst| !inst.is_jump() || inst.argument != UNRESOLVED_TARGET),
            "branch destinations must be resolved before block construction"
        );

        let leaders = Self::identify_leaders(code);

        let mut blocks: Vec<BasicBlock> = Vec::with_capacity(leaders.len() - 1);
        for (label, window) in leaders.windows(2).enumerate() {
            let ops = code[window[0]..window[1]].to_vec();
            blocks.push(BasicBlock::new(label as Label, ops));
        }

        let block_of = |instruction_index: i64| -> Label {
            leaders
                .binary_search(&(instruction_index as usize))
                .unwrap_or_else(|_| {
                    panic!("branch destination {instruction_index} is not a block leader")
                }) as Label
        };

        let block_count = blocks.len();
        for index in 0..block_count {
            let Some(terminator) = blocks[index].terminator().copied() else {
                if index + 1 < block_count {
                    blocks[index].natural_successor = Some((index + 1) as Label);
                }
                continue;
            };

            let destination = block_of(terminator.argument);
            blocks[index].jump_successor = Some(destination);
            if terminator.opcode == OpCode::BranchNz {
                assert!(
                    index + 1 < block_count,
                    "branch_nz cannot terminate the last block"
                );
                blocks[index].natural_successor = Some((index + 1) as Label);
            }
            // Successor edges are authoritative now.
            blocks[index].ops.last_mut().unwrap().argument = 0;
        }

        for index in 0..block_count {
            let successors: Vec<Label> = blocks[index].successors().collect();
            for successor in successors {
                blocks[successor as usize].add_predecessor(index as Label);
            }
        }

        let program = Program::from_blocks(blocks);
        program.assert_invariants();
        program
    }

    /// Leader set of the stream, in increasing order, closed by a sentinel
    /// one past the end. Duplicates (for instance from adjacent `]]`)
    /// collapse via the set.
    fn identify_leaders(code: &[Instruction]) -> Vec<usize> {
        let mut leaders: BTreeSet<usize> = BTreeSet::new();
        leaders.insert(0);
        leaders.insert(code.len());

        for (index, inst) in code.iter().enumerate() {
            match inst.opcode {
                OpCode::Branch => {
                    leaders.insert(index + 1);
                    leaders.insert(inst.argument as usize);
                }
                OpCode::BranchNz => {
                    leaders.insert(index);
                    leaders.insert(index + 1);
                    leaders.insert(inst.argument as usize);
                }
                _ => {}
            }
        }

        leaders.into_iter().collect()
    }
}
