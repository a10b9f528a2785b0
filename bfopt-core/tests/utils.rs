//! Test Utilities
//!
//! Shared helpers for the integration tests: compiling, driving the
//! optimizer, executing programs, and comparing graphs.

use bfopt_core::compiler::cfg;
use bfopt_core::compiler::ir::{OpCode, Program};
use bfopt_core::compiler::linearize::linearize;
use bfopt_core::compiler::optimizer::{self, OptPass, OptimizationReport};
use bfopt_core::runtime::{Emulator, ExecutionOutcome, ExecutionStatus};
use std::collections::BTreeSet;

/// Small programs exercising every opcode and every loop shape.
pub const CORPUS: &[&str] = &[
    "",
    "+++",
    "+-+-+",
    "[-]",
    "-[-]",
    "[]",
    "[>]",
    "[<]",
    "+[>]",
    "+[<]",
    "+[-]",
    "+[+]",
    "[+-]",
    "+[+-]",
    ",+.",
    "+++[-]+++",
    ">>>[-]<<<+",
    "[[]]",
    "[[-]]",
    "[[[]]]",
    "+[[]]",
    "[[>]]",
    "+[>]+[-]",
    "+++[>++<-]>.",
    "++>+++<[->+<]>.",
    "++[>+++[>++<-]<-]>>.",
    "+[>,.<-]",
    "[-]+[.-]",
];

/// Inputs fed to every corpus program.
pub const INPUTS: &[&[u8]] = &[b"", b"A", b"hello", b"\x00\x01\xff"];

/// Step budget generous enough for the corpus, small enough that divergent
/// programs cut off quickly.
pub const TEST_STEP_LIMIT: u64 = 200_000;

pub fn compile(source: &str) -> Program {
    cfg::compile(source).expect("corpus programs are well-formed")
}

pub fn pass_set(passes: &[OptPass]) -> BTreeSet<OptPass> {
    passes.iter().copied().collect()
}

pub fn optimize_with(program: &mut Program, passes: &[OptPass]) -> OptimizationReport {
    optimizer::optimize(program, &pass_set(passes))
}

/// Execute a program graph and capture everything observable.
pub fn execute(program: &Program, input: &[u8]) -> (ExecutionOutcome, Vec<u8>) {
    let mut emulator = Emulator::new(linearize(program));
    emulator.set_step_limit(TEST_STEP_LIMIT);
    let mut reader = input;
    let mut output: Vec<u8> = Vec::new();
    let outcome = emulator
        .run(&mut reader, &mut output)
        .expect("in-memory streams cannot fail");
    (outcome, output)
}

pub fn diverged(outcome: &ExecutionOutcome) -> bool {
    matches!(
        outcome.status,
        ExecutionStatus::InfiniteLoop | ExecutionStatus::StepLimit
    )
}

/// Opcode/argument listing of one block, for compact structural asserts.
pub fn block_ops(program: &Program, label: u32) -> Vec<(OpCode, i64)> {
    program
        .block(label)
        .ops
        .iter()
        .map(|inst| (inst.opcode, inst.argument))
        .collect()
}

/// Assert two graphs are isomorphic under the identity mapping of labels.
pub fn assert_isomorphic(expected: &Program, actual: &Program, message: &str) {
    assert_eq!(expected.len(), actual.len(), "{message}: block count differs");
    for (a, b) in expected.blocks().iter().zip(actual.blocks()) {
        assert_eq!(a.label, b.label, "{message}: labels diverge");
        assert_eq!(
            a.natural_successor, b.natural_successor,
            "{message}: natural successor of block {}",
            a.label
        );
        assert_eq!(
            a.jump_successor, b.jump_successor,
            "{message}: jump successor of block {}",
            a.label
        );
        let ops_a: Vec<(OpCode, i64)> = a.ops.iter().map(|i| (i.opcode, i.argument)).collect();
        let ops_b: Vec<(OpCode, i64)> = b.ops.iter().map(|i| (i.opcode, i.argument)).collect();
        assert_eq!(ops_a, ops_b, "{message}: instructions of block {}", a.label);
    }
}

/// Deterministic pseudo-random bytes for fuzz-ish inputs.
pub fn generate_random_data(size: usize) -> Vec<u8> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut data = Vec::with_capacity(size);
    let mut hasher = DefaultHasher::new();
    for i in 0..size {
        (i as u64).hash(&mut hasher);
        data.push((hasher.finish() % 256) as u8);
    }
    data
}
