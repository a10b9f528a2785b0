//! Optimization passes and the driver
//!
//! Two pass shapes exist. *Peephole* passes rewrite one block at a time and
//! are lifted to the whole program by summing their per-block change counts;
//! they never touch cross-block edges. *Global* passes rewire the graph -
//! jump forwarding, block merging, reachability - and run over the whole
//! program at once.
//!
//! The driver takes the set of requested passes and iterates the canonical
//! pipeline until a full round reports zero changes, with a safety cap on
//! the number of rounds. Any pass that can orphan blocks runs the orphan
//! sweep before returning, so between passes the arena never holds dead
//! blocks. In debug builds the driver re-checks every graph invariant after
//! each pass and aborts on the first violation.

pub mod arithmetic;
pub mod branches;
pub mod cleanup;
pub mod const_prop;
pub mod inner_loops;

use crate::compiler::ir::{BasicBlock, Program};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fixed-point safety cap for the driver.
pub const MAX_OPTIMIZATION_ROUNDS: usize = 10;

/// The optimization passes, named by their stable CLI identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptPass {
    ArithmeticValue,
    ArithmeticPointer,
    ArithmeticBoth,
    LocalConstPropagation,
    ClearLoop,
    InfiniteLoop,
    SearchLoop,
    PureUjumpElimination,
    CjumpDestination,
    SingleEntryCjump,
    EmptyBlockElimination,
    BlockMerging,
    NopElimination,
    DeadCodeElimination,
}

/// Shape of a pass, deciding how the driver may schedule it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Operates on one block at a time; lifted by summing over all blocks
    Peephole,
    /// Mutates cross-block edges and must run over the whole program
    Global,
}

/// Canonical application order within one driver round.
pub const PIPELINE: [OptPass; 14] = [
    OptPass::ArithmeticValue,
    OptPass::ArithmeticPointer,
    OptPass::ArithmeticBoth,
    OptPass::ClearLoop,
    OptPass::LocalConstPropagation,
    OptPass::PureUjumpElimination,
    OptPass::InfiniteLoop,
    OptPass::SearchLoop,
    OptPass::CjumpDestination,
    OptPass::SingleEntryCjump,
    OptPass::EmptyBlockElimination,
    OptPass::DeadCodeElimination,
    OptPass::BlockMerging,
    OptPass::NopElimination,
];

impl OptPass {
    pub const ALL: [OptPass; 14] = PIPELINE;

    /// Stable identifier used by the CLI and the statistics report.
    pub fn name(self) -> &'static str {
        match self {
            OptPass::ArithmeticValue => "arithmetic_value",
            OptPass::ArithmeticPointer => "arithmetic_pointer",
            OptPass::ArithmeticBoth => "arithmetic_both",
            OptPass::LocalConstPropagation => "local_const_propagation",
            OptPass::ClearLoop => "clear_loop",
            OptPass::InfiniteLoop => "infinite_loop",
            OptPass::SearchLoop => "search_loop",
            OptPass::PureUjumpElimination => "pure_ujump_elimination",
            OptPass::CjumpDestination => "cjump_destination",
            OptPass::SingleEntryCjump => "single_entry_cjump",
            OptPass::EmptyBlockElimination => "empty_block_elimination",
            OptPass::BlockMerging => "block_merging",
            OptPass::NopElimination => "nop_elimination",
            OptPass::DeadCodeElimination => "dead_code_elimination",
        }
    }

    /// Look an optimization up by its stable name.
    pub fn from_name(name: &str) -> Option<OptPass> {
        OptPass::ALL.into_iter().find(|pass| pass.name() == name)
    }

    pub fn kind(self) -> PassKind {
        match self {
            OptPass::ArithmeticValue
            | OptPass::ArithmeticPointer
            | OptPass::ArithmeticBoth
            | OptPass::LocalConstPropagation
            | OptPass::NopElimination => PassKind::Peephole,
            OptPass::ClearLoop
            | OptPass::InfiniteLoop
            | OptPass::SearchLoop
            | OptPass::PureUjumpElimination
            | OptPass::CjumpDestination
            | OptPass::SingleEntryCjump
            | OptPass::EmptyBlockElimination
            | OptPass::BlockMerging
            | OptPass::DeadCodeElimination => PassKind::Global,
        }
    }

    /// Apply the pass once over the whole program. Returns the change count.
    pub fn run(self, program: &mut Program) -> usize {
        match self {
            OptPass::ArithmeticValue => {
                arithmetic::simplify(program, arithmetic::ArithmeticTag::Value)
            }
            OptPass::ArithmeticPointer => {
                arithmetic::simplify(program, arithmetic::ArithmeticTag::Pointer)
            }
            OptPass::ArithmeticBoth => {
                arithmetic::simplify(program, arithmetic::ArithmeticTag::Both)
            }
            OptPass::LocalConstPropagation => const_prop::propagate_local_consts(program),
            OptPass::ClearLoop => inner_loops::eliminate_clear_loops(program),
            OptPass::InfiniteLoop => inner_loops::eliminate_infinite_loops(program),
            OptPass::SearchLoop => inner_loops::eliminate_search_loops(program),
            OptPass::PureUjumpElimination => branches::eliminate_pure_ujumps(program),
            OptPass::CjumpDestination => branches::chain_cjump_destinations(program),
            OptPass::SingleEntryCjump => branches::fold_single_entry_cjumps(program),
            OptPass::EmptyBlockElimination => cleanup::eliminate_empty_blocks(program),
            OptPass::BlockMerging => cleanup::merge_into_predecessors(program),
            OptPass::NopElimination => cleanup::remove_nops(program),
            OptPass::DeadCodeElimination => cleanup::eliminate_dead_code(program),
        }
    }
}

/// Lift a per-block peephole routine to a program pass by summing its
/// change counts over all blocks.
pub(crate) fn for_each_block<F>(program: &mut Program, routine: F) -> usize
where
    F: Fn(&mut BasicBlock) -> usize,
{
    program.blocks_mut().iter_mut().map(routine).sum()
}

/// Statistics collected while driving the pipeline to its fixed point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Rounds executed, including the final all-zero round
    pub rounds: usize,
    /// Sum of all change counts
    pub total_changes: usize,
    /// Change counts keyed by pass name
    pub changes_by_pass: BTreeMap<String, usize>,
    /// Whether a fixed point was reached within the round cap
    pub converged: bool,
}

/// Run the requested passes to a fixed point.
///
/// Each round applies the requested subset of [`PIPELINE`] in canonical
/// order; the driver stops as soon as a full round reports zero changes, or
/// after [`MAX_OPTIMIZATION_ROUNDS`] rounds.
pub fn optimize(program: &mut Program, requested: &BTreeSet<OptPass>) -> OptimizationReport {
    let mut report = OptimizationReport::default();
    if requested.is_empty() {
        report.converged = true;
        return report;
    }

    log::info!(
        "optimizing {} block(s) with {} pass(es)",
        program.len(),
        requested.len()
    );

    for round in 1..=MAX_OPTIMIZATION_ROUNDS {
        report.rounds = round;
        let mut round_changes: usize = 0;

        for pass in PIPELINE {
            if !requested.contains(&pass) {
                continue;
            }
            let changes = pass.run(program);
            if cfg!(debug_assertions) {
                program.assert_invariants();
            }
            if changes > 0 {
                log::debug!("round {}: {} made {} change(s)", round, pass.name(), changes);
                *report.changes_by_pass.entry(pass.name().to_string()).or_default() += changes;
            }
            round_changes += changes;
        }

        report.total_changes += round_changes;
        if round_changes == 0 {
            report.converged = true;
            break;
        }
    }

    log::info!(
        "optimization {} after {} round(s), {} change(s), {} block(s) remain",
        if report.converged { "converged" } else { "hit the round cap" },
        report.rounds,
        report.total_changes,
        program.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_names_round_trip() {
        for pass in OptPass::ALL {
            assert_eq!(OptPass::from_name(pass.name()), Some(pass));
        }
        assert_eq!(OptPass::from_name("no_such_pass"), None);
    }

    #[test]
    fn test_pipeline_covers_every_pass_once() {
        let unique: BTreeSet<OptPass> = PIPELINE.into_iter().collect();
        assert_eq!(unique.len(), PIPELINE.len());
    }

    #[test]
    fn test_pass_shapes() {
        // Block-local passes never touch cross-block edges; everything that
        // rewires the graph is global.
        assert_eq!(OptPass::ArithmeticBoth.kind(), PassKind::Peephole);
        assert_eq!(OptPass::LocalConstPropagation.kind(), PassKind::Peephole);
        assert_eq!(OptPass::NopElimination.kind(), PassKind::Peephole);
        assert_eq!(OptPass::ClearLoop.kind(), PassKind::Global);
        assert_eq!(OptPass::BlockMerging.kind(), PassKind::Global);
        assert_eq!(OptPass::DeadCodeElimination.kind(), PassKind::Global);
    }
}
