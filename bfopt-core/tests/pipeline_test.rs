// Whole-pipeline properties: semantic preservation, invariant safety,
// idempotence, convergence, and the linearization round trip.
mod utils;

#[cfg(test)]
mod tests {
    use crate::utils;
    use bfopt_core::compiler::cfg::CfgBuilder;
    use bfopt_core::compiler::linearize::linearize;
    use bfopt_core::compiler::optimizer::{OptPass, MAX_OPTIMIZATION_ROUNDS};

    /// Optimizing must not change what a program does: same output stream
    /// and same final cell, or divergence on both sides.
    fn assert_preserves_semantics(source: &str, passes: &[OptPass]) {
        let reference = utils::compile(source);
        let mut optimized = reference.clone();
        utils::optimize_with(&mut optimized, passes);
        optimized.assert_invariants();

        for &input in utils::INPUTS {
            let (ref_outcome, ref_output) = utils::execute(&reference, input);
            let (opt_outcome, opt_output) = utils::execute(&optimized, input);

            assert_eq!(
                utils::diverged(&ref_outcome),
                utils::diverged(&opt_outcome),
                "divergence class changed for {source:?} with {passes:?}"
            );
            if !utils::diverged(&ref_outcome) {
                assert_eq!(
                    ref_output, opt_output,
                    "output changed for {source:?} with {passes:?}"
                );
                assert_eq!(
                    ref_outcome.final_cell, opt_outcome.final_cell,
                    "final cell changed for {source:?} with {passes:?}"
                );
            }
        }
    }

    #[test]
    fn test_every_single_pass_preserves_semantics() {
        for &source in utils::CORPUS {
            for pass in OptPass::ALL {
                assert_preserves_semantics(source, &[pass]);
            }
        }
    }

    #[test]
    fn test_full_pipeline_preserves_semantics() {
        for &source in utils::CORPUS {
            assert_preserves_semantics(source, &OptPass::ALL);
        }
    }

    #[test]
    fn test_full_pipeline_preserves_semantics_on_random_input() {
        let noise = utils::generate_random_data(64);
        for &source in utils::CORPUS {
            let reference = utils::compile(source);
            let mut optimized = reference.clone();
            utils::optimize_with(&mut optimized, &OptPass::ALL);

            let (ref_outcome, ref_output) = utils::execute(&reference, &noise);
            let (opt_outcome, opt_output) = utils::execute(&optimized, &noise);
            assert_eq!(utils::diverged(&ref_outcome), utils::diverged(&opt_outcome));
            if !utils::diverged(&ref_outcome) {
                assert_eq!(ref_output, opt_output, "output changed for {source:?}");
            }
        }
    }

    #[test]
    fn test_invariants_hold_after_every_pass() {
        for &source in utils::CORPUS {
            for pass in OptPass::ALL {
                let mut program = utils::compile(source);
                pass.run(&mut program);
                program.assert_invariants();
            }
        }
    }

    #[test]
    fn test_every_pass_is_idempotent() {
        for &source in utils::CORPUS {
            for pass in OptPass::ALL {
                let mut program = utils::compile(source);
                pass.run(&mut program);
                let second = pass.run(&mut program);
                assert_eq!(
                    second, 0,
                    "{} is not idempotent on {source:?}",
                    pass.name()
                );
            }
        }
    }

    #[test]
    fn test_pipeline_converges_within_the_round_cap() {
        for &source in utils::CORPUS {
            let mut program = utils::compile(source);
            let report = utils::optimize_with(&mut program, &OptPass::ALL);
            assert!(
                report.converged,
                "no fixed point within {MAX_OPTIMIZATION_ROUNDS} rounds for {source:?}"
            );
            assert!(report.rounds <= MAX_OPTIMIZATION_ROUNDS);
        }
    }

    #[test]
    fn test_linearization_round_trip_is_isomorphic() {
        for &source in utils::CORPUS {
            let mut program = utils::compile(source);
            // The empty pass set leaves the graph untouched.
            utils::optimize_with(&mut program, &[]);
            let rebuilt = CfgBuilder::build(&linearize(&program));
            utils::assert_isomorphic(&program, &rebuilt, source);
        }
    }

    #[test]
    fn test_optimized_programs_round_trip_through_the_stream() {
        // After optimization the rebuilt graph need not be isomorphic, but
        // it must still behave identically.
        for &source in utils::CORPUS {
            let mut optimized = utils::compile(source);
            utils::optimize_with(&mut optimized, &OptPass::ALL);
            let rebuilt = CfgBuilder::build(&linearize(&optimized));
            rebuilt.assert_invariants();

            for &input in utils::INPUTS {
                let (a_outcome, a_output) = utils::execute(&optimized, input);
                let (b_outcome, b_output) = utils::execute(&rebuilt, input);
                assert_eq!(utils::diverged(&a_outcome), utils::diverged(&b_outcome));
                if !utils::diverged(&a_outcome) {
                    assert_eq!(a_output, b_output, "stream round trip broke {source:?}");
                    assert_eq!(a_outcome.final_cell, b_outcome.final_cell);
                }
            }
        }
    }

    #[test]
    fn test_report_accounts_for_the_changes() {
        let mut program = utils::compile("+++[-]");
        let report = utils::optimize_with(&mut program, &OptPass::ALL);
        assert!(report.converged);
        assert!(report.total_changes > 0);
        assert_eq!(
            report.total_changes,
            report.changes_by_pass.values().sum::<usize>()
        );
        assert!(report.changes_by_pass.contains_key("clear_loop"));
    }
}
