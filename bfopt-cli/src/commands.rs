// Command implementations for the bfopt CLI
use anyhow::{bail, Context, Result};
use bfopt_core::compiler::dump::dump_dot;
use bfopt_core::compiler::ir::Program;
use bfopt_core::compiler::linearize::linearize;
use bfopt_core::compiler::optimizer::{self, OptPass};
use bfopt_core::compiler::{cfg, syntax, CompileError};
use bfopt_core::runtime::{Emulator, ExecutionStatus};
use indicatif::ProgressBar;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::PassArgs;

/// Validate the source and print every syntax error with its location.
pub fn check_source(source: &str) -> Result<()> {
    let errors = syntax::validate(source);
    if errors.is_empty() {
        println!("Source is well-formed.");
        return Ok(());
    }
    for (index, error) in errors.iter().enumerate() {
        eprintln!("{index:>5}. {error}");
    }
    bail!(
        "found {} syntax error{}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
}

/// Compile and report the program shape.
pub fn compile_source(source: &str) -> Result<()> {
    let program = compile_or_report(source)?;
    println!(
        "Successfully compiled {} instruction(s) in {} basic block(s).",
        program.instruction_count(),
        program.len()
    );
    Ok(())
}

/// Compile, run the requested optimizations to their fixed point, and
/// report what changed.
pub fn optimize_source(
    source: &str,
    pass_args: &PassArgs,
    dump: Option<&Path>,
    stats: bool,
) -> Result<()> {
    let mut program = compile_or_report(source)?;
    let requested = parse_passes(pass_args)?;
    if requested.is_empty() {
        println!("No optimizations were performed.");
        return Ok(());
    }

    let before = program.instruction_count();
    let report = with_spinner("optimizing", || optimizer::optimize(&mut program, &requested));

    println!(
        "Optimization {} after {} round(s): {} -> {} instruction(s), {} block(s).",
        if report.converged { "converged" } else { "stopped at the round cap" },
        report.rounds,
        before,
        program.instruction_count(),
        program.len()
    );
    for (pass, changes) in &report.changes_by_pass {
        println!("  {pass:<24} {changes} change(s)");
    }

    if let Some(path) = dump {
        std::fs::write(path, dump_dot(&program))
            .with_context(|| format!("cannot write dot file {}", path.display()))?;
        println!("CFG written to {}.", path.display());
    }
    if stats {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Compile, optionally optimize, and execute against stdin/stdout or a
/// file input.
pub fn run_source(
    source: &str,
    pass_args: &PassArgs,
    input: Option<&Path>,
    tape_size: usize,
    step_limit: u64,
    stats: bool,
) -> Result<()> {
    let mut program = compile_or_report(source)?;
    let requested = parse_passes(pass_args)?;
    if !requested.is_empty() {
        optimizer::optimize(&mut program, &requested);
    }

    let mut emulator = Emulator::with_tape_size(linearize(&program), tape_size);
    emulator.set_step_limit(step_limit);

    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    let outcome = match input {
        Some(path) => {
            let mut file = std::fs::File::open(path)
                .with_context(|| format!("cannot open input file {}", path.display()))?;
            emulator.run(&mut file, &mut output)?
        }
        None => {
            let stdin = std::io::stdin();
            let mut stdin = stdin.lock();
            emulator.run(&mut stdin, &mut output)?
        }
    };
    output.flush()?;

    match outcome.status {
        ExecutionStatus::Finished => {
            log::info!("finished after {} step(s)", outcome.steps);
        }
        ExecutionStatus::InfiniteLoop => {
            eprintln!("\nProgram provably never terminates; stopped.");
        }
        ExecutionStatus::StepLimit => {
            eprintln!("\nStep limit of {step_limit} exhausted; stopped.");
        }
        ExecutionStatus::Breakpoint => {
            eprintln!("\nBreakpoint hit; stopped.");
        }
    }
    if stats {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}

/// Compile and write the CFG as a Graphviz dot file.
pub fn dump_source(source: &str, output: &Path) -> Result<()> {
    let program = compile_or_report(source)?;
    std::fs::write(output, dump_dot(&program))
        .with_context(|| format!("cannot write dot file {}", output.display()))?;
    println!("CFG written to {}.", output.display());
    Ok(())
}

/// Compile, printing syntax errors the way the `check` command does.
fn compile_or_report(source: &str) -> Result<Program> {
    match cfg::compile(source) {
        Ok(program) => Ok(program),
        Err(CompileError::Syntax { errors }) => {
            for (index, error) in errors.iter().enumerate() {
                eprintln!("{index:>5}. {error}");
            }
            bail!(
                "found {} syntax error{}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            );
        }
    }
}

/// Resolve the requested pass names against the stable identifiers.
fn parse_passes(args: &PassArgs) -> Result<BTreeSet<OptPass>> {
    if args.all_passes {
        return Ok(OptPass::ALL.into_iter().collect());
    }
    let mut requested: BTreeSet<OptPass> = BTreeSet::new();
    for name in &args.passes {
        match OptPass::from_name(name) {
            Some(pass) => {
                requested.insert(pass);
            }
            None => {
                let known: Vec<&str> = OptPass::ALL.iter().map(|pass| pass.name()).collect();
                bail!(
                    "unknown optimization {name:?}; known optimizations: {}",
                    known.join(", ")
                );
            }
        }
    }
    Ok(requested)
}

/// Run a closure behind a steady spinner.
fn with_spinner<T>(message: &'static str, work: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = work();
    spinner.finish_and_clear();
    result
}
