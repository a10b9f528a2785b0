// CLI application
use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::{check_source, compile_source, dump_source, optimize_source, run_source};

#[derive(Parser)]
#[command(name = "bfopt")]
#[command(about = "Optimizing Brainfuck compiler and emulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the source text comes from: a file or an inline string.
#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct SourceArg {
    /// Path to the source file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Inline source code
    #[arg(short, long)]
    code: Option<String>,
}

#[derive(clap::Args)]
struct PassArgs {
    /// Comma-separated optimization names (see `bfopt optimize --help`)
    #[arg(long, value_delimiter = ',')]
    passes: Vec<String>,

    /// Request every known optimization
    #[arg(long)]
    all_passes: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate source code and report syntax errors
    Check {
        #[command(flatten)]
        source: SourceArg,
    },
    /// Compile source code and report the program shape
    Compile {
        #[command(flatten)]
        source: SourceArg,
    },
    /// Compile, optimize, and report what the optimizer did
    Optimize {
        #[command(flatten)]
        source: SourceArg,

        #[command(flatten)]
        passes: PassArgs,

        /// Write the optimized CFG as a Graphviz dot file
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Print the optimization report as JSON
        #[arg(long)]
        stats: bool,
    },
    /// Compile, optionally optimize, and execute
    Run {
        #[command(flatten)]
        source: SourceArg,

        #[command(flatten)]
        passes: PassArgs,

        /// File to read program input from (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of tape cells
        #[arg(long, default_value_t = bfopt_core::runtime::DEFAULT_TAPE_SIZE)]
        tape_size: usize,

        /// Instruction budget before execution is cut off
        #[arg(long, default_value_t = bfopt_core::runtime::DEFAULT_STEP_LIMIT)]
        step_limit: u64,

        /// Print the execution outcome as JSON
        #[arg(long)]
        stats: bool,
    },
    /// Compile and write the CFG as a Graphviz dot file
    Dump {
        #[command(flatten)]
        source: SourceArg,

        /// Output path for the dot file
        #[arg(short, long, default_value = "cfg.dot")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { source } => check_source(&source.resolve()?),
        Commands::Compile { source } => compile_source(&source.resolve()?),
        Commands::Optimize {
            source,
            passes,
            dump,
            stats,
        } => optimize_source(&source.resolve()?, &passes, dump.as_deref(), stats),
        Commands::Run {
            source,
            passes,
            input,
            tape_size,
            step_limit,
            stats,
        } => run_source(
            &source.resolve()?,
            &passes,
            input.as_deref(),
            tape_size,
            step_limit,
            stats,
        ),
        Commands::Dump { source, output } => dump_source(&source.resolve()?, &output),
    }
}

impl SourceArg {
    /// Load the source text from whichever alternative was given.
    fn resolve(&self) -> anyhow::Result<String> {
        use anyhow::Context;
        match (&self.file, &self.code) {
            (Some(path), None) => std::fs::read_to_string(path)
                .with_context(|| format!("cannot read source file {}", path.display())),
            (None, Some(code)) => Ok(code.clone()),
            _ => unreachable!("clap enforces exactly one source alternative"),
        }
    }
}
