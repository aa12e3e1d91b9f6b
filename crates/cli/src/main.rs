//! Out-of-order core simulator CLI.
//!
//! This binary drives the simulator over programs written in the reference assembly
//! language. It performs:
//! 1. **Run:** Assemble a program, simulate it to completion or to a limit, and print the
//!    run summary and statistics.
//! 2. **Configuration check:** Parse and validate a JSON configuration without running.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (e.g. `RUST_LOG=o3sim_core=debug`).

use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use o3sim_core::config::Config;
use o3sim_core::stats::STATS_SECTIONS;
use o3sim_core::{LoggingSystem, ProgramEmulator, SimError, SimResult, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "o3sim",
    author,
    version,
    about = "Cycle-accurate out-of-order core simulator",
    long_about = "Simulate an assembly program on a configurable out-of-order core.\n\nExamples:\n  o3sim run demos/sum.s\n  o3sim run demos/sum.s --config core.json --stats summary recovery\n  o3sim check-config core.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate an assembly program.
    Run {
        /// Assembly source file.
        program: PathBuf,

        /// JSON configuration file; built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Stop after this many retired instructions.
        #[arg(long)]
        max_insts: Option<u64>,

        /// Fast-forward this many instructions before detailed simulation.
        #[arg(long)]
        skip: Option<u64>,

        /// Statistics sections to print (all when omitted).
        #[arg(long, num_args = 1.., value_parser = clap::builder::PossibleValuesParser::new(STATS_SECTIONS.iter().copied()))]
        stats: Vec<String>,

        /// Print the summary and statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a JSON configuration file.
    CheckConfig {
        /// Configuration file.
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            program,
            config,
            max_cycles,
            max_insts,
            skip,
            stats,
            json,
        } => cmd_run(&RunArgs {
            program,
            config,
            max_cycles,
            max_insts,
            skip,
            stats,
            json,
        }),
        Commands::CheckConfig { file } => cmd_check_config(&file),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

#[derive(Debug)]
struct RunArgs {
    program: PathBuf,
    config: Option<PathBuf>,
    max_cycles: Option<u64>,
    max_insts: Option<u64>,
    skip: Option<u64>,
    stats: Vec<String>,
    json: bool,
}

fn load_config(path: Option<&Path>) -> SimResult<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

/// Assembles and simulates one program, then reports the outcome.
fn cmd_run(args: &RunArgs) -> SimResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.max_cycles.is_some() {
        config.general.max_cycles = args.max_cycles;
    }
    if args.max_insts.is_some() {
        config.general.max_insts = args.max_insts;
    }
    if let Some(skip) = args.skip {
        config.general.skip_insts = skip;
    }

    let source = fs::read_to_string(&args.program)
        .map_err(|e| SimError::Unsupported(format!("{}: {e}", args.program.display())))?;
    let emulator = ProgramEmulator::from_asm(&source)?;
    debug!(
        program = %args.program.display(),
        config = ?args.config,
        schedulers = config.schedulers.len(),
        "program assembled"
    );
    let mut sim = Simulator::new(config, Box::new(emulator), Box::new(LoggingSystem))?;
    let summary = sim.run()?;
    let stats = sim.stats();

    if args.json {
        let report = serde_json::json!({ "summary": summary, "stats": stats });
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| SimError::invariant(format!("stats serialization failed: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    println!("[*] {}: stopped ({:?})", args.program.display(), summary.stop);
    for (tid, code) in summary.exit_codes.iter().enumerate() {
        match code {
            Some(code) => println!("    thread {tid}: exit code {code}"),
            None => println!("    thread {tid}: no exit code"),
        }
    }
    stats.print_sections(&args.stats);
    Ok(())
}

/// Parses and validates a configuration file.
fn cmd_check_config(file: &Path) -> SimResult<()> {
    let config = Config::from_file(file)?;
    config.validate()?;
    println!(
        "{}: ok ({} schedulers, fetch width {})",
        file.display(),
        config.schedulers.len(),
        config.pipeline.fetch_width
    );
    Ok(())
}
