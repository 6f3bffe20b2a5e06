//! fillsched CLI - Filling-line scheduler
//!
//! Command-line interface for validating lot files, scheduling them with one
//! of the packing strategies, comparing strategies and benchmarking.

mod bench;
mod input;
mod report;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use fillsched_core::{Configuration, ScheduleResult, StrategyKind};
use fillsched_solver::{compare_strategies, schedule, schedule_in_sequence, validate_inputs, ComparisonRow};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_START: &str = "2025-01-01 08:00";

#[derive(Parser)]
#[command(name = "fillsched")]
#[command(author, version, about = "Filling-line scheduler", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML or JSON); defaults to ./fillsched.toml
    #[arg(short, long, global = true, env = "FILLSCHED_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a lot file
    Check {
        /// Lots file (CSV or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Schedule lots with one strategy
    Schedule {
        /// Lots file (CSV or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Strategy (smart-pack, spt-pack, lpt-pack, cfs-pack, hybrid-pack, milp-opt)
        #[arg(short, long, default_value = "smart-pack")]
        strategy: StrategyKind,

        /// Schedule start ("YYYY-MM-DD HH:MM")
        #[arg(long, default_value = DEFAULT_START)]
        start: String,

        /// Number of fillers (overrides the configuration)
        #[arg(long)]
        fillers: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replay a fixed lot order from FILE instead of running a strategy
        #[arg(long, value_name = "FILE")]
        sequence: Option<PathBuf>,
    },

    /// Compare strategies against the given-order baseline
    Compare {
        /// Lots file (CSV or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Strategies to run (comma separated); all when omitted
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<StrategyKind>,

        /// Schedule start ("YYYY-MM-DD HH:MM")
        #[arg(long, default_value = DEFAULT_START)]
        start: String,

        /// Number of fillers (overrides the configuration)
        #[arg(long)]
        fillers: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Time every strategy on synthetic lots
    Bench {
        /// Lot counts to generate (comma separated)
        #[arg(long, value_delimiter = ',', default_values_t = vec![20, 100, 500])]
        lots: Vec<usize>,

        /// Number of distinct vial types
        #[arg(long, default_value_t = 4)]
        types: usize,

        /// Generator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Strategies to run (comma separated); all when omitted
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<StrategyKind>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = input::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Check { file }) => cmd_check(&file, &config),
        Some(Commands::Schedule {
            file,
            strategy,
            start,
            fillers,
            format,
            output,
            sequence,
        }) => {
            let config = with_fillers(config, fillers);
            let start = input::parse_datetime(&start)?;
            cmd_schedule(&file, strategy, start, &config, format, output.as_deref(), sequence.as_deref())
        }
        Some(Commands::Compare {
            file,
            strategies,
            start,
            fillers,
            format,
        }) => {
            let config = with_fillers(config, fillers);
            let start = input::parse_datetime(&start)?;
            cmd_compare(&file, &strategies, start, &config, format)
        }
        Some(Commands::Bench {
            lots,
            types,
            seed,
            strategies,
        }) => {
            let start = input::parse_datetime(DEFAULT_START)?;
            let kinds = strategies_or_all(&strategies);
            let results = bench::run_benchmark_series(&kinds, &lots, types, seed, start, &config);
            bench::print_report(&results);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("fillsched - Filling-line scheduler");
            println!("Run with --help for usage information");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn with_fillers(config: Configuration, fillers: Option<usize>) -> Configuration {
    match fillers {
        Some(n) => config.fillers(n),
        None => config,
    }
}

fn strategies_or_all(requested: &[StrategyKind]) -> Vec<StrategyKind> {
    if requested.is_empty() {
        StrategyKind::ALL.to_vec()
    } else {
        requested.to_vec()
    }
}

fn cmd_check(file: &Path, config: &Configuration) -> Result<ExitCode> {
    let lots = input::load_lots(file, config)?;
    let report = validate_inputs(&lots, config);

    println!("Checking: {} ({} lots)", file.display(), lots.len());
    print!("{}", report::validation_text(&report));

    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_schedule(
    file: &Path,
    strategy: StrategyKind,
    start: NaiveDateTime,
    config: &Configuration,
    format: OutputFormat,
    output: Option<&Path>,
    sequence: Option<&Path>,
) -> Result<ExitCode> {
    let lots = input::load_lots(file, config)?;
    let outcome = match sequence {
        Some(path) => {
            let order = input::load_sequence(path)?;
            schedule_in_sequence(lots, &order, start, config)
        }
        None => schedule(lots, start, config, strategy),
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let rendered = match format {
        OutputFormat::Text => report::schedule_text(&result),
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
    };
    write_output(&rendered, output)?;

    Ok(exit_for(&result))
}

fn cmd_compare(
    file: &Path,
    strategies: &[StrategyKind],
    start: NaiveDateTime,
    config: &Configuration,
    format: OutputFormat,
) -> Result<ExitCode> {
    let lots = input::load_lots(file, config)?;
    let kinds = strategies_or_all(strategies);

    let baseline_start = Instant::now();
    let baseline = schedule_in_sequence(lots.clone(), &[], start, config);
    let baseline_row = ComparisonRow::new(
        fillsched_solver::GIVEN_ORDER,
        baseline,
        baseline_start.elapsed(),
    );

    let mut rows = vec![baseline_row];
    rows.extend(compare_strategies(&lots, start, config, &kinds));

    match format {
        OutputFormat::Text => {
            let baseline = rows[0].outcome.as_ref().ok();
            print!("{}", report::comparison_text(&rows, baseline));
            if let Some(best) = fillsched_solver::best_by_makespan(&rows) {
                println!();
                println!("Best makespan: {}", best.strategy);
            }
        }
        OutputFormat::Json => {
            let json = report::comparison_json(&rows);
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    let all_failed = rows.iter().all(|row| row.outcome.is_err());
    Ok(if all_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn write_output(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "schedule written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn exit_for(result: &ScheduleResult) -> ExitCode {
    if result.validation.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
