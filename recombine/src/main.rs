use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use recombine::config::RunConfig;
use recombine::driver::{self, Report, RunOptions};
use recombine::rules;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply the rules and write the resulting font.
    Apply {
        #[command(flatten)]
        run: RunArgs,

        /// Where to write the font (default: the config's `output`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Apply the rules in memory and report, without writing anything.
    Check {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// The run configuration.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// The rule list, as JSON (`.json`) or tab-separated lines.
    #[arg(short, long, default_value = "replace.tsv")]
    rules: PathBuf,

    /// Stop at the first rule that cannot be applied.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Apply { run, output } => {
            execute(&run, output, true)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { run } => {
            let report = execute(&run, None, false)?;
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn execute(args: &RunArgs, output: Option<PathBuf>, write: bool) -> anyhow::Result<Report> {
    let mut config = RunConfig::load(&args.config)
        .with_context(|| format!("failed to read config {}", args.config.display()))?;
    if let Some(output) = output {
        config.output = output;
    }
    let rules = rules::load(&args.rules)
        .with_context(|| format!("failed to read rules {}", args.rules.display()))?;

    let options = RunOptions {
        strict: args.strict,
        write,
    };
    let report = driver::run(&config, rules, options).context("run aborted")?;
    summarize(&report);
    if write {
        log::info!("wrote {}", config.output.display());
    }
    Ok(report)
}

fn summarize(report: &Report) {
    log::info!(
        "{} rule(s) applied, {} skipped",
        report.applied.len(),
        report.skipped()
    );
    for error in &report.rejected {
        log::warn!("  {}", error);
    }
    for error in &report.failed {
        log::warn!("  {}", error);
    }
}
