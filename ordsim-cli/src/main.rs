mod reports;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use ordsim_core::{
    JsonSource, Simulation, SimulationConfig, SimulationConfigOverlay, SimulationRun,
    to_json_string,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitMode {
    /// Write the transformed dataset as JSON
    Dataset,
    /// Write a summary report
    Report,
    /// Write the dataset, then the report
    Both,
}

impl EmitMode {
    const fn dataset(self) -> bool {
        matches!(self, Self::Dataset | Self::Both)
    }

    const fn report(self) -> bool {
        matches!(self, Self::Report | Self::Both)
    }
}

#[derive(Debug, Parser)]
#[command(name = "ordsim", version = "0.1.0")]
#[command(
    about = "Reallocate treatment by prognosis, complete 28-day follow-up and inject missingness",
    long_about = "Reallocate treatment by prognosis, complete 28-day follow-up and inject \
                  post-discharge missingness in longitudinal ordinal trial data"
)]
struct Args {
    /// JSON dataset: an array of rows or {"outcome_levels": [...], "rows": [...]}
    #[arg(long)]
    input: PathBuf,

    /// Optional JSON simulation config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treatment probability for the better-prognosis half of each stratum
    #[arg(long)]
    allocation_prob: Option<f64>,

    /// Seed for every random stage
    #[arg(long)]
    seed: Option<u64>,

    /// Post-discharge missingness probability for survivors
    #[arg(long)]
    missing_alive: Option<f64>,

    /// Post-discharge missingness probability for participants who died
    #[arg(long)]
    missing_dead: Option<f64>,

    /// Stop after reallocation instead of completing follow-up
    #[arg(long)]
    skip_complete: bool,

    /// What to write
    #[arg(long, value_enum, default_value_t = EmitMode::Dataset)]
    emit: EmitMode,

    /// Report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path for the dataset instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Optional path for the report instead of stdout
    #[arg(long)]
    report_output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = resolve_config(&args)?;
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let start_time = Instant::now();
    let engine = Simulation::new(JsonSource::new(text));
    let run = engine
        .run(&config)
        .with_context(|| format!("simulation failed for {}", args.input.display()))?;
    log::info!(
        "simulation finished in {:?}: {} rows",
        start_time.elapsed(),
        run.dataset.len()
    );

    if args.emit.dataset() {
        write_dataset(args.output.as_deref(), &run)?;
    }
    if args.emit.report() {
        write_report(&args, &run, start_time)?;
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn resolve_config(args: &Args) -> Result<SimulationConfig> {
    let base = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            SimulationConfig::from_json(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };
    let config = base
        .with_overlay(&overlay_from_args(args))
        .context("invalid command-line overrides")?;
    config.validate().context("invalid simulation config")?;
    Ok(config)
}

fn overlay_from_args(args: &Args) -> SimulationConfigOverlay {
    SimulationConfigOverlay {
        allocation_prob: args.allocation_prob,
        seed: args.seed,
        complete_follow_up: args.skip_complete.then_some(false),
        prob_missing_given_alive: args.missing_alive,
        prob_missing_given_dead: args.missing_dead,
    }
}

fn write_dataset(path: Option<&Path>, run: &SimulationRun) -> Result<()> {
    let json = to_json_string(&run.dataset).context("failed to serialize dataset")?;
    let mut output_target = OutputTarget::new(path)?;
    writeln!(&mut output_target, "{json}")?;
    output_target.flush_inner()?;
    Ok(())
}

fn write_report(args: &Args, run: &SimulationRun, start_time: Instant) -> Result<()> {
    let summary = run.summary().context("failed to summarize dataset")?;
    let mut output_target = OutputTarget::new(args.report_output.as_deref())?;
    if matches!(output_target, OutputTarget::File(_)) {
        colored::control::set_override(false);
    }

    match args.report.as_str() {
        "json" => reports::generate_json_report(output_target.writer(), run, &summary)?,
        "markdown" => reports::generate_markdown_report(output_target.writer(), run, &summary)?,
        "csv" => reports::generate_csv_report(output_target.writer(), &summary)?,
        _ => {
            reports::generate_console_report(
                output_target.writer(),
                run,
                &summary,
                start_time.elapsed(),
            )?;
            writeln!(
                &mut output_target,
                "\n{} {:?}",
                "🏁 Total time:".bold(),
                start_time.elapsed()
            )?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
