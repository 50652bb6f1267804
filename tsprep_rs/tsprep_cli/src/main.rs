use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tsprep::{
    clean_file, combine_directory, list_csv_files, parse_interval_token, CleanConfig,
    CleanReport, CombineConfig, OutputEncoding,
};

/// Source listings longer than this are only shown at debug level.
const LIST_FILES_MAX: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "CSV concatenation and time-series cleaning CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate every CSV file in a directory into one output file
    Combine(CombineArgs),
    /// Regularize a time-series CSV onto a fixed interval grid
    Clean(CleanArgs),
}

#[derive(Parser, Debug)]
struct CombineArgs {
    /// Directory holding the CSV files to combine
    #[arg(default_value = ".", value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    /// Output file name
    #[arg(short, long, default_value = "Combined output.csv")]
    output_name: String,

    /// Directory for the output file (defaults to the input directory)
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Output text encoding
    #[arg(long, value_enum, default_value_t = EncodingOpt::Utf8)]
    encoding: EncodingOpt,

    /// Write the run summary as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct CleanArgs {
    /// Time-series CSV file to clean
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// JSON config file; flags given on the command line take precedence
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Output file name
    #[arg(short, long)]
    output_name: Option<String>,

    /// Directory for the output file (defaults to the input's directory)
    #[arg(long, value_hint = ValueHint::DirPath)]
    output_dir: Option<PathBuf>,

    /// Column holding the timestamps
    #[arg(long)]
    timestamp_field: Option<String>,

    /// Grid interval (e.g. 5min, 30s, 1h)
    #[arg(long)]
    interval: Option<String>,

    /// chrono format of the raw timestamps, without the year
    #[arg(long)]
    timestamp_format: Option<String>,

    /// Year appended to raw timestamps before parsing
    #[arg(long)]
    assumed_year: Option<i32>,

    /// Parse raw timestamps as-is (they already carry a year)
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "assumed_year")]
    no_assumed_year: bool,

    /// chrono format used to write the timestamp column
    #[arg(long)]
    output_timestamp_format: Option<String>,

    /// Columns to interpolate (comma separated)
    #[arg(long)]
    fill: Option<String>,

    /// Output text encoding
    #[arg(long, value_enum)]
    encoding: Option<EncodingOpt>,

    /// Replace an existing output file
    #[arg(long, action = ArgAction::SetTrue)]
    overwrite: bool,

    /// Write the run summary as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EncodingOpt {
    #[value(name = "utf-8", alias = "utf8")]
    Utf8,
    #[value(name = "iso-8859-1", alias = "latin1")]
    Latin1,
}

impl From<EncodingOpt> for OutputEncoding {
    fn from(value: EncodingOpt) -> Self {
        match value {
            EncodingOpt::Utf8 => OutputEncoding::Utf8,
            EncodingOpt::Latin1 => OutputEncoding::Latin1,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Combine(args) => args.verbose,
        Command::Clean(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Combine(args) => handle_combine(args),
        Command::Clean(args) => handle_clean(args),
    }
}

fn handle_combine(args: CombineArgs) -> Result<()> {
    let config = CombineConfig {
        dir: args.dir,
        output_dir: args.output_dir,
        output_name: args.output_name,
        encoding: args.encoding.into(),
    };
    debug!("Combine config: {:?}", config);

    let output = config.output_path();
    if output.exists() {
        return Err(anyhow!(
            "'{}' already exists; remove or rename it before running",
            output.display()
        ));
    }
    info!("No existing '{}' found; proceeding", output.display());

    let sources = list_csv_files(&config.dir)
        .with_context(|| format!("failed to list {}", config.dir.display()))?;
    if sources.is_empty() {
        return Err(anyhow!("no CSV files found in {}", config.dir.display()));
    }
    info!("Total CSV files found: {}", sources.len());
    for path in &sources {
        if sources.len() <= LIST_FILES_MAX {
            info!("  {}", path.display());
        } else {
            debug!("  {}", path.display());
        }
    }

    let t_combine = Instant::now();
    let report = combine_directory(&config)
        .with_context(|| format!("failed to combine CSV files in {}", config.dir.display()))?;
    for source in &report.sources {
        debug!("{}: {} rows", source.path.display(), source.rows);
    }
    info!(
        "Combined {} rows x {} columns in {:.1} ms",
        report.total_rows,
        report.columns.len(),
        t_combine.elapsed().as_secs_f64() * 1000.0
    );
    info!("Combined output saved to: {}", report.output.display());

    if let Some(path) = args.report.as_ref() {
        write_report(path, &report)?;
    }
    Ok(())
}

fn handle_clean(args: CleanArgs) -> Result<()> {
    let config = build_clean_config(&args)?;
    debug!("Clean config: {:?}", config);

    let t_clean = Instant::now();
    let report = clean_file(&config)
        .with_context(|| format!("failed to clean {}", config.input.display()))?;
    log_clean_summary(&report, &config);
    if args.verbose {
        info!(
            "Clean stage: {:.1} ms",
            t_clean.elapsed().as_secs_f64() * 1000.0
        );
    }

    if let Some(path) = args.report.as_ref() {
        write_report(path, &report)?;
    }
    Ok(())
}

fn build_clean_config(args: &CleanArgs) -> Result<CleanConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => CleanConfig::load_json(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CleanConfig::default(),
    };

    if let Some(input) = args.input.as_ref() {
        config.input = input.clone();
    }
    if config.input.as_os_str().is_empty() {
        return Err(anyhow!("no input file supplied"));
    }
    if let Some(dir) = args.output_dir.as_ref() {
        config.output_dir = Some(dir.clone());
    }
    if let Some(name) = args.output_name.as_ref() {
        config.output_name = name.clone();
    }
    if let Some(field) = args.timestamp_field.as_ref() {
        config.timestamp_field = field.clone();
    }
    if let Some(token) = args.interval.as_ref() {
        config.interval = parse_interval_token(token)
            .with_context(|| format!("invalid --interval '{}'", token))?;
    }
    if let Some(format) = args.timestamp_format.as_ref() {
        config.timestamp_format.format = format.clone();
    }
    if let Some(year) = args.assumed_year {
        config.timestamp_format.assumed_year = Some(year);
    }
    if args.no_assumed_year {
        config.timestamp_format.assumed_year = None;
    }
    if let Some(format) = args.output_timestamp_format.as_ref() {
        config.output_timestamp_format = format.clone();
    }
    if let Some(fill) = args.fill.as_ref() {
        config.fillable_fields = parse_field_list(fill);
    }
    if let Some(encoding) = args.encoding {
        config.encoding = encoding.into();
    }
    if args.overwrite {
        config.overwrite = true;
    }
    Ok(config)
}

fn parse_field_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn log_clean_summary(report: &CleanReport, config: &CleanConfig) {
    let stats = &report.regularize;
    info!(
        "Grid {} .. {} every {} ({} timestamps)",
        stats.grid_start, stats.grid_end, config.interval, stats.grid_len
    );
    info!(
        "Total number of inconsistent format rows: {} (entire row removed)",
        stats.off_grid
    );
    info!(
        "Total number of duplicate rows: {} ({} removed, latest record retained)",
        stats.duplicate_records, stats.duplicates_removed
    );
    info!("Number of missing timestamps: {}", stats.missing_timestamps);
    if !stats.filled_values.is_empty() {
        let filled = stats
            .filled_values
            .iter()
            .map(|(field, n)| format!("{}={}", field, n))
            .collect::<Vec<_>>()
            .join(", ");
        info!("Linear interpolation applied to: {}", filled);
    }
    if !stats.ignored_fill_fields.is_empty() {
        warn!(
            "Fill columns not present in {}: {}",
            report.input.display(),
            stats.ignored_fill_fields.join(", ")
        );
    }
    info!(
        "Cleaned time series data saved to: {} ({} rows, {})",
        report.output.display(),
        report.rows_written,
        report.encoding
    );
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(report)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote run summary: {}", path.display());
    Ok(())
}
