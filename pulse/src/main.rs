//! HR Pulse Main Binary
//!
//! Drives the heart-rate anomaly policy benchmark:
//! - `run`: benchmark every policy over a directory of patient CSV files
//! - `detect`: apply the policies to a single patient file
//! - `config`: show the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hr_pulse_benchmarks::{BenchmarkIO, BenchmarkReport, Orchestrator};
use hr_pulse_core::{
    config::BenchmarkConfig,
    types::{PolicyKind, SamplingFrequency},
};
use hr_pulse_detection::{Evaluation, PolicySet};
use hr_pulse_ingestion::{load_series, CsvColumns, CsvDirectoryProvider};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration file read when `--config` is not given.
const DEFAULT_CONFIG: &str = "config/pulse.yaml";

/// HR Pulse CLI arguments
#[derive(Debug, Parser)]
#[clap(name = "pulse", version, about = "Heart-rate anomaly policy benchmark")]
struct Cli {
    /// Configuration file path [default: config/pulse.yaml, if present]
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "PULSE_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[clap(long, env = "PULSE_LOG_JSON", global = true)]
    log_json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Benchmark every policy over the patient files in the data directory
    Run {
        /// Directory of patient CSV files
        #[clap(long)]
        data_dir: Option<PathBuf>,

        /// Sampling strides, comma separated (e.g. 1,2,5,10)
        #[clap(long, value_delimiter = ',')]
        frequencies: Option<Vec<SamplingFrequency>>,

        /// Minimum raw readings for a series to be benchmarked
        #[clap(long)]
        min_readings: Option<usize>,

        /// Maximum eligible series per frequency
        #[clap(long)]
        max_patients: Option<usize>,

        /// Report lower and upper breaches separately
        #[clap(long)]
        separate_breach_types: bool,

        /// Evaluate patients in parallel
        #[clap(long)]
        parallel: bool,

        /// Output directory for reports
        #[clap(long)]
        output: Option<PathBuf>,

        /// Only print results, don't write to files
        #[clap(long)]
        dry_run: bool,

        /// Output the report as JSON to stdout
        #[clap(long)]
        json: bool,

        /// Also write every flagged reading
        #[clap(long)]
        details: bool,
    },
    /// Apply the policies to a single patient file
    Detect {
        /// Patient CSV file
        file: PathBuf,

        /// Sampling stride
        #[clap(long, default_value = "1")]
        frequency: SamplingFrequency,

        /// Only this policy (percentile, iqr, rolling, fixed)
        #[clap(long)]
        policy: Option<PolicyKind>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    info!("Starting HR Pulse v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            data_dir,
            frequencies,
            min_readings,
            max_patients,
            separate_breach_types,
            parallel,
            output,
            dry_run,
            json,
            details,
        } => {
            let mut config = config;
            if let Some(dir) = data_dir {
                config.ingestion.data_dir = dir;
            }
            if let Some(frequencies) = frequencies {
                config.sampling_frequencies = frequencies;
            }
            if let Some(min) = min_readings {
                config.min_readings = min;
            }
            if let Some(max) = max_patients {
                config.max_patients = max;
            }
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            config.detection.separate_breach_types |= separate_breach_types;
            config.output.write_anomaly_details |= details;
            config.validate().context("Invalid configuration")?;

            run_command(config, parallel, dry_run, json).await
        }
        Commands::Detect {
            file,
            frequency,
            policy,
            json,
        } => detect_command(&config, &file, frequency, policy, json),
        Commands::Config { json } => config_command(&config, json),
    }
}

/// Explicit `--config` must exist; otherwise the default file is optional.
fn load_config(path: Option<&PathBuf>) -> Result<BenchmarkConfig> {
    if let Some(path) = path {
        return BenchmarkConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path));
    }

    let default = PathBuf::from(DEFAULT_CONFIG);
    if default.exists() {
        return BenchmarkConfig::from_file(&default)
            .with_context(|| format!("Failed to load configuration from {:?}", default));
    }

    info!("No configuration file found, using defaults");
    let mut config = BenchmarkConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Run the benchmark subcommand
async fn run_command(
    config: BenchmarkConfig,
    parallel: bool,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let provider = CsvDirectoryProvider::from_config(&config.ingestion)?;
    let orchestrator = Orchestrator::new(config.clone())?;

    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping after the current frequency pass...");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let run = tokio::task::spawn_blocking(move || {
        if parallel {
            info!("Running benchmark in parallel mode");
            orchestrator.run_parallel(&provider)
        } else {
            info!("Running benchmark sequentially");
            orchestrator.run(&provider)
        }
    })
    .await
    .context("Benchmark task failed")??;

    let report = BenchmarkReport::from_run(&run, &config);

    if json_output {
        println!("{}", report.to_json()?);
    } else {
        println!("\n{}", "=".repeat(80));
        println!("HR Pulse Benchmark: anomalies per 1000 evaluated readings");
        println!("{}", "=".repeat(80));
        println!("{}", report.matrix.render_table());
        println!("{}", "-".repeat(80));
        println!("{:<12} {:>10} {:>14}", "Sampling", "Series", "Tally");
        for tally in &report.tallies {
            println!(
                "{:<12} {:>10} {:>14}",
                tally.frequency.get(),
                tally.series,
                tally.tally
            );
        }
        println!("{}", "=".repeat(80));
        println!(
            "Run {} finished at {}{}",
            report.run_id,
            report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        println!();
    }

    if !dry_run {
        let io = BenchmarkIO::new(&config.output.dir);
        let anomalies: Vec<_> = run.anomalies().cloned().collect();
        let written = io.write_all(
            &report,
            config
                .output
                .write_anomaly_details
                .then_some(anomalies.as_slice()),
        )?;

        info!("Report written to: {:?}", written.report_json);
        info!("Summary written to: {:?}", written.summary_md);

        if !json_output {
            println!("Results written to: {}", io.output_dir().display());
            println!("Summary: {}", written.summary_md.display());
        }
    }

    run.ensure_complete()?;
    Ok(())
}

/// Apply the policies to one file
fn detect_command(
    config: &BenchmarkConfig,
    file: &Path,
    frequency: SamplingFrequency,
    policy: Option<PolicyKind>,
    json_output: bool,
) -> Result<()> {
    let series = load_series(file, &CsvColumns::from(&config.ingestion))?;
    let sampled = series.downsample(frequency);
    let policies = PolicySet::from_config(&config.detection);

    let evaluations: Vec<Evaluation> = match policy {
        Some(kind) => vec![policies.evaluate(kind, &sampled, frequency)],
        None => policies.evaluate_all(&sampled, frequency),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&evaluations)?);
        return Ok(());
    }

    println!(
        "Patient {}: {} readings, {} at sampling {}",
        series.patient,
        series.len(),
        sampled.len(),
        frequency
    );
    println!("{}", "=".repeat(80));
    println!(
        "{:<18} {:>10} {:>10} {:>24}",
        "Policy", "Evaluated", "Anomalies", "Bounds"
    );
    println!("{}", "-".repeat(80));
    for evaluation in &evaluations {
        let bounds = match (evaluation.start_index, evaluation.constant_bounds) {
            (None, _) => "insufficient data".to_string(),
            (Some(_), Some(b)) => format!("[{:.2}, {:.2}]", b.lower, b.upper),
            (Some(_), None) => "per reading".to_string(),
        };
        println!(
            "{:<18} {:>10} {:>10} {:>24}",
            evaluation.policy.label(),
            evaluation.evaluated,
            evaluation.anomaly_count(),
            bounds
        );
    }
    println!("{}", "=".repeat(80));

    for evaluation in &evaluations {
        for anomaly in &evaluation.anomalies {
            println!("{}", anomaly);
        }
    }

    Ok(())
}

/// Print the configuration snapshot
fn config_command(config: &BenchmarkConfig, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("{:<28} {}", "Parameter", "Value");
    println!("{}", "-".repeat(60));
    for (parameter, value) in config.snapshot() {
        println!("{:<28} {}", parameter, value);
    }
    println!("{:<28} {}", "DATA_DIR", config.ingestion.data_dir.display());
    println!("{:<28} {}", "OUTPUT_DIR", config.output.dir.display());

    Ok(())
}

/// Initialize logging based on CLI arguments
fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .context("Invalid log level")?;

    if cli.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    }

    info!("Logging initialized at level: {}", log_level);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "pulse",
            "run",
            "--frequencies",
            "1,3,7",
            "--min-readings",
            "100",
            "--separate-breach-types",
            "--dry-run",
        ]);

        match cli.command {
            Commands::Run {
                frequencies,
                min_readings,
                separate_breach_types,
                dry_run,
                parallel,
                ..
            } => {
                let frequencies: Vec<u32> =
                    frequencies.unwrap().into_iter().map(|f| f.get()).collect();
                assert_eq!(frequencies, vec![1, 3, 7]);
                assert_eq!(min_readings, Some(100));
                assert!(separate_breach_types);
                assert!(dry_run);
                assert!(!parallel);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_zero_frequency_rejected() {
        assert!(Cli::try_parse_from(["pulse", "run", "--frequencies", "1,0"]).is_err());
    }

    #[test]
    fn test_parse_detect() {
        let cli = Cli::parse_from([
            "pulse",
            "detect",
            "p.csv",
            "--policy",
            "rolling",
            "--frequency",
            "5",
        ]);
        match cli.command {
            Commands::Detect {
                file,
                frequency,
                policy,
                json,
            } => {
                assert_eq!(file, PathBuf::from("p.csv"));
                assert_eq!(frequency.get(), 5);
                assert_eq!(policy, Some(PolicyKind::RollingAverage));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let missing = PathBuf::from("/no/such/pulse.yaml");
        assert!(load_config(Some(&missing)).is_err());
    }
}
