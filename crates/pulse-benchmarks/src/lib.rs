//! # HR Pulse Benchmarks
//!
//! Runs the four heart-rate anomaly policies over a population of patient
//! series at several sampling frequencies and reports how often each policy
//! fires, normalised per 1000 evaluated readings.
//!
//! ## Module Structure
//!
//! - `orchestrator.rs` - frequency passes, eligibility, parallelism, cancellation
//! - `summary.rs` - mergeable counts and the policy × frequency rate matrix
//! - `report.rs` - `BenchmarkReport`, the persisted record of a run
//! - `io.rs` - CSV, JSON and markdown output
//! - `markdown.rs` - markdown summary generation
//!
//! ## Output Files
//!
//! `<stamp>` is the finish time to the millisecond plus a run id prefix.
//!
//! - `<output>/summary_<stamp>.csv` - rate matrix
//! - `<output>/configuration_<stamp>.csv` - configuration snapshot
//! - `<output>/report_<stamp>.json` - full report
//! - `<output>/anomalies_<stamp>.csv` - flagged readings, when enabled
//! - `<output>/summary.md` - markdown summary of the latest run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hr_pulse_benchmarks::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BenchmarkConfig::from_file("config/pulse.yaml")?;
//!     let provider = CsvDirectoryProvider::from_config(&config.ingestion)?;
//!     let (report, written) = run_and_save_benchmark(&provider, &config)?;
//!     println!("{}", report.matrix.render_table());
//!     println!("Report written to: {:?}", written.report_json);
//!     Ok(())
//! }
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod io;
mod markdown;
mod orchestrator;
mod report;
mod summary;

pub use io::{BenchmarkIO, WrittenReport, DEFAULT_OUTPUT_DIR, SUMMARY_FILE};
pub use markdown::generate_summary;
pub use orchestrator::{run_benchmark, BenchmarkRun, FrequencyPass, Orchestrator};
pub use report::{BenchmarkReport, ConfigEntry};
pub use summary::{Cell, FrequencyTally, MatrixRow, RateMatrix, Summary, RATE_SCALE};

use hr_pulse_core::config::BenchmarkConfig;
use hr_pulse_ingestion::SeriesProvider;

/// Run the benchmark and write every report artifact to the configured
/// output directory.
///
/// Returns the report together with the paths that were written.
pub fn run_and_save_benchmark(
    provider: &dyn SeriesProvider,
    config: &BenchmarkConfig,
) -> anyhow::Result<(BenchmarkReport, WrittenReport)> {
    let run = run_benchmark(provider, config)?;
    let report = BenchmarkReport::from_run(&run, config);

    let io = BenchmarkIO::new(&config.output.dir);
    let anomalies: Vec<_> = run.anomalies().cloned().collect();
    let details = config
        .output
        .write_anomaly_details
        .then_some(anomalies.as_slice());
    let written = io.write_all(&report, details)?;

    Ok((report, written))
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::io::BenchmarkIO;
    pub use super::markdown::generate_summary;
    pub use super::orchestrator::{run_benchmark, BenchmarkRun, Orchestrator};
    pub use super::report::BenchmarkReport;
    pub use super::run_and_save_benchmark;
    pub use super::summary::{Cell, RateMatrix, Summary};
    pub use hr_pulse_core::config::BenchmarkConfig;
    pub use hr_pulse_ingestion::{CsvDirectoryProvider, InMemoryProvider, SeriesProvider};
}
