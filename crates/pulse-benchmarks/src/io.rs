//! Report sink: writes benchmark reports to the output directory.
//!
//! Every run produces a summary matrix CSV, a configuration CSV and the full
//! JSON report, all stamped with the run's finish time and id, plus
//! `summary.md` for the latest run.

use crate::markdown::generate_summary;
use crate::report::BenchmarkReport;
use anyhow::{Context, Result};
use hr_pulse_core::events::Anomaly;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default output directory for benchmark reports.
pub const DEFAULT_OUTPUT_DIR: &str = "logs";

/// Markdown summary file name.
pub const SUMMARY_FILE: &str = "summary.md";

/// Paths written for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenReport {
    pub summary_csv: PathBuf,
    pub configuration_csv: PathBuf,
    pub report_json: PathBuf,
    pub summary_md: PathBuf,
    pub anomalies_csv: Option<PathBuf>,
}

/// I/O handler for benchmark reports.
#[derive(Debug, Clone)]
pub struct BenchmarkIO {
    output_dir: PathBuf,
}

impl Default for BenchmarkIO {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl BenchmarkIO {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", self.output_dir))?;

        debug!("Ensured benchmark output directory exists");
        Ok(())
    }

    /// Write every artifact of `report`; anomaly details only when given.
    pub fn write_all(
        &self,
        report: &BenchmarkReport,
        anomalies: Option<&[Anomaly]>,
    ) -> Result<WrittenReport> {
        Ok(WrittenReport {
            summary_csv: self.write_summary_csv(report)?,
            configuration_csv: self.write_configuration_csv(report)?,
            report_json: self.write_report(report)?,
            summary_md: self.write_summary(&generate_summary(report))?,
            anomalies_csv: anomalies
                .map(|anomalies| self.write_anomalies(report, anomalies))
                .transpose()?,
        })
    }

    /// Policy × frequency matrix; cells without data are written as `N/A`.
    pub fn write_summary_csv(&self, report: &BenchmarkReport) -> Result<PathBuf> {
        let path = self.stamped_path("summary", report, "csv");
        let matrix = &report.matrix;

        let mut writer = self.csv_writer(&path)?;
        writer.write_record(matrix.header())?;
        for row in &matrix.rows {
            let mut record = matrix.row_labels(row);
            record.extend(row.cells.iter().map(|c| c.to_field()));
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write summary to {:?}", path))?;

        info!("Wrote summary matrix to {:?}", path);
        Ok(path)
    }

    /// `Parameter,Value` snapshot of the run configuration.
    pub fn write_configuration_csv(&self, report: &BenchmarkReport) -> Result<PathBuf> {
        let path = self.stamped_path("configuration", report, "csv");

        let mut writer = self.csv_writer(&path)?;
        writer.write_record(["Parameter", "Value"])?;
        for entry in &report.configuration {
            writer.write_record([entry.parameter.as_str(), entry.value.as_str()])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write configuration to {:?}", path))?;

        info!("Wrote configuration snapshot to {:?}", path);
        Ok(path)
    }

    /// Full report as pretty JSON.
    pub fn write_report(&self, report: &BenchmarkReport) -> Result<PathBuf> {
        self.ensure_directories()?;

        let path = self.stamped_path("report", report, "json");
        let json = report.to_json()?;
        fs::write(&path, json).with_context(|| format!("Failed to write report to {:?}", path))?;

        info!("Wrote benchmark report to {:?}", path);
        Ok(path)
    }

    /// One line per flagged reading.
    pub fn write_anomalies(&self, report: &BenchmarkReport, anomalies: &[Anomaly]) -> Result<PathBuf> {
        let path = self.stamped_path("anomalies", report, "csv");

        let mut writer = self.csv_writer(&path)?;
        writer.write_record([
            "patient",
            "offset",
            "sensor",
            "value",
            "policy",
            "sampling",
            "breach",
            "hard_limit",
        ])?;
        for anomaly in anomalies {
            writer.write_record([
                anomaly.patient.to_string(),
                anomaly.offset.to_string(),
                anomaly.sensor.to_string(),
                anomaly.value.to_string(),
                anomaly.policy.label().to_string(),
                anomaly.frequency.to_string(),
                anomaly.breach.to_string(),
                anomaly.hard_limit_breached.to_string(),
            ])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write anomalies to {:?}", path))?;

        info!(count = anomalies.len(), "Wrote anomaly details to {:?}", path);
        Ok(path)
    }

    pub fn write_summary(&self, content: &str) -> Result<PathBuf> {
        self.ensure_directories()?;

        let path = self.summary_path();
        fs::write(&path, content)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;

        info!("Wrote benchmark summary to {:?}", path);
        Ok(path)
    }

    fn stamped_path(&self, prefix: &str, report: &BenchmarkReport, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", prefix, report.file_stamp(), extension))
    }

    fn csv_writer(&self, path: &Path) -> Result<csv::Writer<fs::File>> {
        self.ensure_directories()?;
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))
    }
}
