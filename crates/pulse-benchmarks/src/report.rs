//! Persistable benchmark report.
//!
//! A [`BenchmarkReport`] is the self-contained record of one run: the rate
//! matrix, the tallies behind it and the configuration that produced it.

use crate::orchestrator::BenchmarkRun;
use crate::summary::{FrequencyTally, RateMatrix};
use chrono::{DateTime, Utc};
use hr_pulse_core::{config::BenchmarkConfig, types::PolicyKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One `Parameter,Value` row of the configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub parameter: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,

    /// UTC time the run finished
    pub timestamp: DateTime<Utc>,

    /// Run stopped before every frequency was processed
    pub cancelled: bool,

    /// Policy whose evaluated counts are the rate denominators
    pub tally_policy: PolicyKind,

    pub tallies: Vec<FrequencyTally>,

    pub matrix: RateMatrix,

    pub configuration: Vec<ConfigEntry>,
}

impl BenchmarkReport {
    pub fn from_run(run: &BenchmarkRun, config: &BenchmarkConfig) -> Self {
        Self {
            run_id: run.id,
            timestamp: run.finished_at,
            cancelled: run.cancelled,
            tally_policy: run.summary.tally_policy(),
            tallies: run.summary.tallies(&run.frequencies),
            matrix: run
                .summary
                .matrix(&run.frequencies, config.detection.separate_breach_types),
            configuration: config
                .snapshot()
                .into_iter()
                .map(|(parameter, value)| ConfigEntry { parameter, value })
                .collect(),
        }
    }

    /// Millisecond timestamp plus the start of the run id, for file names.
    pub fn file_stamp(&self) -> String {
        let id = self.run_id.simple().to_string();
        format!("{}_{}", self.timestamp.format("%Y%m%d_%H%M%S%3f"), &id[..8])
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BenchmarkReport {{ run_id: {}, timestamp: {}, frequencies: {}, cancelled: {} }}",
            self.run_id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.matrix.frequencies.len(),
            self.cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Orchestrator;
    use crate::summary::Cell;
    use hr_pulse_core::types::{SamplingFrequency, Series};
    use hr_pulse_ingestion::InMemoryProvider;

    fn report() -> BenchmarkReport {
        let mut config = BenchmarkConfig::default();
        config.min_readings = 1;
        config.sampling_frequencies = vec![SamplingFrequency::FULL];
        let provider: InMemoryProvider =
            std::iter::once(Series::from_values("p", &[70.0, 130.0, 70.0, 70.0])).collect();

        let run = Orchestrator::new(config.clone())
            .unwrap()
            .run(&provider)
            .unwrap();
        BenchmarkReport::from_run(&run, &config)
    }

    #[test]
    fn test_report_from_run() {
        let report = report();
        assert!(!report.cancelled);
        assert_eq!(report.tally_policy, PolicyKind::FixedThreshold);
        assert_eq!(report.tallies[0].tally, 4);
        assert_eq!(
            report
                .matrix
                .cell(PolicyKind::FixedThreshold, None, SamplingFrequency::FULL),
            Some(Cell::Rate(250.0))
        );
        // Reference window is far longer than the series
        assert_eq!(
            report
                .matrix
                .cell(PolicyKind::Percentile, None, SamplingFrequency::FULL),
            Some(Cell::Rate(0.0))
        );
        assert_eq!(report.configuration[0].parameter, "FIXED_LOWER_BOUND");
    }

    #[test]
    fn test_report_json_roundtrip() {
        let report = report();
        let json = report.to_json().unwrap();
        let parsed = BenchmarkReport::from_json(&json).unwrap();

        assert_eq!(parsed, report);
        assert!(json.contains("\"fixed_threshold\""));
    }

    #[test]
    fn test_file_stamp_distinguishes_runs() {
        let first = report();
        let mut second = first.clone();
        second.run_id = Uuid::new_v4();

        let stamp = first.file_stamp();
        assert_eq!(stamp.len(), "20260101_120000123_".len() + 8);
        assert!(stamp.starts_with(&first.timestamp.format("%Y%m%d_%H%M%S").to_string()));
        assert_ne!(stamp, second.file_stamp());
    }

    #[test]
    fn test_report_display() {
        let report = report();
        let display = report.to_string();
        assert!(display.contains(&report.run_id.to_string()));
        assert!(display.contains("frequencies: 1"));
    }
}
