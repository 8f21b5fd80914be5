//! Benchmark configuration.
//!
//! A [`BenchmarkConfig`] is built once (defaults, YAML file, then `PULSE_*`
//! environment overrides), validated, and passed by reference to every stage.
//! Nothing reads configuration from global state.

use crate::types::{PolicyKind, SamplingFrequency};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PULSE_";

/// A `(lower, upper)` pair of fixed limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundPair {
    pub lower: f64,
    pub upper: f64,
}

impl BoundPair {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(Error::config(format!("{} bounds must be finite", name)));
        }
        if self.lower > self.upper {
            return Err(Error::config(format!(
                "{} lower bound {} exceeds upper bound {}",
                name, self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Parameters of the four detection policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Warm-up length at full sampling for the percentile and IQR policies
    pub reference_window: usize,
    /// Trailing window of the rolling-average policy, in down-sampled readings
    pub rolling_window: usize,
    /// Readings required before rolling bounds are defined
    pub rolling_min_periods: usize,
    /// Standard deviations around the rolling mean
    pub rolling_std_multiplier: f64,
    /// IQR fence multiplier
    pub iqr_multiplier: f64,
    /// Lower quantile of the percentile policy
    pub lower_percentile: f64,
    /// Upper quantile of the percentile policy
    pub upper_percentile: f64,
    /// Bounds of the fixed-threshold policy
    pub fixed: BoundPair,
    /// Physiological safety limits checked alongside every policy
    pub hard: BoundPair,
    /// Split adaptive-only breaches into lower and upper instead of `Both`
    pub separate_breach_types: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            reference_window: 1000,
            rolling_window: 500,
            rolling_min_periods: 10,
            rolling_std_multiplier: 2.0,
            iqr_multiplier: 1.5,
            lower_percentile: 0.01,
            upper_percentile: 0.99,
            fixed: BoundPair::new(60.0, 100.0),
            hard: BoundPair::new(40.0, 120.0),
            separate_breach_types: false,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rolling_window == 0 {
            return Err(Error::config("rolling_window must be at least 1"));
        }
        if self.rolling_min_periods == 0 {
            return Err(Error::config("rolling_min_periods must be at least 1"));
        }
        if self.rolling_min_periods > self.rolling_window {
            return Err(Error::config(format!(
                "rolling_min_periods ({}) cannot exceed rolling_window ({})",
                self.rolling_min_periods, self.rolling_window
            )));
        }
        if !(0.0..=1.0).contains(&self.lower_percentile)
            || !(0.0..=1.0).contains(&self.upper_percentile)
        {
            return Err(Error::config("percentiles must lie within [0, 1]"));
        }
        if self.lower_percentile >= self.upper_percentile {
            return Err(Error::config(
                "lower_percentile must be smaller than upper_percentile",
            ));
        }
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(Error::config("iqr_multiplier must be a non-negative number"));
        }
        if !self.rolling_std_multiplier.is_finite() || self.rolling_std_multiplier < 0.0 {
            return Err(Error::config(
                "rolling_std_multiplier must be a non-negative number",
            ));
        }
        self.fixed.validate("fixed")?;
        self.hard.validate("hard")?;
        Ok(())
    }

    /// Warm-up length for a sampling stride: `floor(reference_window / f)`.
    pub fn warm_up_len(&self, frequency: SamplingFrequency) -> usize {
        self.reference_window / frequency.get() as usize
    }
}

/// Where patient series are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub data_dir: PathBuf,
    pub offset_column: String,
    pub value_column: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            offset_column: "observation_offset".to_string(),
            value_column: "heart_rate".to_string(),
        }
    }
}

/// Where reports are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Also write every flagged anomaly to a detail CSV
    pub write_anomaly_details: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logs"),
            write_anomaly_details: false,
        }
    }
}

/// Complete benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub detection: DetectionConfig,
    /// Sampling strides, in report column order
    pub sampling_frequencies: Vec<SamplingFrequency>,
    /// Raw series shorter than this are not benchmarked
    pub min_readings: usize,
    /// Eligible series evaluated per frequency
    pub max_patients: usize,
    /// Policy whose evaluated count normalises every policy's rate
    pub tally_policy: PolicyKind,
    pub ingestion: IngestionConfig,
    pub output: OutputConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            sampling_frequencies: [1, 2, 5, 10]
                .into_iter()
                .filter_map(|f| SamplingFrequency::new(f).ok())
                .collect(),
            min_readings: 2000,
            max_patients: 10000,
            tally_policy: PolicyKind::FixedThreshold,
            ingestion: IngestionConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        debug!(path = ?path, "Loaded benchmark configuration");
        Ok(config)
    }

    /// Parse configuration from YAML without environment overrides.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply `PULSE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_var("MIN_READINGS") {
            self.min_readings = parse_env("MIN_READINGS", &value)?;
        }
        if let Some(value) = env_var("MAX_PATIENTS") {
            self.max_patients = parse_env("MAX_PATIENTS", &value)?;
        }
        if let Some(value) = env_var("SEPARATE_BREACH_TYPES") {
            self.detection.separate_breach_types = parse_env("SEPARATE_BREACH_TYPES", &value)?;
        }
        if let Some(value) = env_var("DATA_DIR") {
            self.ingestion.data_dir = PathBuf::from(value);
        }
        if let Some(value) = env_var("OUTPUT_DIR") {
            self.output.dir = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;

        if self.sampling_frequencies.is_empty() {
            return Err(Error::config("at least one sampling frequency is required"));
        }
        if self.sampling_frequencies.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::config(
                "sampling frequencies must be unique and in ascending order",
            ));
        }
        if self.max_patients == 0 {
            return Err(Error::config("max_patients must be at least 1"));
        }
        Ok(())
    }

    /// Ordered `(parameter, value)` pairs describing the run configuration.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let d = &self.detection;
        let frequencies = self
            .sampling_frequencies
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",");

        vec![
            ("FIXED_LOWER_BOUND".to_string(), d.fixed.lower.to_string()),
            ("FIXED_UPPER_BOUND".to_string(), d.fixed.upper.to_string()),
            ("HARD_LOWER_BOUND".to_string(), d.hard.lower.to_string()),
            ("HARD_UPPER_BOUND".to_string(), d.hard.upper.to_string()),
            (
                "PERCENTILES_IQR_LENGTH".to_string(),
                d.reference_window.to_string(),
            ),
            ("ROLLING_AVG_RANGE".to_string(), d.rolling_window.to_string()),
            (
                "ROLLING_MIN_PERIODS".to_string(),
                d.rolling_min_periods.to_string(),
            ),
            (
                "ROLLING_STD_MULTIPLIER".to_string(),
                d.rolling_std_multiplier.to_string(),
            ),
            ("IQR_MULTIPLIER".to_string(), d.iqr_multiplier.to_string()),
            (
                "PERCENTILE_RANGE".to_string(),
                format!("{}-{}", d.lower_percentile, d.upper_percentile),
            ),
            ("NUMBER_PATIENTS".to_string(), self.max_patients.to_string()),
            (
                "MIN_NUMBER_OF_READINGS".to_string(),
                self.min_readings.to_string(),
            ),
            (
                "SEPARATE_LOWER_AND_UPPER".to_string(),
                d.separate_breach_types.to_string(),
            ),
            ("SAMPLING_FREQUENCIES".to_string(), frequencies),
            (
                "TALLY_POLICY".to_string(),
                self.tally_policy.label().to_string(),
            ),
        ]
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::config(format!(
            "Invalid value for {}{}: {:?}",
            ENV_PREFIX, name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.detection.reference_window, 1000);
        assert_eq!(config.detection.rolling_window, 500);
        assert_eq!(config.detection.rolling_min_periods, 10);
        assert_eq!(config.detection.fixed, BoundPair::new(60.0, 100.0));
        assert_eq!(config.detection.hard, BoundPair::new(40.0, 120.0));
        assert_eq!(config.min_readings, 2000);
        assert_eq!(config.max_patients, 10000);
        assert_eq!(
            config
                .sampling_frequencies
                .iter()
                .map(|f| f.get())
                .collect::<Vec<_>>(),
            vec![1, 2, 5, 10]
        );
        assert_eq!(config.tally_policy, PolicyKind::FixedThreshold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
sampling_frequencies: [1, 3]
min_readings: 50
detection:
  reference_window: 200
  separate_breach_types: true
tally_policy: iqr
"#;
        let config = BenchmarkConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.min_readings, 50);
        assert_eq!(config.detection.reference_window, 200);
        assert!(config.detection.separate_breach_types);
        assert_eq!(config.detection.rolling_window, 500);
        assert_eq!(config.tally_policy, PolicyKind::Iqr);
        assert_eq!(config.sampling_frequencies.len(), 2);
    }

    #[test]
    fn test_zero_frequency_rejected_at_parse() {
        let yaml = "sampling_frequencies: [1, 0]";
        assert!(BenchmarkConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BenchmarkConfig::default();
        config.sampling_frequencies.clear();
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.sampling_frequencies.push(SamplingFrequency::FULL);
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.detection.fixed = BoundPair::new(100.0, 60.0);
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.detection.rolling_min_periods = 600;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.detection.lower_percentile = 0.99;
        config.detection.upper_percentile = 0.01;
        assert!(config.validate().is_err());

        let mut config = BenchmarkConfig::default();
        config.max_patients = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_ascending_frequencies() {
        let mut config = BenchmarkConfig::default();
        config.sampling_frequencies = vec![
            SamplingFrequency::new(5).unwrap(),
            SamplingFrequency::FULL,
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ascending"));

        let validated = |yaml: &str| BenchmarkConfig::from_yaml_str(yaml).and_then(|c| c.validate());
        assert!(validated("sampling_frequencies: [2, 2]").is_err());
        assert!(validated("sampling_frequencies: [1, 4, 9]").is_ok());
    }

    #[test]
    fn test_warm_up_len_floors() {
        let detection = DetectionConfig::default();
        let len = |f| detection.warm_up_len(SamplingFrequency::new(f).unwrap());
        assert_eq!(len(1), 1000);
        assert_eq!(len(3), 333);
        assert_eq!(len(7), 142);
        assert_eq!(len(2000), 0);
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut config = BenchmarkConfig::default();
        config.max_patients = 25;
        write!(file, "{}", config.to_yaml().unwrap()).unwrap();

        let loaded = BenchmarkConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.detection, config.detection);
        assert_eq!(loaded.sampling_frequencies, config.sampling_frequencies);
    }

    #[test]
    fn test_from_file_missing() {
        let err = BenchmarkConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = include_str!("../../../config/pulse.yaml");
        let config = BenchmarkConfig::from_yaml_str(shipped).unwrap();
        assert_eq!(config, BenchmarkConfig::default());
    }

    #[test]
    fn test_snapshot_lists_reference_parameters() {
        let snapshot = BenchmarkConfig::default().snapshot();
        let names: Vec<&str> = snapshot.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names[0], "FIXED_LOWER_BOUND");
        assert!(names.contains(&"PERCENTILES_IQR_LENGTH"));
        assert!(names.contains(&"SEPARATE_LOWER_AND_UPPER"));

        let freq = snapshot
            .iter()
            .find(|(k, _)| k == "SAMPLING_FREQUENCIES")
            .map(|(_, v)| v.as_str());
        assert_eq!(freq, Some("1,2,5,10"));
    }
}
