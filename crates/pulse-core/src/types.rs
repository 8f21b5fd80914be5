//! Core data model: readings, series, sampling frequencies, bounds and the
//! closed set of detection policies.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// A single sensor reading.
///
/// `offset` is the observation offset reported by the source. It is kept
/// unchanged through down-sampling so flagged anomalies can be traced back to
/// the raw recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub offset: u64,
    pub value: f64,
}

impl Reading {
    pub fn new(offset: u64, value: f64) -> Self {
        Self { offset, value }
    }
}

/// Patient identifier, derived from the source name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered readings for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub patient: PatientId,
    pub readings: Vec<Reading>,
}

impl Series {
    pub fn new(patient: PatientId, readings: Vec<Reading>) -> Self {
        Self { patient, readings }
    }

    /// Build a series with offsets `0..values.len()`.
    pub fn from_values(patient: impl Into<String>, values: &[f64]) -> Self {
        let readings = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Reading::new(i as u64, value))
            .collect();
        Self::new(PatientId::new(patient), readings)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Values in index order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.readings.iter().map(|r| r.value)
    }

    /// Values collected into a vector, for the statistics routines.
    pub fn value_vec(&self) -> Vec<f64> {
        self.values().collect()
    }

    /// Keep every `frequency`-th reading starting at index 0.
    ///
    /// The result has `ceil(len / frequency)` readings; positions are
    /// renumbered from 0 while each reading keeps its source offset.
    pub fn downsample(&self, frequency: SamplingFrequency) -> Series {
        let readings = self
            .readings
            .iter()
            .step_by(frequency.get() as usize)
            .copied()
            .collect();
        Series::new(self.patient.clone(), readings)
    }
}

/// Down-sampling stride. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SamplingFrequency(NonZeroU32);

impl SamplingFrequency {
    /// Every reading is kept.
    pub const FULL: SamplingFrequency = SamplingFrequency(NonZeroU32::MIN);

    pub fn new(stride: u32) -> Result<Self> {
        NonZeroU32::new(stride)
            .map(Self)
            .ok_or_else(|| Error::config("sampling frequency must be a positive integer"))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Column label used in reports, e.g. `Sampling 5`.
    pub fn column_label(self) -> String {
        format!("Sampling {}", self.0)
    }
}

impl TryFrom<u32> for SamplingFrequency {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SamplingFrequency> for u32 {
    fn from(value: SamplingFrequency) -> Self {
        value.get()
    }
}

impl fmt::Display for SamplingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SamplingFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let stride = s
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::config(format!("invalid sampling frequency: {:?}", s)))?;
        Self::new(stride)
    }
}

/// A `(lower, upper)` pair. Non-finite sides mean "not enough data to judge".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const UNDEFINED: Bounds = Bounds {
        lower: f64::NAN,
        upper: f64::NAN,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    pub fn below(&self, value: f64) -> bool {
        value < self.lower
    }

    pub fn above(&self, value: f64) -> bool {
        value > self.upper
    }
}

/// Which limit a flagged value violated.
///
/// `Lower` and `Upper` are adaptive-bound breaches on one side; `Both` covers
/// hard safety-limit breaches and every anomaly when separation is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachType {
    Lower,
    Upper,
    Both,
}

impl BreachType {
    pub const ALL: [BreachType; 3] = [BreachType::Lower, BreachType::Upper, BreachType::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            BreachType::Lower => "Lower",
            BreachType::Upper => "Upper",
            BreachType::Both => "Both",
        }
    }
}

impl fmt::Display for BreachType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor channel a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    HeartRate,
}

impl SensorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::HeartRate => "heart_rate",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of benchmarked detection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Percentile,
    Iqr,
    RollingAverage,
    FixedThreshold,
}

impl PolicyKind {
    /// All policies in report row order.
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::Percentile,
        PolicyKind::Iqr,
        PolicyKind::RollingAverage,
        PolicyKind::FixedThreshold,
    ];

    /// Stable machine identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Percentile => "percentile",
            PolicyKind::Iqr => "iqr",
            PolicyKind::RollingAverage => "rolling_average",
            PolicyKind::FixedThreshold => "fixed_threshold",
        }
    }

    /// Human-readable row label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            PolicyKind::Percentile => "Percentile",
            PolicyKind::Iqr => "IQR",
            PolicyKind::RollingAverage => "Rolling Average",
            PolicyKind::FixedThreshold => "Fixed Threshold",
        }
    }

    /// Whether the policy estimates its bounds from a warm-up prefix.
    pub fn uses_warm_up(&self) -> bool {
        matches!(self, PolicyKind::Percentile | PolicyKind::Iqr)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "percentile" => Ok(PolicyKind::Percentile),
            "iqr" => Ok(PolicyKind::Iqr),
            "rollingaverage" | "rolling" => Ok(PolicyKind::RollingAverage),
            "fixedthreshold" | "fixed" => Ok(PolicyKind::FixedThreshold),
            _ => Err(Error::config(format!("Unknown policy: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_keeps_every_nth() {
        let series = Series::from_values("p1", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let sampled = series.downsample(SamplingFrequency::new(3).unwrap());

        assert_eq!(sampled.len(), 3);
        assert_eq!(sampled.value_vec(), vec![1.0, 4.0, 7.0]);
        let offsets: Vec<u64> = sampled.readings.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 3, 6]);
        assert_eq!(sampled.patient, series.patient);
    }

    #[test]
    fn test_downsample_full_frequency_is_identity() {
        let series = Series::from_values("p1", &[70.0, 71.0, 69.0]);
        assert_eq!(series.downsample(SamplingFrequency::FULL), series);
    }

    #[test]
    fn test_downsample_length_is_ceiling() {
        let series = Series::from_values("p1", &vec![80.0; 10]);
        for stride in 1..=12u32 {
            let sampled = series.downsample(SamplingFrequency::new(stride).unwrap());
            let expected = (10 + stride as usize - 1) / stride as usize;
            assert_eq!(sampled.len(), expected, "stride {}", stride);
        }
    }

    #[test]
    fn test_downsample_empty_series() {
        let series = Series::from_values("empty", &[]);
        assert!(series
            .downsample(SamplingFrequency::new(5).unwrap())
            .is_empty());
    }

    #[test]
    fn test_sampling_frequency_rejects_zero() {
        assert!(SamplingFrequency::new(0).is_err());
        assert!("0".parse::<SamplingFrequency>().is_err());
        assert!("abc".parse::<SamplingFrequency>().is_err());
        assert_eq!("5".parse::<SamplingFrequency>().unwrap().get(), 5);
    }

    #[test]
    fn test_sampling_frequency_serde() {
        let freqs: Vec<SamplingFrequency> = serde_json::from_str("[1, 2, 10]").unwrap();
        assert_eq!(freqs.iter().map(|f| f.get()).collect::<Vec<_>>(), vec![1, 2, 10]);
        assert!(serde_json::from_str::<SamplingFrequency>("0").is_err());
        assert_eq!(serde_json::to_string(&freqs[2]).unwrap(), "10");
    }

    #[test]
    fn test_bounds_finiteness() {
        assert!(Bounds::new(60.0, 100.0).is_finite());
        assert!(!Bounds::UNDEFINED.is_finite());
        assert!(!Bounds::new(f64::NAN, 100.0).is_finite());
        assert!(!Bounds::new(60.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_policy_kind_parsing() {
        assert_eq!("IQR".parse::<PolicyKind>().unwrap(), PolicyKind::Iqr);
        assert_eq!(
            "Rolling Average".parse::<PolicyKind>().unwrap(),
            PolicyKind::RollingAverage
        );
        assert_eq!(
            "fixed_threshold".parse::<PolicyKind>().unwrap(),
            PolicyKind::FixedThreshold
        );
        assert_eq!(
            "percentile".parse::<PolicyKind>().unwrap(),
            PolicyKind::Percentile
        );
        assert!("zscore".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_policy_order_and_labels() {
        let labels: Vec<&str> = PolicyKind::ALL.iter().map(|p| p.label()).collect();
        assert_eq!(
            labels,
            vec!["Percentile", "IQR", "Rolling Average", "Fixed Threshold"]
        );
        assert!(PolicyKind::Iqr.uses_warm_up());
        assert!(!PolicyKind::RollingAverage.uses_warm_up());
    }
}
