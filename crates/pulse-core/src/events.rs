//! Anomaly facts produced by policy evaluation.

use crate::types::{BreachType, PatientId, PolicyKind, SamplingFrequency, SensorType};
use serde::{Deserialize, Serialize};

/// One flagged reading.
///
/// Anomalies are derived per evaluation run and never persisted by the
/// engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Patient whose series produced the anomaly
    pub patient: PatientId,
    /// Position in the down-sampled series
    pub index: usize,
    /// Source observation offset of the reading
    pub offset: u64,
    /// Sensor channel
    pub sensor: SensorType,
    /// Flagged value
    pub value: f64,
    /// Policy that flagged it
    pub policy: PolicyKind,
    /// Sampling stride the series was evaluated at
    pub frequency: SamplingFrequency,
    /// Violated limit; `Both` for hard-limit breaches or when separation is off
    pub breach: BreachType,
    /// Value also lies outside the hard safety bounds
    pub hard_limit_breached: bool,
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} offset={} value={} policy={} sampling={} breach={}{}",
            self.patient,
            self.sensor,
            self.offset,
            self.value,
            self.policy,
            self.frequency,
            self.breach,
            if self.hard_limit_breached {
                " (hard limit)"
            } else {
                ""
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Anomaly {
        Anomaly {
            patient: PatientId::new("heart_rate-17"),
            index: 6,
            offset: 6,
            sensor: SensorType::HeartRate,
            value: 130.0,
            policy: PolicyKind::FixedThreshold,
            frequency: SamplingFrequency::FULL,
            breach: BreachType::Both,
            hard_limit_breached: true,
        }
    }

    #[test]
    fn test_anomaly_display() {
        let display = sample().to_string();
        assert!(display.contains("heart_rate-17"));
        assert!(display.contains("offset=6"));
        assert!(display.contains("Fixed Threshold"));
        assert!(display.contains("(hard limit)"));
    }

    #[test]
    fn test_anomaly_serialization() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sensor"], "heart_rate");
        assert_eq!(json["policy"], "fixed_threshold");
        assert_eq!(json["breach"], "both");
        assert_eq!(json["frequency"], 1);
    }
}
