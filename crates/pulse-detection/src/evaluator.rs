//! Shared anomaly rule applied to every policy's bounds.

use crate::bounds::BoundsProvider;
use crate::policies::PolicyBounds;
use hr_pulse_core::{
    config::DetectionConfig,
    events::Anomaly,
    types::{Bounds, BreachType, PolicyKind, SamplingFrequency, SensorType, Series},
};
use serde::Serialize;
use tracing::{debug, trace};

/// Outcome of one policy on one down-sampled series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub policy: PolicyKind,
    pub frequency: SamplingFrequency,
    /// Flagged readings in index order
    pub anomalies: Vec<Anomaly>,
    /// Indices that reached the anomaly decision
    pub evaluated: u64,
    /// First index considered, `None` when the policy produced no bounds
    pub start_index: Option<usize>,
    /// Bounds used for every index, when the policy's bounds are constant
    pub constant_bounds: Option<Bounds>,
}

impl Evaluation {
    /// Result for a series the policy could not judge at all.
    pub fn empty(policy: PolicyKind, frequency: SamplingFrequency) -> Self {
        Self {
            policy,
            frequency,
            anomalies: Vec::new(),
            evaluated: 0,
            start_index: None,
            constant_bounds: None,
        }
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }
}

/// Applies the anomaly rule: an index with finite adaptive bounds is flagged
/// when its value lies outside those bounds or outside the hard bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluator {
    hard: Bounds,
    separate_breach_types: bool,
}

impl Evaluator {
    pub fn new(hard: Bounds, separate_breach_types: bool) -> Self {
        Self {
            hard,
            separate_breach_types,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            Bounds::new(config.hard.lower, config.hard.upper),
            config.separate_breach_types,
        )
    }

    pub fn hard_bounds(&self) -> Bounds {
        self.hard
    }

    /// Classify a value against adaptive bounds. `None` means not anomalous.
    ///
    /// With separation on, a hard-limit breach is always `Both`; adaptive-only
    /// breaches are `Lower` or `Upper` by side. Callers must only pass finite
    /// `bounds`.
    pub fn classify(&self, value: f64, bounds: Bounds) -> Option<(BreachType, bool)> {
        let hard = self.hard.below(value) || self.hard.above(value);
        let low = bounds.below(value);
        let high = bounds.above(value);

        if !(low || high || hard) {
            return None;
        }

        let breach = match (low, high) {
            _ if hard || !self.separate_breach_types => BreachType::Both,
            (true, false) => BreachType::Lower,
            (false, true) => BreachType::Upper,
            _ => BreachType::Both,
        };

        Some((breach, hard))
    }

    /// Evaluate `series` from `bounds.start` onwards.
    pub fn evaluate(
        &self,
        policy: PolicyKind,
        series: &Series,
        frequency: SamplingFrequency,
        bounds: Option<PolicyBounds>,
    ) -> Evaluation {
        let Some(PolicyBounds { provider, start }) = bounds else {
            debug!(
                policy = %policy,
                patient = %series.patient,
                frequency = frequency.get(),
                len = series.len(),
                "Insufficient data for policy bounds"
            );
            return Evaluation::empty(policy, frequency);
        };

        let mut anomalies = Vec::new();
        let mut evaluated = 0u64;

        for (index, reading) in series.readings.iter().enumerate().skip(start) {
            let bounds = provider.bounds_at(index);
            if !bounds.is_finite() {
                continue;
            }
            evaluated += 1;

            if let Some((breach, hard_limit_breached)) = self.classify(reading.value, bounds) {
                trace!(
                    policy = %policy,
                    index,
                    value = reading.value,
                    breach = %breach,
                    "Anomaly flagged"
                );
                anomalies.push(Anomaly {
                    patient: series.patient.clone(),
                    index,
                    offset: reading.offset,
                    sensor: SensorType::HeartRate,
                    value: reading.value,
                    policy,
                    frequency,
                    breach,
                    hard_limit_breached,
                });
            }
        }

        debug!(
            policy = %policy,
            patient = %series.patient,
            frequency = frequency.get(),
            evaluated,
            anomalies = anomalies.len(),
            "Policy evaluated"
        );

        Evaluation {
            policy,
            frequency,
            anomalies,
            evaluated,
            start_index: Some(start),
            constant_bounds: provider.constant(),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}
