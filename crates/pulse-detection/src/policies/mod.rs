//! The four benchmarked detection policies.
//!
//! Each policy turns a down-sampled series into a bounds provider plus the
//! index where evaluation starts. The anomaly rule itself lives in the
//! [`Evaluator`], shared by all of them.

pub mod fixed;
pub mod iqr;
pub mod percentile;
pub mod rolling;

pub use fixed::FixedThresholdPolicy;
pub use iqr::IqrPolicy;
pub use percentile::PercentilePolicy;
pub use rolling::RollingAveragePolicy;

use crate::bounds::BoundsProvider;
use crate::evaluator::{Evaluation, Evaluator};
use hr_pulse_core::{
    config::DetectionConfig,
    types::{PolicyKind, SamplingFrequency, Series},
};

/// Bounds produced by a policy for one series.
#[derive(Debug)]
pub struct PolicyBounds {
    pub provider: Box<dyn BoundsProvider>,
    /// First index eligible for evaluation
    pub start: usize,
}

impl PolicyBounds {
    pub fn new(provider: impl BoundsProvider + 'static, start: usize) -> Self {
        Self {
            provider: Box::new(provider),
            start,
        }
    }
}

/// A detection policy: derives bounds from a down-sampled series.
pub trait DetectionPolicy: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> PolicyKind;

    /// Bounds for `series`, or `None` when the series is too short to judge.
    fn bounds(&self, series: &Series, frequency: SamplingFrequency) -> Option<PolicyBounds>;

    /// Run the anomaly rule over `series` with this policy's bounds.
    fn evaluate(
        &self,
        evaluator: &Evaluator,
        series: &Series,
        frequency: SamplingFrequency,
    ) -> Evaluation {
        evaluator.evaluate(self.kind(), series, frequency, self.bounds(series, frequency))
    }
}

/// Construct the policy for `kind` from configuration.
pub fn build_policy(kind: PolicyKind, config: &DetectionConfig) -> Box<dyn DetectionPolicy> {
    match kind {
        PolicyKind::Percentile => Box::new(PercentilePolicy::from_config(config)),
        PolicyKind::Iqr => Box::new(IqrPolicy::from_config(config)),
        PolicyKind::RollingAverage => Box::new(RollingAveragePolicy::from_config(config)),
        PolicyKind::FixedThreshold => Box::new(FixedThresholdPolicy::from_config(config)),
    }
}

/// All four policies plus the evaluator that applies them.
#[derive(Debug)]
pub struct PolicySet {
    policies: Vec<Box<dyn DetectionPolicy>>,
    evaluator: Evaluator,
}

impl PolicySet {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            policies: PolicyKind::ALL
                .iter()
                .map(|&kind| build_policy(kind, config))
                .collect(),
            evaluator: Evaluator::from_config(config),
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn get(&self, kind: PolicyKind) -> Option<&dyn DetectionPolicy> {
        self.policies
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DetectionPolicy> {
        self.policies.iter().map(|p| p.as_ref())
    }

    /// Evaluate one policy on an already down-sampled series.
    pub fn evaluate(
        &self,
        kind: PolicyKind,
        series: &Series,
        frequency: SamplingFrequency,
    ) -> Evaluation {
        match self.get(kind) {
            Some(policy) => policy.evaluate(&self.evaluator, series, frequency),
            None => Evaluation::empty(kind, frequency),
        }
    }

    /// Evaluate every policy, in report order.
    pub fn evaluate_all(&self, series: &Series, frequency: SamplingFrequency) -> Vec<Evaluation> {
        self.iter()
            .map(|policy| policy.evaluate(&self.evaluator, series, frequency))
            .collect()
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_pulse_core::types::BreachType;

    const SAMPLE: [f64; 12] = [
        70.0, 71.0, 69.0, 70.0, 72.0, 68.0, 130.0, 70.0, 69.0, 71.0, 70.0, 69.0,
    ];

    fn small_window_config() -> DetectionConfig {
        DetectionConfig {
            reference_window: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_policy_set_order() {
        let set = PolicySet::default();
        let kinds: Vec<PolicyKind> = set.iter().map(|p| p.kind()).collect();
        assert_eq!(kinds, PolicyKind::ALL.to_vec());
    }

    #[test]
    fn test_sample_series_all_policies() {
        let set = PolicySet::from_config(&small_window_config());
        let series = Series::from_values("p", &SAMPLE);
        let results = set.evaluate_all(&series, SamplingFrequency::FULL);

        let indices = |kind: PolicyKind| -> Vec<usize> {
            results
                .iter()
                .find(|e| e.policy == kind)
                .map(|e| e.anomalies.iter().map(|a| a.index).collect())
                .unwrap_or_default()
        };
        let evaluated = |kind: PolicyKind| -> u64 {
            results
                .iter()
                .find(|e| e.policy == kind)
                .map(|e| e.evaluated)
                .unwrap_or_default()
        };

        // Band [69.03, 70.97] from the first four readings
        assert_eq!(indices(PolicyKind::Percentile), vec![4, 5, 6, 8, 9, 11]);
        // Fences [69.0, 71.0]
        assert_eq!(indices(PolicyKind::Iqr), vec![4, 5, 6]);
        // Rolling window sees the spike, so the band is wide
        assert!(indices(PolicyKind::RollingAverage).is_empty());
        assert_eq!(indices(PolicyKind::FixedThreshold), vec![6]);

        assert_eq!(evaluated(PolicyKind::Percentile), 8);
        assert_eq!(evaluated(PolicyKind::Iqr), 8);
        assert_eq!(evaluated(PolicyKind::RollingAverage), 2);
        assert_eq!(evaluated(PolicyKind::FixedThreshold), 12);
    }

    #[test]
    fn test_fixed_threshold_single_spike() {
        let set = PolicySet::default();
        let series = Series::from_values("p", &SAMPLE);
        let result = set.evaluate(PolicyKind::FixedThreshold, &series, SamplingFrequency::FULL);

        assert_eq!(result.anomalies.len(), 1);
        let anomaly = &result.anomalies[0];
        assert_eq!(anomaly.offset, 6);
        assert_eq!(anomaly.value, 130.0);
        assert_eq!(anomaly.breach, BreachType::Both);
        assert!(anomaly.hard_limit_breached);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let set = PolicySet::from_config(&small_window_config());
        let series = Series::from_values("p", &SAMPLE);
        let first = set.evaluate_all(&series, SamplingFrequency::FULL);
        let second = set.evaluate_all(&series, SamplingFrequency::FULL);
        assert_eq!(first, second);
    }
}
