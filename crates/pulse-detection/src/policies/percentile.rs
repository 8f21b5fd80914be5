//! Percentile policy: the lower/upper percentiles of a warm-up prefix are
//! used as constant bounds for the rest of the series.

use super::{DetectionPolicy, PolicyBounds};
use crate::bounds::ConstantBounds;
use crate::stats;
use hr_pulse_core::{
    config::DetectionConfig,
    types::{PolicyKind, SamplingFrequency, Series},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PercentilePolicy {
    /// Warm-up length at full sampling
    reference_window: usize,
    lower_percentile: f64,
    upper_percentile: f64,
}

impl PercentilePolicy {
    pub fn new(reference_window: usize, lower_percentile: f64, upper_percentile: f64) -> Self {
        Self {
            reference_window,
            lower_percentile,
            upper_percentile,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.reference_window,
            config.lower_percentile,
            config.upper_percentile,
        )
    }

    pub fn warm_up_len(&self, frequency: SamplingFrequency) -> usize {
        self.reference_window / frequency.get() as usize
    }
}

impl DetectionPolicy for PercentilePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Percentile
    }

    fn bounds(&self, series: &Series, frequency: SamplingFrequency) -> Option<PolicyBounds> {
        let warm_up = self.warm_up_len(frequency);
        if warm_up == 0 || series.len() < warm_up {
            return None;
        }

        let mut reference: Vec<f64> = series.values().take(warm_up).collect();
        reference.sort_by(f64::total_cmp);

        let lower = stats::quantile_sorted(&reference, self.lower_percentile)?;
        let upper = stats::quantile_sorted(&reference, self.upper_percentile)?;

        Some(PolicyBounds::new(ConstantBounds::new(lower, upper), warm_up))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;
    use hr_pulse_core::types::Bounds;

    fn policy(reference_window: usize) -> PercentilePolicy {
        PercentilePolicy::new(reference_window, 0.01, 0.99)
    }

    #[test]
    fn test_bounds_from_warm_up() {
        let series = Series::from_values("p", &[70.0, 71.0, 69.0, 70.0, 72.0]);
        let bounds = policy(4).bounds(&series, SamplingFrequency::FULL).unwrap();

        assert_eq!(bounds.start, 4);
        let constant = bounds.provider.constant().unwrap();
        assert!((constant.lower - 69.03).abs() < 1e-9);
        assert!((constant.upper - 70.97).abs() < 1e-9);
    }

    #[test]
    fn test_warm_up_scales_with_frequency() {
        let p = policy(1000);
        assert_eq!(p.warm_up_len(SamplingFrequency::FULL), 1000);
        assert_eq!(p.warm_up_len(SamplingFrequency::new(5).unwrap()), 200);
        assert_eq!(p.warm_up_len(SamplingFrequency::new(3).unwrap()), 333);
    }

    #[test]
    fn test_short_series_has_no_bounds() {
        let series = Series::from_values("p", &[70.0; 3]);
        assert!(policy(4).bounds(&series, SamplingFrequency::FULL).is_none());

        let result = policy(4).evaluate(&Evaluator::default(), &series, SamplingFrequency::FULL);
        assert!(result.anomalies.is_empty());
        assert_eq!(result.evaluated, 0);
    }

    #[test]
    fn test_series_exactly_warm_up_long_evaluates_nothing() {
        let series = Series::from_values("p", &[70.0; 4]);
        let result = policy(4).evaluate(&Evaluator::default(), &series, SamplingFrequency::FULL);
        assert_eq!(result.evaluated, 0);
        assert_eq!(result.start_index, Some(4));
    }

    #[test]
    fn test_zero_warm_up_has_no_bounds() {
        let series = Series::from_values("p", &[70.0; 10]);
        assert!(policy(4)
            .bounds(&series, SamplingFrequency::new(5).unwrap())
            .is_none());
    }

    #[test]
    fn test_hard_bound_inside_percentile_band() {
        // Warm-up band [30.06, 35.94] is below the hard lower bound of 40
        let series = Series::from_values("p", &[30.0, 32.0, 34.0, 36.0, 33.0, 41.0]);
        let evaluator = Evaluator::new(Bounds::new(40.0, 120.0), true);
        let result = policy(4).evaluate(&evaluator, &series, SamplingFrequency::FULL);

        assert_eq!(result.evaluated, 2);
        assert_eq!(result.anomalies.len(), 2);
        assert!(result.anomalies[0].hard_limit_breached);
        assert!(!result.anomalies[1].hard_limit_breached);
    }
}
