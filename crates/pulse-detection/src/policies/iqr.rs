//! IQR policy: Tukey fences around the quartiles of a warm-up prefix.

use super::{DetectionPolicy, PolicyBounds};
use crate::bounds::ConstantBounds;
use crate::stats;
use hr_pulse_core::{
    config::DetectionConfig,
    types::{PolicyKind, SamplingFrequency, Series},
};

#[derive(Debug, Clone, PartialEq)]
pub struct IqrPolicy {
    reference_window: usize,
    multiplier: f64,
}

impl IqrPolicy {
    pub fn new(reference_window: usize, multiplier: f64) -> Self {
        Self {
            reference_window,
            multiplier,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.reference_window, config.iqr_multiplier)
    }

    pub fn warm_up_len(&self, frequency: SamplingFrequency) -> usize {
        self.reference_window / frequency.get() as usize
    }
}

impl DetectionPolicy for IqrPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Iqr
    }

    fn bounds(&self, series: &Series, frequency: SamplingFrequency) -> Option<PolicyBounds> {
        let warm_up = self.warm_up_len(frequency);
        if warm_up == 0 || series.len() < warm_up {
            return None;
        }

        let mut reference: Vec<f64> = series.values().take(warm_up).collect();
        reference.sort_by(f64::total_cmp);

        let q1 = stats::quantile_sorted(&reference, 0.25)?;
        let q3 = stats::quantile_sorted(&reference, 0.75)?;
        let iqr = q3 - q1;

        Some(PolicyBounds::new(
            ConstantBounds::new(q1 - self.multiplier * iqr, q3 + self.multiplier * iqr),
            warm_up,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;
    use hr_pulse_core::types::Bounds;

    #[test]
    fn test_fences() {
        let series = Series::from_values("p", &[70.0, 71.0, 69.0, 70.0, 72.0]);
        let bounds = IqrPolicy::new(4, 1.5)
            .bounds(&series, SamplingFrequency::FULL)
            .unwrap();

        assert_eq!(bounds.start, 4);
        let constant = bounds.provider.constant().unwrap();
        assert!((constant.lower - 69.0).abs() < 1e-9);
        assert!((constant.upper - 71.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_warm_up_flags_any_change() {
        let series = Series::from_values("p", &[80.0, 80.0, 80.0, 80.0, 80.0, 81.0]);
        let result = IqrPolicy::new(4, 1.5).evaluate(
            &Evaluator::default(),
            &series,
            SamplingFrequency::FULL,
        );
        assert_eq!(result.evaluated, 2);
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].index, 5);
        assert_eq!(result.constant_bounds, Some(Bounds::new(80.0, 80.0)));
    }

    #[test]
    fn test_warm_up_uses_downsampled_length() {
        // 8 readings at stride 2 leave 4; warm-up of 8 / 2 = 4 leaves nothing to evaluate
        let raw = Series::from_values("p", &[70.0; 8]);
        let frequency = SamplingFrequency::new(2).unwrap();
        let sampled = raw.downsample(frequency);
        let result = IqrPolicy::new(8, 1.5).evaluate(&Evaluator::default(), &sampled, frequency);
        assert_eq!(result.start_index, Some(4));
        assert_eq!(result.evaluated, 0);
    }
}
