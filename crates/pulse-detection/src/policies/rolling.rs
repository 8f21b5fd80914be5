//! Rolling-average policy: mean ± k·σ over a trailing window.
//!
//! Window size and minimum periods are counted in down-sampled readings and
//! are not rescaled by the sampling frequency. The first `min_periods`
//! indices are never evaluated, even though bounds already exist at
//! `min_periods - 1`.

use super::{DetectionPolicy, PolicyBounds};
use crate::bounds::IndexedBounds;
use crate::stats;
use hr_pulse_core::{
    config::DetectionConfig,
    types::{PolicyKind, SamplingFrequency, Series},
};

#[derive(Debug, Clone, PartialEq)]
pub struct RollingAveragePolicy {
    window: usize,
    min_periods: usize,
    std_multiplier: f64,
}

impl RollingAveragePolicy {
    pub fn new(window: usize, min_periods: usize, std_multiplier: f64) -> Self {
        Self {
            window,
            min_periods,
            std_multiplier,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.rolling_window,
            config.rolling_min_periods,
            config.rolling_std_multiplier,
        )
    }
}

impl DetectionPolicy for RollingAveragePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::RollingAverage
    }

    fn bounds(&self, series: &Series, _frequency: SamplingFrequency) -> Option<PolicyBounds> {
        let values = series.value_vec();
        let bounds = stats::rolling_bounds(
            &values,
            self.window,
            self.min_periods,
            self.std_multiplier,
        );
        Some(PolicyBounds::new(
            IndexedBounds::new(bounds),
            self.min_periods,
        ))
    }
}
