//! Fixed-threshold policy: the same configured range for every index.

use super::{DetectionPolicy, PolicyBounds};
use crate::bounds::ConstantBounds;
use hr_pulse_core::{
    config::DetectionConfig,
    types::{PolicyKind, SamplingFrequency, Series},
};

#[derive(Debug, Clone, PartialEq)]
pub struct FixedThresholdPolicy {
    lower: f64,
    upper: f64,
}

impl FixedThresholdPolicy {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.fixed.lower, config.fixed.upper)
    }
}

impl DetectionPolicy for FixedThresholdPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::FixedThreshold
    }

    fn bounds(&self, _series: &Series, _frequency: SamplingFrequency) -> Option<PolicyBounds> {
        Some(PolicyBounds::new(
            ConstantBounds::new(self.lower, self.upper),
            0,
        ))
    }
}
