//! # HR Pulse Detection
//!
//! Statistics engine and policy evaluator for the heart-rate anomaly
//! benchmark.
//!
//! ## Policies
//! - **Percentile**: 1st/99th percentile of a warm-up prefix
//! - **IQR**: Tukey fences around the warm-up quartiles
//! - **Rolling Average**: mean ± k·σ over a trailing window
//! - **Fixed Threshold**: constant physiological range
//!
//! Every policy produces a [`BoundsProvider`](bounds::BoundsProvider) and an
//! evaluation start index; the shared [`Evaluator`](evaluator::Evaluator)
//! applies the anomaly rule, including the hard safety bounds.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod bounds;
pub mod evaluator;
pub mod policies;
pub mod stats;

pub use bounds::{BoundsProvider, ConstantBounds, IndexedBounds};
pub use evaluator::{Evaluation, Evaluator};
pub use policies::{
    DetectionPolicy, FixedThresholdPolicy, IqrPolicy, PercentilePolicy, PolicyBounds, PolicySet,
    RollingAveragePolicy,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bounds::{BoundsProvider, ConstantBounds, IndexedBounds};
    pub use crate::evaluator::{Evaluation, Evaluator};
    pub use crate::policies::{DetectionPolicy, PolicyBounds, PolicySet};
}
