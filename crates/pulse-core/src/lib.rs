//! # HR Pulse Core
//!
//! Shared building blocks for the heart-rate anomaly policy benchmark.
//!
//! This crate provides:
//! - The reading/series data model and the closed set of detection policies
//! - The [`Anomaly`] fact produced by policy evaluation
//! - The immutable [`BenchmarkConfig`] value passed to every stage
//! - A single [`Error`] type used across the workspace

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::Anomaly;

pub use config::BenchmarkConfig;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        BenchmarkConfig, BoundPair, DetectionConfig, IngestionConfig, OutputConfig,
    };
    pub use crate::error::{Error, Result};
    pub use crate::events::Anomaly;
    pub use crate::types::{
        Bounds, BreachType, PatientId, PolicyKind, Reading, SamplingFrequency, SensorType, Series,
    };
}
