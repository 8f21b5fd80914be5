//! # HR Pulse Ingestion
//!
//! Series sources for the benchmark. Everything here runs at the boundary:
//! rows are validated while loading, so the detection engine only ever sees
//! numeric, ordered, non-empty series.
//!
//! - [`CsvDirectoryProvider`]: one CSV file per patient in a directory
//! - [`InMemoryProvider`]: series already held in memory

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod csv_source;
pub mod provider;

pub use csv_source::{load_series, patient_id_from_path, CsvColumns, CsvDirectoryProvider};
pub use provider::{InMemoryProvider, SeriesIter, SeriesProvider};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::csv_source::{CsvColumns, CsvDirectoryProvider};
    pub use crate::provider::{InMemoryProvider, SeriesProvider};
}
