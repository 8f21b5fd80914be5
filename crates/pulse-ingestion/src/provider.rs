//! The series provider abstraction.

use hr_pulse_core::{types::Series, Error, Result};

/// Lazy sequence of patient series. A failed item is a validation or I/O
/// error for that one source; later items are unaffected.
pub type SeriesIter<'a> = Box<dyn Iterator<Item = Result<Series>> + Send + 'a>;

/// Supplies patient series, in a stable order, every time it is asked.
pub trait SeriesProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Number of sources, if known up front
    fn source_count(&self) -> Option<usize> {
        None
    }

    /// Iterate all series from the beginning.
    fn series(&self) -> SeriesIter<'_>;
}

/// Provider over series already loaded in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: Vec<Series>,
}

impl InMemoryProvider {
    pub fn new(series: Vec<Series>) -> Self {
        Self { series }
    }

    pub fn push(&mut self, series: Series) {
        self.series.push(series);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<Series> for InMemoryProvider {
    fn from_iter<I: IntoIterator<Item = Series>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl SeriesProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn source_count(&self) -> Option<usize> {
        Some(self.series.len())
    }

    fn series(&self) -> SeriesIter<'_> {
        Box::new(self.series.iter().cloned().map(Ok::<Series, Error>))
    }
}
