//! Statistical helpers used to derive policy bounds.

use hr_pulse_core::types::Bounds;
use std::collections::VecDeque;

/// Quantile by linear interpolation between order statistics (R-7).
///
/// `p` is clamped to `[0, 1]`. Returns `None` for empty input.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

/// [`quantile`] on data that is already sorted ascending.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let upper = h.ceil() as usize;

    if lower == upper {
        return Some(sorted[lower]);
    }

    let (lo, hi) = (sorted[lower], sorted[upper]);
    Some(lo + (hi - lo) * (h - lower as f64))
}

/// Arithmetic mean, `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator), `None` below two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Bounded FIFO of the most recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    data: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            data: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, evicting the oldest once full.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    pub fn sample_std_dev(&self) -> Option<f64> {
        let n = self.data.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance =
            self.data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(variance.sqrt())
    }
}

/// Per-index `mean ± k·σ` over a trailing window of up to `window` values.
///
/// Index `i` has undefined bounds while fewer than `min_periods` values
/// (including the current one) are available; the window grows until it
/// reaches `window` values and then slides.
pub fn rolling_bounds(values: &[f64], window: usize, min_periods: usize, k: f64) -> Vec<Bounds> {
    let mut rolling = RollingWindow::new(window);

    values
        .iter()
        .map(|&value| {
            rolling.push(value);
            if rolling.len() < min_periods {
                return Bounds::UNDEFINED;
            }
            match (rolling.mean(), rolling.sample_std_dev()) {
                (Some(mean), Some(std_dev)) => Bounds::new(mean - k * std_dev, mean + k * std_dev),
                _ => Bounds::UNDEFINED,
            }
        })
        .collect()
}
