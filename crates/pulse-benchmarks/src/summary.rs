//! Aggregated anomaly counts and the normalised rate matrix.

use hr_pulse_core::types::{BreachType, PolicyKind, SamplingFrequency};
use hr_pulse_detection::Evaluation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Anomalies are reported per this many evaluated readings.
pub const RATE_SCALE: f64 = 1000.0;

type CountKey = (PolicyKind, SamplingFrequency, BreachType);

/// Anomaly and evaluated-reading counts for a benchmark, or part of one.
///
/// Every field is a sum, so [`Summary::merge`] is associative and
/// commutative: partial summaries built by any number of workers combine to
/// the same result in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    tally_policy: PolicyKind,
    anomalies: BTreeMap<CountKey, u64>,
    evaluated: BTreeMap<(PolicyKind, SamplingFrequency), u64>,
    series: BTreeMap<SamplingFrequency, u64>,
}

impl Summary {
    /// Empty summary normalised by `tally_policy`'s evaluated counts.
    pub fn new(tally_policy: PolicyKind) -> Self {
        Self {
            tally_policy,
            anomalies: BTreeMap::new(),
            evaluated: BTreeMap::new(),
            series: BTreeMap::new(),
        }
    }

    pub fn tally_policy(&self) -> PolicyKind {
        self.tally_policy
    }

    /// Add one policy's result on one series.
    pub fn record(&mut self, evaluation: &Evaluation) {
        self.add_evaluated(evaluation.policy, evaluation.frequency, evaluation.evaluated);
        for anomaly in &evaluation.anomalies {
            self.add_anomalies(evaluation.policy, evaluation.frequency, anomaly.breach, 1);
        }
    }

    /// Count one more series evaluated at `frequency`.
    pub fn record_series(&mut self, frequency: SamplingFrequency) {
        *self.series.entry(frequency).or_default() += 1;
    }

    pub fn add_anomalies(
        &mut self,
        policy: PolicyKind,
        frequency: SamplingFrequency,
        breach: BreachType,
        count: u64,
    ) {
        if count > 0 {
            *self.anomalies.entry((policy, frequency, breach)).or_default() += count;
        }
    }

    pub fn add_evaluated(&mut self, policy: PolicyKind, frequency: SamplingFrequency, count: u64) {
        *self.evaluated.entry((policy, frequency)).or_default() += count;
    }

    /// Sum of two summaries. The receiver's tally policy is kept.
    pub fn merge(mut self, other: Summary) -> Summary {
        self.merge_from(other);
        self
    }

    pub fn merge_from(&mut self, other: Summary) {
        for (key, count) in other.anomalies {
            *self.anomalies.entry(key).or_default() += count;
        }
        for (key, count) in other.evaluated {
            *self.evaluated.entry(key).or_default() += count;
        }
        for (key, count) in other.series {
            *self.series.entry(key).or_default() += count;
        }
    }

    pub fn count(&self, policy: PolicyKind, frequency: SamplingFrequency, breach: BreachType) -> u64 {
        self.anomalies
            .get(&(policy, frequency, breach))
            .copied()
            .unwrap_or(0)
    }

    /// Anomalies of `policy` at `frequency` over every breach type.
    pub fn total(&self, policy: PolicyKind, frequency: SamplingFrequency) -> u64 {
        BreachType::ALL
            .iter()
            .map(|&breach| self.count(policy, frequency, breach))
            .sum()
    }

    pub fn evaluated(&self, policy: PolicyKind, frequency: SamplingFrequency) -> u64 {
        self.evaluated
            .get(&(policy, frequency))
            .copied()
            .unwrap_or(0)
    }

    /// Normalisation denominator for `frequency`.
    pub fn tally(&self, frequency: SamplingFrequency) -> u64 {
        self.evaluated(self.tally_policy, frequency)
    }

    pub fn series_count(&self, frequency: SamplingFrequency) -> u64 {
        self.series.get(&frequency).copied().unwrap_or(0)
    }

    /// Frequencies with at least one recorded series or count.
    pub fn frequencies(&self) -> BTreeSet<SamplingFrequency> {
        self.series
            .keys()
            .copied()
            .chain(self.evaluated.keys().map(|&(_, f)| f))
            .collect()
    }

    /// Rate of one matrix cell. `breach: None` sums every breach type.
    pub fn rate(
        &self,
        policy: PolicyKind,
        frequency: SamplingFrequency,
        breach: Option<BreachType>,
    ) -> Cell {
        let tally = self.tally(frequency);
        if tally == 0 {
            return Cell::NoData;
        }
        let count = match breach {
            Some(breach) => self.count(policy, frequency, breach),
            None => self.total(policy, frequency),
        };
        Cell::Rate(count as f64 / tally as f64 * RATE_SCALE)
    }

    /// `count / tally * 1000` for every recorded count with a non-zero tally.
    pub fn rates(&self) -> BTreeMap<(PolicyKind, SamplingFrequency, BreachType), f64> {
        self.anomalies
            .iter()
            .filter_map(|(&(policy, frequency, breach), &count)| {
                let tally = self.tally(frequency);
                (tally > 0).then(|| {
                    (
                        (policy, frequency, breach),
                        count as f64 / tally as f64 * RATE_SCALE,
                    )
                })
            })
            .collect()
    }

    /// Per-frequency tallies, in `frequencies` order.
    pub fn tallies(&self, frequencies: &[SamplingFrequency]) -> Vec<FrequencyTally> {
        frequencies
            .iter()
            .map(|&frequency| FrequencyTally {
                frequency,
                series: self.series_count(frequency),
                tally: self.tally(frequency),
                evaluated: PolicyKind::ALL
                    .iter()
                    .map(|&policy| (policy, self.evaluated(policy, frequency)))
                    .collect(),
            })
            .collect()
    }

    /// Arrange rates into report rows and columns.
    pub fn matrix(&self, frequencies: &[SamplingFrequency], separate_breach_types: bool) -> RateMatrix {
        let breaches: Vec<Option<BreachType>> = if separate_breach_types {
            BreachType::ALL.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        let rows = PolicyKind::ALL
            .iter()
            .flat_map(|&policy| {
                breaches.iter().map(move |&breach| MatrixRow {
                    policy,
                    breach,
                    cells: frequencies
                        .iter()
                        .map(|&frequency| self.rate(policy, frequency, breach))
                        .collect(),
                })
            })
            .collect();

        RateMatrix {
            frequencies: frequencies.to_vec(),
            separate_breach_types,
            rows,
        }
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::new(PolicyKind::FixedThreshold)
    }
}

/// Series and evaluated readings seen at one frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTally {
    pub frequency: SamplingFrequency,
    /// Eligible series evaluated
    pub series: u64,
    /// Denominator used for every rate in this column
    pub tally: u64,
    /// Evaluated readings per policy
    pub evaluated: BTreeMap<PolicyKind, u64>,
}

/// One matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Nothing was evaluated at this frequency
    NoData,
    /// Anomalies per 1000 evaluated readings
    Rate(f64),
}

impl Cell {
    pub fn rate(&self) -> Option<f64> {
        match self {
            Cell::NoData => None,
            Cell::Rate(rate) => Some(*rate),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Cell::NoData)
    }

    /// Unrounded value for machine-readable output.
    pub fn to_field(&self) -> String {
        match self {
            Cell::NoData => NO_DATA.to_string(),
            Cell::Rate(rate) => rate.to_string(),
        }
    }
}

const NO_DATA: &str = "N/A";

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::NoData => f.write_str(NO_DATA),
            Cell::Rate(rate) => write!(f, "{:.3}", rate),
        }
    }
}

/// A report row: one policy, optionally split by breach type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub policy: PolicyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breach: Option<BreachType>,
    /// One cell per matrix column
    pub cells: Vec<Cell>,
}

/// Policy × frequency rate matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateMatrix {
    /// Column order
    pub frequencies: Vec<SamplingFrequency>,
    pub separate_breach_types: bool,
    pub rows: Vec<MatrixRow>,
}

impl RateMatrix {
    /// Column headers, e.g. `Algorithm, Breach Type, Sampling 1, ...`.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["Algorithm".to_string()];
        if self.separate_breach_types {
            header.push("Breach Type".to_string());
        }
        header.extend(self.frequencies.iter().map(|f| f.column_label()));
        header
    }

    /// Row as display strings, in header order.
    pub fn row_labels(&self, row: &MatrixRow) -> Vec<String> {
        let mut labels = vec![row.policy.label().to_string()];
        if self.separate_breach_types {
            labels.push(row.breach.map(|b| b.to_string()).unwrap_or_default());
        }
        labels
    }

    pub fn cell(
        &self,
        policy: PolicyKind,
        breach: Option<BreachType>,
        frequency: SamplingFrequency,
    ) -> Option<Cell> {
        let column = self.frequencies.iter().position(|&f| f == frequency)?;
        self.rows
            .iter()
            .find(|row| row.policy == policy && row.breach == breach)
            .and_then(|row| row.cells.get(column).copied())
    }

    /// Fixed-width text table.
    pub fn render_table(&self) -> String {
        let header = self.header();
        let body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut fields = self.row_labels(row);
                fields.extend(row.cells.iter().map(|c| c.to_string()));
                fields
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|i| {
                body.iter()
                    .filter_map(|r| r.get(i))
                    .chain(std::iter::once(&header[i]))
                    .map(|s| s.len())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |fields: &[String]| {
            fields
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, (field, &width))| {
                    if i < self.label_columns() {
                        format!("{:<width$}", field, width = width)
                    } else {
                        format!("{:>width$}", field, width = width)
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        };

        let mut out = line(&header);
        out.push('\n');
        out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
        for row in &body {
            out.push('\n');
            out.push_str(&line(row));
        }
        out
    }

    fn label_columns(&self) -> usize {
        if self.separate_breach_types {
            2
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_pulse_core::{config::DetectionConfig, types::Series};
    use hr_pulse_detection::PolicySet;

    fn freq(n: u32) -> SamplingFrequency {
        SamplingFrequency::new(n).unwrap()
    }

    fn sample() -> Summary {
        let mut summary = Summary::new(PolicyKind::FixedThreshold);
        summary.add_evaluated(PolicyKind::FixedThreshold, freq(1), 2000);
        summary.add_evaluated(PolicyKind::Percentile, freq(1), 1000);
        summary.add_anomalies(PolicyKind::Percentile, freq(1), BreachType::Lower, 4);
        summary.add_anomalies(PolicyKind::Percentile, freq(1), BreachType::Upper, 6);
        summary.add_anomalies(PolicyKind::FixedThreshold, freq(1), BreachType::Both, 1);
        summary.record_series(freq(1));
        summary
    }

    #[test]
    fn test_rates_use_reference_tally() {
        let summary = sample();
        assert_eq!(summary.tally(freq(1)), 2000);
        assert_eq!(
            summary.rate(PolicyKind::Percentile, freq(1), None),
            Cell::Rate(5.0)
        );
        assert_eq!(
            summary.rate(PolicyKind::Percentile, freq(1), Some(BreachType::Lower)),
            Cell::Rate(2.0)
        );
        assert_eq!(summary.rates().len(), 3);
    }

    #[test]
    fn test_zero_anomalies_differs_from_no_data() {
        let summary = sample();
        assert_eq!(summary.rate(PolicyKind::Iqr, freq(1), None), Cell::Rate(0.0));
        assert_eq!(summary.rate(PolicyKind::Iqr, freq(5), None), Cell::NoData);
    }

    #[test]
    fn test_merge_sums() {
        let merged = sample().merge(sample());
        assert_eq!(merged.tally(freq(1)), 4000);
        assert_eq!(merged.count(PolicyKind::Percentile, freq(1), BreachType::Upper), 12);
        assert_eq!(merged.series_count(freq(1)), 2);
        assert_eq!(merged.rate(PolicyKind::Percentile, freq(1), None), Cell::Rate(5.0));
    }

    #[test]
    fn test_matrix_layout() {
        let summary = sample();
        let frequencies = [freq(1), freq(5)];

        let matrix = summary.matrix(&frequencies, false);
        assert_eq!(matrix.header(), vec!["Algorithm", "Sampling 1", "Sampling 5"]);
        let policies: Vec<PolicyKind> = matrix.rows.iter().map(|r| r.policy).collect();
        assert_eq!(policies, PolicyKind::ALL.to_vec());
        assert_eq!(matrix.rows[0].cells, vec![Cell::Rate(5.0), Cell::NoData]);

        let separated = summary.matrix(&frequencies, true);
        assert_eq!(separated.rows.len(), 12);
        assert_eq!(separated.header()[1], "Breach Type");
        assert_eq!(
            separated.cell(PolicyKind::Percentile, Some(BreachType::Upper), freq(1)),
            Some(Cell::Rate(3.0))
        );
    }

    #[test]
    fn test_separated_matrix_from_evaluations() {
        let config = DetectionConfig {
            separate_breach_types: true,
            ..Default::default()
        };
        let policies = PolicySet::from_config(&config);
        let series = Series::from_values(
            "p",
            &[70.0, 55.0, 70.0, 105.0, 130.0, 70.0, 35.0, 70.0],
        );

        let mut summary = Summary::new(PolicyKind::FixedThreshold);
        summary.record_series(freq(1));
        for evaluation in policies.evaluate_all(&series, freq(1)) {
            summary.record(&evaluation);
        }

        let matrix = summary.matrix(&[freq(1)], true);
        let fixed = |breach| matrix.cell(PolicyKind::FixedThreshold, Some(breach), freq(1));
        assert_eq!(fixed(BreachType::Lower), Some(Cell::Rate(125.0)));
        assert_eq!(fixed(BreachType::Upper), Some(Cell::Rate(125.0)));
        assert_eq!(fixed(BreachType::Both), Some(Cell::Rate(250.0)));
    }

    #[test]
    fn test_tallies_report_every_policy() {
        let tallies = sample().tallies(&[freq(1), freq(2)]);
        assert_eq!(tallies[0].tally, 2000);
        assert_eq!(tallies[0].series, 1);
        assert_eq!(tallies[0].evaluated[&PolicyKind::Percentile], 1000);
        assert_eq!(tallies[1].tally, 0);
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(Cell::NoData.to_string(), "N/A");
        assert_eq!(Cell::Rate(2.5).to_string(), "2.500");
        assert_eq!(Cell::Rate(2.5).to_field(), "2.5");
        assert_eq!(serde_json::to_string(&Cell::NoData).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Cell::Rate(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_render_table() {
        let table = sample().matrix(&[freq(1), freq(5)], false).render_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Algorithm"));
        assert!(lines[2].starts_with("Percentile"));
        assert!(lines[2].ends_with("N/A"));
    }
}
