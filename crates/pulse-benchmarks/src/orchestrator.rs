//! Benchmark orchestrator.
//!
//! One pass per configured sampling frequency. Each pass down-samples every
//! eligible series, runs all four policies on it and folds the results into
//! a [`Summary`]. A pass is final once complete; cancelling between passes
//! keeps every finished pass intact. A series the provider fails to load
//! aborts the run with that error.

use crate::summary::Summary;
use chrono::{DateTime, Utc};
use hr_pulse_core::{
    config::BenchmarkConfig,
    events::Anomaly,
    types::{SamplingFrequency, Series},
    Error, Result,
};
use hr_pulse_detection::PolicySet;
use hr_pulse_ingestion::SeriesProvider;
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of a single frequency pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyPass {
    pub frequency: SamplingFrequency,
    pub summary: Summary,
    /// Flagged readings, only when detail collection is on
    pub anomalies: Vec<Anomaly>,
}

/// Partial pass state owned by one worker.
#[derive(Debug)]
struct PassAccumulator {
    summary: Summary,
    anomalies: Vec<(usize, Vec<Anomaly>)>,
}

impl PassAccumulator {
    fn new(summary: Summary) -> Self {
        Self {
            summary,
            anomalies: Vec::new(),
        }
    }

    fn merge(mut self, other: PassAccumulator) -> Self {
        self.summary.merge_from(other.summary);
        self.anomalies.extend(other.anomalies);
        self
    }

    /// Anomalies in source order, then policy order, then index.
    fn into_anomalies(mut self) -> (Summary, Vec<Anomaly>) {
        self.anomalies.sort_by_key(|(ordinal, _)| *ordinal);
        let anomalies = self
            .anomalies
            .into_iter()
            .flat_map(|(_, anomalies)| anomalies)
            .collect();
        (self.summary, anomalies)
    }
}

/// Outcome of a whole benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Counts over every completed pass
    pub summary: Summary,
    /// Completed passes, in configured order
    pub passes: Vec<FrequencyPass>,
    /// Frequencies requested for the run
    pub frequencies: Vec<SamplingFrequency>,
    /// Stopped before every frequency was processed
    pub cancelled: bool,
}

impl BenchmarkRun {
    pub fn completed_frequencies(&self) -> Vec<SamplingFrequency> {
        self.passes.iter().map(|p| p.frequency).collect()
    }

    /// Every collected anomaly, pass by pass.
    pub fn anomalies(&self) -> impl Iterator<Item = &Anomaly> {
        self.passes.iter().flat_map(|p| p.anomalies.iter())
    }

    /// `Err(Error::Cancelled)` when the run stopped early.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.cancelled {
            return Err(Error::Cancelled {
                completed: self.passes.len(),
                total: self.frequencies.len(),
            });
        }
        Ok(())
    }
}

/// Drives the frequency passes of a benchmark.
#[derive(Debug)]
pub struct Orchestrator {
    config: BenchmarkConfig,
    policies: PolicySet,
    cancel: Arc<AtomicBool>,
    collect_anomalies: bool,
}

impl Orchestrator {
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;
        let policies = PolicySet::from_config(&config.detection);
        let collect_anomalies = config.output.write_anomaly_details;

        Ok(Self {
            config,
            policies,
            cancel: Arc::new(AtomicBool::new(false)),
            collect_anomalies,
        })
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Keep every flagged reading, not just the counts.
    pub fn with_anomaly_details(mut self, enabled: bool) -> Self {
        self.collect_anomalies = enabled;
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Stop before the next frequency pass.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run every pass sequentially.
    pub fn run(&self, provider: &dyn SeriesProvider) -> Result<BenchmarkRun> {
        self.run_passes(provider, |frequency| self.run_frequency(provider, frequency))
    }

    /// Run every pass with patients evaluated concurrently.
    pub fn run_parallel(&self, provider: &dyn SeriesProvider) -> Result<BenchmarkRun> {
        self.run_passes(provider, |frequency| {
            self.run_frequency_parallel(provider, frequency)
        })
    }

    fn run_passes<F>(&self, provider: &dyn SeriesProvider, mut pass: F) -> Result<BenchmarkRun>
    where
        F: FnMut(SamplingFrequency) -> Result<FrequencyPass>,
    {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let frequencies = self.config.sampling_frequencies.clone();

        info!(
            run_id = %id,
            provider = provider.name(),
            sources = ?provider.source_count(),
            frequencies = ?frequencies.iter().map(|f| f.get()).collect::<Vec<_>>(),
            min_readings = self.config.min_readings,
            max_patients = self.config.max_patients,
            "Starting benchmark run"
        );

        let mut summary = Summary::new(self.config.tally_policy);
        let mut passes = Vec::with_capacity(frequencies.len());
        let mut cancelled = false;

        for &frequency in &frequencies {
            if self.is_cancelled() {
                warn!(
                    run_id = %id,
                    completed = passes.len(),
                    total = frequencies.len(),
                    "Benchmark cancelled"
                );
                cancelled = true;
                break;
            }

            let result = pass(frequency).map_err(|e| {
                error!(
                    run_id = %id,
                    frequency = frequency.get(),
                    error = %e,
                    "Frequency pass failed"
                );
                e
            })?;
            summary.merge_from(result.summary.clone());
            passes.push(result);
        }

        let finished_at = Utc::now();
        info!(
            run_id = %id,
            passes = passes.len(),
            cancelled,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Benchmark run finished"
        );

        Ok(BenchmarkRun {
            id,
            started_at,
            finished_at,
            summary,
            passes,
            frequencies,
            cancelled,
        })
    }

    /// One sequential pass at `frequency`. Stops at the first series the
    /// provider fails to load.
    pub fn run_frequency(
        &self,
        provider: &dyn SeriesProvider,
        frequency: SamplingFrequency,
    ) -> Result<FrequencyPass> {
        let start = Instant::now();

        let acc = self.eligible(provider).try_fold(
            PassAccumulator::new(Summary::new(self.config.tally_policy)),
            |mut acc, loaded| {
                let (ordinal, series) = loaded?;
                self.absorb(&mut acc, ordinal, &series, frequency);
                Ok::<_, Error>(acc)
            },
        )?;

        Ok(self.finish_pass(frequency, acc, start))
    }

    /// One pass at `frequency` with patients spread over the rayon pool.
    ///
    /// Any load failure fails the pass; when several series fail, which
    /// error is returned is unspecified.
    pub fn run_frequency_parallel(
        &self,
        provider: &dyn SeriesProvider,
        frequency: SamplingFrequency,
    ) -> Result<FrequencyPass> {
        let start = Instant::now();
        let tally_policy = self.config.tally_policy;

        let acc = self
            .eligible(provider)
            .par_bridge()
            .try_fold(
                || PassAccumulator::new(Summary::new(tally_policy)),
                |mut acc, loaded| {
                    let (ordinal, series) = loaded?;
                    self.absorb(&mut acc, ordinal, &series, frequency);
                    Ok::<_, Error>(acc)
                },
            )
            .try_reduce(
                || PassAccumulator::new(Summary::new(tally_policy)),
                |a, b| Ok(a.merge(b)),
            )?;

        Ok(self.finish_pass(frequency, acc, start))
    }

    /// Eligible series tagged with their source position, capped at
    /// `max_patients`. Load failures are passed through untouched.
    fn eligible<'a>(
        &'a self,
        provider: &'a dyn SeriesProvider,
    ) -> impl Iterator<Item = Result<(usize, Series)>> + Send + 'a {
        let min_readings = self.config.min_readings;

        provider
            .series()
            .filter(move |loaded| match loaded {
                Ok(series) if series.len() < min_readings => {
                    debug!(
                        patient = %series.patient,
                        len = series.len(),
                        min_readings,
                        "Series below minimum length"
                    );
                    false
                }
                _ => true,
            })
            .take(self.config.max_patients)
            .enumerate()
            .map(|(ordinal, loaded)| loaded.map(|series| (ordinal, series)))
    }

    fn absorb(
        &self,
        acc: &mut PassAccumulator,
        ordinal: usize,
        series: &Series,
        frequency: SamplingFrequency,
    ) {
        let sampled = series.downsample(frequency);
        let evaluations = self.policies.evaluate_all(&sampled, frequency);

        acc.summary.record_series(frequency);
        for evaluation in &evaluations {
            acc.summary.record(evaluation);
        }

        if self.collect_anomalies {
            let anomalies: Vec<Anomaly> = evaluations
                .into_iter()
                .flat_map(|e| e.anomalies)
                .collect();
            if !anomalies.is_empty() {
                acc.anomalies.push((ordinal, anomalies));
            }
        }
    }

    fn finish_pass(
        &self,
        frequency: SamplingFrequency,
        acc: PassAccumulator,
        start: Instant,
    ) -> FrequencyPass {
        let (summary, anomalies) = acc.into_anomalies();

        info!(
            frequency = frequency.get(),
            series = summary.series_count(frequency),
            tally = summary.tally(frequency),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Frequency pass complete"
        );

        FrequencyPass {
            frequency,
            summary,
            anomalies,
        }
    }
}

/// Run the configured benchmark sequentially over `provider`.
pub fn run_benchmark(provider: &dyn SeriesProvider, config: &BenchmarkConfig) -> Result<BenchmarkRun> {
    Orchestrator::new(config.clone())?.run(provider)
}
